use eyeriss::arch::eyeriss::tensor::{all_close, conv2d_direct, Matrix};
use eyeriss::arch::eyeriss::pe::row_address;
use eyeriss::arch::eyeriss::{Eyeriss, Message};
use eyeriss::{AcceleratorConfig, EyerissError};
use ndarray::{array, s, Array2};
use proptest::prelude::*;

fn eyeriss(rows: usize, cols: usize) -> Eyeriss {
  Eyeriss::from_config(&AcceleratorConfig::new(rows, cols, 0.0, 0.0)).unwrap()
}

#[test]
fn ones_on_two_by_three_array() {
  let mut e = eyeriss(2, 3);
  e.set_filter(Array2::<f64>::ones((2, 2)).view()).unwrap();
  e.set_image(Array2::<f64>::ones((4, 3)).view()).unwrap();
  let out = e.compute().unwrap();
  assert_eq!(out.dim(), (3, 2));
  assert!(out.iter().all(|v| *v == 4.0));
}

#[test]
fn output_rows_are_capped_by_columns() {
  // 4 rows of valid output, only 3 columns to hold them
  let mut e = eyeriss(4, 3);
  let image = Matrix::from_shape_fn((5, 5), |(r, c)| (r * 5 + c) as f64);
  let kernel = array![[1.0, 2.0], [0.0, -1.0]];
  e.set_filter(kernel.view()).unwrap();
  e.set_image(image.view()).unwrap();
  let out = e.compute().unwrap();
  let expected = conv2d_direct(image.view(), kernel.view());
  assert_eq!(out, expected.slice(s![..3, ..]).to_owned());
}

#[test]
fn filter_rows_equal_array_rows() {
  let mut e = eyeriss(3, 3);
  let image = Matrix::from_shape_fn((5, 4), |(r, c)| ((r + 1) * (c + 2)) as f64);
  let kernel = array![[1.0, 0.0], [2.0, 1.0], [-1.0, 3.0]];
  let out = e.compute_with(Some(&image), Some(&kernel)).unwrap();
  assert_eq!(out, conv2d_direct(image.view(), kernel.view()));
}

#[test]
fn repeated_compute_is_idempotent() {
  let mut e = eyeriss(3, 4);
  let image = Matrix::from_shape_fn((5, 6), |(r, c)| (r as f64) - (c as f64) * 0.25);
  let kernel = array![[0.5, 1.0], [1.0, -0.5], [2.0, 0.0]];
  e.set_filter(kernel.view()).unwrap();
  e.set_image(image.view()).unwrap();

  let first = e.compute().unwrap();
  let psums: Vec<_> = e.noc().iter().map(|(c, _)| e.snapshot(c).unwrap().psum).collect();
  let second = e.compute().unwrap();
  let again: Vec<_> = e.noc().iter().map(|(c, _)| e.snapshot(c).unwrap().psum).collect();

  assert_eq!(first, second);
  assert_eq!(psums, again);
  assert_eq!(first, conv2d_direct(image.view(), kernel.view()));
}

#[test]
fn batches_reuse_the_array() {
  let mut e = eyeriss(2, 2);
  let kernel = array![[1.0, 1.0], [1.0, 1.0]];
  e.set_filter(kernel.view()).unwrap();
  for scale in [1.0, 2.0, 3.0] {
    let image = Array2::from_elem((3, 3), scale);
    e.set_image(image.view()).unwrap();
    assert_eq!(e.compute().unwrap(), Array2::from_elem((2, 2), 4.0 * scale));
  }
}

#[test]
fn capacity_errors() {
  let mut e = eyeriss(2, 3);
  assert!(matches!(e.set_filter(Array2::<f64>::ones((3, 2)).view()), Err(EyerissError::Configuration(_))));
  assert!(matches!(e.set_filter(Array2::<f64>::ones((2, 4)).view()), Err(EyerissError::Configuration(_))));
  e.set_filter(Array2::<f64>::ones((1, 1)).view()).unwrap();
  assert!(matches!(e.set_image(Array2::<f64>::ones((6, 2)).view()), Err(EyerissError::Configuration(_))));
  assert!(!e.is_ready());
}

#[test]
fn multicast_delivers_identical_payloads() {
  let mut e = eyeriss(3, 3);
  let msg = Message::write_ifmap(row_address(), array![1.5, -2.0, 4.0]);
  let before = msg.clone();
  let dests = [(0, 0), (1, 2), (2, 1)];
  e.noc_mut().multicast(&msg, &dests).unwrap();
  assert_eq!(msg, before);
  for coord in dests {
    assert_eq!(e.snapshot(coord).unwrap().ifmap, array![1.5, -2.0, 4.0]);
  }
}

#[test]
fn diagonal_edges_are_empty() {
  let e = eyeriss(4, 5);
  for c in 0..5 {
    assert!(e.noc().diagonal_connections((0, c)).unwrap().is_empty());
  }
  for r in 0..4 {
    assert!(e.noc().diagonal_connections((r, 4)).unwrap().is_empty());
  }
  assert_eq!(e.noc().diagonal_connections((3, 0)).unwrap(), vec![(2, 1), (1, 2), (0, 3)]);
}

fn conv_case() -> impl Strategy<Value = (usize, usize, Array2<f64>, Array2<f64>)> {
  (1usize..=4, 1usize..=4)
    .prop_flat_map(|(rows, cols)| (1..=rows, 1..=cols, Just(rows), Just(cols)))
    .prop_flat_map(|(fr, fc, rows, cols)| {
      (fr..=(fr + cols).min(rows + cols), fc..=(fc + 6).min(16),
       Just(fr), Just(fc), Just(rows), Just(cols))
    })
    .prop_flat_map(|(irows, icols, fr, fc, rows, cols)| {
      (prop::collection::vec(-5i32..=5, irows * icols),
       prop::collection::vec(-3i32..=3, fr * fc),
       Just(irows), Just(icols), Just(fr), Just(fc),
       Just(rows), Just(cols))
    })
    .prop_map(|(image, kernel, irows, icols, fr, fc, rows, cols)| {
      let image = Array2::from_shape_vec((irows, icols), image.into_iter().map(f64::from).collect()).unwrap();
      let kernel = Array2::from_shape_vec((fr, fc), kernel.into_iter().map(f64::from).collect()).unwrap();
      (rows, cols, image, kernel)
    })
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn matches_direct_convolution((rows, cols, image, kernel) in conv_case()) {
    let mut e = eyeriss(rows, cols);
    let out = e.compute_with(Some(&image), Some(&kernel)).unwrap();

    let expected = conv2d_direct(image.view(), kernel.view());
    let keep = expected.nrows().min(cols);
    let expected = expected.slice(s![..keep, ..]).to_owned();
    prop_assert!(all_close(out.view(), expected.view(), 1e-9), "{:?} vs {:?}", out, expected);
  }
}
