use crate::arch::eyeriss::eyeriss::Eyeriss;
use crate::arch::eyeriss::pe::Endpoint;
use crate::arch::eyeriss::tensor::Matrix;
use crate::error::{EyerissError, Result};
use crate::simulator::config::WorkloadSection;
use ndarray::{array, s, ArrayView2};

/// One convolution layer to push through the array
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
  pub image: Matrix,
  pub kernel: Matrix,
}

impl Workload {
  pub fn synthetic(section: &WorkloadSection) -> Self {
    Self {
      image: synthetic_image(section.image_rows, section.image_cols),
      kernel: gaussian_kernel(),
    }
  }
}

/// Deterministic pseudo-random image in [-0.5, 0.5)
pub fn synthetic_image(rows: usize, cols: usize) -> Matrix {
  Matrix::from_shape_fn((rows, cols), |(r, c)| ((r * 31 + c * 17 + r * c) % 23) as f64 / 23.0 - 0.5)
}

/// Normalised 3x3 Gaussian blur
pub fn gaussian_kernel() -> Matrix {
  array![[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]] / 16.0
}

/// Convolve an image of any size by tiling it over the array.
///
/// Output rows are produced in batches of at most `cols` rows; each batch is
/// split into column tiles no wider than a scratchpad word, overlapping by
/// `kernel_cols - 1` image columns. The filter is loaded once.
pub fn convolve_tiled<E: Endpoint>(eyeriss: &mut Eyeriss<E>, image: ArrayView2<'_, f64>, kernel: ArrayView2<'_, f64>) -> Result<Matrix> {
  let (ir, ic) = image.dim();
  let (kr, kc) = kernel.dim();
  if kr == 0 || kc == 0 || ir < kr || ic < kc {
    return Err(EyerissError::Configuration(format!(
      "image {}x{} cannot be convolved with a {}x{} kernel",
      ir, ic, kr, kc
    )));
  }

  eyeriss.set_filter(kernel)?;

  let (_, cols) = eyeriss.size();
  let word_size = eyeriss.noc().pe_config().word_size;
  let (out_rows, out_cols) = (ir - kr + 1, ic - kc + 1);
  let tile_width = word_size.min(ic);
  let tile_step = tile_width - kc + 1;

  let mut out = Matrix::zeros((out_rows, out_cols));
  let mut tiles = 0usize;

  for r0 in (0..out_rows).step_by(cols) {
    let batch = cols.min(out_rows - r0);
    let image_rows = r0..r0 + batch + kr - 1;

    for c0 in (0..out_cols).step_by(tile_step) {
      let image_end = (c0 + tile_width).min(ic);
      let tile = image.slice(s![image_rows.clone(), c0..image_end]);
      eyeriss.set_image(tile)?;
      let part = eyeriss.compute()?;

      let (pr, pc) = part.dim();
      out.slice_mut(s![r0..r0 + pr, c0..c0 + pc]).assign(&part);
      tiles += 1;
    }
  }

  log::info!(
    "convolved {}x{} image in {} tile(s), output {}x{}",
    ir,
    ic,
    tiles,
    out_rows,
    out_cols
  );
  Ok(out)
}
