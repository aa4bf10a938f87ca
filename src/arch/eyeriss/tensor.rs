// Tensor helpers on top of ndarray: rows, matrices and the convolution kernels

use crate::error::{EyerissError, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// One row of values (a word's contents, a message payload)
pub type Payload = Array1<f64>;

/// Row-major 2-D array
pub type Matrix = Array2<f64>;

/// Promote any numeric matrix to f64
pub fn to_matrix<T: Copy + Into<f64>>(a: ArrayView2<T>) -> Matrix {
  a.mapv(|v| v.into())
}

/// Valid-mode 1-D cross-correlation: out[i] = sum(row[i..i+k] * weight)
pub fn conv1d(row: ArrayView1<f64>, weight: ArrayView1<f64>) -> Payload {
  let n = row.len();
  let k = weight.len();
  if k == 0 || k > n {
    return Payload::zeros(0);
  }
  Payload::from_shape_fn(n - k + 1, |i| {
    row.slice(s![i..i + k]).dot(&weight)
  })
}

/// Direct-loop 2-D valid cross-correlation, the oracle for the PE array
pub fn conv2d_direct(image: ArrayView2<f64>, kernel: ArrayView2<f64>) -> Matrix {
  let (ir, ic) = image.dim();
  let (kr, kc) = kernel.dim();
  if kr == 0 || kc == 0 || kr > ir || kc > ic {
    return Matrix::zeros((0, 0));
  }
  let mut out = Matrix::zeros((ir - kr + 1, ic - kc + 1));
  for ((r, c), v) in out.indexed_iter_mut() {
    let mut acc = 0.0;
    for i in 0..kr {
      for j in 0..kc {
        acc += image[[r + i, c + j]] * kernel[[i, j]];
      }
    }
    *v = acc;
  }
  out
}

/// Stack equal-length rows into a matrix
pub fn stack_rows(rows: &[Payload]) -> Result<Matrix> {
  let width = rows.first().map_or(0, |r| r.len());
  let mut out = Matrix::zeros((rows.len(), width));
  for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(rows) {
    if src.len() != width {
      return Err(EyerissError::Shape {
        expected: width,
        actual: src.len(),
      });
    }
    dst.assign(src);
  }
  Ok(out)
}

/// Elementwise closeness with a mixed absolute/relative tolerance
pub fn all_close(a: ArrayView2<f64>, b: ArrayView2<f64>, tol: f64) -> bool {
  a.dim() == b.dim()
    && a
      .iter()
      .zip(b.iter())
      .all(|(x, y)| (x - y).abs() <= tol * (1.0 + x.abs().max(y.abs())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn test_conv1d() {
    let row = array![1.0, 2.0, 3.0, 4.0];
    let w = array![1.0, 0.0, -1.0];
    assert_eq!(conv1d(row.view(), w.view()), array![-2.0, -2.0]);

    // no flipping
    let w = array![1.0, 2.0];
    assert_eq!(conv1d(row.view(), w.view()), array![5.0, 8.0, 11.0]);

    let long = array![1.0, 1.0, 1.0, 1.0, 1.0];
    assert_eq!(conv1d(row.view(), long.view()).len(), 0);
  }

  #[test]
  fn test_conv2d_direct() {
    let image = Matrix::ones((4, 3));
    let kernel = Matrix::ones((2, 2));
    let out = conv2d_direct(image.view(), kernel.view());
    assert_eq!(out, Matrix::from_elem((3, 2), 4.0));

    let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
    let kernel = array![[1.0, 0.0], [0.0, 1.0]];
    assert_eq!(conv2d_direct(image.view(), kernel.view()), array![[6.0, 8.0], [12.0, 14.0]]);
  }

  #[test]
  fn test_stack_rows() {
    let m = stack_rows(&[array![1.0, 2.0], array![3.0, 4.0]]).unwrap();
    assert_eq!(m, array![[1.0, 2.0], [3.0, 4.0]]);
    assert!(stack_rows(&[array![1.0], array![1.0, 2.0]]).is_err());
    assert_eq!(stack_rows(&[]).unwrap().dim(), (0, 0));
  }

  #[test]
  fn test_to_matrix_promotes() {
    let ints = array![[1i32, 2], [3, 4]];
    assert_eq!(to_matrix(ints.view()), array![[1.0, 2.0], [3.0, 4.0]]);
    let bytes = array![[255u8]];
    assert_eq!(to_matrix(bytes.view())[[0, 0]], 255.0);
  }
}
