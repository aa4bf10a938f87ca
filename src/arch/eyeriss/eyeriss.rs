// Row-stationary accelerator: maps a 2-D convolution onto the PE grid

use super::actor::PeActor;
use super::memory::{AccessStats, Memory};
use super::message::Message;
use super::noc::{Coord, LinkStats, NetworkOnChip};
use super::pe::{row_address, Endpoint, PeSnapshot, ProcessingElement};
use super::tensor::{stack_rows, to_matrix, Matrix, Payload};
use crate::error::{EyerissError, Result};
use crate::simulator::config::AcceleratorConfig;
use ndarray::ArrayView2;
use serde::Serialize;

/// Aggregate cost of everything the accelerator has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostReport {
  pub scratchpads: AccessStats,
  pub global_buffer: AccessStats,
  pub noc: LinkStats,
}

impl CostReport {
  pub fn latency(&self) -> f64 {
    self.scratchpads.latency + self.global_buffer.latency + self.noc.latency
  }

  pub fn energy(&self) -> f64 {
    self.scratchpads.energy + self.global_buffer.energy + self.noc.energy
  }
}

/// Eyeriss accelerator.
///
/// Filter row `i` is held by every PE of grid row `i`; image row `t` is held
/// by every PE `(i, j)` with `i + j == t`. Each PE convolves its two rows,
/// the partial sums are folded upward, and grid row 0 ends up holding one
/// output row per column.
pub struct Eyeriss<E: Endpoint = ProcessingElement> {
  noc: NetworkOnChip<E>,
  filter_shape: Option<(usize, usize)>,
  image_shape: Option<(usize, usize)>,
  /// Set once the partial sums of the current operands have been folded
  reduced: bool,
}

impl Eyeriss {
  pub fn from_config(config: &AcceleratorConfig) -> Result<Self> {
    Self::build(config)
  }
}

impl Eyeriss<PeActor> {
  /// Accelerator whose PEs each run on their own thread
  pub fn with_actors(config: &AcceleratorConfig) -> Result<Self> {
    Self::build(config)
  }
}

impl<E: Endpoint> Eyeriss<E> {
  pub fn build(config: &AcceleratorConfig) -> Result<Self> {
    if config.rows == 0 || config.cols == 0 {
      return Err(EyerissError::Configuration(format!(
        "array must have at least one row and column, got {}x{}",
        config.rows, config.cols
      )));
    }
    Ok(Self {
      noc: NetworkOnChip::new(config)?,
      filter_shape: None,
      image_shape: None,
      reduced: false,
    })
  }

  pub fn size(&self) -> Coord {
    self.noc.size()
  }

  pub fn noc(&self) -> &NetworkOnChip<E> {
    &self.noc
  }

  pub fn noc_mut(&mut self) -> &mut NetworkOnChip<E> {
    &mut self.noc
  }

  pub fn pe(&self, coord: Coord) -> Result<&E> {
    self.noc.pe(coord)
  }

  pub fn snapshot(&self, coord: Coord) -> Result<PeSnapshot> {
    self.noc.snapshot(coord)
  }

  pub fn filter_shape(&self) -> Option<(usize, usize)> {
    self.filter_shape
  }

  pub fn image_shape(&self) -> Option<(usize, usize)> {
    self.image_shape
  }

  pub fn is_ready(&self) -> bool {
    self.filter_shape.is_some() && self.image_shape.is_some()
  }

  /// Forget the loaded operands. Scratchpad contents are left alone.
  pub fn reset(&mut self) {
    self.filter_shape = None;
    self.image_shape = None;
    self.reduced = false;
    log::debug!("Eyeriss reset");
  }

  fn not_ready(&self) -> EyerissError {
    EyerissError::NotReady {
      filter_loaded: self.filter_shape.is_some(),
      image_loaded: self.image_shape.is_some(),
    }
  }

  fn check_filter(&self, (fr, fc): (usize, usize)) -> Result<()> {
    let (rows, cols) = self.size();
    let word_size = self.noc.pe_config().word_size;
    if fr == 0 || fc == 0 {
      return Err(EyerissError::Configuration(format!("filter {}x{} is empty", fr, fc)));
    }
    if fr > rows || fc > cols {
      return Err(EyerissError::Configuration(format!(
        "filter {}x{} does not fit the {}x{} array",
        fr, fc, rows, cols
      )));
    }
    if fc > word_size {
      return Err(EyerissError::Configuration(format!(
        "filter row of {} values exceeds the {}-value scratchpad word",
        fc, word_size
      )));
    }
    Ok(())
  }

  fn check_image(&self, (ir, ic): (usize, usize), (fr, fc): (usize, usize)) -> Result<()> {
    let (rows, cols) = self.size();
    let word_size = self.noc.pe_config().word_size;
    if ir > rows + cols {
      return Err(EyerissError::Configuration(format!(
        "image has {} rows, the {}x{} array holds at most {}",
        ir,
        rows,
        cols,
        rows + cols
      )));
    }
    if ir < fr || ic < fc {
      return Err(EyerissError::Configuration(format!(
        "image {}x{} is smaller than the {}x{} filter",
        ir, ic, fr, fc
      )));
    }
    if ir - fr > cols {
      return Err(EyerissError::Configuration(format!(
        "image of {} rows needs {} output columns, array has {}",
        ir,
        ir - fr + 1,
        cols
      )));
    }
    if ic > word_size {
      return Err(EyerissError::Configuration(format!(
        "image row of {} values exceeds the {}-value scratchpad word",
        ic, word_size
      )));
    }
    Ok(())
  }

  /// Distribute a filter: kernel row `i` goes to every PE of grid row `i`
  pub fn set_filter<T: Copy + Into<f64>>(&mut self, kernel: ArrayView2<'_, T>) -> Result<()> {
    let shape = kernel.dim();
    self.check_filter(shape)?;
    let kernel = to_matrix(kernel);
    let (_, cols) = self.size();

    self.noc.broadcast(&Message::write_filter(row_address(), Payload::zeros(0)))?;
    self.noc.broadcast(&Message::write_psum(row_address(), Payload::zeros(0)))?;

    for (i, row) in kernel.rows().into_iter().enumerate() {
      let dests: Vec<Coord> = (0..cols).map(|j| (i, j)).collect();
      log::debug!("filter row {} -> grid row {}", i, i);
      self.noc.multicast(&Message::write_filter(row_address(), row.to_owned()), &dests)?;
    }
    self.noc.flush()?;

    self.filter_shape = Some(shape);
    self.reduced = false;
    log::info!("filter {}x{} loaded", shape.0, shape.1);
    Ok(())
  }

  /// Distribute an image along the anti-diagonals of the grid
  pub fn set_image<T: Copy + Into<f64>>(&mut self, image: ArrayView2<'_, T>) -> Result<()> {
    let filter = self.filter_shape.ok_or_else(|| self.not_ready())?;
    let shape = image.dim();
    self.check_image(shape, filter)?;
    let image = to_matrix(image);
    let (rows, cols) = self.size();

    self.noc.broadcast(&Message::write_ifmap(row_address(), Payload::zeros(0)))?;
    self.noc.broadcast(&Message::write_psum(row_address(), Payload::zeros(0)))?;

    for (t, row) in image.rows().into_iter().enumerate() {
      // walk down column 0, then along the bottom row
      let start_row = t.min(rows - 1);
      let start_col = t - start_row;
      if start_col >= cols {
        log::debug!("image row {} has no PE, skipped", t);
        continue;
      }
      let mut dests = vec![(start_row, start_col)];
      dests.extend(self.noc.diagonal_connections((start_row, start_col))?);
      log::debug!("image row {} -> {:?}", t, dests);
      self.noc.multicast(&Message::write_ifmap(row_address(), row.to_owned()), &dests)?;
    }
    self.noc.flush()?;

    self.image_shape = Some(shape);
    self.reduced = false;
    log::info!("image {}x{} loaded", shape.0, shape.1);
    Ok(())
  }

  /// Run the convolution of the loaded image with the loaded filter.
  ///
  /// The result has `min(image_rows - filter_rows + 1, cols)` rows of
  /// `image_cols - filter_cols + 1` values.
  pub fn compute(&mut self) -> Result<Matrix> {
    let (Some(filter), Some(image)) = (self.filter_shape, self.image_shape) else {
      return Err(self.not_ready());
    };
    // the image was checked against whichever filter was loaded at the time
    self.check_image(image, filter)?;
    let (fr, fc) = filter;
    let (ir, ic) = image;
    let (_, cols) = self.size();

    if !self.reduced {
      if let Err(err) = self.reduce(fr, cols) {
        // partial sums are now half folded; only a fresh image load clears them
        log::warn!("psum fold failed, image must be reloaded: {}", err);
        self.image_shape = None;
        return Err(err);
      }
      self.reduced = true;
    }

    let out_rows = (ir - fr + 1).min(cols);
    let out_cols = ic - fc + 1;
    let mut result = Vec::with_capacity(out_rows);
    for j in 0..out_rows {
      let psum = self
        .noc
        .send((0, j), &Message::read_psum(row_address()))?
        .unwrap_or_else(|| Payload::zeros(0));
      if psum.is_empty() {
        result.push(Payload::zeros(out_cols));
      } else if psum.len() != out_cols {
        return Err(EyerissError::Shape {
          expected: out_cols,
          actual: psum.len(),
        });
      } else {
        result.push(psum);
      }
    }

    log::info!("computed {}x{} output ({}x{} image, {}x{} filter)", out_rows, out_cols, ir, ic, fr, fc);
    stack_rows(&result)
  }

  /// Compute wave, then fold psum rows `fr-1 ..= 1` into the row above
  fn reduce(&mut self, fr: usize, cols: usize) -> Result<()> {
    log::debug!("compute wave");
    self.noc.broadcast(&Message::compute())?;

    for i in (1..fr).rev() {
      log::debug!("fold psum row {} into row {}", i, i - 1);
      for j in 0..cols {
        let psum = self
          .noc
          .send((i, j), &Message::read_psum(row_address()))?
          .unwrap_or_else(|| Payload::zeros(0));
        self.noc.send((i - 1, j), &Message::add_psum(row_address(), psum))?;
      }
    }
    self.noc.flush()
  }

  /// Load the given operands (filter first) and compute
  pub fn compute_with(&mut self, image: Option<&Matrix>, filter: Option<&Matrix>) -> Result<Matrix> {
    if let Some(filter) = filter {
      self.set_filter(filter.view())?;
    }
    if let Some(image) = image {
      self.set_image(image.view())?;
    }
    self.compute()
  }

  pub fn stats(&self) -> Result<CostReport> {
    Ok(CostReport {
      scratchpads: self.noc.pe_stats()?,
      global_buffer: self.noc.global_buffer().stats(),
      noc: self.noc.stats(),
    })
  }
}
