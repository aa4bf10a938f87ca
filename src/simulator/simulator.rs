use super::config::{AppConfig, ExecMode};
use super::sim::{open_trace, run_shell};
use super::utils::report::print_cost_report;
use super::workload::{convolve_tiled, Workload};
use crate::arch::eyeriss::eyeriss::{CostReport, Eyeriss};
use crate::arch::eyeriss::pe::Endpoint;
use crate::arch::eyeriss::tensor::conv2d_direct;
use crate::error::Result;
use std::io::Write;

/// Largest elementwise deviation accepted against the direct convolution
pub const TOLERANCE: f64 = 1e-9;

/// Outcome of one simulator run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
  pub output_shape: (usize, usize),
  /// Shape of the direct convolution
  pub expected_shape: (usize, usize),
  pub max_abs_error: f64,
  pub cost: CostReport,
}

impl RunSummary {
  pub fn matches(&self) -> bool {
    self.output_shape == self.expected_shape && self.max_abs_error <= TOLERANCE
  }
}

pub struct Simulator {
  config: AppConfig,
}

impl Simulator {
  pub fn new(config: AppConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &AppConfig {
    &self.config
  }

  pub fn run(&mut self) -> Result<RunSummary> {
    let acc = &self.config.accelerator;
    log::info!(
      "Eyeriss {}x{} array, {:?} execution, {}x{} workload",
      acc.rows,
      acc.cols,
      acc.execution,
      self.config.workload.image_rows,
      self.config.workload.image_cols
    );
    match acc.execution {
      ExecMode::Direct => {
        let mut eyeriss = Eyeriss::from_config(acc)?;
        self.execute(&mut eyeriss)
      },
      ExecMode::Actor => {
        let mut eyeriss = Eyeriss::with_actors(acc)?;
        self.execute(&mut eyeriss)
      },
    }
  }

  fn execute<E: Endpoint>(&self, eyeriss: &mut Eyeriss<E>) -> Result<RunSummary> {
    let sim = &self.config.simulation;
    if let Some(sink) = open_trace(&sim.trace_file)? {
      eyeriss.noc_mut().set_trace(sink);
    }

    let workload = Workload::synthetic(&self.config.workload);
    let output = convolve_tiled(eyeriss, workload.image.view(), workload.kernel.view())?;
    let expected = conv2d_direct(workload.image.view(), workload.kernel.view());

    let max_abs_error = output
      .iter()
      .zip(expected.iter())
      .map(|(a, b)| (a - b).abs())
      .fold(0.0, f64::max);

    let summary = RunSummary {
      output_shape: output.dim(),
      expected_shape: expected.dim(),
      max_abs_error,
      cost: eyeriss.stats()?,
    };

    if summary.matches() {
      log::info!("output {:?} matches direct convolution (max error {:.3e})", summary.output_shape, max_abs_error);
    } else {
      log::error!(
        "output {:?} deviates from direct convolution {:?} by {:.3e}",
        summary.output_shape,
        summary.expected_shape,
        max_abs_error
      );
    }
    if !sim.quiet {
      print_cost_report(&summary.cost);
    }

    if sim.interactive {
      run_shell(eyeriss, &workload)?;
    }

    if let Some(mut sink) = eyeriss.noc_mut().take_trace() {
      sink.flush()?;
    }
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn small_config(execution: ExecMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.accelerator.rows = 3;
    config.accelerator.cols = 4;
    config.accelerator.execution = execution;
    config.workload.image_rows = 10;
    config.workload.image_cols = 20;
    config.simulation.quiet = true;
    config
  }

  #[test]
  fn test_run_direct() {
    let summary = Simulator::new(small_config(ExecMode::Direct)).run().unwrap();
    assert_eq!(summary.output_shape, (8, 18));
    assert_eq!(summary.expected_shape, (8, 18));
    assert!(summary.matches());
    assert!(summary.cost.noc.messages > 0);
  }

  #[test]
  fn test_run_actor_matches_direct() {
    let direct = Simulator::new(small_config(ExecMode::Direct)).run().unwrap();
    let actor = Simulator::new(small_config(ExecMode::Actor)).run().unwrap();
    assert!(actor.matches());
    assert_eq!(actor.output_shape, direct.output_shape);
    assert_eq!(actor.cost, direct.cost);
  }

  #[test]
  fn test_shape_mismatch_is_not_a_match() {
    let summary = RunSummary {
      output_shape: (3, 4),
      expected_shape: (4, 4),
      max_abs_error: 0.0,
      cost: CostReport::default(),
    };
    assert!(!summary.matches());
    assert!(RunSummary {
      expected_shape: (3, 4),
      ..summary.clone()
    }
    .matches());
    assert!(!RunSummary {
      expected_shape: (3, 4),
      max_abs_error: 1e-3,
      ..summary
    }
    .matches());
  }
}
