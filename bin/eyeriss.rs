use clap::Parser;
use eyeriss::error::EyerissError;
use eyeriss::simulator::config::{apply_cli_overrides, load_config, validate_config, CliOverrides, ExecMode};
use eyeriss::simulator::utils::log::init_log;
use eyeriss::simulator::Simulator;
use std::path::PathBuf;

/// Eyeriss - a row-stationary CNN accelerator simulator
#[derive(Parser, Debug)]
#[command(name = "eyeriss")]
#[command(version = "0.1.0")]
#[command(about = "Cost-annotated simulator of the Eyeriss PE array", long_about = None)]
struct Args {
  /// TOML configuration file layered over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// PE array rows
  #[arg(long)]
  rows: Option<usize>,

  /// PE array columns
  #[arg(long)]
  cols: Option<usize>,

  /// Execution model of the PEs
  #[arg(short, long, value_enum)]
  execution: Option<ExecMode>,

  /// Rows of the synthetic workload image
  #[arg(long)]
  image_rows: Option<usize>,

  /// Columns of the synthetic workload image
  #[arg(long)]
  image_cols: Option<usize>,

  /// Quiet mode (warnings and errors only, no cost report)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path (JSON lines, one per delivered message)
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Open the interactive shell after the workload has run
  #[arg(short, long)]
  interactive: bool,

  /// Print the effective configuration as TOML and exit
  #[arg(long)]
  dump_config: bool,
}

fn main() -> Result<(), EyerissError> {
  let args = Args::parse();

  let mut config = load_config(args.config.as_deref())?;
  apply_cli_overrides(
    &mut config,
    &CliOverrides {
      rows: args.rows,
      cols: args.cols,
      execution: args.execution,
      image_rows: args.image_rows,
      image_cols: args.image_cols,
      quiet: args.quiet,
      interactive: args.interactive,
      trace_file: args.trace_file,
    },
  );
  validate_config(&config)?;

  if args.dump_config {
    print!("{}", config.to_toml()?);
    return Ok(());
  }

  init_log(config.simulation.quiet);

  let mut simulator = Simulator::new(config);
  let summary = simulator.run()?;
  if !summary.matches() {
    std::process::exit(1);
  }
  Ok(())
}
