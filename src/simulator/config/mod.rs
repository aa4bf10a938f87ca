pub mod config;

pub use self::config::{
  apply_cli_overrides, load_config, validate_config, AcceleratorConfig, AppConfig, CliOverrides, ExecMode,
  GlobalBufferConfig, PeConfig, SimulationSection, WorkloadSection, DEFAULT_CONFIG,
};
