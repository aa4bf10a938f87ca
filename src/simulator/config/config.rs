use crate::error::{EyerissError, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Embedded default configuration
pub const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// How PEs execute the messages delivered to them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
  /// Plain in-process calls
  #[default]
  Direct,
  /// One thread and inbound channel per PE
  Actor,
}

/// Scratchpad geometry of every PE
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeConfig {
  #[serde(default = "default_filter_words")]
  pub filter_words: usize,
  #[serde(default = "default_ifmap_words")]
  pub ifmap_words: usize,
  #[serde(default = "default_psum_words")]
  pub psum_words: usize,
  /// Values per word; bounds the row width a PE can hold
  #[serde(default = "default_word_size")]
  pub word_size: usize,
}

fn default_filter_words() -> usize {
  224
}

fn default_ifmap_words() -> usize {
  12
}

fn default_psum_words() -> usize {
  24
}

fn default_word_size() -> usize {
  16
}

impl Default for PeConfig {
  fn default() -> Self {
    Self {
      filter_words: default_filter_words(),
      ifmap_words: default_ifmap_words(),
      psum_words: default_psum_words(),
      word_size: default_word_size(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlobalBufferConfig {
  pub blocks: usize,
  pub block_size: usize,
  pub word_size: usize,
}

impl Default for GlobalBufferConfig {
  fn default() -> Self {
    Self {
      blocks: 25,
      block_size: 4096,
      word_size: 16,
    }
  }
}

/// Array geometry and the NoC's per-hop cost
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AcceleratorConfig {
  #[serde(default = "default_rows")]
  pub rows: usize,
  #[serde(default = "default_cols")]
  pub cols: usize,
  /// Latency (s) charged per delivered message
  #[serde(default)]
  pub latency: f64,
  /// Energy (J) charged per delivered message
  #[serde(default)]
  pub energy: f64,
  #[serde(default)]
  pub execution: ExecMode,
  #[serde(default)]
  pub pe: PeConfig,
  #[serde(default)]
  pub global_buffer: GlobalBufferConfig,
}

fn default_rows() -> usize {
  12
}

fn default_cols() -> usize {
  14
}

impl AcceleratorConfig {
  pub fn new(rows: usize, cols: usize, latency: f64, energy: f64) -> Self {
    Self {
      rows,
      cols,
      latency,
      energy,
      ..Self::default()
    }
  }

  pub fn size(&self) -> (usize, usize) {
    (self.rows, self.cols)
  }
}

impl Default for AcceleratorConfig {
  fn default() -> Self {
    Self {
      rows: default_rows(),
      cols: default_cols(),
      latency: 0.0,
      energy: 0.0,
      execution: ExecMode::default(),
      pe: PeConfig::default(),
      global_buffer: GlobalBufferConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub interactive: bool,
  /// JSON-lines message trace; empty disables tracing
  #[serde(default)]
  pub trace_file: String,
}

/// Synthetic workload driven through the array by the simulator
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkloadSection {
  pub image_rows: usize,
  pub image_cols: usize,
}

impl Default for WorkloadSection {
  fn default() -> Self {
    Self {
      image_rows: 32,
      image_cols: 32,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub accelerator: AcceleratorConfig,
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub workload: WorkloadSection,
}

impl AppConfig {
  /// Defaults overlaid with a TOML document
  pub fn from_toml_str(content: &str) -> Result<Self> {
    let config = config::Config::builder()
      .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
      .add_source(File::from_str(content, FileFormat::Toml))
      .build()?;
    let app: AppConfig = config.try_deserialize()?;
    validate_config(&app)?;
    Ok(app)
  }

  pub fn to_toml(&self) -> Result<String> {
    Ok(toml::to_string_pretty(self)?)
  }
}

/// Load the layered configuration.
///
/// Order: embedded defaults, then the optional user file, then
/// `EYERISS_<SECTION>__<KEY>` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
  let mut builder = config::Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

  if let Some(path) = path {
    builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
  }

  let config = builder
    .add_source(
      Environment::with_prefix("EYERISS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()?;

  let app: AppConfig = config.try_deserialize()?;
  validate_config(&app)?;
  Ok(app)
}

/// CLI overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub rows: Option<usize>,
  pub cols: Option<usize>,
  pub execution: Option<ExecMode>,
  pub image_rows: Option<usize>,
  pub image_cols: Option<usize>,
  pub quiet: bool,
  pub interactive: bool,
  pub trace_file: Option<String>,
}

pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if let Some(rows) = cli.rows {
    config.accelerator.rows = rows;
  }
  if let Some(cols) = cli.cols {
    config.accelerator.cols = cols;
  }
  if let Some(execution) = cli.execution {
    config.accelerator.execution = execution;
  }
  if let Some(rows) = cli.image_rows {
    config.workload.image_rows = rows;
  }
  if let Some(cols) = cli.image_cols {
    config.workload.image_cols = cols;
  }
  if cli.quiet {
    config.simulation.quiet = true;
  }
  if cli.interactive {
    config.simulation.interactive = true;
  }
  if let Some(file) = &cli.trace_file {
    config.simulation.trace_file = file.clone();
  }
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
  let acc = &config.accelerator;
  if acc.rows == 0 || acc.cols == 0 {
    return Err(EyerissError::Configuration(format!(
      "array must have at least one row and column, got {}x{}",
      acc.rows, acc.cols
    )));
  }
  let pe = &acc.pe;
  if pe.filter_words == 0 || pe.ifmap_words == 0 || pe.psum_words == 0 || pe.word_size == 0 {
    return Err(EyerissError::Configuration(
      "PE scratchpads must have at least one word of at least one value".to_string(),
    ));
  }
  let gb = &acc.global_buffer;
  if gb.blocks == 0 || gb.block_size == 0 || gb.word_size == 0 {
    return Err(EyerissError::Configuration("global buffer geometry cannot be zero".to_string()));
  }
  if acc.latency < 0.0 || acc.energy < 0.0 {
    return Err(EyerissError::Configuration("NoC latency and energy cannot be negative".to_string()));
  }
  if config.workload.image_rows == 0 || config.workload.image_cols == 0 {
    return Err(EyerissError::Configuration("workload image cannot be empty".to_string()));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_embedded_defaults_match_default_impl() {
    let app = AppConfig::from_toml_str("").unwrap();
    assert_eq!(app, AppConfig::default());
    assert_eq!(app.accelerator.size(), (12, 14));
    assert_eq!(app.accelerator.latency, 0.0);
    assert_eq!(app.accelerator.execution, ExecMode::Direct);
  }

  #[test]
  fn test_overlay() {
    let app = AppConfig::from_toml_str(
      r#"
      [accelerator]
      rows = 3
      cols = 4
      execution = "actor"

      [accelerator.pe]
      word_size = 32
      "#,
    )
    .unwrap();
    assert_eq!(app.accelerator.size(), (3, 4));
    assert_eq!(app.accelerator.execution, ExecMode::Actor);
    assert_eq!(app.accelerator.pe.word_size, 32);
    assert_eq!(app.accelerator.pe.ifmap_words, 12);
  }

  #[test]
  fn test_validation() {
    assert!(matches!(
      AppConfig::from_toml_str("[accelerator]\nrows = 0"),
      Err(EyerissError::Configuration(_))
    ));
    assert!(AppConfig::from_toml_str("[accelerator.pe]\nword_size = 0").is_err());
    assert!(AppConfig::from_toml_str("[accelerator]\nexecution = \"threads\"").is_err());
  }

  #[test]
  fn test_cli_overrides_and_dump() {
    let mut app = AppConfig::default();
    apply_cli_overrides(
      &mut app,
      &CliOverrides {
        rows: Some(2),
        execution: Some(ExecMode::Actor),
        quiet: true,
        trace_file: Some("trace.jsonl".to_string()),
        ..CliOverrides::default()
      },
    );
    assert_eq!(app.accelerator.rows, 2);
    assert_eq!(app.accelerator.cols, 14);
    assert!(app.simulation.quiet);

    let dumped = app.to_toml().unwrap();
    let back = AppConfig::from_toml_str(&dumped).unwrap();
    assert_eq!(back, app);
  }
}
