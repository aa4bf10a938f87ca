use eyeriss::simulator::config::{load_config, AppConfig, ExecMode};
use std::io::Write;

#[test]
fn load_user_file_over_defaults() {
  let dir = std::env::temp_dir().join(format!("eyeriss-config-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("small.toml");
  let mut file = std::fs::File::create(&path).unwrap();
  writeln!(
    file,
    "[accelerator]\nrows = 4\ncols = 5\nlatency = 1e-9\nexecution = \"actor\"\n\n[workload]\nimage_rows = 8"
  )
  .unwrap();

  let config = load_config(Some(&path)).unwrap();
  assert_eq!(config.accelerator.size(), (4, 5));
  assert_eq!(config.accelerator.latency, 1e-9);
  assert_eq!(config.accelerator.execution, ExecMode::Actor);
  assert_eq!(config.accelerator.pe.word_size, 16);
  assert_eq!(config.workload.image_rows, 8);
  assert_eq!(config.workload.image_cols, 32);

  std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_file_is_an_error() {
  assert!(load_config(Some(std::path::Path::new("/nonexistent/eyeriss.toml"))).is_err());
}

#[test]
fn defaults_without_file() {
  let config = load_config(None).unwrap();
  assert_eq!(config.accelerator, AppConfig::default().accelerator);
}
