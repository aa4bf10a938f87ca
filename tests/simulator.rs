use eyeriss::simulator::config::{AppConfig, ExecMode};
use eyeriss::simulator::sim::trace::{read_trace, TraceDest};
use eyeriss::Simulator;

#[test]
fn run_writes_message_trace() {
  let path = std::env::temp_dir().join(format!("eyeriss-trace-{}.jsonl", std::process::id()));

  let mut config = AppConfig::default();
  config.accelerator.rows = 3;
  config.accelerator.cols = 3;
  config.accelerator.execution = ExecMode::Actor;
  config.workload.image_rows = 6;
  config.workload.image_cols = 7;
  config.simulation.quiet = true;
  config.simulation.trace_file = path.to_string_lossy().into_owned();

  let summary = Simulator::new(config).run().unwrap();
  assert!(summary.matches());
  assert_eq!(summary.output_shape, (4, 5));

  let entries = read_trace(&path).unwrap();
  assert_eq!(entries.len() as u64, summary.cost.noc.messages);
  assert!(entries.windows(2).all(|w| w[1].seq == w[0].seq + 1));
  assert!(entries.iter().all(|e| matches!(e.dest, TraceDest::Pe(r, c) if r < 3 && c < 3)));
  assert!(entries.iter().any(|e| e.name == "COMPUTE"));
  assert!(entries.iter().any(|e| e.name == "PE_ADD_PSUM"));

  std::fs::remove_file(&path).unwrap();
}
