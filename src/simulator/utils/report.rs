use crate::arch::eyeriss::eyeriss::CostReport;
use crate::arch::eyeriss::memory::AccessStats;
use crate::arch::eyeriss::pe::PeSnapshot;
use crate::arch::eyeriss::tensor::Matrix;
use std::fmt::Write;

pub fn format_cost_report(report: &CostReport) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "--- Cost Report ---");
  write_access(&mut out, "scratchpads", &report.scratchpads);
  write_access(&mut out, "global buffer", &report.global_buffer);
  let _ = writeln!(
    out,
    "  {:<14} messages={:<8} latency={:.3e} s  energy={:.3e} J",
    "noc", report.noc.messages, report.noc.latency, report.noc.energy
  );
  let _ = writeln!(
    out,
    "  {:<14} latency={:.3e} s  energy={:.3e} J",
    "total",
    report.latency(),
    report.energy()
  );
  let _ = writeln!(out, "--- End Report ---");
  out
}

fn write_access(out: &mut String, name: &str, stats: &AccessStats) {
  let _ = writeln!(
    out,
    "  {:<14} reads={:<8} writes={:<8} latency={:.3e} s  energy={:.3e} J",
    name, stats.reads, stats.writes, stats.latency, stats.energy
  );
}

pub fn print_cost_report(report: &CostReport) {
  print!("\n{}", format_cost_report(report));
}

pub fn format_snapshot(snap: &PeSnapshot) -> String {
  format!(
    "PE {}\n  filter: {}\n  ifmap:  {}\n  psum:   {}\n  reads={} writes={}",
    snap.id, snap.filter, snap.ifmap, snap.psum, snap.stats.reads, snap.stats.writes
  )
}

/// Matrix printed row by row with a fixed precision
pub fn format_matrix(m: &Matrix) -> String {
  let mut out = String::new();
  for row in m.rows() {
    let cells: Vec<String> = row.iter().map(|v| format!("{:>9.4}", v)).collect();
    let _ = writeln!(out, "[{}]", cells.join(" "));
  }
  out
}
