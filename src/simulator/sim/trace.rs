use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Where a traced message went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceDest {
  Pe(usize, usize),
  /// "glb"
  Unit(String),
}

/// One line of the JSON-lines message trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
  pub seq: u64,
  pub dest: TraceDest,
  pub opcode: u8,
  pub name: String,
  pub address: Option<Vec<usize>>,
  pub payload_len: Option<usize>,
}

/// Open the trace sink; an empty path disables tracing
pub fn open_trace(path: &str) -> Result<Option<Box<dyn Write>>> {
  if path.is_empty() {
    return Ok(None);
  }
  let file = File::create(path)?;
  log::info!("writing message trace to {}", path);
  Ok(Some(Box::new(BufWriter::new(file))))
}

pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<TraceEntry>> {
  let reader = BufReader::new(File::open(path)?);
  let mut entries = Vec::new();
  for line in reader.lines() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    entries.push(serde_json::from_str(&line)?);
  }
  Ok(entries)
}
