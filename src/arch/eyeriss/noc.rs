// Network-on-Chip: the PE grid, the shared global buffer and message delivery

use super::instruction::Instruction;
use super::memory::{AccessStats, GlobalBuffer, Memory};
use super::message::Message;
use super::pe::{Endpoint, PeSnapshot, ProcessingElement};
use super::tensor::Payload;
use crate::error::{EyerissError, Result};
use crate::simulator::config::{AcceleratorConfig, PeConfig};
use serde::Serialize;
use std::io::Write;
use std::ops::Index;

pub type Coord = (usize, usize);

/// Messages moved over the network and what moving them cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LinkStats {
  pub messages: u64,
  pub latency: f64,
  pub energy: f64,
}

pub struct NetworkOnChip<E: Endpoint = ProcessingElement> {
  rows: usize,
  cols: usize,
  /// Row-major, id = row * cols + col
  grid: Vec<E>,
  pe_config: PeConfig,
  gb: GlobalBuffer,
  latency: f64,
  energy: f64,
  link: LinkStats,
  trace: Option<Box<dyn Write>>,
}

impl<E: Endpoint> NetworkOnChip<E> {
  pub fn new(config: &AcceleratorConfig) -> Result<Self> {
    let (rows, cols) = config.size();
    let grid = (0..rows * cols)
      .map(|id| E::spawn(id, &config.pe))
      .collect::<Result<Vec<E>>>()?;
    let gb_config = &config.global_buffer;

    log::debug!("NoC: {}x{} PEs, latency {} s, energy {} J", rows, cols, config.latency, config.energy);

    Ok(Self {
      rows,
      cols,
      grid,
      pe_config: config.pe.clone(),
      gb: GlobalBuffer::new(gb_config.blocks, gb_config.block_size, gb_config.word_size),
      latency: config.latency,
      energy: config.energy,
      link: LinkStats::default(),
      trace: None,
    })
  }

  pub fn size(&self) -> Coord {
    (self.rows, self.cols)
  }

  pub fn len(&self) -> usize {
    self.grid.len()
  }

  pub fn is_empty(&self) -> bool {
    self.grid.is_empty()
  }

  pub fn pe_config(&self) -> &PeConfig {
    &self.pe_config
  }

  fn index_of(&self, (row, col): Coord) -> Result<usize> {
    if row >= self.rows || col >= self.cols {
      return Err(EyerissError::Index {
        row,
        col,
        rows: self.rows,
        cols: self.cols,
      });
    }
    Ok(row * self.cols + col)
  }

  pub fn pe(&self, coord: Coord) -> Result<&E> {
    let idx = self.index_of(coord)?;
    Ok(&self.grid[idx])
  }

  pub fn pe_mut(&mut self, coord: Coord) -> Result<&mut E> {
    let idx = self.index_of(coord)?;
    Ok(&mut self.grid[idx])
  }

  /// Swap the endpoint at `coord`, returning the previous one
  pub fn replace(&mut self, coord: Coord, endpoint: E) -> Result<E> {
    let idx = self.index_of(coord)?;
    Ok(std::mem::replace(&mut self.grid[idx], endpoint))
  }

  pub fn iter(&self) -> impl Iterator<Item = (Coord, &E)> + '_ {
    let cols = self.cols;
    self.grid.iter().enumerate().map(move |(id, pe)| ((id / cols, id % cols), pe))
  }

  pub fn snapshot(&self, coord: Coord) -> Result<PeSnapshot> {
    self.pe(coord)?.snapshot()
  }

  /// Record every delivered message as one JSON line
  pub fn set_trace(&mut self, sink: Box<dyn Write>) {
    self.trace = Some(sink);
  }

  pub fn take_trace(&mut self) -> Option<Box<dyn Write>> {
    self.trace.take()
  }

  fn record(&mut self, dest: serde_json::Value, message: &Message) -> Result<()> {
    self.link.messages += 1;
    self.link.latency += self.latency;
    self.link.energy += self.energy;

    if let Some(writer) = self.trace.as_mut() {
      let entry = serde_json::json!({
        "seq": self.link.messages,
        "dest": dest,
        "opcode": message.opcode().code(),
        "name": message.instruction().name(),
        "address": message.address(),
        "payload_len": message.payload().map(|p| p.len()),
      });
      writeln!(writer, "{}", entry)?;
    }
    Ok(())
  }

  /// Point-to-point delivery. Read instructions return their payload.
  pub fn send(&mut self, coord: Coord, message: &Message) -> Result<Option<Payload>> {
    let idx = self.index_of(coord)?;
    self.record(serde_json::json!([coord.0, coord.1]), message)?;
    self.grid[idx].deliver(message)
  }

  /// Deliver the same message to every destination.
  ///
  /// All coordinates are validated before anything is delivered.
  pub fn multicast(&mut self, message: &Message, destinations: &[Coord]) -> Result<()> {
    for &coord in destinations {
      self.index_of(coord)?;
    }
    for &coord in destinations {
      self.send(coord, message)?;
    }
    Ok(())
  }

  pub fn broadcast(&mut self, message: &Message) -> Result<()> {
    let all: Vec<Coord> = (0..self.rows)
      .flat_map(|r| (0..self.cols).map(move |c| (r, c)))
      .collect();
    self.multicast(message, &all)
  }

  /// PEs on the up-right diagonal from `coord`, nearest first, excluding `coord`
  pub fn diagonal_connections(&self, coord: Coord) -> Result<Vec<Coord>> {
    self.index_of(coord)?;
    let (mut row, mut col) = coord;
    let mut out = Vec::new();
    while row > 0 && col + 1 < self.cols {
      row -= 1;
      col += 1;
      out.push((row, col));
    }
    Ok(out)
  }

  /// Wait for every PE to drain its queue; first deferred error wins
  pub fn flush(&mut self) -> Result<()> {
    for pe in self.grid.iter_mut() {
      pe.flush()?;
    }
    Ok(())
  }

  // --- global buffer ---

  pub fn global_buffer(&self) -> &GlobalBuffer {
    &self.gb
  }

  /// Execute a GLB_* instruction against the global buffer
  pub fn execute_glb(&mut self, message: &Message) -> Result<Option<Payload>> {
    self.record(serde_json::json!("glb"), message)?;
    match message.instruction() {
      Instruction::GlbReadFilter { address }
      | Instruction::GlbReadIfmap { address }
      | Instruction::GlbReadPsum { address }
      | Instruction::GlbReadOfmap { address } => Ok(Some(self.gb.read(address)?)),
      Instruction::GlbWriteFilter { address, data }
      | Instruction::GlbWriteIfmap { address, data }
      | Instruction::GlbWritePsum { address, data } => {
        self.gb.write(address, data.view())?;
        Ok(None)
      },
      other => Err(EyerissError::Unsupported {
        unit: "global buffer".to_string(),
        instruction: other.name(),
      }),
    }
  }

  // --- cost ---

  pub fn stats(&self) -> LinkStats {
    self.link
  }

  /// Scratchpad cost summed over every PE
  pub fn pe_stats(&self) -> Result<AccessStats> {
    self.grid.iter().map(|pe| pe.snapshot().map(|s| s.stats)).sum()
  }
}

impl<E: Endpoint> Index<Coord> for NetworkOnChip<E> {
  type Output = E;

  fn index(&self, (row, col): Coord) -> &E {
    assert!(
      row < self.rows && col < self.cols,
      "PE ({}, {}) is outside the {}x{} array",
      row,
      col,
      self.rows,
      self.cols
    );
    &self.grid[row * self.cols + col]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::eyeriss::address::Address;
  use crate::arch::eyeriss::pe::row_address;
  use ndarray::array;
  use std::sync::{Arc, Mutex};

  fn noc(rows: usize, cols: usize) -> NetworkOnChip {
    NetworkOnChip::new(&AcceleratorConfig::new(rows, cols, 2e-9, 3e-12)).unwrap()
  }

  #[test]
  fn test_grid_layout() {
    let noc = noc(3, 4);
    assert_eq!(noc.size(), (3, 4));
    assert_eq!(noc.len(), 12);
    assert_eq!(noc[(2, 1)].id(), 9);
    assert_eq!(noc.pe((1, 3)).unwrap().id(), 7);
    assert!(matches!(noc.pe((3, 0)), Err(EyerissError::Index { row: 3, .. })));
    let coords: Vec<Coord> = noc.iter().map(|(c, _)| c).take(5).collect();
    assert_eq!(coords, vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0)]);
  }

  #[test]
  fn test_replace_endpoint() {
    let mut noc = noc(2, 2);
    noc.send((1, 0), &Message::write_ifmap(row_address(), array![5.0])).unwrap();

    let old = noc.replace((1, 0), ProcessingElement::new(99, &PeConfig::default())).unwrap();
    assert_eq!(old.id(), 2);
    assert_eq!(old.snapshot().unwrap().ifmap, array![5.0]);
    assert_eq!(noc.size(), (2, 2));
    assert_eq!(noc.len(), 4);
    assert_eq!(noc[(1, 0)].id(), 99);
    assert!(noc.snapshot((1, 0)).unwrap().ifmap.is_empty());

    noc.send((1, 0), &Message::write_ifmap(row_address(), array![1.0, 2.0])).unwrap();
    let snap = noc.snapshot((1, 0)).unwrap();
    assert_eq!(snap.id, 99);
    assert_eq!(snap.ifmap, array![1.0, 2.0]);

    noc
      .pe_mut((1, 0))
      .unwrap()
      .deliver(&Message::write_filter(row_address(), array![3.0]))
      .unwrap();
    assert_eq!(noc.snapshot((1, 0)).unwrap().filter, array![3.0]);

    let spare = ProcessingElement::new(100, &PeConfig::default());
    assert!(matches!(noc.replace((2, 0), spare), Err(EyerissError::Index { row: 2, col: 0, .. })));
    assert!(matches!(noc.pe_mut((0, 2)), Err(EyerissError::Index { .. })));
    assert_eq!(noc.len(), 4);
  }

  #[test]
  #[should_panic]
  fn test_index_out_of_range_panics() {
    let noc = noc(2, 2);
    let _ = &noc[(0, 2)];
  }

  #[test]
  fn test_diagonal_connections() {
    let noc = noc(3, 4);
    assert_eq!(noc.diagonal_connections((2, 0)).unwrap(), vec![(1, 1), (0, 2)]);
    assert_eq!(noc.diagonal_connections((2, 2)).unwrap(), vec![(1, 3)]);
    assert!(noc.diagonal_connections((0, 1)).unwrap().is_empty());
    assert!(noc.diagonal_connections((2, 3)).unwrap().is_empty());
    assert!(noc.diagonal_connections((3, 0)).is_err());
  }

  #[test]
  fn test_multicast_validates_first() {
    let mut noc = noc(2, 2);
    let msg = Message::write_ifmap(row_address(), array![1.0, 2.0]);
    let err = noc.multicast(&msg, &[(0, 0), (5, 5)]).unwrap_err();
    assert!(matches!(err, EyerissError::Index { .. }));
    assert!(noc.snapshot((0, 0)).unwrap().ifmap.is_empty());
    assert_eq!(noc.stats().messages, 0);

    noc.multicast(&msg, &[(0, 0), (1, 1)]).unwrap();
    assert_eq!(noc.snapshot((0, 0)).unwrap().ifmap, array![1.0, 2.0]);
    assert_eq!(noc.snapshot((1, 1)).unwrap().ifmap, array![1.0, 2.0]);
    assert!(noc.snapshot((0, 1)).unwrap().ifmap.is_empty());
    assert_eq!(msg, Message::write_ifmap(row_address(), array![1.0, 2.0]));
  }

  #[test]
  fn test_link_cost() {
    let mut noc = noc(2, 2);
    noc.broadcast(&Message::compute()).unwrap();
    let stats = noc.stats();
    assert_eq!(stats.messages, 4);
    assert!((stats.latency - 8e-9).abs() < 1e-18);
    assert!((stats.energy - 12e-12).abs() < 1e-20);
  }

  #[test]
  fn test_execute_glb() {
    let mut noc = noc(1, 1);
    let addr = Address::from((3, 10));
    let write = Message::new(Instruction::GlbWritePsum { address: addr.clone(), data: array![1.0, 2.0] });
    assert_eq!(noc.execute_glb(&write).unwrap(), None);
    let read = Message::new(Instruction::GlbReadOfmap { address: addr });
    assert_eq!(noc.execute_glb(&read).unwrap(), Some(array![1.0, 2.0]));
    assert_eq!(noc.global_buffer().stats().reads, 1);

    assert!(matches!(noc.execute_glb(&Message::compute()), Err(EyerissError::Unsupported { .. })));
    // PEs refuse buffer traffic
    assert!(matches!(noc.send((0, 0), &write), Err(EyerissError::Unsupported { .. })));
  }

  #[derive(Clone, Default)]
  struct Shared(Arc<Mutex<Vec<u8>>>);

  impl Write for Shared {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn test_trace_lines() {
    let mut noc = noc(1, 2);
    let sink = Shared::default();
    noc.set_trace(Box::new(sink.clone()));
    noc.send((0, 1), &Message::write_filter(row_address(), array![1.0, 2.0, 3.0])).unwrap();
    noc.send((0, 1), &Message::read_psum(row_address())).unwrap();

    let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["seq"], 1);
    assert_eq!(lines[0]["dest"], serde_json::json!([0, 1]));
    assert_eq!(lines[0]["name"], "PE_WRITE_FILTER");
    assert_eq!(lines[0]["payload_len"], 3);
    assert_eq!(lines[1]["opcode"], 6);
    assert!(lines[1]["payload_len"].is_null());
  }
}
