// Processing Element: three private scratchpads and a 1-D convolution unit

use super::address::Address;
use super::instruction::Instruction;
use super::memory::{AccessStats, Memory, Scratchpad};
use super::message::Message;
use super::tensor::{conv1d, Payload};
use crate::error::{EyerissError, Result};
use crate::simulator::config::PeConfig;
use serde::Serialize;

/// Word every scratchpad row lives at
pub const ROW_ADDR: (usize, usize) = (0, 0);

pub fn row_address() -> Address {
  Address::from(ROW_ADDR)
}

/// Contents and cost counters of one PE, taken without charging any access
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeSnapshot {
  pub id: usize,
  pub filter: Payload,
  pub ifmap: Payload,
  pub psum: Payload,
  pub stats: AccessStats,
}

/// Something the NoC can deliver messages to.
///
/// Implemented by [`ProcessingElement`] (plain call) and by
/// [`PeActor`](super::actor::PeActor) (a PE running on its own thread).
pub trait Endpoint: Sized {
  fn spawn(id: usize, config: &PeConfig) -> Result<Self>;

  fn id(&self) -> usize;

  /// Execute one message. Read instructions return their payload.
  fn deliver(&mut self, message: &Message) -> Result<Option<Payload>>;

  fn snapshot(&self) -> Result<PeSnapshot>;

  /// Wait until every delivered message has executed and report the first
  /// error one of them raised
  fn flush(&mut self) -> Result<()> {
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct ProcessingElement {
  id: usize,
  filter: Scratchpad,
  ifmap: Scratchpad,
  psum: Scratchpad,
}

impl ProcessingElement {
  pub fn new(id: usize, config: &PeConfig) -> Self {
    Self {
      id,
      filter: Scratchpad::new(config.filter_words, config.word_size),
      ifmap: Scratchpad::new(config.ifmap_words, config.word_size),
      psum: Scratchpad::new(config.psum_words, config.word_size),
    }
  }

  pub fn id(&self) -> usize {
    self.id
  }

  pub fn filter(&self) -> &Scratchpad {
    &self.filter
  }

  pub fn ifmap(&self) -> &Scratchpad {
    &self.ifmap
  }

  pub fn psum(&self) -> &Scratchpad {
    &self.psum
  }

  pub fn stats(&self) -> AccessStats {
    self.filter.stats() + self.ifmap.stats() + self.psum.stats()
  }

  /// Single entry point for every instruction the PE understands
  pub fn handle(&mut self, message: &Message) -> Result<Option<Payload>> {
    log::trace!("PE {}: {}", self.id, message);

    match message.instruction() {
      Instruction::PeWriteFilter { address, data } => {
        self.filter.write(address, data.view())?;
        Ok(None)
      },
      Instruction::PeWriteIfmap { address, data } => {
        self.ifmap.write(address, data.view())?;
        Ok(None)
      },
      Instruction::PeReadPsum { address } => Ok(Some(self.psum.read(address)?)),
      Instruction::PeWritePsum { address, data } => {
        self.psum.write(address, data.view())?;
        Ok(None)
      },
      Instruction::PeAddPsum { address, data } => {
        self.add_psum(address, data)?;
        Ok(None)
      },
      Instruction::Compute => {
        self.compute()?;
        Ok(None)
      },
      Instruction::Terminate => Ok(None),
      glb @ (Instruction::GlbReadFilter { .. }
      | Instruction::GlbWriteFilter { .. }
      | Instruction::GlbReadIfmap { .. }
      | Instruction::GlbWriteIfmap { .. }
      | Instruction::GlbReadPsum { .. }
      | Instruction::GlbWritePsum { .. }
      | Instruction::GlbReadOfmap { .. }) => Err(EyerissError::Unsupported {
        unit: format!("PE {}", self.id),
        instruction: glb.name(),
      }),
    }
  }

  /// psum += data, the forwarding step of the row reduction
  fn add_psum(&mut self, address: &Address, data: &Payload) -> Result<()> {
    if data.is_empty() {
      return Ok(());
    }
    let current = self.psum.read(address)?;
    if current.iter().all(|v| *v == 0.0) {
      self.psum.write(address, data.view())?;
      return Ok(());
    }
    if current.len() != data.len() {
      return Err(EyerissError::Shape {
        expected: current.len(),
        actual: data.len(),
      });
    }
    let sum = &current + data;
    self.psum.write(address, sum.view())?;
    Ok(())
  }

  /// Convolve the stored ifmap row with the stored filter row.
  ///
  /// Skipped when either operand is empty, and when psum already holds a
  /// result so a repeated COMPUTE never re-accumulates.
  pub fn compute(&mut self) -> Result<()> {
    if self.ifmap.is_empty() || self.filter.is_empty() {
      return Ok(());
    }
    if !self.psum.is_empty() {
      return Ok(());
    }
    let addr = row_address();
    let row = self.ifmap.read(&addr)?;
    let weight = self.filter.read(&addr)?;
    let out = conv1d(row.view(), weight.view());
    self.psum.write(&addr, out.view())?;
    Ok(())
  }
}

impl Endpoint for ProcessingElement {
  fn spawn(id: usize, config: &PeConfig) -> Result<Self> {
    Ok(Self::new(id, config))
  }

  fn id(&self) -> usize {
    self.id
  }

  fn deliver(&mut self, message: &Message) -> Result<Option<Payload>> {
    self.handle(message)
  }

  fn snapshot(&self) -> Result<PeSnapshot> {
    let addr = row_address();
    Ok(PeSnapshot {
      id: self.id,
      filter: self.filter.peek(&addr)?,
      ifmap: self.ifmap.peek(&addr)?,
      psum: self.psum.peek(&addr)?,
      stats: self.stats(),
    })
  }
}
