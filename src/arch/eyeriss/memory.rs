// Memory hierarchy: per-PE scratchpads, the shared global buffer and DRAM

use super::address::Address;
use super::tensor::Payload;
use crate::error::AddressError;
use ndarray::{s, Array2, ArrayView1};
use serde::Serialize;
use std::ops::{Add, AddAssign};

/// Accumulated cost of the accesses made to a memory (or a group of memories)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccessStats {
  pub reads: u64,
  pub writes: u64,
  /// Modeled read latency in seconds
  pub latency: f64,
  /// Modeled energy in joules
  pub energy: f64,
}

impl AddAssign for AccessStats {
  fn add_assign(&mut self, other: Self) {
    self.reads += other.reads;
    self.writes += other.writes;
    self.latency += other.latency;
    self.energy += other.energy;
  }
}

impl Add for AccessStats {
  type Output = Self;

  fn add(mut self, other: Self) -> Self {
    self += other;
    self
  }
}

impl std::iter::Sum for AccessStats {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
    iter.fold(Self::default(), Add::add)
  }
}

// ------------------------------------------------------------
// MemoryBlock
// ------------------------------------------------------------

/// Flat store of `words` words, each holding up to `word_size` values.
///
/// Values are kept as f64 rather than bits. Each word remembers how many
/// values its last write stored; reads return that prefix.
#[derive(Debug, Clone)]
pub struct MemoryBlock {
  data: Array2<f64>,
  lens: Vec<usize>,
  read_latency: f64,
  energy: f64,
  stats: AccessStats,
}

impl MemoryBlock {
  pub fn new(words: usize, word_size: usize, read_latency: f64, energy: f64) -> Self {
    Self {
      data: Array2::zeros((words, word_size)),
      lens: vec![0; words],
      read_latency,
      energy,
      stats: AccessStats::default(),
    }
  }

  pub fn words(&self) -> usize {
    self.data.nrows()
  }

  pub fn word_size(&self) -> usize {
    self.data.ncols()
  }

  pub fn shape(&self) -> (usize, usize) {
    self.data.dim()
  }

  pub fn bits(&self) -> usize {
    self.words() * self.word_size()
  }

  pub fn read_latency(&self) -> f64 {
    self.read_latency
  }

  pub fn energy(&self) -> f64 {
    self.energy
  }

  pub fn stats(&self) -> AccessStats {
    self.stats
  }

  fn check_word(&self, word: usize) -> Result<(), AddressError> {
    if word >= self.words() {
      return Err(AddressError::OutOfRange {
        memory: "MemoryBlock",
        address: Address::new(vec![word]),
        field: "word",
        index: word,
        limit: self.words(),
      });
    }
    Ok(())
  }

  /// Read a word, charging the block's latency and energy
  pub fn read(&mut self, word: usize) -> Result<Payload, AddressError> {
    let value = self.peek(word)?;
    self.stats.reads += 1;
    self.stats.latency += self.read_latency;
    self.stats.energy += self.energy;
    Ok(value)
  }

  /// Read a word without charging any cost
  pub fn peek(&self, word: usize) -> Result<Payload, AddressError> {
    self.check_word(word)?;
    Ok(self.data.slice(s![word, ..self.lens[word]]).to_owned())
  }

  /// Overwrite a word. No latency on the write path, energy only.
  pub fn write(&mut self, word: usize, value: ArrayView1<f64>) -> Result<(), AddressError> {
    self.check_word(word)?;
    if value.len() > self.word_size() {
      return Err(AddressError::Overflow {
        len: value.len(),
        word_size: self.word_size(),
      });
    }
    let mut row = self.data.row_mut(word);
    row.fill(0.0);
    row.slice_mut(s![..value.len()]).assign(&value);
    self.lens[word] = value.len();
    self.stats.writes += 1;
    self.stats.energy += self.energy;
    Ok(())
  }

  /// True iff every stored value is zero
  pub fn is_empty(&self) -> bool {
    self.data.iter().all(|v| *v == 0.0)
  }

  /// Zero-fill the whole block
  pub fn clear(&mut self) {
    self.data.fill(0.0);
    self.lens.iter_mut().for_each(|l| *l = 0);
  }
}

// ------------------------------------------------------------
// Memory components
// ------------------------------------------------------------

/// A memory component built from one or more blocks plus an address decoder
pub trait Memory {
  fn kind(&self) -> &'static str;

  fn blocks(&self) -> &[MemoryBlock];

  fn blocks_mut(&mut self) -> &mut [MemoryBlock];

  /// Map an address to (block index, word index)
  fn decode(&self, address: &Address) -> Result<(usize, usize), AddressError>;

  fn read(&mut self, address: &Address) -> Result<Payload, AddressError> {
    let (block, word) = self.decode(address)?;
    self.blocks_mut()[block].read(word)
  }

  fn peek(&self, address: &Address) -> Result<Payload, AddressError> {
    let (block, word) = self.decode(address)?;
    self.blocks()[block].peek(word)
  }

  fn write(&mut self, address: &Address, value: ArrayView1<f64>) -> Result<(), AddressError> {
    let (block, word) = self.decode(address)?;
    self.blocks_mut()[block].write(word, value)
  }

  fn is_empty(&self) -> bool {
    self.blocks().iter().all(MemoryBlock::is_empty)
  }

  fn clear(&mut self) {
    self.blocks_mut().iter_mut().for_each(MemoryBlock::clear);
  }

  fn len(&self) -> usize {
    self.blocks().len()
  }

  fn block(&self, index: usize) -> Option<&MemoryBlock> {
    self.blocks().get(index)
  }

  /// (number of blocks, (words, word size) of a block)
  fn shape(&self) -> (usize, (usize, usize)) {
    (self.len(), self.blocks().first().map_or((0, 0), MemoryBlock::shape))
  }

  fn bits(&self) -> usize {
    self.blocks().iter().map(MemoryBlock::bits).sum()
  }

  fn read_latency(&self) -> f64 {
    self.blocks().first().map_or(0.0, MemoryBlock::read_latency)
  }

  fn energy(&self) -> f64 {
    self.blocks().first().map_or(0.0, MemoryBlock::energy)
  }

  fn stats(&self) -> AccessStats {
    self.blocks().iter().map(MemoryBlock::stats).sum()
  }
}

fn out_of_range(memory: &'static str, address: &Address, field: &'static str, index: usize, limit: usize) -> AddressError {
  AddressError::OutOfRange {
    memory,
    address: address.clone(),
    field,
    index,
    limit,
  }
}

/// Decode a (block, word) address against a list of blocks
fn decode_2d(memory: &'static str, blocks: &[MemoryBlock], address: &Address) -> Result<(usize, usize), AddressError> {
  if address.shape() != 2 {
    return Err(AddressError::Dimension {
      memory,
      expected: 2,
      address: address.clone(),
    });
  }
  let (block, word) = (address.coords()[0], address.coords()[1]);
  let b = blocks
    .get(block)
    .ok_or_else(|| out_of_range(memory, address, "block", block, blocks.len()))?;
  if word >= b.words() {
    return Err(out_of_range(memory, address, "word", word, b.words()));
  }
  Ok((block, word))
}

/// Private per-PE scratchpad (SPAD), lowest latency and energy
#[derive(Debug, Clone)]
pub struct Scratchpad {
  blocks: Vec<MemoryBlock>,
}

impl Scratchpad {
  pub const READ_LATENCY: f64 = 1e-9;
  pub const ENERGY: f64 = 1e-12;

  pub fn new(words: usize, word_size: usize) -> Self {
    Self {
      blocks: vec![MemoryBlock::new(words, word_size, Self::READ_LATENCY, Self::ENERGY)],
    }
  }
}

impl Memory for Scratchpad {
  fn kind(&self) -> &'static str {
    "Scratchpad"
  }

  fn blocks(&self) -> &[MemoryBlock] {
    &self.blocks
  }

  fn blocks_mut(&mut self) -> &mut [MemoryBlock] {
    &mut self.blocks
  }

  fn decode(&self, address: &Address) -> Result<(usize, usize), AddressError> {
    decode_2d("Scratchpad", &self.blocks, address)
  }
}

/// Shared on-chip global buffer
#[derive(Debug, Clone)]
pub struct GlobalBuffer {
  blocks: Vec<MemoryBlock>,
}

impl GlobalBuffer {
  pub const READ_LATENCY: f64 = 5e-9;
  pub const ENERGY: f64 = 5e-12;

  pub fn new(blocks: usize, block_size: usize, word_size: usize) -> Self {
    Self {
      blocks: (0..blocks)
        .map(|_| MemoryBlock::new(block_size, word_size, Self::READ_LATENCY, Self::ENERGY))
        .collect(),
    }
  }
}

impl Default for GlobalBuffer {
  fn default() -> Self {
    Self::new(25, 4096, 16)
  }
}

impl Memory for GlobalBuffer {
  fn kind(&self) -> &'static str {
    "GlobalBuffer"
  }

  fn blocks(&self) -> &[MemoryBlock] {
    &self.blocks
  }

  fn blocks_mut(&mut self) -> &mut [MemoryBlock] {
    &mut self.blocks
  }

  fn decode(&self, address: &Address) -> Result<(usize, usize), AddressError> {
    decode_2d("GlobalBuffer", &self.blocks, address)
  }
}

/// Off-chip DRAM, paged (page, block, word) addressing
#[derive(Debug, Clone)]
pub struct Dram {
  pages: usize,
  blocks_per_page: usize,
  blocks: Vec<MemoryBlock>,
}

impl Dram {
  pub const READ_LATENCY: f64 = 1e-6;
  pub const ENERGY: f64 = 500e-12;

  pub fn new(pages: usize, blocks_per_page: usize, block_size: usize, word_size: usize) -> Self {
    Self {
      pages,
      blocks_per_page,
      blocks: (0..pages * blocks_per_page)
        .map(|_| MemoryBlock::new(block_size, word_size, Self::READ_LATENCY, Self::ENERGY))
        .collect(),
    }
  }

  /// Blocks belonging to one page
  pub fn page(&self, page: usize) -> Option<&[MemoryBlock]> {
    if page >= self.pages {
      return None;
    }
    let start = page * self.blocks_per_page;
    Some(&self.blocks[start..start + self.blocks_per_page])
  }
}

impl Default for Dram {
  fn default() -> Self {
    Self::new(4, 16, 4096, 16)
  }
}

impl Memory for Dram {
  fn kind(&self) -> &'static str {
    "DRAM"
  }

  fn blocks(&self) -> &[MemoryBlock] {
    &self.blocks
  }

  fn blocks_mut(&mut self) -> &mut [MemoryBlock] {
    &mut self.blocks
  }

  fn decode(&self, address: &Address) -> Result<(usize, usize), AddressError> {
    if address.shape() != 3 {
      return Err(AddressError::Dimension {
        memory: "DRAM",
        expected: 3,
        address: address.clone(),
      });
    }
    let (page, block, word) = (address.coords()[0], address.coords()[1], address.coords()[2]);
    if page >= self.pages {
      return Err(out_of_range("DRAM", address, "page", page, self.pages));
    }
    if block >= self.blocks_per_page {
      return Err(out_of_range("DRAM", address, "block", block, self.blocks_per_page));
    }
    let flat = page * self.blocks_per_page + block;
    let words = self.blocks[flat].words();
    if word >= words {
      return Err(out_of_range("DRAM", address, "word", word, words));
    }
    Ok((flat, word))
  }
}
