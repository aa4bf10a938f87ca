// Addresses into memory components: (block, word) or (page, block, word)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable coordinate into a memory component.
///
/// The number of coordinates (`shape`) selects the decoder: 2 for scratchpads
/// and the global buffer, 3 for DRAM. Ordering is lexicographic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(Vec<usize>);

impl Address {
  pub fn new(coords: impl Into<Vec<usize>>) -> Self {
    Self(coords.into())
  }

  /// Number of coordinates
  pub fn shape(&self) -> usize {
    self.0.len()
  }

  pub fn coords(&self) -> &[usize] {
    &self.0
  }

  pub fn get(&self, index: usize) -> Option<usize> {
    self.0.get(index).copied()
  }
}

impl From<[usize; 2]> for Address {
  fn from(coords: [usize; 2]) -> Self {
    Self(coords.to_vec())
  }
}

impl From<[usize; 3]> for Address {
  fn from(coords: [usize; 3]) -> Self {
    Self(coords.to_vec())
  }
}

impl From<(usize, usize)> for Address {
  fn from((block, word): (usize, usize)) -> Self {
    Self(vec![block, word])
  }
}

impl From<(usize, usize, usize)> for Address {
  fn from((page, block, word): (usize, usize, usize)) -> Self {
    Self(vec![page, block, word])
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", c)?;
    }
    write!(f, ")")
  }
}
