//! Error types for the Eyeriss simulator

use crate::arch::eyeriss::address::Address;
use thiserror::Error;

/// Failure to resolve an address against a memory component
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
  /// Address has the wrong number of coordinates for the component
  #[error("{memory} expects a {expected}-D address, got {address}")]
  Dimension {
    memory: &'static str,
    expected: usize,
    address: Address,
  },

  /// One coordinate falls outside the component
  #[error("{memory} address {address}: {field} {index} out of range (limit {limit})")]
  OutOfRange {
    memory: &'static str,
    address: Address,
    field: &'static str,
    index: usize,
    limit: usize,
  },

  /// Payload does not fit in a single word
  #[error("payload of {len} values does not fit a {word_size}-value word")]
  Overflow { len: usize, word_size: usize },
}

/// Eyeriss simulator error type
#[derive(Debug, Error)]
pub enum EyerissError {
  /// Filter or image exceeds what the array can hold
  #[error("configuration error: {0}")]
  Configuration(String),

  /// compute (or set_image) invoked before its operands were loaded
  #[error("accelerator not ready (filter loaded: {filter_loaded}, image loaded: {image_loaded})")]
  NotReady { filter_loaded: bool, image_loaded: bool },

  /// Memory decoding failure
  #[error("address error: {0}")]
  Address(#[from] AddressError),

  /// Grid coordinate outside the PE array
  #[error("PE ({row}, {col}) is outside the {rows}x{cols} array")]
  Index {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
  },

  /// Instruction delivered to a unit that cannot execute it
  #[error("{unit} cannot execute {instruction}")]
  Unsupported {
    unit: String,
    instruction: &'static str,
  },

  /// Elementwise operation on rows of different lengths
  #[error("shape mismatch: expected {expected} values, got {actual}")]
  Shape { expected: usize, actual: usize },

  /// Instruction text could not be decoded
  #[error("decode error: {0}")]
  Decode(String),

  /// Actor-backed PE task is gone
  #[error("PE {id} is disconnected")]
  Disconnected { id: usize },

  /// Layered configuration could not be built
  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  /// Effective configuration could not be serialised
  #[error("toml error: {0}")]
  TomlSer(#[from] toml::ser::Error),

  /// Trace line could not be read back
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// IO error
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EyerissError>;
