// Instruction protocol between the controller, the PEs and the global buffer

use super::address::Address;
use super::tensor::Payload;
use crate::error::{EyerissError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
  Terminate = 0,
  Compute = 1,
  PeWriteFilter = 4,
  PeWriteIfmap = 5,
  PeReadPsum = 6,
  PeWritePsum = 7,
  PeAddPsum = 8,
  GlbReadFilter = 9,
  GlbWriteFilter = 10,
  GlbReadIfmap = 11,
  GlbWriteIfmap = 12,
  GlbReadPsum = 13,
  GlbWritePsum = 14,
  GlbReadOfmap = 15,
}

impl Opcode {
  pub fn code(self) -> u8 {
    self as u8
  }

  pub fn descriptor(self) -> &'static Descriptor {
    let index = match self {
      Opcode::Terminate => 0,
      Opcode::Compute => 1,
      Opcode::PeWriteFilter => 2,
      Opcode::PeWriteIfmap => 3,
      Opcode::PeReadPsum => 4,
      Opcode::PeWritePsum => 5,
      Opcode::PeAddPsum => 6,
      Opcode::GlbReadFilter => 7,
      Opcode::GlbWriteFilter => 8,
      Opcode::GlbReadIfmap => 9,
      Opcode::GlbWriteIfmap => 10,
      Opcode::GlbReadPsum => 11,
      Opcode::GlbWritePsum => 12,
      Opcode::GlbReadOfmap => 13,
    };
    &DESCRIPTORS[index]
  }

  pub fn name(self) -> &'static str {
    self.descriptor().name
  }
}

impl TryFrom<u8> for Opcode {
  type Error = EyerissError;

  fn try_from(code: u8) -> Result<Self> {
    InstructionSet::get(code)
      .map(|d| d.opcode)
      .ok_or_else(|| EyerissError::Decode(format!("unknown opcode {}", code)))
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.name(), self.code())
  }
}

/// Operands carried by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
  None,
  Address,
  AddressPayload,
}

/// Unit that executes an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
  Control,
  Pe,
  GlobalBuffer,
}

/// Static description of one opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
  pub opcode: Opcode,
  pub name: &'static str,
  pub operands: Operands,
  pub unit: Unit,
}

const fn desc(opcode: Opcode, name: &'static str, operands: Operands, unit: Unit) -> Descriptor {
  Descriptor {
    opcode,
    name,
    operands,
    unit,
  }
}

static DESCRIPTORS: [Descriptor; 14] = [
  desc(Opcode::Terminate, "TERMINATE", Operands::None, Unit::Control),
  desc(Opcode::Compute, "COMPUTE", Operands::None, Unit::Pe),
  desc(Opcode::PeWriteFilter, "PE_WRITE_FILTER", Operands::AddressPayload, Unit::Pe),
  desc(Opcode::PeWriteIfmap, "PE_WRITE_IFMAP", Operands::AddressPayload, Unit::Pe),
  desc(Opcode::PeReadPsum, "PE_READ_PSUM", Operands::Address, Unit::Pe),
  desc(Opcode::PeWritePsum, "PE_WRITE_PSUM", Operands::AddressPayload, Unit::Pe),
  desc(Opcode::PeAddPsum, "PE_ADD_PSUM", Operands::AddressPayload, Unit::Pe),
  desc(Opcode::GlbReadFilter, "GLB_READ_FILTER", Operands::Address, Unit::GlobalBuffer),
  desc(Opcode::GlbWriteFilter, "GLB_WRITE_FILTER", Operands::AddressPayload, Unit::GlobalBuffer),
  desc(Opcode::GlbReadIfmap, "GLB_READ_IFMAP", Operands::Address, Unit::GlobalBuffer),
  desc(Opcode::GlbWriteIfmap, "GLB_WRITE_IFMAP", Operands::AddressPayload, Unit::GlobalBuffer),
  desc(Opcode::GlbReadPsum, "GLB_READ_PSUM", Operands::Address, Unit::GlobalBuffer),
  desc(Opcode::GlbWritePsum, "GLB_WRITE_PSUM", Operands::AddressPayload, Unit::GlobalBuffer),
  desc(Opcode::GlbReadOfmap, "GLB_READ_OFMAP", Operands::Address, Unit::GlobalBuffer),
];

/// Registry of every opcode the protocol knows about
pub struct InstructionSet;

impl InstructionSet {
  pub fn descriptors() -> &'static [Descriptor] {
    &DESCRIPTORS
  }

  pub fn get(code: u8) -> Option<&'static Descriptor> {
    DESCRIPTORS.iter().find(|d| d.opcode.code() == code)
  }

  pub fn by_name(name: &str) -> Option<&'static Descriptor> {
    DESCRIPTORS.iter().find(|d| d.name.eq_ignore_ascii_case(name))
  }

  pub fn contains(code: u8) -> bool {
    Self::get(code).is_some()
  }

  pub fn len() -> usize {
    DESCRIPTORS.len()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
  Terminate,
  Compute,
  PeWriteFilter { address: Address, data: Payload },
  PeWriteIfmap { address: Address, data: Payload },
  PeReadPsum { address: Address },
  PeWritePsum { address: Address, data: Payload },
  PeAddPsum { address: Address, data: Payload },
  GlbReadFilter { address: Address },
  GlbWriteFilter { address: Address, data: Payload },
  GlbReadIfmap { address: Address },
  GlbWriteIfmap { address: Address, data: Payload },
  GlbReadPsum { address: Address },
  GlbWritePsum { address: Address, data: Payload },
  GlbReadOfmap { address: Address },
}

impl Instruction {
  pub fn opcode(&self) -> Opcode {
    match self {
      Instruction::Terminate => Opcode::Terminate,
      Instruction::Compute => Opcode::Compute,
      Instruction::PeWriteFilter { .. } => Opcode::PeWriteFilter,
      Instruction::PeWriteIfmap { .. } => Opcode::PeWriteIfmap,
      Instruction::PeReadPsum { .. } => Opcode::PeReadPsum,
      Instruction::PeWritePsum { .. } => Opcode::PeWritePsum,
      Instruction::PeAddPsum { .. } => Opcode::PeAddPsum,
      Instruction::GlbReadFilter { .. } => Opcode::GlbReadFilter,
      Instruction::GlbWriteFilter { .. } => Opcode::GlbWriteFilter,
      Instruction::GlbReadIfmap { .. } => Opcode::GlbReadIfmap,
      Instruction::GlbWriteIfmap { .. } => Opcode::GlbWriteIfmap,
      Instruction::GlbReadPsum { .. } => Opcode::GlbReadPsum,
      Instruction::GlbWritePsum { .. } => Opcode::GlbWritePsum,
      Instruction::GlbReadOfmap { .. } => Opcode::GlbReadOfmap,
    }
  }

  pub fn name(&self) -> &'static str {
    self.opcode().name()
  }

  pub fn descriptor(&self) -> &'static Descriptor {
    self.opcode().descriptor()
  }

  pub fn unit(&self) -> Unit {
    self.descriptor().unit
  }

  pub fn address(&self) -> Option<&Address> {
    match self {
      Instruction::Terminate | Instruction::Compute => None,
      Instruction::PeReadPsum { address }
      | Instruction::GlbReadFilter { address }
      | Instruction::GlbReadIfmap { address }
      | Instruction::GlbReadPsum { address }
      | Instruction::GlbReadOfmap { address } => Some(address),
      Instruction::PeWriteFilter { address, .. }
      | Instruction::PeWriteIfmap { address, .. }
      | Instruction::PeWritePsum { address, .. }
      | Instruction::PeAddPsum { address, .. }
      | Instruction::GlbWriteFilter { address, .. }
      | Instruction::GlbWriteIfmap { address, .. }
      | Instruction::GlbWritePsum { address, .. } => Some(address),
    }
  }

  pub fn payload(&self) -> Option<&Payload> {
    match self {
      Instruction::PeWriteFilter { data, .. }
      | Instruction::PeWriteIfmap { data, .. }
      | Instruction::PeWritePsum { data, .. }
      | Instruction::PeAddPsum { data, .. }
      | Instruction::GlbWriteFilter { data, .. }
      | Instruction::GlbWriteIfmap { data, .. }
      | Instruction::GlbWritePsum { data, .. } => Some(data),
      _ => None,
    }
  }

  /// True for instructions whose sender waits on a reply
  pub fn is_read(&self) -> bool {
    self.descriptor().operands == Operands::Address
  }

  /// Build an instruction from its opcode and operands
  pub fn from_parts(opcode: Opcode, address: Option<Address>, data: Option<Payload>) -> Result<Self> {
    let operands = opcode.descriptor().operands;
    let missing = |what: &str| EyerissError::Decode(format!("{} requires {}", opcode.name(), what));
    let mismatch =
      |op: Opcode| EyerissError::Decode(format!("{} does not take {:?} operands", op.name(), operands));

    let inst = match (opcode, operands) {
      (Opcode::Terminate, Operands::None) => Instruction::Terminate,
      (Opcode::Compute, Operands::None) => Instruction::Compute,
      (Opcode::PeReadPsum, Operands::Address) => Instruction::PeReadPsum {
        address: address.ok_or_else(|| missing("an address"))?,
      },
      (Opcode::GlbReadFilter, Operands::Address) => Instruction::GlbReadFilter {
        address: address.ok_or_else(|| missing("an address"))?,
      },
      (Opcode::GlbReadIfmap, Operands::Address) => Instruction::GlbReadIfmap {
        address: address.ok_or_else(|| missing("an address"))?,
      },
      (Opcode::GlbReadPsum, Operands::Address) => Instruction::GlbReadPsum {
        address: address.ok_or_else(|| missing("an address"))?,
      },
      (Opcode::GlbReadOfmap, Operands::Address) => Instruction::GlbReadOfmap {
        address: address.ok_or_else(|| missing("an address"))?,
      },
      (
        Opcode::PeWriteFilter
        | Opcode::PeWriteIfmap
        | Opcode::PeWritePsum
        | Opcode::PeAddPsum
        | Opcode::GlbWriteFilter
        | Opcode::GlbWriteIfmap
        | Opcode::GlbWritePsum,
        Operands::AddressPayload,
      ) => {
        let address = address.ok_or_else(|| missing("an address"))?;
        let data = data.ok_or_else(|| missing("a payload"))?;
        match opcode {
          Opcode::PeWriteFilter => Instruction::PeWriteFilter { address, data },
          Opcode::PeWriteIfmap => Instruction::PeWriteIfmap { address, data },
          Opcode::PeWritePsum => Instruction::PeWritePsum { address, data },
          Opcode::PeAddPsum => Instruction::PeAddPsum { address, data },
          Opcode::GlbWriteFilter => Instruction::GlbWriteFilter { address, data },
          Opcode::GlbWriteIfmap => Instruction::GlbWriteIfmap { address, data },
          Opcode::GlbWritePsum => Instruction::GlbWritePsum { address, data },
          other => return Err(mismatch(other)),
        }
      },
      (other, _) => return Err(mismatch(other)),
    };
    Ok(inst)
  }

  /// Decode an instruction from text.
  ///
  /// Format: `NAME [block word] [v0,v1,...]`, e.g. `PE_WRITE_FILTER 0 0 1,2,3`,
  /// `PE_READ_PSUM 0 0`, `COMPUTE`. Names are case-insensitive.
  pub fn parse(text: &str) -> Result<Self> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.is_empty() {
      return Err(EyerissError::Decode("empty instruction".to_string()));
    }

    let desc = InstructionSet::by_name(parts[0])
      .ok_or_else(|| EyerissError::Decode(format!("unknown instruction: {}", parts[0])))?;

    let expected = match desc.operands {
      Operands::None => 0,
      Operands::Address => 2,
      Operands::AddressPayload => 3,
    };
    if parts.len() - 1 != expected {
      return Err(EyerissError::Decode(format!(
        "{} expects {} args, got {}",
        desc.name,
        expected,
        parts.len() - 1
      )));
    }

    let address = match desc.operands {
      Operands::None => None,
      _ => Some(Address::new(vec![
        Self::parse_usize(parts[1])?,
        Self::parse_usize(parts[2])?,
      ])),
    };
    let data = match desc.operands {
      Operands::AddressPayload => Some(Self::parse_payload(parts[3])?),
      _ => None,
    };

    Self::from_parts(desc.opcode, address, data)
  }

  fn parse_usize(s: &str) -> Result<usize> {
    s.parse::<usize>()
      .map_err(|e| EyerissError::Decode(format!("invalid number '{}': {}", s, e)))
  }

  fn parse_payload(s: &str) -> Result<Payload> {
    s.split(',')
      .filter(|v| !v.is_empty())
      .map(|v| {
        v.parse::<f64>()
          .map_err(|e| EyerissError::Decode(format!("invalid value '{}': {}", v, e)))
      })
      .collect::<Result<Vec<f64>>>()
      .map(Payload::from)
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.opcode())?;
    if let Some(address) = self.address() {
      write!(f, " address={}", address)?;
    }
    if let Some(data) = self.payload() {
      write!(f, " data={}", data)?;
    }
    Ok(())
  }
}
