// Message envelope exchanged between the controller and a PE

use super::address::Address;
use super::instruction::{Instruction, Opcode};
use super::tensor::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// {instruction, address, payload} unit passed to and from PEs.
///
/// Address and payload live inside the instruction variant, so a message can
/// never carry operands its opcode does not take. Equality includes the
/// address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  instruction: Instruction,
}

impl Message {
  pub fn new(instruction: Instruction) -> Self {
    Self { instruction }
  }

  pub fn instruction(&self) -> &Instruction {
    &self.instruction
  }

  pub fn opcode(&self) -> Opcode {
    self.instruction.opcode()
  }

  pub fn address(&self) -> Option<&Address> {
    self.instruction.address()
  }

  pub fn payload(&self) -> Option<&Payload> {
    self.instruction.payload()
  }

  // --- constructors used by the controller ---

  pub fn compute() -> Self {
    Self::new(Instruction::Compute)
  }

  pub fn terminate() -> Self {
    Self::new(Instruction::Terminate)
  }

  pub fn write_filter(address: Address, data: Payload) -> Self {
    Self::new(Instruction::PeWriteFilter { address, data })
  }

  pub fn write_ifmap(address: Address, data: Payload) -> Self {
    Self::new(Instruction::PeWriteIfmap { address, data })
  }

  pub fn read_psum(address: Address) -> Self {
    Self::new(Instruction::PeReadPsum { address })
  }

  pub fn write_psum(address: Address, data: Payload) -> Self {
    Self::new(Instruction::PeWritePsum { address, data })
  }

  pub fn add_psum(address: Address, data: Payload) -> Self {
    Self::new(Instruction::PeAddPsum { address, data })
  }
}

impl From<Instruction> for Message {
  fn from(instruction: Instruction) -> Self {
    Self::new(instruction)
  }
}

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Message({})", self.instruction)
  }
}
