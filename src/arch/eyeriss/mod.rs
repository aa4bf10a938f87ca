pub mod actor;
pub mod address;
pub mod eyeriss;
pub mod instruction;
pub mod memory;
pub mod message;
pub mod noc;
pub mod pe;
pub mod tensor;

pub use actor::PeActor;
pub use address::Address;
pub use eyeriss::{CostReport, Eyeriss};
pub use instruction::{Instruction, InstructionSet, Opcode};
pub use memory::{AccessStats, Dram, GlobalBuffer, Memory, MemoryBlock, Scratchpad};
pub use message::Message;
pub use noc::{Coord, LinkStats, NetworkOnChip};
pub use pe::{Endpoint, PeSnapshot, ProcessingElement};
pub use tensor::{Matrix, Payload};
