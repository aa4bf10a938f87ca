pub mod arch;
pub mod error;
pub mod simulator;

pub use arch::eyeriss::{Eyeriss, PeActor, ProcessingElement};
pub use error::{AddressError, EyerissError, Result};
pub use simulator::config::{AcceleratorConfig, AppConfig};
pub use simulator::Simulator;
