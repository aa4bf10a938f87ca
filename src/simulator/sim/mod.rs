pub mod shell;
pub mod trace;

pub use shell::{parse_command, run_shell, Command};
pub use trace::{open_trace, read_trace, TraceEntry};
