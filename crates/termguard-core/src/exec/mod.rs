//! Timeout-bound shell command execution.

mod executor;
mod policy;

pub use executor::{CommandExecutor, ExecStatus, ExecutionResult, NO_OUTPUT_MARKER};
pub use policy::CommandPolicy;
