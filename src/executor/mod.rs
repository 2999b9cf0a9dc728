//! Process execution
//!
//! Launches make for an authorized target with:
//! - Timeout that kills the process group
//! - Merged, bounded output capture
//! - Allow-listed child environment
//! - Working directory control

pub mod env;
pub mod runner;

pub use env::{ChildEnv, DEFAULT_ALLOWLIST};
pub use runner::{
    ExecSpec, Execute, ExecutionResult, ProcessRunner, RunState, DEFAULT_TIMEOUT_SECS,
    MAX_OUTPUT_SIZE, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, TIMEOUT_EXIT_CODE, TRUNCATION_MARKER,
    UNKNOWN_EXIT_CODE,
};
