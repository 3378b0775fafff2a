//! Core domain types for the hive multi-agent coordinator.
//!
//! This crate holds everything the coordination layer and the CLI share:
//! the error taxonomy, the agent/task/lock/event models, input validation,
//! and the JSON output envelope. It contains no I/O; persistence lives in
//! the `hive` crate.

pub mod error;
pub mod output;
pub mod types;
pub mod validation;

pub use error::Error;
pub use output::{OutputFormat, SchemaEnvelope};
pub use types::{
    Agent, AgentStatus, EventKind, EventRecord, ResourceLock, Task, TaskFilter, TaskSpec,
    TaskStatus,
};

/// Result type used throughout hive.
pub type Result<T> = std::result::Result<T, Error>;
