//! Error types for hive with categorization:
//!
//! - **Conflict / InvalidState / NotFound / Timeout**: expected coordination
//!   outcomes, recoverable by the caller
//! - **InvalidArgument**: bad user input (exit code 1)
//! - **Unavailable / Io / Parse / Unknown**: system-level failures (exit code 2)
//! - **Database**: store corruption or schema mismatch (exit code 4)
//!
//! Every coordination operation returns these synchronously as typed results;
//! none of the expected categories is ever treated as fatal.

use std::fmt;

/// Top-level error type covering every failure mode in the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Uniqueness violation: duplicate session token or lock key
    Conflict(String),
    /// Bad input: priority out of range, missing dependency target
    InvalidArgument(String),
    /// Operation not valid in the current state: double-claim,
    /// mutating an in-progress or done task
    InvalidState(String),
    /// Unknown agent or task id
    NotFound(String),
    /// Lock-wait batch exhausted its deadline
    Timeout(String),
    /// Store unreachable beyond bounded retry
    Unavailable(String),
    /// Store corruption or schema mismatch
    Database(String),
    /// Filesystem failure outside the store
    Io(String),
    /// Malformed stored or supplied data
    Parse(String),
    /// Fallback for unexpected cases
    Unknown(String),
}

impl Error {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Returns the appropriate process exit code for this error.
    ///
    /// Exit code scheme:
    /// - 1: user error (invalid argument)
    /// - 2: system error (store unreachable, IO, parse, unknown)
    /// - 3: not found
    /// - 4: invalid state or database corruption
    /// - 5: conflict (duplicate token or lock key)
    /// - 6: lock-wait timeout
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => 1,
            Self::Unavailable(_) | Self::Io(_) | Self::Parse(_) | Self::Unknown(_) => 2,
            Self::NotFound(_) => 3,
            Self::InvalidState(_) | Self::Database(_) => 4,
            Self::Conflict(_) => 5,
            Self::Timeout(_) => 6,
        }
    }

    /// Whether this error is an expected, caller-recoverable coordination
    /// outcome rather than a system failure.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_)
                | Self::InvalidState(_)
                | Self::NotFound(_)
                | Self::Timeout(_)
                | Self::InvalidArgument(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Timeout(msg) => write!(f, "Timed out: {msg}"),
            Self::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            Self::Database(msg) => write!(f, "Database error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Parse(msg) => write!(f, "Parse error: {msg}"),
            Self::Unknown(msg) => write!(f, "Unknown error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::unavailable(err.to_string())
            }
            sqlx::Error::RowNotFound => Self::not_found(err.to_string()),
            other => Self::database_error(other.to_string()),
        }
    }
}
