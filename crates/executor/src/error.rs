//! Error types for the RPC surface.
//!
//! All failures of cursor and appender operations are represented by the
//! [`Error`] enum. These errors are:
//! - **Structured**: Each variant has typed fields for error details
//! - **Serializable**: Can be carried in a response body or envelope
//! - **Coded**: [`Error::code`] is a stable machine-readable reason code

use serde::{Deserialize, Serialize};

/// RPC operation errors.
///
/// Most errors are reported inside a response body (`success = false`).
/// Only transport faults, see [`Error::is_transport_fault`], are returned as
/// `Err` from the executor.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Codec | `TypeMismatch`, `BufferTooSmall` | Value conversion failed |
/// | Handle | `HandleNotFound`, `HandleInvalid`, `HandleBusy` | Opaque handle problems |
/// | Validation | `ParamCountMismatch`, `InvalidInput` | Bad request contents |
/// | Appender | `TableNotFound`, `NotAppendable`, `AppendAborted` | Append session failures |
/// | Engine | `Engine` | Reported by the database engine |
/// | System | `Timeout`, `Internal` | Deadlines and invariant violations |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Codec ====================
    /// Value cannot be converted to the declared type
    #[error("type mismatch: cannot convert {from_type} to {to_type}")]
    TypeMismatch { from_type: String, to_type: String },

    /// Caller buffer is smaller than the value
    #[error("buffer too small: value needs {needed} bytes, buffer holds {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    // ==================== Handle ====================
    /// Handle is not live in this session
    #[error("handle '{handle}' not found")]
    HandleNotFound { handle: String },

    /// Handle is malformed or refers to the wrong kind of resource
    #[error("handle '{handle}' is not valid: {reason}")]
    HandleInvalid { handle: String, reason: String },

    /// Another operation holds the handle
    #[error("handle '{handle}' is busy")]
    HandleBusy { handle: String },

    // ==================== Validation ====================
    /// Bound parameter count differs from the statement's
    #[error("params required {expected}, but got {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },

    /// Invalid input
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    // ==================== Appender ====================
    /// Append target does not exist
    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    /// Append target is not a log or tag table
    #[error("{table} is not appendable table ({kind})")]
    NotAppendable { table: String, kind: String },

    /// Consecutive-failure threshold reached; the session fails fast
    #[error(
        "append to '{table}' aborted after {threshold} consecutive failures (success {success}, fail {fail})"
    )]
    AppendAborted {
        table: String,
        success: u64,
        fail: u64,
        threshold: u32,
    },

    // ==================== Engine ====================
    /// Error reported by the engine
    #[error("engine error {code}: {reason}")]
    Engine { code: i32, reason: String },

    // ==================== System ====================
    /// Deadline expired while waiting for the engine
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Internal error (bug or invariant violation)
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::TypeMismatch { .. } => "TypeMismatch",
            Error::BufferTooSmall { .. } => "BufferTooSmall",
            Error::HandleNotFound { .. } => "HandleNotFound",
            Error::HandleInvalid { .. } => "HandleInvalid",
            Error::HandleBusy { .. } => "HandleBusy",
            Error::ParamCountMismatch { .. } => "ParamCountMismatch",
            Error::InvalidInput { .. } => "InvalidInput",
            Error::TableNotFound { .. } => "TableNotFound",
            Error::NotAppendable { .. } => "NotAppendable",
            Error::AppendAborted { .. } => "AppendAborted",
            Error::Engine { .. } => "Engine",
            Error::Timeout { .. } => "Timeout",
            Error::Internal { .. } => "Internal",
        }
    }

    /// Malformed requests and registry corruption fail the call itself
    /// instead of being reported in the response body.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Error::HandleInvalid { .. } | Error::Internal { .. })
    }
}
