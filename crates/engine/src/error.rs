//! Engine error type
//!
//! The engine reports failures as a numeric code plus a message, the way a
//! native database client library does. Codes are stable; messages are not.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// An error reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ERR-{code}, {message}")]
pub struct EngineError {
    /// Stable engine error code
    pub code: i32,
    /// Human-readable message
    pub message: String,
}

impl EngineError {
    /// Statement could not be parsed
    pub const SYNTAX: i32 = 1000;
    /// Table does not exist
    pub const TABLE_NOT_FOUND: i32 = 1001;
    /// Table already exists
    pub const TABLE_EXISTS: i32 = 1002;
    /// Column does not exist
    pub const COLUMN_NOT_FOUND: i32 = 1003;
    /// Parameter index out of range or left unbound
    pub const PARAMETER: i32 = 1004;
    /// Value is not valid for its column
    pub const VALUE: i32 = 1005;
    /// Value count does not match the column count
    pub const COLUMN_COUNT: i32 = 1006;
    /// Operation is not valid in the current state
    pub const STATE: i32 = 1007;
    /// Table kind does not accept appends
    pub const NOT_APPENDABLE: i32 = 1008;
    /// Statement form is not supported
    pub const UNSUPPORTED: i32 = 1009;

    /// Create an error with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    /// Syntax error
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(Self::SYNTAX, message)
    }

    /// Table not found
    pub fn table_not_found(table: &str) -> Self {
        Self::new(Self::TABLE_NOT_FOUND, format!("table '{}' not found", table))
    }

    /// Column not found
    pub fn column_not_found(table: &str, column: &str) -> Self {
        Self::new(
            Self::COLUMN_NOT_FOUND,
            format!("column '{}' not found in '{}'", column, table),
        )
    }

    /// Invalid operation for the current state
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(Self::STATE, message)
    }
}

impl From<veneer_core::CodecError> for EngineError {
    fn from(e: veneer_core::CodecError) -> Self {
        EngineError::new(EngineError::VALUE, e.to_string())
    }
}
