//! Client-side errors.

use thiserror::Error;

/// Errors returned by [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum WireError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The server closed the connection
    #[error("connection closed by server")]
    Closed,

    /// The server answered with a transport fault
    #[error("{code}: {message}")]
    Fault {
        /// Stable reason code
        code: String,
        /// Server message
        message: String,
    },

    /// The operation ran and failed
    #[error("{reason}")]
    Failed {
        /// Stable reason code, if any
        code: Option<String>,
        /// Server reason
        reason: String,
    },

    /// The response does not match the request
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl WireError {
    /// Stable reason code of a fault or failed operation.
    pub fn code(&self) -> Option<&str> {
        match self {
            WireError::Fault { code, .. } => Some(code),
            WireError::Failed { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, WireError>;
