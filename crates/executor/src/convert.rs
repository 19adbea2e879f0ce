//! Error conversion from lower layers.
//!
//! Codec and engine errors map onto the executor's [`Error`] without losing
//! their details.

use veneer_core::CodecError;
use veneer_engine::EngineError;

use crate::Error;

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TypeMismatch { from_type, to_type } => Error::TypeMismatch { from_type, to_type },
            CodecError::BufferTooSmall { needed, capacity } => Error::BufferTooSmall { needed, capacity },
            CodecError::InvalidValue { column_type, reason } => Error::InvalidInput {
                reason: format!("invalid {} value: {}", column_type, reason),
            },
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Error::Engine {
            code: err.code,
            reason: err.message,
        }
    }
}
