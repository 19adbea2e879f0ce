//! Codec error types
//!
//! Failures of the value codec. Precision loss inside an allowed conversion
//! is never an error; only incompatible types, invalid inputs and undersized
//! buffers are.

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while encoding or decoding values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value cannot be converted to the requested type
    #[error("type mismatch: cannot convert {from_type} to {to_type}")]
    TypeMismatch {
        /// Type of the value being converted
        from_type: String,
        /// Requested target type
        to_type: String,
    },

    /// Caller-supplied buffer is smaller than the value
    #[error("buffer too small: value needs {needed} bytes, buffer holds {capacity}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        capacity: usize,
    },

    /// The type pairing is legal but this particular value is not
    #[error("invalid {column_type} value: {reason}")]
    InvalidValue {
        /// Column type being produced
        column_type: String,
        /// What was wrong with the input
        reason: String,
    },
}

impl CodecError {
    /// Build a type mismatch from two type names.
    pub fn mismatch(from_type: impl Into<String>, to_type: impl Into<String>) -> Self {
        CodecError::TypeMismatch {
            from_type: from_type.into(),
            to_type: to_type.into(),
        }
    }

    /// Build an invalid-value error.
    pub fn invalid(column_type: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::InvalidValue {
            column_type: column_type.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_names_both_types() {
        let err = CodecError::mismatch("string", "int64");
        let msg = err.to_string();
        assert!(msg.contains("string"));
        assert!(msg.contains("int64"));
    }

    #[test]
    fn test_buffer_too_small_display() {
        let err = CodecError::BufferTooSmall {
            needed: 12,
            capacity: 8,
        };
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("8"));
    }
}
