//! Type conversion errors.

use thiserror::Error;

/// Errors raised while extracting a typed value from a field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    /// The field is NULL and the target type cannot represent NULL.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// The stored value cannot be converted to the requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Requested Rust type.
        expected: &'static str,
        /// SQL type name of the stored value.
        actual: &'static str,
    },

    /// The stored value does not fit in the requested type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Requested Rust type.
        target_type: &'static str,
    },

    /// The stored text is not a valid representation of the requested type.
    #[error("invalid {target_type} text: {reason}")]
    InvalidText {
        /// Requested Rust type.
        target_type: &'static str,
        /// Parser message.
        reason: String,
    },
}

impl TypeError {
    /// Whether this error was caused by reading a NULL field.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::UnexpectedNull)
    }
}
