//! # Protocol Error Types
//!
//! Failures while decoding the command stream. Every variant is fatal for
//! the tick that produced it: the cursor can no longer be trusted.

use physbridge_core::BufferError;
use thiserror::Error;

/// Errors raised while encoding or decoding protocol records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The operator byte does not name a command family.
    #[error("unknown operator: {0}")]
    UnknownOperator(u8),

    /// The command code is not defined for its operator.
    #[error("unknown command {code} for operator {operator}")]
    UnknownCommand {
        /// Operator byte the code was read under.
        operator: u8,
        /// Command code.
        code: u16,
    },

    /// An enumeration byte is out of range.
    #[error("invalid {kind} value: {value}")]
    InvalidEnum {
        /// Name of the enumeration.
        kind: &'static str,
        /// Raw value found on the wire.
        value: u8,
    },

    /// A record ended before its payload was complete.
    #[error("record truncated at offset {offset}")]
    Truncated {
        /// Cursor when the overrun was detected.
        offset: usize,
    },

    /// A fixed buffer had no room for the record.
    #[error("commands buffer is full")]
    Overflow,

    /// Side buffer failure.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
