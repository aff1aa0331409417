//! # Buffer Error Types
//!
//! Errors raised by the wire primitives.

use thiserror::Error;

/// Errors that can occur while reading or writing wire buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A fixed buffer ran out of room.
    #[error("buffer overflow: requested {requested} bytes, capacity {capacity}")]
    Overflow {
        /// Bytes needed past the cursor.
        requested: usize,
        /// Capacity of the fixed buffer.
        capacity: usize,
    },

    /// A read went past the end of the buffer.
    #[error("read of {size} bytes at offset {offset} outside buffer of {len} bytes")]
    ReadOutOfBounds {
        /// Cursor when the read started.
        offset: usize,
        /// Size of the value.
        size: usize,
        /// Buffer length.
        len: usize,
    },

    /// An auxiliary buffer index does not exist.
    #[error("auxiliary buffer {0} is missing")]
    MissingAuxBuffer(u32),

    /// An auxiliary buffer exists but its contents do not match the reference.
    #[error("auxiliary buffer {index} is malformed: {reason}")]
    MalformedAuxBuffer {
        /// Index into the auxiliary list.
        index: u32,
        /// What did not match.
        reason: String,
    },
}

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;
