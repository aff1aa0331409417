//! # Backend Error Types
//!
//! [`EngineError`] is what a [`PhysicsEngine`](crate::engine::PhysicsEngine)
//! reports. [`BackendError`] is what the backend reports to its owner,
//! either for one command or for the whole tick.

use physbridge_core::BufferError;
use physbridge_protocol::ProtocolError;
use thiserror::Error;

/// Failures reported by a physics engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The handle does not name a live object.
    #[error("invalid handle: {0}")]
    InvalidHandle(u32),

    /// The collision filter group table does not exist.
    #[error("collision group {0} does not exist")]
    MissingGroup(u32),

    /// A sub group index is outside its group table.
    #[error("sub group {sub_group} out of range for group {group}")]
    SubGroupOutOfRange {
        /// Group table.
        group: u32,
        /// Offending sub group.
        sub_group: u32,
    },

    /// Shape data could not be turned into a shape.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A property value the engine cannot use.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The engine does not implement this feature.
    #[error("unsupported by this engine: {0}")]
    Unsupported(&'static str),

    /// The simulation could not advance.
    #[error("step failed: {0}")]
    StepFailed(String),

    /// An auxiliary buffer was missing or malformed.
    #[error("auxiliary buffer: {0}")]
    Buffer(#[from] BufferError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The command stream could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The engine refused an operation.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A command referenced a body that is not tracked.
    #[error("body {0} is not tracked")]
    MissingBody(u32),

    /// A create command reused a pcid that is still alive.
    #[error("body {0} already exists")]
    DuplicateBody(u32),

    /// A command referenced a shape index that is not registered.
    #[error("shape {0} is not registered")]
    MissingShape(u32),

    /// A command carried values that cannot be simulated.
    #[error("invalid command data: {0}")]
    Validation(String),

    /// A previous failure halted the backend.
    #[error("backend is halted")]
    Halted,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// True for failures that invalidate the command stream itself.
    ///
    /// Everything else only affects the command that raised it.
    #[must_use]
    pub const fn is_stream_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Halted)
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
