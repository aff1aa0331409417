//! Caller side errors.

use physbridge_backend::BackendError;
use physbridge_protocol::ProtocolError;
use thiserror::Error;

/// Errors seen by the caller of a [`BackendWorker`](crate::BackendWorker)
/// or a [`PhysicsClient`](crate::PhysicsClient).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The worker thread is gone.
    #[error("backend worker disconnected")]
    Disconnected,

    /// The backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A command could not be encoded or a response decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for caller side operations.
pub type ClientResult<T> = Result<T, ClientError>;
