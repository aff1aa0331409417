//! # physbridge
//!
//! Physics on its own thread, synchronized with the scene through command
//! buffers. No object reference ever crosses the boundary; bodies are
//! named by caller assigned pcids.
//!
//! ## Crates
//!
//! - `physbridge_core`: commands buffer, side buffers, index tables, math
//! - `physbridge_protocol`: typed commands and responses
//! - `physbridge_backend`: dispatch, tracking, fixed step loop
//! - `physbridge`: worker thread and caller side client
//!
//! ## Example
//!
//! ```rust,ignore
//! use physbridge::{BackendWorker, PhysicsClient};
//! use physbridge_backend::{BackendConfig, SandboxEngine};
//!
//! let config = BackendConfig::default();
//! let worker = BackendWorker::spawn(SandboxEngine::from_config(&config), config)?;
//! let mut client = PhysicsClient::default();
//!
//! client.push(CreateCommand::Body(Box::new(desc)))?;
//! if let Some(output) = worker.step(Some(client.flush()), 1.0 / 60.0)? {
//!     let events = client.apply(&output)?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod error;
pub mod worker;

pub use client::{ClientEvent, PhysicsClient};
pub use error::{ClientError, ClientResult};
pub use worker::{BackendWorker, WorkerMessage, WorkerRequest, WorkerStatus};
