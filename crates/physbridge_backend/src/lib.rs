//! # physbridge Backend
//!
//! The simulation side of the bridge: decodes commands, drives a
//! [`PhysicsEngine`] at a fixed step and encodes what happened.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Backend<E>                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  inbound ──→ Creator / Modifier / Querier / Cleaner      │
//! │                         │                                │
//! │               World: Tracker, shapes, constraints,       │
//! │                      motion states, debug cache          │
//! │                         │                                │
//! │  FixedClock ──→ E::step ──→ ContactListener ──→ outbound │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use physbridge_backend::{Backend, BackendConfig, Inbound, SandboxEngine};
//!
//! let config = BackendConfig::default();
//! let mut backend = Backend::new(SandboxEngine::from_config(&config), config)?;
//! let outcome = backend.step(Some(Inbound::take(&mut commands)), 1.0 / 60.0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod constraints;
pub mod drawer;
pub mod engine;
pub mod error;
pub mod listener;
pub mod motion_state;
pub mod operators;
pub mod tracker;

pub use backend::{Backend, BackendStats, Inbound, StepOutput, TickOutcome};
pub use clock::{ClockStats, FixedClock};
pub use config::BackendConfig;
pub use constraints::{ConstraintEntry, ConstraintTable};
pub use drawer::DebugDrawer;
pub use engine::{
    BodyHandle, BodyKind, BodyState, ConstraintHandle, GroundInfo, PhysicsEngine, RawCharacterContact, RawContact,
    RawHit, SandboxEngine, ShapeHandle, SolverSettings,
};
pub use error::{BackendError, BackendResult, EngineError, EngineResult};
pub use listener::{ContactFilter, ContactListener};
pub use motion_state::{MotionState, MotionStates};
pub use operators::{Cleaner, Creator, Modifier, Querier, World};
pub use tracker::Tracker;
