//! # physbridge Core
//!
//! Wire primitives shared by the caller and the physics backend.
//!
//! ## Design Principles
//!
//! 1. **Buffers, not references** - Nothing but bytes crosses the boundary
//! 2. **Reads never panic** - Out of bounds reads yield zero and flag the buffer
//! 3. **Stable indices** - Shapes, constraints and callbacks are addressed by `u32`
//!
//! ## Example
//!
//! ```rust,ignore
//! use physbridge_core::{CommandsBuffer, Vec3};
//!
//! let mut commands = CommandsBuffer::default();
//! commands.write_operator(1);
//! commands.write_command(101);
//! commands.write(7u32);
//! commands.write(Vec3::new(0.0, 10.0, 0.0));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod auxiliary;
pub mod buffer;
pub mod error;
pub mod math;
pub mod registry;

pub use auxiliary::AuxBuffers;
pub use buffer::{Checkpoint, CommandsBuffer, WireValue, DEFAULT_CAPACITY, HEADER_SIZE};
pub use error::{BufferError, BufferResult};
pub use math::{Isometry, Quat, Vec3};
pub use registry::{IndexedRegistry, WireMap};
