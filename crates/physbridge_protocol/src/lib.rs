//! # physbridge Protocol
//!
//! The command language spoken between a scene and its physics backend.
//!
//! ## Numbering
//!
//! | family    | operator | codes     |
//! |-----------|----------|-----------|
//! | Creator   | 0        | 0 - 99    |
//! | Modifier  | 1        | 100 - 599 |
//! | Querier   | 2        | 600 - 699 |
//! | Cleaner   | 3        | 700 - 799 |
//! | Responses | 10 - 12  | 800 - 899 |
//!
//! Numbers are a compatibility contract. Never renumber an existing code.
//!
//! ## Example
//!
//! ```rust,ignore
//! use physbridge_core::{CommandsBuffer, Vec3};
//! use physbridge_protocol::{BodyMutation, Command, ModifyCommand};
//!
//! let mut commands = CommandsBuffer::default();
//! Command::Modify(ModifyCommand::Body {
//!     pcid: 7,
//!     mutation: BodyMutation::AddImpulse { impulse: Vec3::Y, offset: None },
//! })
//! .encode(&mut commands)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

mod codec;

pub mod commands;
pub mod constants;
pub mod error;
pub mod response;
pub mod shape;
pub mod startup;

pub use commands::{
    AxisLimit, BodyDesc, BodyMutation, Buoyancy, CharacterDesc, CharacterMutation, CleanCommand, Command,
    ConstraintDesc, ConstraintMutation, CreateCommand, EngineDesc, MassOverride, ModifyCommand,
    MotorSettings, QueryCommand, RayCast, ShapeCast, SoftBodyDesc, SpringSettings, TransmissionDesc,
    VehicleDesc, VehicleInput, WheelDesc,
};
pub use constants::{
    BackFaceMode, ConstraintSpace, ConstraintType, ContactType, GroundState, IsometryUpdate, MotionQuality, MotionType,
    MotorState, Operator, OverrideMassProperties, ResponseOperator, ShapeType, SpringMode,
    TransmissionMode, VehicleType, PROTOCOL_VERSION,
};
pub use error::{ProtocolError, ProtocolResult};
pub use response::{
    BodyTransform, CharacterContact, CharacterContacts, CharacterState, ContactEvent, ContactManifold,
    ContactPhase, ContactPoints, DebugDrawView, GroundSupport, QueryHit, QueryResult, Response,
};
pub use shape::{CompoundChild, HeightFieldRef, MeshRef, ShapeGeometry, ShapeSettings, DEFAULT_DENSITY};
pub use startup::StartupConstants;
