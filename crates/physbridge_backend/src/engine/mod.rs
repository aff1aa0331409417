//! # Physics Engine Capability
//!
//! The backend never talks to a solver directly. Everything it needs is
//! behind [`PhysicsEngine`], passed to the [`Backend`](crate::Backend) as a
//! generic parameter.
//!
//! ```text
//! Backend<E>           E: PhysicsEngine
//! ┌─────────────┐      ┌──────────────────┐
//! │ operators   │ ───→ │ create / mutate  │
//! │ step loop   │ ───→ │ step / query     │
//! │ listener    │ ←─── │ contact events   │
//! └─────────────┘      └──────────────────┘
//! ```
//!
//! Handles are opaque to the backend and never cross the wire. The
//! [`Tracker`](crate::Tracker) maps them to pcids.

pub mod sandbox;

use physbridge_core::{AuxBuffers, Isometry, Quat, Vec3};
use physbridge_protocol::{
    BodyDesc, BodyMutation, CharacterDesc, CharacterMutation, ConstraintDesc, ConstraintMutation,
    ContactType, GroundState, RayCast, ShapeCast, ShapeSettings, SoftBodyDesc, VehicleDesc, VehicleInput,
};

use crate::error::{EngineError, EngineResult};

pub use sandbox::{SandboxEngine, SolverSettings};

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw engine id.
            #[must_use]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw engine id.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

engine_handle! {
    /// Opaque body or character handle.
    BodyHandle
}

engine_handle! {
    /// Opaque shape handle.
    ShapeHandle
}

engine_handle! {
    /// Opaque constraint or vehicle handle.
    ConstraintHandle
}

/// How a body moves, as far as reporting is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Never moves. Not reported.
    Static,
    /// Moved by velocity only.
    Kinematic,
    /// Fully simulated. Soft bodies are dynamic.
    Dynamic,
    /// Virtual character.
    Character,
}

/// Transform and velocities of a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
}

impl BodyState {
    /// Position and rotation only.
    #[must_use]
    pub const fn isometry(&self) -> Isometry {
        Isometry::new(self.position, self.rotation)
    }
}

/// Ground information of a character.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundInfo {
    /// Ground classification.
    pub state: GroundState,
    /// Supporting body.
    pub body: Option<BodyHandle>,
    /// Slope exceeds the character's max slope.
    pub too_steep: bool,
    /// Velocity of the ground.
    pub velocity: Vec3,
    /// Ground normal.
    pub normal: Vec3,
}

/// One hit of a cast, before pcid resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawHit {
    /// Hit body.
    pub body: BodyHandle,
    /// Fraction of the cast length at which the hit happened.
    pub fraction: f32,
    /// World hit point.
    pub point: Vec3,
    /// Surface normal, when requested.
    pub normal: Option<Vec3>,
}

/// One contact event, before pcid resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct RawContact {
    /// Phase.
    pub kind: ContactType,
    /// First body.
    pub body1: BodyHandle,
    /// Second body.
    pub body2: BodyHandle,
    /// Normal from body 1 to body 2.
    pub normal: Vec3,
    /// Penetration depth.
    pub depth: f32,
    /// Base offset of the manifold.
    pub offset: Vec3,
    /// Points on body 1, relative to `offset`.
    pub points1: Vec<Vec3>,
    /// Points on body 2, relative to `offset`.
    pub points2: Vec<Vec3>,
}

/// One character contact, before pcid resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawCharacterContact {
    /// Character that reported the contact.
    pub character: BodyHandle,
    /// Touched body.
    pub other: Option<BodyHandle>,
    /// Contact position.
    pub position: Vec3,
    /// Contact normal.
    pub normal: Vec3,
    /// Velocity of the touched surface.
    pub velocity: Vec3,
    /// Character velocity after resolution.
    pub new_character_velocity: Vec3,
}

/// The capability a native solver provides to the backend.
///
/// Methods on absent handles are no-ops or `None`; only creation, step and
/// query methods report failures. Features with a default body are
/// optional and report [`EngineError::Unsupported`].
pub trait PhysicsEngine {
    // =========================================================================
    // SHAPES
    // =========================================================================

    /// Builds a shape. Mesh and height data is read from `aux`.
    fn create_shape(&mut self, settings: &ShapeSettings, aux: &AuxBuffers) -> EngineResult<ShapeHandle>;

    /// Drops the caller's reference to a shape. Bodies using it keep theirs.
    fn release_shape(&mut self, shape: ShapeHandle);

    // =========================================================================
    // COLLISION FILTERING
    // =========================================================================

    /// Creates a group filter table with `sub_groups` sub groups that all
    /// collide with each other. Returns the group index.
    ///
    /// The size comes straight off the wire; engines that store tables
    /// densely refuse sizes they cannot hold instead of allocating them.
    fn create_group_table(&mut self, sub_groups: u32) -> EngineResult<u32>;

    /// Enables or disables collision between two sub groups of a table.
    fn toggle_group_pair(&mut self, group: u32, sub_group1: u32, sub_group2: u32, enable: bool) -> EngineResult<()>;

    // =========================================================================
    // BODIES
    // =========================================================================

    /// Creates a rigid body and adds it to the world.
    fn create_body(&mut self, desc: &BodyDesc, shape: ShapeHandle) -> EngineResult<BodyHandle>;

    /// Creates a soft body from mesh data.
    fn create_soft_body(&mut self, desc: &SoftBodyDesc, aux: &AuxBuffers) -> EngineResult<BodyHandle> {
        let _ = (desc, aux);
        Err(EngineError::Unsupported("soft bodies"))
    }

    /// Removes a body or character from the world.
    fn destroy_body(&mut self, body: BodyHandle);

    /// Current kind of a body.
    fn body_kind(&self, body: BodyHandle) -> Option<BodyKind>;

    /// Current transform and velocities.
    fn body_state(&self, body: BodyHandle) -> Option<BodyState>;

    /// Appends every awake, non-static body in engine order.
    fn active_bodies(&self, out: &mut Vec<BodyHandle>);

    /// Wakes a body.
    fn activate_body(&mut self, body: BodyHandle);

    /// Applies a property or motion change.
    ///
    /// Shape, compound child, debug draw, motion state, isometry ownership
    /// and vehicle input changes are handled by the backend and never reach
    /// this method.
    fn apply(&mut self, body: BodyHandle, mutation: &BodyMutation) -> EngineResult<()>;

    /// Replaces the shape of a body.
    fn set_shape(&mut self, body: BodyHandle, shape: ShapeHandle) -> EngineResult<()>;

    /// Appends a child to the body's mutable compound.
    fn add_child_shape(
        &mut self,
        body: BodyHandle,
        shape: ShapeHandle,
        position: Vec3,
        rotation: Quat,
        user_data: u32,
    ) -> EngineResult<()> {
        let _ = (body, shape, position, rotation, user_data);
        Err(EngineError::Unsupported("mutable compounds"))
    }

    /// Removes a child of the body's mutable compound. An index past the
    /// last child is a no-op.
    fn remove_child_shape(&mut self, body: BodyHandle, child: u32) -> EngineResult<()> {
        let _ = (body, child);
        Err(EngineError::Unsupported("mutable compounds"))
    }

    /// Moves a child of the body's mutable compound and optionally swaps
    /// its shape.
    fn modify_child_shape(
        &mut self,
        body: BodyHandle,
        child: u32,
        position: Vec3,
        rotation: Quat,
        shape: Option<ShapeHandle>,
    ) -> EngineResult<()> {
        let _ = (body, child, position, rotation, shape);
        Err(EngineError::Unsupported("mutable compounds"))
    }

    /// Sets world gravity.
    fn set_gravity(&mut self, gravity: Vec3);

    /// World gravity.
    fn gravity(&self) -> Vec3;

    // =========================================================================
    // CONSTRAINTS
    // =========================================================================

    /// Creates a constraint between two bodies.
    fn create_constraint(
        &mut self,
        desc: &ConstraintDesc,
        body1: BodyHandle,
        body2: BodyHandle,
    ) -> EngineResult<ConstraintHandle>;

    /// Removes a constraint.
    fn destroy_constraint(&mut self, constraint: ConstraintHandle);

    /// Changes a constraint.
    fn modify_constraint(&mut self, constraint: ConstraintHandle, mutation: &ConstraintMutation) -> EngineResult<()>;

    /// Creates a vehicle constraint on a chassis body.
    fn create_vehicle(&mut self, desc: &VehicleDesc, body: BodyHandle) -> EngineResult<ConstraintHandle> {
        let _ = (desc, body);
        Err(EngineError::Unsupported("vehicles"))
    }

    /// Sets driver input on a vehicle.
    fn set_vehicle_input(&mut self, vehicle: ConstraintHandle, input: VehicleInput) -> EngineResult<()> {
        let _ = (vehicle, input);
        Err(EngineError::Unsupported("vehicles"))
    }

    /// Appends the local wheel transforms of a vehicle.
    fn vehicle_wheels(&self, vehicle: ConstraintHandle, out: &mut Vec<Isometry>) {
        let _ = (vehicle, out);
    }

    // =========================================================================
    // CHARACTERS
    // =========================================================================

    /// Creates a virtual character.
    fn create_character(&mut self, desc: &CharacterDesc, shape: ShapeHandle) -> EngineResult<BodyHandle>;

    /// Moves a character by its velocity for `dt`, resolving collisions.
    fn update_character(&mut self, character: BodyHandle, dt: f32) -> EngineResult<()>;

    /// Changes a character. Shape changes go through
    /// [`PhysicsEngine::set_character_shape`].
    fn modify_character(&mut self, character: BodyHandle, mutation: &CharacterMutation) -> EngineResult<()>;

    /// Switches the shape of a character. Returns false when the new shape
    /// does not fit at the current position.
    fn set_character_shape(&mut self, character: BodyHandle, shape: ShapeHandle) -> EngineResult<bool>;

    /// Ground information of a character.
    fn character_ground(&self, character: BodyHandle) -> Option<GroundInfo>;

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Advances the world by exactly `dt` seconds.
    fn step(&mut self, dt: f32, sub_steps: u32) -> EngineResult<()>;

    /// Appends contact events collected since the last drain.
    fn drain_contacts(&mut self, out: &mut Vec<RawContact>);

    /// Appends character contacts collected since the last drain.
    fn drain_character_contacts(&mut self, out: &mut Vec<RawCharacterContact>) {
        let _ = out;
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Casts a ray. Hits are appended sorted by fraction.
    fn cast_ray(&self, ray: &RayCast, out: &mut Vec<RawHit>) -> EngineResult<()>;

    /// Sweeps a registered shape. Hits are appended sorted by fraction.
    fn cast_shape(&self, cast: &ShapeCast, shape: ShapeHandle, out: &mut Vec<RawHit>) -> EngineResult<()> {
        let _ = (cast, shape, out);
        Err(EngineError::Unsupported("shape casts"))
    }

    // =========================================================================
    // DEBUG
    // =========================================================================

    /// Appends the body's triangles as packed `f32` triples in local space.
    fn debug_triangles(&self, body: BodyHandle, out: &mut Vec<f32>) -> EngineResult<()> {
        let _ = (body, out);
        Ok(())
    }
}
