//! # Wire Numbering
//!
//! Operator bytes, command codes and enumeration values.
//!
//! **CRITICAL:** These values are the compatibility contract between the
//! caller and the backend. Both sides must agree on every number here.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Protocol revision, sent in the startup message.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// OPERATORS
// =============================================================================

/// Top-level command family tag.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Creates bodies, shapes, constraints and characters.
    Creator = 0,
    /// Mutates existing objects.
    Modifier = 1,
    /// Runs spatial queries.
    Querier = 2,
    /// Destroys objects.
    Cleaner = 3,
}

impl TryFrom<u8> for Operator {
    type Error = ProtocolError;

    fn try_from(value: u8) -> ProtocolResult<Self> {
        match value {
            0 => Ok(Self::Creator),
            1 => Ok(Self::Modifier),
            2 => Ok(Self::Querier),
            3 => Ok(Self::Cleaner),
            _ => Err(ProtocolError::UnknownOperator(value)),
        }
    }
}

/// Response family tag written by the backend.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseOperator {
    /// Body transforms and contacts.
    Body = 10,
    /// Character state and character contacts.
    Character = 11,
    /// Query results and other manager level replies.
    Manager = 12,
}

impl TryFrom<u8> for ResponseOperator {
    type Error = ProtocolError;

    fn try_from(value: u8) -> ProtocolResult<Self> {
        match value {
            10 => Ok(Self::Body),
            11 => Ok(Self::Character),
            12 => Ok(Self::Manager),
            _ => Err(ProtocolError::UnknownOperator(value)),
        }
    }
}

// =============================================================================
// CREATOR CODES (0 - 99)
// =============================================================================

/// Create a rigid body.
pub const CMD_CREATE_BODY: u16 = 0;
/// Create a soft body.
pub const CMD_CREATE_SOFT_BODY: u16 = 1;
/// Create collision filter group tables.
pub const CMD_CREATE_GROUPS: u16 = 2;
/// Create a constraint between two bodies.
pub const CMD_CREATE_CONSTRAINT: u16 = 3;
/// Create a virtual character.
pub const CMD_CREATE_CHARACTER: u16 = 4;
/// Create a reusable shape.
pub const CMD_CREATE_SHAPE: u16 = 5;
/// Create a vehicle constraint on a body.
pub const CMD_CREATE_VEHICLE: u16 = 6;

// =============================================================================
// MODIFIER BODY CODES (100 - 399)
// =============================================================================

/// Change world gravity.
pub const CMD_CHANGE_GRAVITY: u16 = 100;
/// Add a force.
pub const CMD_ADD_FORCE: u16 = 101;
/// Add an impulse.
pub const CMD_ADD_IMPULSE: u16 = 102;
/// Add an angular impulse.
pub const CMD_ADD_ANGULAR_IMPULSE: u16 = 103;
/// Apply a buoyancy impulse.
pub const CMD_APPLY_BUOYANCY_IMPULSE: u16 = 104;
/// Add a torque.
pub const CMD_ADD_TORQUE: u16 = 105;
/// Teleport a body.
pub const CMD_MOVE_BODY: u16 = 106;
/// Move a kinematic body over time.
pub const CMD_MOVE_KINEMATIC: u16 = 107;
/// Set linear velocity.
pub const CMD_SET_LIN_VEL: u16 = 108;
/// Set angular velocity.
pub const CMD_SET_ANG_VEL: u16 = 109;
/// Zero both velocities.
pub const CMD_RESET_MOTION: u16 = 110;
/// Change the motion type.
pub const CMD_SET_MOTION_TYPE: u16 = 111;
/// Change the object layer.
pub const CMD_SET_OBJ_LAYER: u16 = 112;
/// Enable or disable collision between two sub groups.
pub const CMD_TOGGLE_GROUP_PAIR: u16 = 113;
/// Toggle interpolated motion state reporting.
pub const CMD_USE_MOTION_STATE: u16 = 114;
/// Set the gravity factor.
pub const CMD_SET_GRAVITY_FACTOR: u16 = 115;
/// Set allowed degrees of freedom.
pub const CMD_SET_DOF: u16 = 116;
/// Set the motion quality.
pub const CMD_SET_MOTION_QUALITY: u16 = 117;
/// Replace the shape from inline settings.
pub const CMD_SET_SHAPE: u16 = 118;
/// Replace the shape with a registered one.
pub const CMD_SET_CUSTOM_SHAPE: u16 = 119;
/// Toggle debug drawing.
pub const CMD_SET_DEBUG_DRAW: u16 = 120;
/// Toggle sleeping.
pub const CMD_SET_ALLOW_SLEEPING: u16 = 121;
/// Change the collision group.
pub const CMD_SET_COL_GROUP: u16 = 122;
/// Set friction.
pub const CMD_SET_FRICTION: u16 = 123;
/// Toggle sensor mode.
pub const CMD_SET_IS_SENSOR: u16 = 124;
/// Set restitution.
pub const CMD_SET_RESTITUTION: u16 = 125;
/// Reset the sleep timer.
pub const CMD_RESET_SLEEP_TIMER: u16 = 126;
/// Set the max linear velocity.
pub const CMD_SET_MAX_LIN_VEL: u16 = 127;
/// Set the max angular velocity.
pub const CMD_SET_MAX_ANG_VEL: u16 = 128;
/// Clamp the current linear velocity.
pub const CMD_CLAMP_LIN_VEL: u16 = 129;
/// Clamp the current angular velocity.
pub const CMD_CLAMP_ANG_VEL: u16 = 130;
/// Set vehicle driver input.
pub const CMD_SET_VEHICLE_INPUT: u16 = 131;
/// Choose which side owns a body's transform.
pub const CMD_SET_AUTO_UPDATE_ISOMETRY: u16 = 132;
/// Append a child to a mutable compound.
pub const CMD_ADD_SHAPE: u16 = 133;
/// Remove a child from a mutable compound.
pub const CMD_REMOVE_SHAPE: u16 = 134;
/// Move or replace a child of a mutable compound.
pub const CMD_MODIFY_SHAPE: u16 = 135;
/// Toggle depth testing of the debug triangles.
pub const CMD_SET_DEBUG_DRAW_DEPTH: u16 = 136;
/// Set angular damping.
pub const CMD_SET_ANG_FACTOR: u16 = 137;
/// Let a kinematic body report contacts with non-dynamic bodies.
pub const CMD_SET_KIN_COL_NON_DYN: u16 = 138;
/// Toggle gyroscopic force.
pub const CMD_SET_APPLY_GYRO_FORCE: u16 = 139;
/// Toggle enhanced internal edge removal.
pub const CMD_SET_INTERNAL_EDGE: u16 = 140;
/// Override the velocity solver steps.
pub const CMD_SET_VEL_STEPS: u16 = 141;
/// Override the position solver steps.
pub const CMD_SET_POS_STEPS: u16 = 142;
/// Replace the object layer with a group and mask pair.
pub const CMD_UPDATE_BIT_FILTER: u16 = 143;
/// Set linear velocity, clamped to the body's maximum.
pub const CMD_SET_LIN_VEL_CLAMPED: u16 = 144;
/// Set angular velocity, clamped to the body's maximum.
pub const CMD_SET_ANG_VEL_CLAMPED: u16 = 145;

// =============================================================================
// MODIFIER CHARACTER CODES (400 - 499)
// =============================================================================

/// Set a character's linear velocity.
pub const CMD_CHAR_SET_LIN_VEL: u16 = 400;
/// Replace a character's shape.
pub const CMD_CHAR_SET_SHAPE: u16 = 401;
/// Teleport a character.
pub const CMD_CHAR_SET_POSITION: u16 = 402;
/// Rotate a character.
pub const CMD_CHAR_SET_ROTATION: u16 = 403;
/// Change a character's walkable slope.
pub const CMD_CHAR_SET_MAX_SLOPE: u16 = 404;

// =============================================================================
// MODIFIER CONSTRAINT CODES (500 - 599)
// =============================================================================

/// Enable or disable a constraint.
pub const CMD_SET_CONSTRAINT_ENABLED: u16 = 500;
/// Change a constraint motor state.
pub const CMD_SET_MOTOR_STATE: u16 = 501;
/// Change a constraint motor target velocity.
pub const CMD_SET_TARGET_VELOCITY: u16 = 502;
/// Change a constraint's limits.
pub const CMD_SET_LIMITS: u16 = 503;

// =============================================================================
// QUERIER, CLEANER AND RESPONSE CODES
// =============================================================================

/// Cast a ray.
pub const CMD_CAST_RAY: u16 = 600;
/// Sweep a shape.
pub const CMD_CAST_SHAPE: u16 = 601;

/// Destroy a body and everything attached to it.
pub const CMD_DESTROY_BODY: u16 = 700;
/// Release a registered shape.
pub const CMD_DESTROY_SHAPE: u16 = 701;
/// Destroy a constraint.
pub const CMD_DESTROY_CONSTRAINT: u16 = 702;

/// Body transforms.
pub const CMD_UPDATE_TRANSFORMS: u16 = 800;
/// Body contact events.
pub const CMD_REPORT_CONTACTS: u16 = 801;
/// Character contact events.
pub const CMD_REPORT_CHAR_CONTACTS: u16 = 802;
/// Query results.
pub const CMD_QUERY_RESULTS: u16 = 803;
/// Character shape replaced.
pub const CMD_CHAR_SHAPE_CHANGED: u16 = 804;

// =============================================================================
// DEGREES OF FREEDOM
// =============================================================================

/// Translation along X.
pub const DOF_TRANSLATION_X: u8 = 1;
/// Translation along Y.
pub const DOF_TRANSLATION_Y: u8 = 2;
/// Translation along Z.
pub const DOF_TRANSLATION_Z: u8 = 4;
/// Rotation around X.
pub const DOF_ROTATION_X: u8 = 8;
/// Rotation around Y.
pub const DOF_ROTATION_Y: u8 = 16;
/// Rotation around Z.
pub const DOF_ROTATION_Z: u8 = 32;
/// Every degree of freedom.
pub const DOF_ALL: u8 = 63;
/// Movement restricted to the XY plane.
pub const DOF_PLANE_2D: u8 = DOF_TRANSLATION_X | DOF_TRANSLATION_Y | DOF_ROTATION_Z;

// =============================================================================
// ENUMERATIONS
// =============================================================================

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident => $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Wire name of the enumeration.
            pub const KIND: &'static str = $kind;

            /// Every variant with its name, in wire order.
            pub const ALL: &'static [(&'static str, Self)] = &[$( (stringify!($variant), Self::$variant) ),+];
        }

        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(value: u8) -> ProtocolResult<Self> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    _ => Err(ProtocolError::InvalidEnum { kind: $kind, value }),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

wire_enum! {
    /// How a body moves.
    MotionType => "motion type" {
        /// Never moves.
        Static = 0,
        /// Moved by velocity only.
        Kinematic = 1,
        /// Fully simulated.
        Dynamic = 2,
    }
}

wire_enum! {
    /// Mass property override method.
    OverrideMassProperties => "mass override" {
        /// Mass and inertia are computed from the shape.
        CalculateMassAndInertia = 0,
        /// Mass is provided, inertia is computed.
        CalculateInertia = 1,
        /// Both are provided.
        MassAndInertiaProvided = 2,
    }
}

wire_enum! {
    /// Collision detection quality.
    MotionQuality => "motion quality" {
        /// Discrete collision detection.
        Discrete = 0,
        /// Continuous collision detection.
        LinearCast = 1,
    }
}

wire_enum! {
    /// Whether back faces of triangles are hit.
    BackFaceMode => "back face mode" {
        /// Back faces are ignored.
        Ignore = 0,
        /// Back faces collide.
        Collide = 1,
    }
}

wire_enum! {
    /// Character support state.
    GroundState => "ground state" {
        /// Standing on walkable ground.
        OnGround = 0,
        /// Touching ground that is too steep.
        OnSteepGround = 1,
        /// Touching something that does not support.
        NotSupported = 2,
        /// Airborne.
        InAir = 3,
    }
}

wire_enum! {
    /// Shape type tag.
    ShapeType => "shape" {
        /// Box.
        Box = 0,
        /// Capsule.
        Capsule = 1,
        /// Cylinder.
        Cylinder = 2,
        /// Sphere.
        Sphere = 3,
        /// Triangle mesh.
        Mesh = 4,
        /// Convex hull of a point cloud.
        ConvexHull = 5,
        /// Immutable compound of child shapes.
        StaticCompound = 6,
        /// Height field.
        HeightField = 7,
        /// Compound whose children can be added, moved and removed.
        MutableCompound = 8,
    }
}

wire_enum! {
    /// Constraint type tag.
    ConstraintType => "constraint" {
        /// Rigid attachment.
        Fixed = 0,
        /// Ball joint.
        Point = 1,
        /// Rope or rod.
        Distance = 2,
        /// Door hinge.
        Hinge = 3,
        /// Prismatic joint.
        Slider = 4,
        /// Cone limit.
        Cone = 5,
        /// Swing and twist limits.
        SwingTwist = 6,
        /// Per-axis limits.
        SixDof = 7,
    }
}

wire_enum! {
    /// Space constraint points are expressed in.
    ConstraintSpace => "constraint space" {
        /// Relative to each body.
        Local = 0,
        /// World space.
        World = 1,
    }
}

wire_enum! {
    /// How a spring is parameterized.
    SpringMode => "spring mode" {
        /// Frequency and damping.
        Frequency = 0,
        /// Stiffness and damping.
        Stiffness = 1,
    }
}

wire_enum! {
    /// Constraint motor state.
    MotorState => "motor state" {
        /// Motor disabled.
        Off = 0,
        /// Drives towards a target velocity.
        Velocity = 1,
        /// Drives towards a target position.
        Position = 2,
    }
}

wire_enum! {
    /// Contact event phase.
    ContactType => "contact type" {
        /// Contact started this step.
        Added = 0,
        /// Contact continued.
        Persisted = 1,
        /// Contact ended.
        Removed = 2,
    }
}

wire_enum! {
    /// Which side owns a body's transform between ticks.
    IsometryUpdate => "isometry update" {
        /// Reported while awake.
        Default = 0,
        /// Driven by the caller and never reported.
        FrontToBack = 1,
        /// Reported every tick, asleep or not.
        BackToFront = 2,
    }
}

wire_enum! {
    /// Vehicle controller type.
    VehicleType => "vehicle type" {
        /// Four or more wheels.
        Wheeled = 0,
        /// Two wheels with lean.
        Motorcycle = 1,
        /// Tank tracks.
        Tracked = 2,
    }
}

wire_enum! {
    /// Gearbox mode.
    TransmissionMode => "transmission" {
        /// Shifts automatically.
        Auto = 0,
        /// Shifts on request.
        Manual = 1,
    }
}

impl Default for MotionType {
    fn default() -> Self {
        Self::Dynamic
    }
}

impl Default for MotionQuality {
    fn default() -> Self {
        Self::Discrete
    }
}

impl Default for BackFaceMode {
    fn default() -> Self {
        Self::Collide
    }
}

impl Default for IsometryUpdate {
    fn default() -> Self {
        Self::Default
    }
}

impl Default for ConstraintSpace {
    fn default() -> Self {
        Self::World
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_try_from() {
        assert_eq!(Operator::try_from(2), Ok(Operator::Querier));
        assert_eq!(Operator::try_from(4), Err(ProtocolError::UnknownOperator(4)));
        assert_eq!(ResponseOperator::try_from(11), Ok(ResponseOperator::Character));
    }

    #[test]
    fn test_enum_unrecognized_arm() {
        assert_eq!(ShapeType::try_from(8), Ok(ShapeType::MutableCompound));
        assert_eq!(
            ShapeType::try_from(9),
            Err(ProtocolError::InvalidEnum { kind: "shape", value: 9 })
        );
        assert_eq!(
            IsometryUpdate::try_from(3),
            Err(ProtocolError::InvalidEnum {
                kind: "isometry update",
                value: 3
            })
        );
    }

    #[test]
    fn test_enum_values_match_wire() {
        for &(_, motion) in MotionType::ALL {
            assert_eq!(MotionType::try_from(u8::from(motion)), Ok(motion));
        }
        assert_eq!(u8::from(GroundState::InAir), 3);
        assert_eq!(DOF_PLANE_2D, 35);
    }
}
