//! Modifier payloads.
//!
//! Body mutations use codes 100 - 399, character mutations 400 - 499 and
//! constraint mutations 500 - 599. Every targeted record starts with the
//! pcid (or constraint index) right after the code.

use physbridge_core::{CommandsBuffer, Quat, Vec3};

use crate::codec::{put, put_enum, put_opt, take_enum};
use crate::constants::{
    IsometryUpdate, MotionQuality, MotionType, MotorState, Operator, CMD_ADD_ANGULAR_IMPULSE, CMD_ADD_FORCE,
    CMD_ADD_IMPULSE, CMD_ADD_SHAPE, CMD_ADD_TORQUE, CMD_APPLY_BUOYANCY_IMPULSE, CMD_CHANGE_GRAVITY,
    CMD_CHAR_SET_LIN_VEL, CMD_CHAR_SET_MAX_SLOPE, CMD_CHAR_SET_POSITION, CMD_CHAR_SET_ROTATION,
    CMD_CHAR_SET_SHAPE, CMD_CLAMP_ANG_VEL, CMD_CLAMP_LIN_VEL, CMD_MOVE_BODY, CMD_MOVE_KINEMATIC,
    CMD_RESET_MOTION, CMD_RESET_SLEEP_TIMER, CMD_SET_ALLOW_SLEEPING, CMD_SET_ANG_VEL,
    CMD_SET_COL_GROUP, CMD_SET_CONSTRAINT_ENABLED, CMD_SET_CUSTOM_SHAPE, CMD_SET_DEBUG_DRAW,
    CMD_SET_DOF, CMD_SET_FRICTION, CMD_SET_GRAVITY_FACTOR, CMD_SET_IS_SENSOR, CMD_SET_LIMITS,
    CMD_SET_LIN_VEL, CMD_SET_MAX_ANG_VEL, CMD_SET_MAX_LIN_VEL, CMD_SET_MOTION_QUALITY,
    CMD_SET_MOTION_TYPE, CMD_SET_MOTOR_STATE, CMD_SET_OBJ_LAYER, CMD_SET_RESTITUTION,
    CMD_SET_SHAPE, CMD_SET_TARGET_VELOCITY, CMD_SET_VEHICLE_INPUT, CMD_TOGGLE_GROUP_PAIR,
    CMD_USE_MOTION_STATE, CMD_MODIFY_SHAPE, CMD_REMOVE_SHAPE, CMD_SET_ANG_FACTOR, CMD_SET_ANG_VEL_CLAMPED,
    CMD_SET_APPLY_GYRO_FORCE, CMD_SET_AUTO_UPDATE_ISOMETRY, CMD_SET_DEBUG_DRAW_DEPTH, CMD_SET_INTERNAL_EDGE,
    CMD_SET_KIN_COL_NON_DYN, CMD_SET_LIN_VEL_CLAMPED, CMD_SET_POS_STEPS, CMD_SET_VEL_STEPS,
    CMD_UPDATE_BIT_FILTER,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::shape::ShapeSettings;

/// Fluid parameters for a buoyancy impulse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Buoyancy {
    /// A point on the fluid surface.
    pub surface_position: Vec3,
    /// Fluid surface normal.
    pub surface_normal: Vec3,
    /// Buoyancy factor, 1 is neutral.
    pub buoyancy: f32,
    /// Linear drag coefficient.
    pub linear_drag: f32,
    /// Angular drag coefficient.
    pub angular_drag: f32,
    /// Fluid velocity.
    pub fluid_velocity: Vec3,
}

/// Driver input for a vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleInput {
    /// Throttle in `[-1, 1]`.
    pub forward: f32,
    /// Steering in `[-1, 1]`.
    pub right: f32,
    /// Brake in `[0, 1]`.
    pub brake: f32,
    /// Hand brake in `[0, 1]`.
    pub hand_brake: f32,
}

/// A single mutation of a body.
#[derive(Clone, Debug, PartialEq)]
pub enum BodyMutation {
    /// Force applied for the next step, optionally at a world point.
    AddForce {
        /// Force vector.
        force: Vec3,
        /// Application point.
        offset: Option<Vec3>,
    },
    /// Impulse, optionally at a world point.
    AddImpulse {
        /// Impulse vector.
        impulse: Vec3,
        /// Application point.
        offset: Option<Vec3>,
    },
    /// Angular impulse.
    AddAngularImpulse(Vec3),
    /// Buoyancy impulse for one fixed step.
    ApplyBuoyancyImpulse(Buoyancy),
    /// Torque.
    AddTorque(Vec3),
    /// Teleport.
    MoveBody {
        /// Target position.
        position: Vec3,
        /// Target rotation.
        rotation: Quat,
    },
    /// Kinematic move reaching the target after `time` seconds.
    MoveKinematic {
        /// Target position.
        position: Vec3,
        /// Target rotation.
        rotation: Quat,
        /// Time to reach the target.
        time: f32,
    },
    /// Linear velocity.
    SetLinearVelocity(Vec3),
    /// Angular velocity.
    SetAngularVelocity(Vec3),
    /// Zero both velocities.
    ResetMotion,
    /// Motion type.
    SetMotionType(MotionType),
    /// Object layer.
    SetObjectLayer(u16),
    /// Interpolated transform reporting.
    UseMotionState(bool),
    /// Gravity multiplier.
    SetGravityFactor(f32),
    /// Allowed degrees of freedom bit set.
    SetAllowedDofs(u8),
    /// Collision detection quality.
    SetMotionQuality(MotionQuality),
    /// Shape from inline settings.
    SetShape(Box<ShapeSettings>),
    /// Shape from the registry.
    SetCustomShape(u32),
    /// Debug draw membership.
    SetDebugDraw(bool),
    /// Sleeping.
    SetAllowSleeping(bool),
    /// Collision filter group.
    SetCollisionGroup {
        /// Filter group.
        group: Option<u32>,
        /// Sub group.
        sub_group: Option<u32>,
    },
    /// Friction.
    SetFriction(f32),
    /// Sensor flag.
    SetIsSensor(bool),
    /// Restitution.
    SetRestitution(f32),
    /// Keep the body awake.
    ResetSleepTimer,
    /// Linear speed cap.
    SetMaxLinearVelocity(f32),
    /// Angular speed cap.
    SetMaxAngularVelocity(f32),
    /// Clamp current linear speed.
    ClampLinearVelocity {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
    /// Clamp current angular speed.
    ClampAngularVelocity {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
    /// Vehicle driver input.
    SetVehicleInput(VehicleInput),
    /// Which side owns the transform.
    SetAutoUpdateIsometry(IsometryUpdate),
    /// Append a registered shape to the body's mutable compound.
    AddShape {
        /// Registry index of the child shape.
        shape: u32,
        /// Child position in the compound.
        position: Vec3,
        /// Child rotation in the compound.
        rotation: Quat,
        /// Opaque value stored with the child.
        user_data: u32,
    },
    /// Remove a child of the body's mutable compound. Out of range is a no-op.
    RemoveShape(u32),
    /// Move a child of the body's mutable compound, optionally swapping its shape.
    ModifyShape {
        /// Child index.
        child: u32,
        /// New child position.
        position: Vec3,
        /// New child rotation.
        rotation: Quat,
        /// Registry index of a replacement shape.
        shape: Option<u32>,
    },
    /// Depth testing of the debug triangles.
    SetDebugDrawDepth(bool),
    /// Angular damping.
    SetAngularFactor(f32),
    /// Kinematic body reports contacts with static and kinematic bodies.
    SetKinematicCollideNonDynamic(bool),
    /// Gyroscopic force.
    SetApplyGyroscopicForce(bool),
    /// Enhanced internal edge removal.
    SetEnhancedInternalEdgeRemoval(bool),
    /// Velocity solver step override, 0 for the world default.
    SetVelocitySteps(u32),
    /// Position solver step override, 0 for the world default.
    SetPositionSteps(u32),
    /// Collision filter by group and mask bits, replacing the object layer.
    UpdateBitFilter {
        /// Bits this body belongs to.
        group: u32,
        /// Bits this body collides with.
        mask: u32,
    },
    /// Linear velocity, clamped to the body's max linear velocity.
    SetLinearVelocityClamped(Vec3),
    /// Angular velocity, clamped to the body's max angular velocity.
    SetAngularVelocityClamped(Vec3),
}

impl BodyMutation {
    /// Wire code of this mutation.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::AddForce { .. } => CMD_ADD_FORCE,
            Self::AddImpulse { .. } => CMD_ADD_IMPULSE,
            Self::AddAngularImpulse(_) => CMD_ADD_ANGULAR_IMPULSE,
            Self::ApplyBuoyancyImpulse(_) => CMD_APPLY_BUOYANCY_IMPULSE,
            Self::AddTorque(_) => CMD_ADD_TORQUE,
            Self::MoveBody { .. } => CMD_MOVE_BODY,
            Self::MoveKinematic { .. } => CMD_MOVE_KINEMATIC,
            Self::SetLinearVelocity(_) => CMD_SET_LIN_VEL,
            Self::SetAngularVelocity(_) => CMD_SET_ANG_VEL,
            Self::ResetMotion => CMD_RESET_MOTION,
            Self::SetMotionType(_) => CMD_SET_MOTION_TYPE,
            Self::SetObjectLayer(_) => CMD_SET_OBJ_LAYER,
            Self::UseMotionState(_) => CMD_USE_MOTION_STATE,
            Self::SetGravityFactor(_) => CMD_SET_GRAVITY_FACTOR,
            Self::SetAllowedDofs(_) => CMD_SET_DOF,
            Self::SetMotionQuality(_) => CMD_SET_MOTION_QUALITY,
            Self::SetShape(_) => CMD_SET_SHAPE,
            Self::SetCustomShape(_) => CMD_SET_CUSTOM_SHAPE,
            Self::SetDebugDraw(_) => CMD_SET_DEBUG_DRAW,
            Self::SetAllowSleeping(_) => CMD_SET_ALLOW_SLEEPING,
            Self::SetCollisionGroup { .. } => CMD_SET_COL_GROUP,
            Self::SetFriction(_) => CMD_SET_FRICTION,
            Self::SetIsSensor(_) => CMD_SET_IS_SENSOR,
            Self::SetRestitution(_) => CMD_SET_RESTITUTION,
            Self::ResetSleepTimer => CMD_RESET_SLEEP_TIMER,
            Self::SetMaxLinearVelocity(_) => CMD_SET_MAX_LIN_VEL,
            Self::SetMaxAngularVelocity(_) => CMD_SET_MAX_ANG_VEL,
            Self::ClampLinearVelocity { .. } => CMD_CLAMP_LIN_VEL,
            Self::ClampAngularVelocity { .. } => CMD_CLAMP_ANG_VEL,
            Self::SetVehicleInput(_) => CMD_SET_VEHICLE_INPUT,
            Self::SetAutoUpdateIsometry(_) => CMD_SET_AUTO_UPDATE_ISOMETRY,
            Self::AddShape { .. } => CMD_ADD_SHAPE,
            Self::RemoveShape(_) => CMD_REMOVE_SHAPE,
            Self::ModifyShape { .. } => CMD_MODIFY_SHAPE,
            Self::SetDebugDrawDepth(_) => CMD_SET_DEBUG_DRAW_DEPTH,
            Self::SetAngularFactor(_) => CMD_SET_ANG_FACTOR,
            Self::SetKinematicCollideNonDynamic(_) => CMD_SET_KIN_COL_NON_DYN,
            Self::SetApplyGyroscopicForce(_) => CMD_SET_APPLY_GYRO_FORCE,
            Self::SetEnhancedInternalEdgeRemoval(_) => CMD_SET_INTERNAL_EDGE,
            Self::SetVelocitySteps(_) => CMD_SET_VEL_STEPS,
            Self::SetPositionSteps(_) => CMD_SET_POS_STEPS,
            Self::UpdateBitFilter { .. } => CMD_UPDATE_BIT_FILTER,
            Self::SetLinearVelocityClamped(_) => CMD_SET_LIN_VEL_CLAMPED,
            Self::SetAngularVelocityClamped(_) => CMD_SET_ANG_VEL_CLAMPED,
        }
    }

    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match self {
            Self::AddForce { force: v, offset } | Self::AddImpulse { impulse: v, offset } => {
                put(buffer, *v)?;
                put_opt(buffer, *offset)
            }
            Self::AddAngularImpulse(v)
            | Self::AddTorque(v)
            | Self::SetLinearVelocity(v)
            | Self::SetAngularVelocity(v)
            | Self::SetLinearVelocityClamped(v)
            | Self::SetAngularVelocityClamped(v) => put(buffer, *v),
            Self::ApplyBuoyancyImpulse(b) => {
                put(buffer, b.surface_position)?;
                put(buffer, b.surface_normal)?;
                put(buffer, b.buoyancy)?;
                put(buffer, b.linear_drag)?;
                put(buffer, b.angular_drag)?;
                put(buffer, b.fluid_velocity)
            }
            Self::MoveBody { position, rotation } => {
                put(buffer, *position)?;
                put(buffer, *rotation)
            }
            Self::MoveKinematic {
                position,
                rotation,
                time,
            } => {
                put(buffer, *position)?;
                put(buffer, *rotation)?;
                put(buffer, *time)
            }
            Self::ResetMotion | Self::ResetSleepTimer => Ok(()),
            Self::SetMotionType(motion) => put_enum(buffer, *motion),
            Self::SetObjectLayer(layer) => put(buffer, *layer),
            Self::UseMotionState(flag)
            | Self::SetDebugDraw(flag)
            | Self::SetAllowSleeping(flag)
            | Self::SetIsSensor(flag)
            | Self::SetDebugDrawDepth(flag)
            | Self::SetKinematicCollideNonDynamic(flag)
            | Self::SetApplyGyroscopicForce(flag)
            | Self::SetEnhancedInternalEdgeRemoval(flag) => put(buffer, *flag),
            Self::SetGravityFactor(value)
            | Self::SetFriction(value)
            | Self::SetRestitution(value)
            | Self::SetMaxLinearVelocity(value)
            | Self::SetMaxAngularVelocity(value)
            | Self::SetAngularFactor(value) => put(buffer, *value),
            Self::SetAllowedDofs(dofs) => put(buffer, *dofs),
            Self::SetMotionQuality(quality) => put_enum(buffer, *quality),
            Self::SetShape(settings) => settings.encode(buffer),
            Self::SetCustomShape(index)
            | Self::RemoveShape(index)
            | Self::SetVelocitySteps(index)
            | Self::SetPositionSteps(index) => put(buffer, *index),
            Self::SetCollisionGroup { group, sub_group } => {
                put_opt(buffer, *group)?;
                put_opt(buffer, *sub_group)
            }
            Self::ClampLinearVelocity { min, max } | Self::ClampAngularVelocity { min, max } => {
                put(buffer, *min)?;
                put(buffer, *max)
            }
            Self::SetVehicleInput(input) => {
                put(buffer, input.forward)?;
                put(buffer, input.right)?;
                put(buffer, input.brake)?;
                put(buffer, input.hand_brake)
            }
            Self::SetAutoUpdateIsometry(mode) => put_enum(buffer, *mode),
            Self::AddShape {
                shape,
                position,
                rotation,
                user_data,
            } => {
                put(buffer, *shape)?;
                put(buffer, *position)?;
                put(buffer, *rotation)?;
                put(buffer, *user_data)
            }
            Self::ModifyShape {
                child,
                position,
                rotation,
                shape,
            } => {
                put(buffer, *child)?;
                put(buffer, *position)?;
                put(buffer, *rotation)?;
                put_opt(buffer, *shape)
            }
            Self::UpdateBitFilter { group, mask } => {
                put(buffer, *group)?;
                put(buffer, *mask)
            }
        }
    }

    fn decode(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(match code {
            CMD_ADD_FORCE => Self::AddForce {
                force: buffer.read(),
                offset: buffer.read_opt(),
            },
            CMD_ADD_IMPULSE => Self::AddImpulse {
                impulse: buffer.read(),
                offset: buffer.read_opt(),
            },
            CMD_ADD_ANGULAR_IMPULSE => Self::AddAngularImpulse(buffer.read()),
            CMD_APPLY_BUOYANCY_IMPULSE => Self::ApplyBuoyancyImpulse(Buoyancy {
                surface_position: buffer.read(),
                surface_normal: buffer.read(),
                buoyancy: buffer.read(),
                linear_drag: buffer.read(),
                angular_drag: buffer.read(),
                fluid_velocity: buffer.read(),
            }),
            CMD_ADD_TORQUE => Self::AddTorque(buffer.read()),
            CMD_MOVE_BODY => Self::MoveBody {
                position: buffer.read(),
                rotation: buffer.read(),
            },
            CMD_MOVE_KINEMATIC => Self::MoveKinematic {
                position: buffer.read(),
                rotation: buffer.read(),
                time: buffer.read(),
            },
            CMD_SET_LIN_VEL => Self::SetLinearVelocity(buffer.read()),
            CMD_SET_ANG_VEL => Self::SetAngularVelocity(buffer.read()),
            CMD_RESET_MOTION => Self::ResetMotion,
            CMD_SET_MOTION_TYPE => Self::SetMotionType(take_enum(buffer)?),
            CMD_SET_OBJ_LAYER => Self::SetObjectLayer(buffer.read()),
            CMD_USE_MOTION_STATE => Self::UseMotionState(buffer.read()),
            CMD_SET_GRAVITY_FACTOR => Self::SetGravityFactor(buffer.read()),
            CMD_SET_DOF => Self::SetAllowedDofs(buffer.read()),
            CMD_SET_MOTION_QUALITY => Self::SetMotionQuality(take_enum(buffer)?),
            CMD_SET_SHAPE => Self::SetShape(Box::new(ShapeSettings::decode(buffer)?)),
            CMD_SET_CUSTOM_SHAPE => Self::SetCustomShape(buffer.read()),
            CMD_SET_DEBUG_DRAW => Self::SetDebugDraw(buffer.read()),
            CMD_SET_ALLOW_SLEEPING => Self::SetAllowSleeping(buffer.read()),
            CMD_SET_COL_GROUP => Self::SetCollisionGroup {
                group: buffer.read_opt(),
                sub_group: buffer.read_opt(),
            },
            CMD_SET_FRICTION => Self::SetFriction(buffer.read()),
            CMD_SET_IS_SENSOR => Self::SetIsSensor(buffer.read()),
            CMD_SET_RESTITUTION => Self::SetRestitution(buffer.read()),
            CMD_RESET_SLEEP_TIMER => Self::ResetSleepTimer,
            CMD_SET_MAX_LIN_VEL => Self::SetMaxLinearVelocity(buffer.read()),
            CMD_SET_MAX_ANG_VEL => Self::SetMaxAngularVelocity(buffer.read()),
            CMD_CLAMP_LIN_VEL => Self::ClampLinearVelocity {
                min: buffer.read(),
                max: buffer.read(),
            },
            CMD_CLAMP_ANG_VEL => Self::ClampAngularVelocity {
                min: buffer.read(),
                max: buffer.read(),
            },
            CMD_SET_VEHICLE_INPUT => Self::SetVehicleInput(VehicleInput {
                forward: buffer.read(),
                right: buffer.read(),
                brake: buffer.read(),
                hand_brake: buffer.read(),
            }),
            CMD_SET_AUTO_UPDATE_ISOMETRY => Self::SetAutoUpdateIsometry(take_enum(buffer)?),
            CMD_ADD_SHAPE => Self::AddShape {
                shape: buffer.read(),
                position: buffer.read(),
                rotation: buffer.read(),
                user_data: buffer.read(),
            },
            CMD_REMOVE_SHAPE => Self::RemoveShape(buffer.read()),
            CMD_MODIFY_SHAPE => Self::ModifyShape {
                child: buffer.read(),
                position: buffer.read(),
                rotation: buffer.read(),
                shape: buffer.read_opt(),
            },
            CMD_SET_DEBUG_DRAW_DEPTH => Self::SetDebugDrawDepth(buffer.read()),
            CMD_SET_ANG_FACTOR => Self::SetAngularFactor(buffer.read()),
            CMD_SET_KIN_COL_NON_DYN => Self::SetKinematicCollideNonDynamic(buffer.read()),
            CMD_SET_APPLY_GYRO_FORCE => Self::SetApplyGyroscopicForce(buffer.read()),
            CMD_SET_INTERNAL_EDGE => Self::SetEnhancedInternalEdgeRemoval(buffer.read()),
            CMD_SET_VEL_STEPS => Self::SetVelocitySteps(buffer.read()),
            CMD_SET_POS_STEPS => Self::SetPositionSteps(buffer.read()),
            CMD_UPDATE_BIT_FILTER => Self::UpdateBitFilter {
                group: buffer.read(),
                mask: buffer.read(),
            },
            CMD_SET_LIN_VEL_CLAMPED => Self::SetLinearVelocityClamped(buffer.read()),
            CMD_SET_ANG_VEL_CLAMPED => Self::SetAngularVelocityClamped(buffer.read()),
            _ => return Err(unknown(code)),
        })
    }
}

/// A single mutation of a virtual character.
#[derive(Clone, Debug, PartialEq)]
pub enum CharacterMutation {
    /// Linear velocity.
    SetLinearVelocity(Vec3),
    /// Replace the shape; `callback` is echoed back once done.
    SetShape {
        /// Caller side callback index.
        callback: Option<u32>,
        /// New shape.
        shape: Box<ShapeSettings>,
    },
    /// Teleport.
    SetPosition(Vec3),
    /// Rotation.
    SetRotation(Quat),
    /// Steepest walkable slope, in radians.
    SetMaxSlope(f32),
}

impl CharacterMutation {
    /// Wire code of this mutation.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::SetLinearVelocity(_) => CMD_CHAR_SET_LIN_VEL,
            Self::SetShape { .. } => CMD_CHAR_SET_SHAPE,
            Self::SetPosition(_) => CMD_CHAR_SET_POSITION,
            Self::SetRotation(_) => CMD_CHAR_SET_ROTATION,
            Self::SetMaxSlope(_) => CMD_CHAR_SET_MAX_SLOPE,
        }
    }

    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match self {
            Self::SetLinearVelocity(v) | Self::SetPosition(v) => put(buffer, *v),
            Self::SetShape { callback, shape } => {
                put_opt(buffer, *callback)?;
                shape.encode(buffer)
            }
            Self::SetRotation(rotation) => put(buffer, *rotation),
            Self::SetMaxSlope(angle) => put(buffer, *angle),
        }
    }

    fn decode(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(match code {
            CMD_CHAR_SET_LIN_VEL => Self::SetLinearVelocity(buffer.read()),
            CMD_CHAR_SET_SHAPE => Self::SetShape {
                callback: buffer.read_opt(),
                shape: Box::new(ShapeSettings::decode(buffer)?),
            },
            CMD_CHAR_SET_POSITION => Self::SetPosition(buffer.read()),
            CMD_CHAR_SET_ROTATION => Self::SetRotation(buffer.read()),
            CMD_CHAR_SET_MAX_SLOPE => Self::SetMaxSlope(buffer.read()),
            _ => return Err(unknown(code)),
        })
    }
}

/// A single mutation of a constraint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintMutation {
    /// Enable or disable.
    SetEnabled {
        /// New state.
        enabled: bool,
        /// Wake the connected bodies.
        activate: bool,
    },
    /// Motor state.
    SetMotorState(MotorState),
    /// Motor target velocity.
    SetTargetVelocity(f32),
    /// Limits.
    SetLimits {
        /// Lower limit.
        min: f32,
        /// Upper limit.
        max: f32,
    },
}

impl ConstraintMutation {
    /// Wire code of this mutation.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::SetEnabled { .. } => CMD_SET_CONSTRAINT_ENABLED,
            Self::SetMotorState(_) => CMD_SET_MOTOR_STATE,
            Self::SetTargetVelocity(_) => CMD_SET_TARGET_VELOCITY,
            Self::SetLimits { .. } => CMD_SET_LIMITS,
        }
    }

    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match *self {
            Self::SetEnabled { enabled, activate } => {
                put(buffer, enabled)?;
                put(buffer, activate)
            }
            Self::SetMotorState(state) => put_enum(buffer, state),
            Self::SetTargetVelocity(velocity) => put(buffer, velocity),
            Self::SetLimits { min, max } => {
                put(buffer, min)?;
                put(buffer, max)
            }
        }
    }

    fn decode(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(match code {
            CMD_SET_CONSTRAINT_ENABLED => Self::SetEnabled {
                enabled: buffer.read(),
                activate: buffer.read(),
            },
            CMD_SET_MOTOR_STATE => Self::SetMotorState(take_enum(buffer)?),
            CMD_SET_TARGET_VELOCITY => Self::SetTargetVelocity(buffer.read()),
            CMD_SET_LIMITS => Self::SetLimits {
                min: buffer.read(),
                max: buffer.read(),
            },
            _ => return Err(unknown(code)),
        })
    }
}

/// Any modifier command.
#[derive(Clone, Debug, PartialEq)]
pub enum ModifyCommand {
    /// World gravity.
    ChangeGravity(Vec3),
    /// Enable or disable collision between two sub groups of a filter table.
    ToggleGroupPair {
        /// Filter group.
        group: u32,
        /// First sub group.
        sub_group1: u32,
        /// Second sub group.
        sub_group2: u32,
        /// Collide when true.
        enable: bool,
    },
    /// Body mutation.
    Body {
        /// Target body.
        pcid: u32,
        /// Mutation.
        mutation: BodyMutation,
    },
    /// Character mutation.
    Character {
        /// Target character.
        pcid: u32,
        /// Mutation.
        mutation: CharacterMutation,
    },
    /// Constraint mutation.
    Constraint {
        /// Target constraint index.
        index: u32,
        /// Mutation.
        mutation: ConstraintMutation,
    },
}

impl ModifyCommand {
    /// Wire code of this command.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::ChangeGravity(_) => CMD_CHANGE_GRAVITY,
            Self::ToggleGroupPair { .. } => CMD_TOGGLE_GROUP_PAIR,
            Self::Body { mutation, .. } => mutation.code(),
            Self::Character { mutation, .. } => mutation.code(),
            Self::Constraint { mutation, .. } => mutation.code(),
        }
    }

    pub(crate) fn encode_payload(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match self {
            Self::ChangeGravity(gravity) => put(buffer, *gravity),
            Self::ToggleGroupPair {
                group,
                sub_group1,
                sub_group2,
                enable,
            } => {
                put(buffer, *group)?;
                put(buffer, *sub_group1)?;
                put(buffer, *sub_group2)?;
                put(buffer, *enable)
            }
            Self::Body { pcid, mutation } => {
                put(buffer, *pcid)?;
                mutation.encode(buffer)
            }
            Self::Character { pcid, mutation } => {
                put(buffer, *pcid)?;
                mutation.encode(buffer)
            }
            Self::Constraint { index, mutation } => {
                put(buffer, *index)?;
                mutation.encode(buffer)
            }
        }
    }

    pub(crate) fn decode_payload(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(match code {
            CMD_CHANGE_GRAVITY => Self::ChangeGravity(buffer.read()),
            CMD_TOGGLE_GROUP_PAIR => Self::ToggleGroupPair {
                group: buffer.read(),
                sub_group1: buffer.read(),
                sub_group2: buffer.read(),
                enable: buffer.read(),
            },
            400..=499 => Self::Character {
                pcid: buffer.read(),
                mutation: CharacterMutation::decode(code, buffer)?,
            },
            500..=599 => Self::Constraint {
                index: buffer.read(),
                mutation: ConstraintMutation::decode(code, buffer)?,
            },
            101..=399 => Self::Body {
                pcid: buffer.read(),
                mutation: BodyMutation::decode(code, buffer)?,
            },
            _ => return Err(unknown(code)),
        })
    }
}

fn unknown(code: u16) -> ProtocolError {
    ProtocolError::UnknownCommand {
        operator: Operator::Modifier as u8,
        code,
    }
}
