//! Creator payloads (codes 0 - 99).

use physbridge_core::{CommandsBuffer, Quat, Vec3};

use crate::codec::{put, put_enum, put_len, put_opt, take_enum, take_len};
use crate::constants::{
    BackFaceMode, ConstraintSpace, ConstraintType, MotionQuality, MotionType, Operator, OverrideMassProperties,
    SpringMode, TransmissionMode, VehicleType, CMD_CREATE_BODY, CMD_CREATE_CHARACTER,
    CMD_CREATE_CONSTRAINT, CMD_CREATE_GROUPS, CMD_CREATE_SHAPE, CMD_CREATE_SOFT_BODY,
    CMD_CREATE_VEHICLE, DOF_ALL,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::shape::{MeshRef, ShapeSettings};

// =============================================================================
// BODIES
// =============================================================================

/// Mass property override carried by [`BodyDesc`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MassOverride {
    /// Mass and inertia come from the shape.
    #[default]
    Calculate,
    /// Mass is given, inertia is scaled from the shape.
    CalculateInertia {
        /// Mass in kg.
        mass: f32,
    },
    /// Mass and inertia are given.
    Provided {
        /// Mass in kg.
        mass: f32,
        /// Diagonal of the inertia tensor.
        inertia_diagonal: Vec3,
        /// Rotation of the inertia frame.
        inertia_rotation: Quat,
    },
}

impl MassOverride {
    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match *self {
            Self::Calculate => put_enum(buffer, OverrideMassProperties::CalculateMassAndInertia),
            Self::CalculateInertia { mass } => {
                put_enum(buffer, OverrideMassProperties::CalculateInertia)?;
                put(buffer, mass)
            }
            Self::Provided {
                mass,
                inertia_diagonal,
                inertia_rotation,
            } => {
                put_enum(buffer, OverrideMassProperties::MassAndInertiaProvided)?;
                put(buffer, mass)?;
                put(buffer, inertia_diagonal)?;
                put(buffer, inertia_rotation)
            }
        }
    }

    fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(match take_enum(buffer)? {
            OverrideMassProperties::CalculateMassAndInertia => Self::Calculate,
            OverrideMassProperties::CalculateInertia => Self::CalculateInertia { mass: buffer.read() },
            OverrideMassProperties::MassAndInertiaProvided => Self::Provided {
                mass: buffer.read(),
                inertia_diagonal: buffer.read(),
                inertia_rotation: buffer.read(),
            },
        })
    }
}

/// Rigid body creation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyDesc {
    /// Shape of the body.
    pub shape: ShapeSettings,
    /// Caller assigned id.
    pub pcid: u32,
    /// Initial position.
    pub position: Vec3,
    /// Initial rotation.
    pub rotation: Quat,
    /// Motion type.
    pub motion_type: MotionType,
    /// Report interpolated transforms.
    pub use_motion_state: bool,
    /// Object layer.
    pub object_layer: u16,
    /// Initial linear velocity.
    pub linear_velocity: Vec3,
    /// Initial angular velocity.
    pub angular_velocity: Vec3,
    /// Linear speed cap.
    pub max_linear_velocity: f32,
    /// Angular speed cap.
    pub max_angular_velocity: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution coefficient.
    pub restitution: f32,
    /// Linear damping.
    pub linear_damping: f32,
    /// Angular damping.
    pub angular_damping: f32,
    /// Gravity multiplier.
    pub gravity_factor: f32,
    /// Inertia multiplier.
    pub inertia_multiplier: f32,
    /// Allowed degrees of freedom bit set.
    pub allowed_dofs: u8,
    /// Allows switching between dynamic and kinematic later.
    pub allow_dynamic_or_kinematic: bool,
    /// Sensor bodies report contacts without a response.
    pub is_sensor: bool,
    /// Collision detection quality.
    pub motion_quality: MotionQuality,
    /// Allows the body to sleep.
    pub allow_sleeping: bool,
    /// Collision filter group.
    pub group: Option<u32>,
    /// Sub group inside the filter group.
    pub sub_group: Option<u32>,
    /// Include in debug draw output.
    pub debug_draw: bool,
    /// Mass property override.
    pub mass: MassOverride,
}

impl BodyDesc {
    /// Creates a body description with engine default properties.
    #[must_use]
    pub fn new(pcid: u32, shape: ShapeSettings, motion_type: MotionType) -> Self {
        Self {
            shape,
            pcid,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            motion_type,
            use_motion_state: true,
            object_layer: if motion_type == MotionType::Static { 0 } else { 1 },
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            max_linear_velocity: 500.0,
            max_angular_velocity: 0.25 * std::f32::consts::PI * 60.0,
            friction: 0.2,
            restitution: 0.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
            gravity_factor: 1.0,
            inertia_multiplier: 1.0,
            allowed_dofs: DOF_ALL,
            allow_dynamic_or_kinematic: false,
            is_sensor: false,
            motion_quality: MotionQuality::Discrete,
            allow_sleeping: true,
            group: None,
            sub_group: None,
            debug_draw: false,
            mass: MassOverride::Calculate,
        }
    }

    /// Returns the description placed at `position`.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Writes the payload.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        self.shape.encode(buffer)?;
        put(buffer, self.pcid)?;
        put(buffer, self.position)?;
        put(buffer, self.rotation)?;
        put_enum(buffer, self.motion_type)?;
        put(buffer, self.use_motion_state)?;
        put(buffer, self.object_layer)?;
        put(buffer, self.linear_velocity)?;
        put(buffer, self.angular_velocity)?;
        put(buffer, self.max_linear_velocity)?;
        put(buffer, self.max_angular_velocity)?;
        put(buffer, self.friction)?;
        put(buffer, self.restitution)?;
        put(buffer, self.linear_damping)?;
        put(buffer, self.angular_damping)?;
        put(buffer, self.gravity_factor)?;
        put(buffer, self.inertia_multiplier)?;
        put(buffer, self.allowed_dofs)?;
        put(buffer, self.allow_dynamic_or_kinematic)?;
        put(buffer, self.is_sensor)?;
        put_enum(buffer, self.motion_quality)?;
        put(buffer, self.allow_sleeping)?;
        put_opt(buffer, self.group)?;
        put_opt(buffer, self.sub_group)?;
        put(buffer, self.debug_draw)?;
        self.mass.encode(buffer)
    }

    /// Reads the payload.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(Self {
            shape: ShapeSettings::decode(buffer)?,
            pcid: buffer.read(),
            position: buffer.read(),
            rotation: buffer.read(),
            motion_type: take_enum(buffer)?,
            use_motion_state: buffer.read(),
            object_layer: buffer.read(),
            linear_velocity: buffer.read(),
            angular_velocity: buffer.read(),
            max_linear_velocity: buffer.read(),
            max_angular_velocity: buffer.read(),
            friction: buffer.read(),
            restitution: buffer.read(),
            linear_damping: buffer.read(),
            angular_damping: buffer.read(),
            gravity_factor: buffer.read(),
            inertia_multiplier: buffer.read(),
            allowed_dofs: buffer.read(),
            allow_dynamic_or_kinematic: buffer.read(),
            is_sensor: buffer.read(),
            motion_quality: take_enum(buffer)?,
            allow_sleeping: buffer.read(),
            group: buffer.read_opt(),
            sub_group: buffer.read_opt(),
            debug_draw: buffer.read(),
            mass: MassOverride::decode(buffer)?,
        })
    }
}

/// Soft body creation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SoftBodyDesc {
    /// Vertex and face data.
    pub mesh: MeshRef,
    /// Caller assigned id.
    pub pcid: u32,
    /// Initial position.
    pub position: Vec3,
    /// Initial rotation.
    pub rotation: Quat,
    /// Collision filter group.
    pub group: Option<u32>,
    /// Sub group inside the filter group.
    pub sub_group: Option<u32>,
    /// Object layer.
    pub object_layer: u16,
    /// Solver iterations.
    pub iterations: u32,
    /// Linear damping.
    pub linear_damping: f32,
    /// Linear speed cap.
    pub max_linear_velocity: f32,
    /// Restitution coefficient.
    pub restitution: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Internal pressure.
    pub pressure: f32,
    /// Gravity multiplier.
    pub gravity_factor: f32,
    /// Move the body position with the vertices.
    pub update_position: bool,
    /// Bake the rotation into the vertices.
    pub make_rotation_identity: bool,
    /// Allows the body to sleep.
    pub allow_sleeping: bool,
    /// Include in debug draw output.
    pub debug_draw: bool,
}

impl SoftBodyDesc {
    /// Writes the payload.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        self.mesh.encode(buffer)?;
        put(buffer, self.pcid)?;
        put(buffer, self.position)?;
        put(buffer, self.rotation)?;
        put_opt(buffer, self.group)?;
        put_opt(buffer, self.sub_group)?;
        put(buffer, self.object_layer)?;
        put(buffer, self.iterations)?;
        put(buffer, self.linear_damping)?;
        put(buffer, self.max_linear_velocity)?;
        put(buffer, self.restitution)?;
        put(buffer, self.friction)?;
        put(buffer, self.pressure)?;
        put(buffer, self.gravity_factor)?;
        put(buffer, self.update_position)?;
        put(buffer, self.make_rotation_identity)?;
        put(buffer, self.allow_sleeping)?;
        put(buffer, self.debug_draw)
    }

    /// Reads the payload.
    pub fn decode(buffer: &mut CommandsBuffer) -> Self {
        Self {
            mesh: MeshRef::decode(buffer),
            pcid: buffer.read(),
            position: buffer.read(),
            rotation: buffer.read(),
            group: buffer.read_opt(),
            sub_group: buffer.read_opt(),
            object_layer: buffer.read(),
            iterations: buffer.read(),
            linear_damping: buffer.read(),
            max_linear_velocity: buffer.read(),
            restitution: buffer.read(),
            friction: buffer.read(),
            pressure: buffer.read(),
            gravity_factor: buffer.read(),
            update_position: buffer.read(),
            make_rotation_identity: buffer.read(),
            allow_sleeping: buffer.read(),
            debug_draw: buffer.read(),
        }
    }
}

// =============================================================================
// CONSTRAINTS
// =============================================================================

/// Spring parameters for soft limits and motors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringSettings {
    /// How `value` is interpreted.
    pub mode: SpringMode,
    /// Frequency in Hz or stiffness in N/m.
    pub value: f32,
    /// Damping ratio or damping coefficient.
    pub damping: f32,
}

impl SpringSettings {
    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put_enum(buffer, self.mode)?;
        put(buffer, self.value)?;
        put(buffer, self.damping)
    }

    fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(Self {
            mode: take_enum(buffer)?,
            value: buffer.read(),
            damping: buffer.read(),
        })
    }
}

/// Constraint motor parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorSettings {
    /// Spring used when driving to a position.
    pub spring: SpringSettings,
    /// Maximum force for linear motors.
    pub max_force: f32,
    /// Maximum torque for angular motors.
    pub max_torque: f32,
}

/// Per-axis limit of a six degree of freedom constraint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisLimit {
    /// Axis index: translation X, Y, Z then rotation X, Y, Z.
    pub axis: u8,
    /// Lower limit.
    pub min: f32,
    /// Upper limit.
    pub max: f32,
}

/// Constraint creation settings.
///
/// Fields that do not apply to `kind` are left `None` and ignored by the
/// backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintDesc {
    /// Constraint type.
    pub kind: ConstraintType,
    /// Caller assigned constraint index.
    pub index: u32,
    /// First body pcid.
    pub body1: u32,
    /// Second body pcid.
    pub body2: u32,
    /// Anchor on the first body.
    pub point1: Option<Vec3>,
    /// Anchor on the second body.
    pub point2: Option<Vec3>,
    /// Hinge, slider or twist axis on the first body.
    pub axis1: Option<Vec3>,
    /// Hinge, slider or twist axis on the second body.
    pub axis2: Option<Vec3>,
    /// Normal axis on the first body.
    pub normal1: Option<Vec3>,
    /// Normal axis on the second body.
    pub normal2: Option<Vec3>,
    /// Lower limit (distance, angle or position).
    pub limits_min: Option<f32>,
    /// Upper limit (distance, angle or position).
    pub limits_max: Option<f32>,
    /// Maximum friction force or torque.
    pub max_friction: Option<f32>,
    /// Soft limit spring.
    pub limits_spring: Option<SpringSettings>,
    /// Motor.
    pub motor: Option<MotorSettings>,
    /// Six degree of freedom limits.
    pub axis_limits: Vec<AxisLimit>,
    /// Solver velocity iterations override.
    pub velocity_steps: Option<u8>,
    /// Solver position iterations override.
    pub position_steps: Option<u8>,
    /// Space of points and axes.
    pub space: ConstraintSpace,
}

impl ConstraintDesc {
    /// Creates a constraint description with no optional fields.
    #[must_use]
    pub fn new(kind: ConstraintType, index: u32, body1: u32, body2: u32) -> Self {
        Self {
            kind,
            index,
            body1,
            body2,
            point1: None,
            point2: None,
            axis1: None,
            axis2: None,
            normal1: None,
            normal2: None,
            limits_min: None,
            limits_max: None,
            max_friction: None,
            limits_spring: None,
            motor: None,
            axis_limits: Vec::new(),
            velocity_steps: None,
            position_steps: None,
            space: ConstraintSpace::World,
        }
    }

    /// Writes the payload.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put_enum(buffer, self.kind)?;
        put(buffer, self.index)?;
        put(buffer, self.body1)?;
        put(buffer, self.body2)?;
        put_opt(buffer, self.point1)?;
        put_opt(buffer, self.point2)?;
        put_opt(buffer, self.axis1)?;
        put_opt(buffer, self.axis2)?;
        put_opt(buffer, self.normal1)?;
        put_opt(buffer, self.normal2)?;
        put_opt(buffer, self.limits_min)?;
        put_opt(buffer, self.limits_max)?;
        put_opt(buffer, self.max_friction)?;

        put(buffer, self.limits_spring.is_some())?;
        if let Some(spring) = &self.limits_spring {
            spring.encode(buffer)?;
        }

        put(buffer, self.motor.is_some())?;
        if let Some(motor) = &self.motor {
            motor.spring.encode(buffer)?;
            put(buffer, motor.max_force)?;
            put(buffer, motor.max_torque)?;
        }

        put_len(buffer, self.axis_limits.len())?;
        for limit in &self.axis_limits {
            put(buffer, limit.axis)?;
            put(buffer, limit.min)?;
            put(buffer, limit.max)?;
        }

        put_opt(buffer, self.velocity_steps)?;
        put_opt(buffer, self.position_steps)?;
        put_enum(buffer, self.space)
    }

    /// Reads the payload.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let mut desc = Self::new(take_enum(buffer)?, buffer.read(), buffer.read(), buffer.read());
        desc.point1 = buffer.read_opt();
        desc.point2 = buffer.read_opt();
        desc.axis1 = buffer.read_opt();
        desc.axis2 = buffer.read_opt();
        desc.normal1 = buffer.read_opt();
        desc.normal2 = buffer.read_opt();
        desc.limits_min = buffer.read_opt();
        desc.limits_max = buffer.read_opt();
        desc.max_friction = buffer.read_opt();

        if buffer.read_flag() {
            desc.limits_spring = Some(SpringSettings::decode(buffer)?);
        }

        if buffer.read_flag() {
            desc.motor = Some(MotorSettings {
                spring: SpringSettings::decode(buffer)?,
                max_force: buffer.read(),
                max_torque: buffer.read(),
            });
        }

        let count = take_len(buffer, 9)?;
        desc.axis_limits = (0..count)
            .map(|_| AxisLimit {
                axis: buffer.read(),
                min: buffer.read(),
                max: buffer.read(),
            })
            .collect();

        desc.velocity_steps = buffer.read_opt();
        desc.position_steps = buffer.read_opt();
        desc.space = take_enum(buffer)?;
        Ok(desc)
    }
}

// =============================================================================
// CHARACTERS
// =============================================================================

/// Virtual character creation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterDesc {
    /// Collision shape.
    pub shape: ShapeSettings,
    /// Caller assigned id.
    pub pcid: u32,
    /// Report interpolated transforms.
    pub use_motion_state: bool,
    /// Up direction.
    pub up: Vec3,
    /// Supporting plane normal.
    pub supporting_plane_normal: Vec3,
    /// Supporting plane distance.
    pub supporting_plane_distance: f32,
    /// Steepest walkable slope, in radians.
    pub max_slope_angle: f32,
    /// Mass used when pushing bodies.
    pub mass: f32,
    /// Maximum push force.
    pub max_strength: f32,
    /// Offset applied to the shape.
    pub shape_offset: Vec3,
    /// Back face handling.
    pub back_face_mode: BackFaceMode,
    /// Contact look-ahead distance.
    pub predictive_contact_distance: f32,
    /// Collision iterations per update.
    pub max_collision_iterations: u32,
    /// Constraint iterations per update.
    pub max_constraint_iterations: u32,
    /// Time left below which the update stops.
    pub min_time_remaining: f32,
    /// Collision tolerance.
    pub collision_tolerance: f32,
    /// Distance kept from other geometry.
    pub character_padding: f32,
    /// Maximum contacts collected.
    pub max_num_hits: u32,
    /// Cosine for merging similar contacts.
    pub hit_reduction_cos_max_angle: f32,
    /// Penetration recovery speed.
    pub penetration_recovery_speed: f32,
    /// Initial position.
    pub position: Vec3,
    /// Initial rotation.
    pub rotation: Quat,
    /// Include in debug draw output.
    pub debug_draw: bool,
}

impl CharacterDesc {
    /// Creates a character description with engine default properties.
    #[must_use]
    pub fn new(pcid: u32, shape: ShapeSettings) -> Self {
        Self {
            shape,
            pcid,
            use_motion_state: true,
            up: Vec3::Y,
            supporting_plane_normal: Vec3::Y,
            supporting_plane_distance: -1.0e10,
            max_slope_angle: 50.0_f32.to_radians(),
            mass: 70.0,
            max_strength: 100.0,
            shape_offset: Vec3::ZERO,
            back_face_mode: BackFaceMode::Collide,
            predictive_contact_distance: 0.1,
            max_collision_iterations: 5,
            max_constraint_iterations: 15,
            min_time_remaining: 1.0e-4,
            collision_tolerance: 1.0e-3,
            character_padding: 0.02,
            max_num_hits: 256,
            hit_reduction_cos_max_angle: 0.999,
            penetration_recovery_speed: 1.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            debug_draw: false,
        }
    }

    /// Writes the payload.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        self.shape.encode(buffer)?;
        put(buffer, self.pcid)?;
        put(buffer, self.use_motion_state)?;
        put(buffer, self.up)?;
        put(buffer, self.supporting_plane_normal)?;
        put(buffer, self.supporting_plane_distance)?;
        put(buffer, self.max_slope_angle)?;
        put(buffer, self.mass)?;
        put(buffer, self.max_strength)?;
        put(buffer, self.shape_offset)?;
        put_enum(buffer, self.back_face_mode)?;
        put(buffer, self.predictive_contact_distance)?;
        put(buffer, self.max_collision_iterations)?;
        put(buffer, self.max_constraint_iterations)?;
        put(buffer, self.min_time_remaining)?;
        put(buffer, self.collision_tolerance)?;
        put(buffer, self.character_padding)?;
        put(buffer, self.max_num_hits)?;
        put(buffer, self.hit_reduction_cos_max_angle)?;
        put(buffer, self.penetration_recovery_speed)?;
        put(buffer, self.position)?;
        put(buffer, self.rotation)?;
        put(buffer, self.debug_draw)
    }

    /// Reads the payload.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(Self {
            shape: ShapeSettings::decode(buffer)?,
            pcid: buffer.read(),
            use_motion_state: buffer.read(),
            up: buffer.read(),
            supporting_plane_normal: buffer.read(),
            supporting_plane_distance: buffer.read(),
            max_slope_angle: buffer.read(),
            mass: buffer.read(),
            max_strength: buffer.read(),
            shape_offset: buffer.read(),
            back_face_mode: take_enum(buffer)?,
            predictive_contact_distance: buffer.read(),
            max_collision_iterations: buffer.read(),
            max_constraint_iterations: buffer.read(),
            min_time_remaining: buffer.read(),
            collision_tolerance: buffer.read(),
            character_padding: buffer.read(),
            max_num_hits: buffer.read(),
            hit_reduction_cos_max_angle: buffer.read(),
            penetration_recovery_speed: buffer.read(),
            position: buffer.read(),
            rotation: buffer.read(),
            debug_draw: buffer.read(),
        })
    }
}

// =============================================================================
// VEHICLES
// =============================================================================

/// Vehicle engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineDesc {
    /// Peak torque in Nm.
    pub max_torque: f32,
    /// Idle rpm.
    pub min_rpm: f32,
    /// Redline rpm.
    pub max_rpm: f32,
}

/// Vehicle gearbox.
#[derive(Clone, Debug, PartialEq)]
pub struct TransmissionDesc {
    /// Shifting mode.
    pub mode: TransmissionMode,
    /// Forward gear ratios.
    pub gear_ratios: Vec<f32>,
    /// Clutch strength.
    pub clutch_strength: f32,
}

/// Vehicle wheel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelDesc {
    /// Attachment point relative to the body.
    pub position: Vec3,
    /// Shortest suspension length.
    pub suspension_min: f32,
    /// Longest suspension length.
    pub suspension_max: f32,
    /// Wheel radius.
    pub radius: f32,
    /// Wheel width.
    pub width: f32,
    /// Steering limit, in radians.
    pub max_steer_angle: f32,
    /// Brake torque.
    pub max_brake_torque: f32,
}

/// Vehicle constraint creation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleDesc {
    /// Pcid of the chassis body.
    pub pcid: u32,
    /// Caller assigned constraint index.
    pub index: u32,
    /// Controller type.
    pub vehicle_type: VehicleType,
    /// Vehicle up direction.
    pub up: Vec3,
    /// Vehicle forward direction.
    pub forward: Vec3,
    /// Pitch and roll limit, in radians.
    pub max_pitch_roll_angle: f32,
    /// Engine.
    pub engine: EngineDesc,
    /// Gearbox.
    pub transmission: TransmissionDesc,
    /// Wheels.
    pub wheels: Vec<WheelDesc>,
}

impl VehicleDesc {
    /// Writes the payload.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put(buffer, self.pcid)?;
        put(buffer, self.index)?;
        put_enum(buffer, self.vehicle_type)?;
        put(buffer, self.up)?;
        put(buffer, self.forward)?;
        put(buffer, self.max_pitch_roll_angle)?;

        put(buffer, self.engine.max_torque)?;
        put(buffer, self.engine.min_rpm)?;
        put(buffer, self.engine.max_rpm)?;

        put_enum(buffer, self.transmission.mode)?;
        put_len(buffer, self.transmission.gear_ratios.len())?;
        for ratio in &self.transmission.gear_ratios {
            put(buffer, *ratio)?;
        }
        put(buffer, self.transmission.clutch_strength)?;

        put_len(buffer, self.wheels.len())?;
        for wheel in &self.wheels {
            put(buffer, wheel.position)?;
            put(buffer, wheel.suspension_min)?;
            put(buffer, wheel.suspension_max)?;
            put(buffer, wheel.radius)?;
            put(buffer, wheel.width)?;
            put(buffer, wheel.max_steer_angle)?;
            put(buffer, wheel.max_brake_torque)?;
        }
        Ok(())
    }

    /// Reads the payload.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let pcid = buffer.read();
        let index = buffer.read();
        let vehicle_type = take_enum(buffer)?;
        let up = buffer.read();
        let forward = buffer.read();
        let max_pitch_roll_angle = buffer.read();

        let engine = EngineDesc {
            max_torque: buffer.read(),
            min_rpm: buffer.read(),
            max_rpm: buffer.read(),
        };

        let mode = take_enum(buffer)?;
        let gears = take_len(buffer, 4)?;
        let gear_ratios: Vec<f32> = (0..gears).map(|_| buffer.read::<f32>()).collect();
        let transmission = TransmissionDesc {
            mode,
            gear_ratios,
            clutch_strength: buffer.read(),
        };

        let count = take_len(buffer, 36)?;
        let wheels = (0..count)
            .map(|_| WheelDesc {
                position: buffer.read(),
                suspension_min: buffer.read(),
                suspension_max: buffer.read(),
                radius: buffer.read(),
                width: buffer.read(),
                max_steer_angle: buffer.read(),
                max_brake_torque: buffer.read(),
            })
            .collect();

        Ok(Self {
            pcid,
            index,
            vehicle_type,
            up,
            forward,
            max_pitch_roll_angle,
            engine,
            transmission,
            wheels,
        })
    }
}

// =============================================================================
// CREATE COMMAND
// =============================================================================

/// Any creator command.
#[derive(Clone, Debug, PartialEq)]
pub enum CreateCommand {
    /// Rigid body.
    Body(Box<BodyDesc>),
    /// Soft body.
    SoftBody(Box<SoftBodyDesc>),
    /// Collision filter tables, one per entry, sized by sub group count.
    Groups(Vec<u32>),
    /// Constraint.
    Constraint(Box<ConstraintDesc>),
    /// Virtual character.
    Character(Box<CharacterDesc>),
    /// Reusable shape.
    Shape {
        /// Caller assigned shape index.
        index: u32,
        /// Shape description.
        settings: ShapeSettings,
    },
    /// Vehicle constraint.
    Vehicle(Box<VehicleDesc>),
}

impl CreateCommand {
    /// Wire code of this command.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Body(_) => CMD_CREATE_BODY,
            Self::SoftBody(_) => CMD_CREATE_SOFT_BODY,
            Self::Groups(_) => CMD_CREATE_GROUPS,
            Self::Constraint(_) => CMD_CREATE_CONSTRAINT,
            Self::Character(_) => CMD_CREATE_CHARACTER,
            Self::Shape { .. } => CMD_CREATE_SHAPE,
            Self::Vehicle(_) => CMD_CREATE_VEHICLE,
        }
    }

    pub(crate) fn encode_payload(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match self {
            Self::Body(desc) => desc.encode(buffer),
            Self::SoftBody(desc) => desc.encode(buffer),
            Self::Groups(sizes) => {
                put_len(buffer, sizes.len())?;
                for size in sizes {
                    put(buffer, *size)?;
                }
                Ok(())
            }
            Self::Constraint(desc) => desc.encode(buffer),
            Self::Character(desc) => desc.encode(buffer),
            Self::Shape { index, settings } => {
                put(buffer, *index)?;
                settings.encode(buffer)
            }
            Self::Vehicle(desc) => desc.encode(buffer),
        }
    }

    pub(crate) fn decode_payload(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        Ok(match code {
            CMD_CREATE_BODY => Self::Body(Box::new(BodyDesc::decode(buffer)?)),
            CMD_CREATE_SOFT_BODY => Self::SoftBody(Box::new(SoftBodyDesc::decode(buffer))),
            CMD_CREATE_GROUPS => {
                let count = take_len(buffer, 4)?;
                Self::Groups((0..count).map(|_| buffer.read::<u32>()).collect())
            }
            CMD_CREATE_CONSTRAINT => Self::Constraint(Box::new(ConstraintDesc::decode(buffer)?)),
            CMD_CREATE_CHARACTER => Self::Character(Box::new(CharacterDesc::decode(buffer)?)),
            CMD_CREATE_SHAPE => Self::Shape {
                index: buffer.read(),
                settings: ShapeSettings::decode(buffer)?,
            },
            CMD_CREATE_VEHICLE => Self::Vehicle(Box::new(VehicleDesc::decode(buffer)?)),
            _ => {
                return Err(ProtocolError::UnknownCommand {
                    operator: Operator::Creator as u8,
                    code,
                })
            }
        })
    }
}
