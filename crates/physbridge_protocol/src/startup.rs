//! # Startup Constants
//!
//! The one-time message the backend side sends when it starts, listing
//! every numeric constant of the protocol by name. A caller that only
//! knows names can build its lookup tables from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[allow(clippy::wildcard_imports)]
use crate::constants::*;

/// Name and value pairs of every protocol constant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupConstants {
    /// Protocol version the backend speaks.
    pub protocol_version: u32,
    /// Operator and response operator bytes.
    pub operators: BTreeMap<String, u8>,
    /// Command and response codes.
    pub commands: BTreeMap<String, u16>,
    /// Enumeration values, grouped by enumeration name.
    pub enums: BTreeMap<String, BTreeMap<String, u8>>,
    /// Degree of freedom bit flags.
    pub dofs: BTreeMap<String, u8>,
}

const COMMANDS: &[(&str, u16)] = &[
    ("CreateBody", CMD_CREATE_BODY),
    ("CreateSoftBody", CMD_CREATE_SOFT_BODY),
    ("CreateGroups", CMD_CREATE_GROUPS),
    ("CreateConstraint", CMD_CREATE_CONSTRAINT),
    ("CreateCharacter", CMD_CREATE_CHARACTER),
    ("CreateShape", CMD_CREATE_SHAPE),
    ("CreateVehicle", CMD_CREATE_VEHICLE),
    ("ChangeGravity", CMD_CHANGE_GRAVITY),
    ("AddForce", CMD_ADD_FORCE),
    ("AddImpulse", CMD_ADD_IMPULSE),
    ("AddAngularImpulse", CMD_ADD_ANGULAR_IMPULSE),
    ("ApplyBuoyancyImpulse", CMD_APPLY_BUOYANCY_IMPULSE),
    ("AddTorque", CMD_ADD_TORQUE),
    ("MoveBody", CMD_MOVE_BODY),
    ("MoveKinematic", CMD_MOVE_KINEMATIC),
    ("SetLinearVelocity", CMD_SET_LIN_VEL),
    ("SetAngularVelocity", CMD_SET_ANG_VEL),
    ("ResetMotion", CMD_RESET_MOTION),
    ("SetMotionType", CMD_SET_MOTION_TYPE),
    ("SetObjectLayer", CMD_SET_OBJ_LAYER),
    ("ToggleGroupPair", CMD_TOGGLE_GROUP_PAIR),
    ("UseMotionState", CMD_USE_MOTION_STATE),
    ("SetGravityFactor", CMD_SET_GRAVITY_FACTOR),
    ("SetAllowedDofs", CMD_SET_DOF),
    ("SetMotionQuality", CMD_SET_MOTION_QUALITY),
    ("SetShape", CMD_SET_SHAPE),
    ("SetCustomShape", CMD_SET_CUSTOM_SHAPE),
    ("SetDebugDraw", CMD_SET_DEBUG_DRAW),
    ("SetAllowSleeping", CMD_SET_ALLOW_SLEEPING),
    ("SetCollisionGroup", CMD_SET_COL_GROUP),
    ("SetFriction", CMD_SET_FRICTION),
    ("SetIsSensor", CMD_SET_IS_SENSOR),
    ("SetRestitution", CMD_SET_RESTITUTION),
    ("ResetSleepTimer", CMD_RESET_SLEEP_TIMER),
    ("SetMaxLinearVelocity", CMD_SET_MAX_LIN_VEL),
    ("SetMaxAngularVelocity", CMD_SET_MAX_ANG_VEL),
    ("ClampLinearVelocity", CMD_CLAMP_LIN_VEL),
    ("ClampAngularVelocity", CMD_CLAMP_ANG_VEL),
    ("SetVehicleInput", CMD_SET_VEHICLE_INPUT),
    ("SetAutoUpdateIsometry", CMD_SET_AUTO_UPDATE_ISOMETRY),
    ("AddShape", CMD_ADD_SHAPE),
    ("RemoveShape", CMD_REMOVE_SHAPE),
    ("ModifyShape", CMD_MODIFY_SHAPE),
    ("SetDebugDrawDepth", CMD_SET_DEBUG_DRAW_DEPTH),
    ("SetAngularFactor", CMD_SET_ANG_FACTOR),
    ("SetKinematicCollideNonDynamic", CMD_SET_KIN_COL_NON_DYN),
    ("SetApplyGyroscopicForce", CMD_SET_APPLY_GYRO_FORCE),
    ("SetEnhancedInternalEdgeRemoval", CMD_SET_INTERNAL_EDGE),
    ("SetVelocitySteps", CMD_SET_VEL_STEPS),
    ("SetPositionSteps", CMD_SET_POS_STEPS),
    ("UpdateBitFilter", CMD_UPDATE_BIT_FILTER),
    ("SetLinearVelocityClamped", CMD_SET_LIN_VEL_CLAMPED),
    ("SetAngularVelocityClamped", CMD_SET_ANG_VEL_CLAMPED),
    ("CharSetLinearVelocity", CMD_CHAR_SET_LIN_VEL),
    ("CharSetShape", CMD_CHAR_SET_SHAPE),
    ("CharSetPosition", CMD_CHAR_SET_POSITION),
    ("CharSetRotation", CMD_CHAR_SET_ROTATION),
    ("CharSetMaxSlope", CMD_CHAR_SET_MAX_SLOPE),
    ("SetConstraintEnabled", CMD_SET_CONSTRAINT_ENABLED),
    ("SetMotorState", CMD_SET_MOTOR_STATE),
    ("SetTargetVelocity", CMD_SET_TARGET_VELOCITY),
    ("SetLimits", CMD_SET_LIMITS),
    ("CastRay", CMD_CAST_RAY),
    ("CastShape", CMD_CAST_SHAPE),
    ("DestroyBody", CMD_DESTROY_BODY),
    ("DestroyShape", CMD_DESTROY_SHAPE),
    ("DestroyConstraint", CMD_DESTROY_CONSTRAINT),
    ("UpdateTransforms", CMD_UPDATE_TRANSFORMS),
    ("ReportContacts", CMD_REPORT_CONTACTS),
    ("ReportCharContacts", CMD_REPORT_CHAR_CONTACTS),
    ("QueryResults", CMD_QUERY_RESULTS),
    ("CharShapeChanged", CMD_CHAR_SHAPE_CHANGED),
];

const DOFS: &[(&str, u8)] = &[
    ("TranslationX", DOF_TRANSLATION_X),
    ("TranslationY", DOF_TRANSLATION_Y),
    ("TranslationZ", DOF_TRANSLATION_Z),
    ("RotationX", DOF_ROTATION_X),
    ("RotationY", DOF_ROTATION_Y),
    ("RotationZ", DOF_ROTATION_Z),
    ("All", DOF_ALL),
    ("Plane2D", DOF_PLANE_2D),
];

fn table<T: Copy + Into<u8>>(all: &[(&str, T)]) -> BTreeMap<String, u8> {
    all.iter()
        .map(|&(name, value)| (name.to_string(), value.into()))
        .collect()
}

impl StartupConstants {
    /// Collects every constant this build of the protocol defines.
    #[must_use]
    pub fn collect() -> Self {
        let mut operators = BTreeMap::new();
        for operator in [Operator::Creator, Operator::Modifier, Operator::Querier, Operator::Cleaner] {
            operators.insert(format!("{operator:?}"), operator as u8);
        }
        for operator in [ResponseOperator::Body, ResponseOperator::Character, ResponseOperator::Manager] {
            operators.insert(format!("Response{operator:?}"), operator as u8);
        }

        let mut enums = BTreeMap::new();
        enums.insert(MotionType::KIND.to_string(), table(MotionType::ALL));
        enums.insert(OverrideMassProperties::KIND.to_string(), table(OverrideMassProperties::ALL));
        enums.insert(MotionQuality::KIND.to_string(), table(MotionQuality::ALL));
        enums.insert(BackFaceMode::KIND.to_string(), table(BackFaceMode::ALL));
        enums.insert(GroundState::KIND.to_string(), table(GroundState::ALL));
        enums.insert(ShapeType::KIND.to_string(), table(ShapeType::ALL));
        enums.insert(ConstraintType::KIND.to_string(), table(ConstraintType::ALL));
        enums.insert(ConstraintSpace::KIND.to_string(), table(ConstraintSpace::ALL));
        enums.insert(SpringMode::KIND.to_string(), table(SpringMode::ALL));
        enums.insert(MotorState::KIND.to_string(), table(MotorState::ALL));
        enums.insert(ContactType::KIND.to_string(), table(ContactType::ALL));
        enums.insert(IsometryUpdate::KIND.to_string(), table(IsometryUpdate::ALL));
        enums.insert(VehicleType::KIND.to_string(), table(VehicleType::ALL));
        enums.insert(TransmissionMode::KIND.to_string(), table(TransmissionMode::ALL));

        let constants = Self {
            protocol_version: PROTOCOL_VERSION,
            operators,
            commands: COMMANDS.iter().map(|&(name, code)| (name.to_string(), code)).collect(),
            enums,
            dofs: DOFS.iter().map(|&(name, bits)| (name.to_string(), bits)).collect(),
        };
        tracing::debug!(
            "Startup constants collected: {} commands, {} enums",
            constants.commands.len(),
            constants.enums.len()
        );
        constants
    }

    /// Looks up a command code by name.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<u16> {
        self.commands.get(name).copied()
    }

    /// Looks up an enumeration value by enumeration and variant name.
    #[must_use]
    pub fn enum_value(&self, kind: &str, variant: &str) -> Option<u8> {
        self.enums.get(kind)?.get(variant).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_are_unique() {
        let constants = StartupConstants::collect();
        assert_eq!(constants.commands.len(), COMMANDS.len());
    }

    #[test]
    fn test_lookup() {
        let constants = StartupConstants::collect();

        assert_eq!(constants.protocol_version, PROTOCOL_VERSION);
        assert_eq!(constants.command("DestroyBody"), Some(700));
        assert_eq!(constants.command("CharSetShape"), Some(401));
        assert_eq!(constants.enum_value("motion type", "Dynamic"), Some(2));
        assert_eq!(constants.enum_value("shape", "HeightField"), Some(7));
        assert_eq!(constants.command("UpdateBitFilter"), Some(143));
        assert_eq!(constants.enum_value("isometry update", "FrontToBack"), Some(1));
        assert_eq!(constants.operators.get("ResponseManager"), Some(&12));
        assert_eq!(constants.dofs.get("Plane2D"), Some(&35));
    }
}
