//! # Modifier
//!
//! Resolves the target of a mutation and applies it. A target that is not
//! alive turns the command into a silent no-op.
//!
//! Shape, compound child, debug draw, isometry ownership, motion state and
//! vehicle input changes touch backend state and are handled here.
//! Everything else goes straight to the engine. Shape indices resolve
//! through the shape table; an unregistered index is a no-op like a
//! missing body.

use physbridge_core::AuxBuffers;
use physbridge_protocol::{BodyMutation, CharacterMutation, ConstraintMutation, ModifyCommand, Response, VehicleInput};

use super::World;
use crate::engine::{BodyHandle, PhysicsEngine};
use crate::error::BackendResult;

/// Modifier family dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifier;

impl Modifier {
    /// Executes one modifier command.
    ///
    /// # Errors
    ///
    /// Invalid values and engine refusals. The failure affects this
    /// command only.
    pub fn execute<E: PhysicsEngine>(world: &mut World<E>, command: ModifyCommand, aux: &AuxBuffers) -> BackendResult<()> {
        match command {
            ModifyCommand::ChangeGravity(gravity) => {
                world.check_vec3("gravity", gravity)?;
                world.engine.set_gravity(gravity);
                Ok(())
            }
            ModifyCommand::ToggleGroupPair {
                group,
                sub_group1,
                sub_group2,
                enable,
            } => Ok(world.engine.toggle_group_pair(group, sub_group1, sub_group2, enable)?),
            ModifyCommand::Body { pcid, mutation } => {
                let Some(handle) = world.tracker.handle_of(pcid) else {
                    tracing::trace!("Skipping {:?} for missing body {}", mutation, pcid);
                    return Ok(());
                };
                modify_body(world, handle, pcid, mutation, aux)
            }
            ModifyCommand::Character { pcid, mutation } => {
                let Some(handle) = world.tracker.handle_of(pcid).filter(|&h| world.tracker.is_character(h)) else {
                    tracing::trace!("Skipping character mutation for missing character {}", pcid);
                    return Ok(());
                };
                modify_character(world, handle, mutation, aux)
            }
            ModifyCommand::Constraint { index, mutation } => modify_constraint(world, index, mutation),
        }
    }
}

fn modify_body<E: PhysicsEngine>(
    world: &mut World<E>,
    handle: BodyHandle,
    pcid: u32,
    mutation: BodyMutation,
    aux: &AuxBuffers,
) -> BackendResult<()> {
    match mutation {
        BodyMutation::SetShape(settings) => {
            world.with_shape(&settings, aux, |engine, shape| engine.set_shape(handle, shape))?;
            world.drawer.invalidate(handle);
        }
        BodyMutation::SetCustomShape(index) => {
            let Some(&shape) = world.shapes.get(index) else {
                tracing::trace!("Skipping custom shape for body {}, shape {} is not registered", pcid, index);
                return Ok(());
            };
            world.engine.set_shape(handle, shape)?;
            world.drawer.invalidate(handle);
        }
        BodyMutation::AddShape {
            shape,
            position,
            rotation,
            user_data,
        } => {
            let Some(&shape) = world.shapes.get(shape) else {
                tracing::trace!("Skipping child shape for body {}, shape {} is not registered", pcid, shape);
                return Ok(());
            };
            world.check_vec3("child position", position)?;
            world.check_quat("child rotation", rotation)?;
            world.engine.add_child_shape(handle, shape, position, rotation, user_data)?;
            world.drawer.invalidate(handle);
        }
        BodyMutation::RemoveShape(child) => {
            world.engine.remove_child_shape(handle, child)?;
            world.drawer.invalidate(handle);
        }
        BodyMutation::ModifyShape {
            child,
            position,
            rotation,
            shape,
        } => {
            let shape = match shape {
                Some(index) => {
                    let Some(&shape) = world.shapes.get(index) else {
                        tracing::trace!("Skipping child {} of body {}, shape {} is not registered", child, pcid, index);
                        return Ok(());
                    };
                    Some(shape)
                }
                None => None,
            };
            world.check_vec3("child position", position)?;
            world.check_quat("child rotation", rotation)?;
            world.engine.modify_child_shape(handle, child, position, rotation, shape)?;
            world.drawer.invalidate(handle);
        }
        BodyMutation::SetAutoUpdateIsometry(mode) => world.tracker.set_isometry_update(handle, mode),
        BodyMutation::SetDebugDrawDepth(depth) => world.tracker.set_debug_depth(handle, depth),
        BodyMutation::SetDebugDraw(enabled) => {
            world.tracker.set_debug(handle, enabled && world.debug_draw);
            if !enabled {
                world.drawer.invalidate(handle);
            }
        }
        BodyMutation::UseMotionState(enabled) => {
            if !enabled {
                world.motion_states.remove(handle);
            } else if let Some(state) = world.engine.body_state(handle) {
                world.motion_states.insert(handle, state.isometry());
            }
        }
        BodyMutation::SetVehicleInput(input) => set_vehicle_input(world, handle, pcid, input)?,
        BodyMutation::SetMotionType(_) => {
            world.engine.apply(handle, &mutation)?;
            if let Some(kind) = world.engine.body_kind(handle) {
                world.tracker.update(handle, pcid, kind);
            }
        }
        BodyMutation::MoveBody { position, rotation } => {
            world.check_vec3("move position", position)?;
            world.check_quat("move rotation", rotation)?;
            world.engine.apply(handle, &mutation)?;
            // A teleport must not be interpolated
            if let (Some(motion), Some(state)) = (world.motion_states.get_mut(handle), world.engine.body_state(handle)) {
                motion.reset(state.isometry());
            }
        }
        _ => {
            check_mutation(world, &mutation)?;
            world.engine.apply(handle, &mutation)?;
        }
    }
    Ok(())
}

fn check_mutation<E: PhysicsEngine>(world: &World<E>, mutation: &BodyMutation) -> BackendResult<()> {
    match *mutation {
        BodyMutation::AddForce { force: value, offset } | BodyMutation::AddImpulse { impulse: value, offset } => {
            world.check_vec3("vector", value)?;
            if let Some(offset) = offset {
                world.check_vec3("application point", offset)?;
            }
        }
        BodyMutation::AddAngularImpulse(value)
        | BodyMutation::AddTorque(value)
        | BodyMutation::SetLinearVelocity(value)
        | BodyMutation::SetAngularVelocity(value)
        | BodyMutation::SetLinearVelocityClamped(value)
        | BodyMutation::SetAngularVelocityClamped(value) => world.check_vec3("vector", value)?,
        BodyMutation::MoveKinematic { position, rotation, time } => {
            world.check_vec3("kinematic target", position)?;
            world.check_quat("kinematic rotation", rotation)?;
            world.check_positive("kinematic move time", time)?;
        }
        BodyMutation::ApplyBuoyancyImpulse(ref buoyancy) => {
            world.check_vec3("surface position", buoyancy.surface_position)?;
            world.check_vec3("surface normal", buoyancy.surface_normal)?;
            world.check_vec3("fluid velocity", buoyancy.fluid_velocity)?;
        }
        BodyMutation::SetGravityFactor(value)
        | BodyMutation::SetFriction(value)
        | BodyMutation::SetRestitution(value)
        | BodyMutation::SetAngularFactor(value) => {
            world.check_scalar("value", value)?;
        }
        _ => {}
    }
    Ok(())
}

fn set_vehicle_input<E: PhysicsEngine>(
    world: &mut World<E>,
    handle: BodyHandle,
    pcid: u32,
    input: VehicleInput,
) -> BackendResult<()> {
    let Some(vehicle) = world.constraints.vehicle_of(handle) else {
        tracing::trace!("Body {} drives no vehicle", pcid);
        return Ok(());
    };
    world.check_scalar("vehicle forward input", input.forward)?;
    world.check_scalar("vehicle right input", input.right)?;
    world.engine.set_vehicle_input(vehicle, input)?;
    Ok(())
}

fn modify_character<E: PhysicsEngine>(
    world: &mut World<E>,
    handle: BodyHandle,
    mutation: CharacterMutation,
    aux: &AuxBuffers,
) -> BackendResult<()> {
    match mutation {
        CharacterMutation::SetShape { callback, shape } => {
            let switched = world.with_shape(&shape, aux, |engine, shape| engine.set_character_shape(handle, shape))?;
            if !switched {
                tracing::debug!("Character shape change rejected, new shape does not fit");
                return Ok(());
            }
            world.drawer.invalidate(handle);
            if let Some(callback) = callback {
                world.staged.push(Response::CharacterShapeChanged { callback });
            }
        }
        CharacterMutation::SetPosition(position) => {
            world.check_vec3("character position", position)?;
            world.engine.modify_character(handle, &mutation)?;
            if let (Some(motion), Some(state)) = (world.motion_states.get_mut(handle), world.engine.body_state(handle)) {
                motion.reset(state.isometry());
            }
        }
        CharacterMutation::SetLinearVelocity(velocity) => {
            world.check_vec3("character velocity", velocity)?;
            world.engine.modify_character(handle, &mutation)?;
        }
        CharacterMutation::SetRotation(rotation) => {
            world.check_quat("character rotation", rotation)?;
            world.engine.modify_character(handle, &mutation)?;
        }
        CharacterMutation::SetMaxSlope(angle) => {
            world.check_scalar("character max slope", angle)?;
            world.engine.modify_character(handle, &mutation)?;
        }
    }
    Ok(())
}

fn modify_constraint<E: PhysicsEngine>(world: &mut World<E>, index: u32, mutation: ConstraintMutation) -> BackendResult<()> {
    let Some(entry) = world.constraints.get(index).copied() else {
        tracing::trace!("Skipping {:?} for missing constraint {}", mutation, index);
        return Ok(());
    };
    match mutation {
        ConstraintMutation::SetTargetVelocity(velocity) => world.check_scalar("target velocity", velocity)?,
        ConstraintMutation::SetLimits { min, max } => {
            world.check_scalar("lower limit", min)?;
            world.check_scalar("upper limit", max)?;
        }
        ConstraintMutation::SetEnabled { .. } | ConstraintMutation::SetMotorState(_) => {}
    }
    world.engine.modify_constraint(entry.handle, &mutation)?;
    Ok(())
}
