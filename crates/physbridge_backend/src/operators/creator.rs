//! # Creator
//!
//! Bodies, soft bodies, characters, shapes, constraints, vehicles and
//! collision filter tables.
//!
//! A pcid is bound and tracked inside the same command that creates its
//! handle. A missing dependency (constraint endpoint, shape index, filter
//! group) fails the command and leaves nothing behind.

use physbridge_core::AuxBuffers;
use physbridge_protocol::{BodyDesc, CharacterDesc, ConstraintDesc, CreateCommand, ShapeSettings, SoftBodyDesc, VehicleDesc};

use super::World;
use crate::constraints::ConstraintEntry;
use crate::engine::PhysicsEngine;
use crate::error::{BackendError, BackendResult};

/// Creator family dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Creator;

impl Creator {
    /// Executes one creator command.
    ///
    /// # Errors
    ///
    /// Duplicate pcids, missing dependencies, invalid values and engine
    /// refusals. The failure affects this command only.
    pub fn execute<E: PhysicsEngine>(world: &mut World<E>, command: CreateCommand, aux: &AuxBuffers) -> BackendResult<()> {
        match command {
            CreateCommand::Body(desc) => create_body(world, &desc, aux),
            CreateCommand::SoftBody(desc) => create_soft_body(world, &desc, aux),
            CreateCommand::Groups(sizes) => create_groups(world, &sizes),
            CreateCommand::Constraint(desc) => create_constraint(world, &desc),
            CreateCommand::Character(desc) => create_character(world, &desc, aux),
            CreateCommand::Shape { index, settings } => create_shape(world, index, &settings, aux),
            CreateCommand::Vehicle(desc) => create_vehicle(world, &desc),
        }
    }
}

fn create_body<E: PhysicsEngine>(world: &mut World<E>, desc: &BodyDesc, aux: &AuxBuffers) -> BackendResult<()> {
    world.ensure_free(desc.pcid)?;
    world.check_vec3("body position", desc.position)?;
    world.check_quat("body rotation", desc.rotation)?;
    world.check_vec3("body linear velocity", desc.linear_velocity)?;
    world.check_vec3("body angular velocity", desc.angular_velocity)?;

    let handle = world.with_shape(&desc.shape, aux, |engine, shape| engine.create_body(desc, shape))?;
    world.track(handle, desc.pcid, desc.debug_draw, desc.use_motion_state)?;

    tracing::debug!("Body {} created ({:?})", desc.pcid, desc.motion_type);
    Ok(())
}

fn create_soft_body<E: PhysicsEngine>(world: &mut World<E>, desc: &SoftBodyDesc, aux: &AuxBuffers) -> BackendResult<()> {
    world.ensure_free(desc.pcid)?;
    world.check_vec3("soft body position", desc.position)?;
    world.check_quat("soft body rotation", desc.rotation)?;

    let handle = world.engine.create_soft_body(desc, aux)?;
    world.track(handle, desc.pcid, desc.debug_draw, false)?;

    tracing::debug!("Soft body {} created", desc.pcid);
    Ok(())
}

fn create_groups<E: PhysicsEngine>(world: &mut World<E>, sizes: &[u32]) -> BackendResult<()> {
    for &sub_groups in sizes {
        let group = world.engine.create_group_table(sub_groups)?;
        tracing::debug!("Filter group {} created with {} sub groups", group, sub_groups);
    }
    Ok(())
}

fn create_constraint<E: PhysicsEngine>(world: &mut World<E>, desc: &ConstraintDesc) -> BackendResult<()> {
    let body1 = world
        .tracker
        .handle_of(desc.body1)
        .ok_or(BackendError::MissingBody(desc.body1))?;
    let body2 = world
        .tracker
        .handle_of(desc.body2)
        .ok_or(BackendError::MissingBody(desc.body2))?;

    let handle = world.engine.create_constraint(desc, body1, body2)?;
    let entry = ConstraintEntry {
        handle,
        body1,
        body2: Some(body2),
    };
    if let Some(previous) = world.constraints.insert(desc.index, entry) {
        tracing::warn!("Constraint index {} reused before it was destroyed", desc.index);
        world.engine.destroy_constraint(previous.handle);
    }

    tracing::debug!(
        "Constraint {} ({:?}) links {} and {}",
        desc.index,
        desc.kind,
        desc.body1,
        desc.body2
    );
    Ok(())
}

fn create_character<E: PhysicsEngine>(world: &mut World<E>, desc: &CharacterDesc, aux: &AuxBuffers) -> BackendResult<()> {
    world.ensure_free(desc.pcid)?;
    world.check_vec3("character position", desc.position)?;
    world.check_quat("character rotation", desc.rotation)?;
    world.check_vec3("character up", desc.up)?;
    world.check_positive("character mass", desc.mass)?;

    let handle = world.with_shape(&desc.shape, aux, |engine, shape| engine.create_character(desc, shape))?;
    world.track(handle, desc.pcid, desc.debug_draw, desc.use_motion_state)?;

    tracing::debug!("Character {} created", desc.pcid);
    Ok(())
}

fn create_shape<E: PhysicsEngine>(
    world: &mut World<E>,
    index: u32,
    settings: &ShapeSettings,
    aux: &AuxBuffers,
) -> BackendResult<()> {
    world.check_shape(settings)?;
    let handle = world.engine.create_shape(settings, aux)?;
    if let Some(previous) = world.shapes.insert(index, handle) {
        tracing::warn!("Shape index {} reused before it was destroyed", index);
        world.engine.release_shape(previous);
    }

    tracing::debug!("Shape {} registered ({:?})", index, settings.geometry.shape_type());
    Ok(())
}

fn create_vehicle<E: PhysicsEngine>(world: &mut World<E>, desc: &VehicleDesc) -> BackendResult<()> {
    let body = world
        .tracker
        .handle_of(desc.pcid)
        .ok_or(BackendError::MissingBody(desc.pcid))?;
    world.check_vec3("vehicle up", desc.up)?;
    world.check_vec3("vehicle forward", desc.forward)?;

    let handle = world.engine.create_vehicle(desc, body)?;
    let entry = ConstraintEntry {
        handle,
        body1: body,
        body2: None,
    };
    if let Some(previous) = world.constraints.insert(desc.index, entry) {
        tracing::warn!("Constraint index {} reused before it was destroyed", desc.index);
        world.engine.destroy_constraint(previous.handle);
    }

    tracing::debug!("Vehicle {} on body {} with {} wheels", desc.index, desc.pcid, desc.wheels.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BodyKind, SandboxEngine};
    use physbridge_core::Vec3;
    use physbridge_protocol::{ConstraintType, MotionType};

    fn world() -> World<SandboxEngine> {
        World::new(SandboxEngine::default(), true, true)
    }

    fn body(pcid: u32, motion_type: MotionType) -> CreateCommand {
        let mut desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::ONE), motion_type);
        desc.debug_draw = true;
        desc.use_motion_state = true;
        CreateCommand::Body(Box::new(desc))
    }

    #[test]
    fn test_create_body_binds_and_tracks() {
        let mut world = world();
        Creator::execute(&mut world, body(1, MotionType::Dynamic), &AuxBuffers::new()).unwrap();
        Creator::execute(&mut world, body(2, MotionType::Static), &AuxBuffers::new()).unwrap();

        let handle = world.tracker.handle_of(1).unwrap();
        assert_eq!(world.tracker.dynamic().collect::<Vec<_>>(), vec![handle]);
        assert!(world.tracker.is_debug(handle));
        assert!(world.motion_states.contains(handle));
        assert!(world.tracker.contains(2));
        assert_eq!(world.tracker.kinematic().count(), 0);
        // The one-off shapes were released
        assert_eq!(world.engine.shape_count(), 0);
    }

    #[test]
    fn test_duplicate_pcid_fails() {
        let mut world = world();
        Creator::execute(&mut world, body(1, MotionType::Dynamic), &AuxBuffers::new()).unwrap();

        let result = Creator::execute(&mut world, body(1, MotionType::Kinematic), &AuxBuffers::new());
        assert!(matches!(result, Err(BackendError::DuplicateBody(1))));
        assert_eq!(world.engine.body_count(), 1);
    }

    #[test]
    fn test_invalid_shape_creates_nothing() {
        let mut world = world();
        let desc = BodyDesc::new(4, ShapeSettings::sphere(0.0), MotionType::Dynamic);

        let result = Creator::execute(&mut world, CreateCommand::Body(Box::new(desc)), &AuxBuffers::new());
        assert!(matches!(result, Err(BackendError::Validation(_))));
        assert!(world.tracker.is_empty());
    }

    #[test]
    fn test_constraint_needs_both_endpoints() {
        let mut world = world();
        Creator::execute(&mut world, body(1, MotionType::Dynamic), &AuxBuffers::new()).unwrap();
        let desc = ConstraintDesc::new(ConstraintType::Fixed, 0, 1, 2);

        let result = Creator::execute(&mut world, CreateCommand::Constraint(Box::new(desc.clone())), &AuxBuffers::new());
        assert!(matches!(result, Err(BackendError::MissingBody(2))));
        assert!(world.constraints.is_empty());

        Creator::execute(&mut world, body(2, MotionType::Dynamic), &AuxBuffers::new()).unwrap();
        Creator::execute(&mut world, CreateCommand::Constraint(Box::new(desc)), &AuxBuffers::new()).unwrap();
        let handle1 = world.tracker.handle_of(1).unwrap();
        let handle2 = world.tracker.handle_of(2).unwrap();
        assert_eq!(world.constraints.of_body(handle1), &[0]);
        assert_eq!(world.constraints.of_body(handle2), &[0]);
    }

    #[test]
    fn test_character_is_tracked_as_character() {
        let mut world = world();
        let desc = CharacterDesc::new(9, ShapeSettings::capsule(0.5, 0.3));
        Creator::execute(&mut world, CreateCommand::Character(Box::new(desc)), &AuxBuffers::new()).unwrap();

        let handle = world.tracker.handle_of(9).unwrap();
        assert!(world.tracker.is_character(handle));
        assert_eq!(world.engine.body_kind(handle), Some(BodyKind::Character));
    }

    #[test]
    fn test_shape_registry_and_groups() {
        let mut world = world();
        let shape = CreateCommand::Shape {
            index: 3,
            settings: ShapeSettings::sphere(0.5),
        };
        Creator::execute(&mut world, shape.clone(), &AuxBuffers::new()).unwrap();
        Creator::execute(&mut world, shape, &AuxBuffers::new()).unwrap();
        // Re-registering an index releases the old shape
        assert_eq!(world.shapes.len(), 1);
        assert_eq!(world.engine.shape_count(), 1);

        Creator::execute(&mut world, CreateCommand::Groups(vec![2, 4]), &AuxBuffers::new()).unwrap();
        assert!(world.engine.toggle_group_pair(1, 0, 3, false).is_ok());
    }
}
