//! # Cleaner
//!
//! Destroys bodies, shapes and constraints. Every destroy is total and
//! idempotent: an absent target is a no-op.
//!
//! Destroying a body cascades, in order:
//! 1. debug draw cache
//! 2. constraints on either endpoint (the other endpoint is woken)
//! 3. motion state
//! 4. tracker binding
//! 5. engine handle

use physbridge_protocol::CleanCommand;

use super::World;
use crate::engine::{BodyHandle, PhysicsEngine};

/// Cleaner family dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaner;

impl Cleaner {
    /// Executes one cleaner command. Never fails.
    pub fn execute<E: PhysicsEngine>(world: &mut World<E>, command: CleanCommand) {
        match command {
            CleanCommand::DestroyBody(pcid) => {
                if let Some(handle) = world.tracker.handle_of(pcid) {
                    destroy_body(world, handle);
                    tracing::debug!("Body {} destroyed", pcid);
                }
            }
            CleanCommand::DestroyShape(index) => {
                if let Some(shape) = world.shapes.remove(index) {
                    world.engine.release_shape(shape);
                }
            }
            CleanCommand::DestroyConstraint(index) => {
                if let Some(entry) = world.constraints.remove(index) {
                    world.engine.destroy_constraint(entry.handle);
                    world.engine.activate_body(entry.body1);
                    if let Some(body2) = entry.body2 {
                        world.engine.activate_body(body2);
                    }
                }
            }
        }
    }

    /// Destroys every tracked body and registered object, then empties all
    /// backend state.
    pub fn clear<E: PhysicsEngine>(world: &mut World<E>) {
        let handles: Vec<BodyHandle> = world.tracker.iter().map(|(handle, _)| handle).collect();
        let bodies = handles.len();
        for handle in handles {
            destroy_body(world, handle);
        }
        for (_, entry) in world.constraints.drain() {
            world.engine.destroy_constraint(entry.handle);
        }
        for (_, shape) in world.shapes.drain() {
            world.engine.release_shape(shape);
        }

        world.motion_states.clear();
        world.drawer.clear();
        world.tracker.clear();
        world.staged.clear();
        tracing::info!("World cleared, {} bodies destroyed", bodies);
    }
}

fn destroy_body<E: PhysicsEngine>(world: &mut World<E>, handle: BodyHandle) {
    world.drawer.invalidate(handle);

    for (_, entry) in world.constraints.detach_body(handle) {
        world.engine.destroy_constraint(entry.handle);
        if let Some(other) = entry.other(handle) {
            world.engine.activate_body(other);
        }
    }

    world.motion_states.remove(handle);
    world.tracker.stop_tracking(handle);
    world.engine.destroy_body(handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SandboxEngine;
    use crate::operators::Creator;
    use physbridge_core::{AuxBuffers, Vec3};
    use physbridge_protocol::{BodyDesc, ConstraintDesc, ConstraintType, CreateCommand, MotionType, ShapeSettings};

    fn world() -> World<SandboxEngine> {
        let mut world = World::new(SandboxEngine::new(Vec3::ZERO, vec![[1, 1]]), true, true);
        for (pcid, x) in [(1u32, 0.0f32), (2, 3.0), (3, 6.0)] {
            let mut desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::ONE), MotionType::Dynamic).at(Vec3::new(x, 0.0, 0.0));
            desc.debug_draw = true;
            Creator::execute(&mut world, CreateCommand::Body(Box::new(desc)), &AuxBuffers::new()).unwrap();
        }
        let link = ConstraintDesc::new(ConstraintType::Distance, 0, 1, 2);
        Creator::execute(&mut world, CreateCommand::Constraint(Box::new(link)), &AuxBuffers::new()).unwrap();
        world
    }

    #[test]
    fn test_destroy_body_cascades() {
        let mut world = world();
        let b = world.tracker.handle_of(2).unwrap();

        Cleaner::execute(&mut world, CleanCommand::DestroyBody(1));

        assert!(!world.tracker.contains(1));
        assert!(world.constraints.of_body(b).is_empty());
        assert_eq!(world.engine.constraint_count(), 0);
        assert!(world.engine.is_awake(b));
        assert!(world.engine.body_state(b).is_some());
        assert_eq!(world.engine.body_count(), 2);
        assert!(world.tracker.is_consistent());
    }

    #[test]
    fn test_double_destroy_is_noop() {
        let mut world = world();
        Cleaner::execute(&mut world, CleanCommand::DestroyBody(2));
        Cleaner::execute(&mut world, CleanCommand::DestroyBody(2));
        Cleaner::execute(&mut world, CleanCommand::DestroyConstraint(0));
        Cleaner::execute(&mut world, CleanCommand::DestroyShape(7));

        assert_eq!(world.tracker.len(), 2);
        assert!(world.tracker.contains(1) && world.tracker.contains(3));
    }

    #[test]
    fn test_destroy_constraint_and_shape() {
        let mut world = world();
        let shape = CreateCommand::Shape {
            index: 0,
            settings: ShapeSettings::sphere(1.0),
        };
        Creator::execute(&mut world, shape, &AuxBuffers::new()).unwrap();

        Cleaner::execute(&mut world, CleanCommand::DestroyConstraint(0));
        Cleaner::execute(&mut world, CleanCommand::DestroyShape(0));

        assert!(world.constraints.is_empty());
        assert_eq!(world.engine.constraint_count(), 0);
        assert!(world.shapes.is_empty());
        assert_eq!(world.engine.shape_count(), 0);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut world = world();
        Cleaner::clear(&mut world);

        assert!(world.tracker.is_empty());
        assert!(world.constraints.is_empty());
        assert!(world.motion_states.is_empty());
        assert_eq!(world.engine.body_count(), 0);
        assert_eq!(world.engine.constraint_count(), 0);
        assert_eq!(world.drawer.cached(), 0);
    }
}
