//! # Operators
//!
//! One dispatcher per command family. Each owns one quadrant of the
//! command space and works on the shared [`World`].
//!
//! ```text
//! Command ─┬─ Create ──→ Creator   bind pcid, register, cross-link
//!          ├─ Modify ──→ Modifier  resolve pcid, apply one mutation
//!          ├─ Query  ──→ Querier   cast, stage a tagged result
//!          └─ Clean  ──→ Cleaner   cascading, idempotent destroy
//! ```
//!
//! A returned error fails only the command that raised it; the decoder
//! has already consumed its whole payload.

pub mod cleaner;
pub mod creator;
pub mod modifier;
pub mod querier;

use physbridge_core::{AuxBuffers, Quat, Vec3, WireMap};
use physbridge_protocol::{Command, Response, ShapeGeometry, ShapeSettings};

use crate::constraints::ConstraintTable;
use crate::drawer::DebugDrawer;
use crate::engine::{BodyHandle, PhysicsEngine, ShapeHandle};
use crate::error::{BackendError, BackendResult, EngineError};
use crate::motion_state::MotionStates;
use crate::tracker::Tracker;

pub use cleaner::Cleaner;
pub use creator::Creator;
pub use modifier::Modifier;
pub use querier::Querier;

/// Everything the operators read and write.
#[derive(Debug)]
pub struct World<E: PhysicsEngine> {
    /// The solver.
    pub engine: E,
    /// Pcid to handle bindings.
    pub tracker: Tracker,
    /// Registered shapes by wire index.
    pub shapes: WireMap<ShapeHandle>,
    /// Registered constraints and vehicles by wire index.
    pub constraints: ConstraintTable,
    /// Interpolation state of bodies that asked for it.
    pub motion_states: MotionStates,
    /// Debug triangle cache.
    pub drawer: DebugDrawer,
    /// Responses produced while executing commands.
    pub staged: Vec<Response>,
    /// Check command values before they reach the engine.
    pub validate: bool,
    /// Honour debug draw requests.
    pub debug_draw: bool,
}

impl<E: PhysicsEngine> World<E> {
    /// Wraps an engine with empty registries.
    pub fn new(engine: E, validate: bool, debug_draw: bool) -> Self {
        Self {
            engine,
            tracker: Tracker::new(),
            shapes: WireMap::new(),
            constraints: ConstraintTable::new(),
            motion_states: MotionStates::new(),
            drawer: DebugDrawer::new(),
            staged: Vec::new(),
            validate,
            debug_draw,
        }
    }

    /// Executes one decoded command.
    ///
    /// # Errors
    ///
    /// The failure of that command only.
    pub fn execute(&mut self, command: Command, aux: &AuxBuffers) -> BackendResult<()> {
        match command {
            Command::Create(command) => Creator::execute(self, command, aux),
            Command::Modify(command) => Modifier::execute(self, command, aux),
            Command::Query(command) => Querier::execute(self, command),
            Command::Clean(command) => {
                Cleaner::execute(self, command);
                Ok(())
            }
        }
    }

    /// Binds `pcid` to a freshly created handle.
    ///
    /// The movement set is chosen from the engine's view of the body.
    pub(crate) fn track(
        &mut self,
        handle: BodyHandle,
        pcid: u32,
        debug_draw: bool,
        use_motion_state: bool,
    ) -> BackendResult<()> {
        let kind = self
            .engine
            .body_kind(handle)
            .ok_or(EngineError::InvalidHandle(handle.raw()))?;
        self.tracker.add(handle, pcid, kind, debug_draw && self.debug_draw);
        if use_motion_state {
            if let Some(state) = self.engine.body_state(handle) {
                self.motion_states.insert(handle, state.isometry());
            }
        }
        Ok(())
    }

    /// Fails with [`BackendError::DuplicateBody`] if `pcid` is alive.
    pub(crate) fn ensure_free(&self, pcid: u32) -> BackendResult<()> {
        if self.tracker.contains(pcid) {
            return Err(BackendError::DuplicateBody(pcid));
        }
        Ok(())
    }

    /// Builds a one-off shape from inline settings and hands it to `apply`.
    ///
    /// The backend's reference is released whatever `apply` returns.
    pub(crate) fn with_shape<T>(
        &mut self,
        settings: &ShapeSettings,
        aux: &AuxBuffers,
        apply: impl FnOnce(&mut E, ShapeHandle) -> Result<T, EngineError>,
    ) -> BackendResult<T> {
        self.check_shape(settings)?;
        let shape = self.engine.create_shape(settings, aux)?;
        let result = apply(&mut self.engine, shape);
        self.engine.release_shape(shape);
        Ok(result?)
    }

    // =========================================================================
    // VALIDATION (debug builds)
    // =========================================================================

    pub(crate) fn check_vec3(&self, what: &str, value: Vec3) -> BackendResult<()> {
        if self.validate && !value.is_finite() {
            return Err(BackendError::Validation(format!("{what} is not finite: {value:?}")));
        }
        Ok(())
    }

    pub(crate) fn check_quat(&self, what: &str, value: Quat) -> BackendResult<()> {
        if self.validate && !value.is_finite() {
            return Err(BackendError::Validation(format!("{what} is not finite: {value:?}")));
        }
        Ok(())
    }

    pub(crate) fn check_scalar(&self, what: &str, value: f32) -> BackendResult<()> {
        if self.validate && !value.is_finite() {
            return Err(BackendError::Validation(format!("{what} is not finite: {value}")));
        }
        Ok(())
    }

    pub(crate) fn check_positive(&self, what: &str, value: f32) -> BackendResult<()> {
        if self.validate && !(value.is_finite() && value > 0.0) {
            return Err(BackendError::Validation(format!("{what} must be positive, got {value}")));
        }
        Ok(())
    }

    pub(crate) fn check_shape(&self, settings: &ShapeSettings) -> BackendResult<()> {
        if !self.validate {
            return Ok(());
        }
        match &settings.geometry {
            ShapeGeometry::Box {
                half_extent,
                convex_radius,
            } => {
                self.check_positive("box half extent x", half_extent.x)?;
                self.check_positive("box half extent y", half_extent.y)?;
                self.check_positive("box half extent z", half_extent.z)?;
                self.check_scalar("box convex radius", *convex_radius)?;
            }
            ShapeGeometry::Capsule { half_height, radius } => {
                self.check_positive("capsule half height", *half_height)?;
                self.check_positive("capsule radius", *radius)?;
            }
            ShapeGeometry::Cylinder {
                half_height, radius, ..
            } => {
                self.check_positive("cylinder half height", *half_height)?;
                self.check_positive("cylinder radius", *radius)?;
            }
            ShapeGeometry::Sphere { radius } => self.check_positive("sphere radius", *radius)?,
            ShapeGeometry::StaticCompound(children) | ShapeGeometry::MutableCompound(children) => {
                for child in children {
                    self.check_vec3("compound child position", child.position)?;
                    self.check_quat("compound child rotation", child.rotation)?;
                    self.check_shape(&child.shape)?;
                }
            }
            ShapeGeometry::Mesh(_) | ShapeGeometry::ConvexHull(_) | ShapeGeometry::HeightField(_) => {}
        }
        if let Some(scale) = settings.scale {
            self.check_vec3("shape scale", scale)?;
        }
        if let Some(density) = settings.density {
            self.check_positive("shape density", density)?;
        }
        if let Some((position, rotation)) = settings.offset {
            self.check_vec3("shape offset", position)?;
            self.check_quat("shape offset rotation", rotation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SandboxEngine;

    fn world(validate: bool) -> World<SandboxEngine> {
        World::new(SandboxEngine::default(), validate, true)
    }

    #[test]
    fn test_validation_only_when_enabled() {
        let bad = ShapeSettings::sphere(-1.0);
        assert!(matches!(world(true).check_shape(&bad), Err(BackendError::Validation(_))));
        assert!(world(false).check_shape(&bad).is_ok());

        let nan = Vec3::new(f32::NAN, 0.0, 0.0);
        assert!(world(true).check_vec3("position", nan).is_err());
        assert!(world(false).check_vec3("position", nan).is_ok());
    }

    #[test]
    fn test_compound_children_are_checked() {
        let child = ShapeSettings::cuboid(Vec3::new(1.0, 0.0, 1.0)).as_child();
        let compound = ShapeSettings::new(ShapeGeometry::StaticCompound(vec![
            physbridge_protocol::CompoundChild {
                shape: child,
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
            },
        ]));
        assert!(world(true).check_shape(&compound).is_err());
    }

    #[test]
    fn test_with_shape_releases_reference() {
        let mut world = world(true);
        let count = world
            .with_shape(&ShapeSettings::sphere(1.0), &AuxBuffers::new(), |engine, _| {
                Ok(engine.shape_count())
            })
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(world.engine.shape_count(), 0);
    }
}
