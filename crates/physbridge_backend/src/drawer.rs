//! # Debug Drawer
//!
//! Collects the triangles of every body with debug drawing enabled and
//! ships them as auxiliary buffers beside the outbound bytes.
//!
//! Triangles are in body-local space; the caller places them with the
//! body's reported transform. They are cached per handle until the body's
//! shape changes or the body is destroyed.

use std::collections::HashMap;

use physbridge_core::AuxBuffers;
use physbridge_protocol::{DebugDrawView, MotionType};

use crate::engine::{BodyHandle, BodyKind, PhysicsEngine};
use crate::error::EngineResult;
use crate::tracker::Tracker;

/// Per-handle triangle cache.
#[derive(Debug, Default)]
pub struct DebugDrawer {
    cache: HashMap<BodyHandle, Vec<f32>>,
}

impl DebugDrawer {
    /// Creates an empty drawer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the cached triangles of a body.
    pub fn invalidate(&mut self, body: BodyHandle) {
        self.cache.remove(&body);
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached bodies.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Appends one buffer per drawn body to `aux` and returns the views.
    ///
    /// # Errors
    ///
    /// Whatever the engine reports while producing triangles.
    pub fn collect<E: PhysicsEngine>(
        &mut self,
        engine: &E,
        tracker: &Tracker,
        aux: &mut AuxBuffers,
    ) -> EngineResult<Vec<DebugDrawView>> {
        let mut views = Vec::new();
        for handle in tracker.debug() {
            let (Some(pcid), Some(kind)) = (tracker.pcid_of(handle), engine.body_kind(handle)) else {
                continue;
            };
            let vertices = match self.cache.entry(handle) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let mut vertices = Vec::new();
                    engine.debug_triangles(handle, &mut vertices)?;
                    entry.insert(vertices)
                }
            };
            if vertices.is_empty() {
                continue;
            }

            let float_count = u32::try_from(vertices.len()).unwrap_or(u32::MAX);
            let buffer = aux.push(bytemuck::cast_slice::<f32, u8>(vertices).to_vec());
            views.push(DebugDrawView {
                pcid,
                motion_type: motion_type(kind),
                buffer,
                float_count,
                depth: tracker.debug_depth(handle),
            });
        }
        Ok(views)
    }
}

/// Colour class of a body. Characters draw like kinematic bodies.
const fn motion_type(kind: BodyKind) -> MotionType {
    match kind {
        BodyKind::Static => MotionType::Static,
        BodyKind::Kinematic | BodyKind::Character => MotionType::Kinematic,
        BodyKind::Dynamic => MotionType::Dynamic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SandboxEngine;
    use physbridge_core::Vec3;
    use physbridge_protocol::{BodyDesc, ShapeSettings};

    fn setup() -> (SandboxEngine, Tracker, BodyHandle) {
        let mut engine = SandboxEngine::default();
        let shape = engine
            .create_shape(&ShapeSettings::cuboid(Vec3::ONE), &AuxBuffers::new())
            .unwrap();
        let body = engine
            .create_body(&BodyDesc::new(3, ShapeSettings::cuboid(Vec3::ONE), MotionType::Dynamic), shape)
            .unwrap();
        let mut tracker = Tracker::new();
        tracker.add(body, 3, BodyKind::Dynamic, true);
        (engine, tracker, body)
    }

    #[test]
    fn test_collects_views_and_buffers() {
        let (engine, tracker, _) = setup();
        let mut drawer = DebugDrawer::new();
        let mut aux = AuxBuffers::new();

        let views = drawer.collect(&engine, &tracker, &mut aux).unwrap();

        assert_eq!(views.len(), 1);
        let view = views[0];
        assert_eq!(view.pcid, 3);
        assert_eq!(view.motion_type, MotionType::Dynamic);
        // 12 triangles of 3 vertices of 3 floats
        assert_eq!(view.float_count, 108);
        let floats = aux.f32_values(view.buffer, 0, 108).unwrap();
        assert!(floats.iter().all(|v| v.abs() <= 1.0 + f32::EPSILON));
        assert_eq!(drawer.cached(), 1);
        assert!(view.depth);
    }

    #[test]
    fn test_depth_flag_follows_tracker() {
        let (engine, mut tracker, body) = setup();
        tracker.set_debug_depth(body, false);
        let views = DebugDrawer::new()
            .collect(&engine, &tracker, &mut AuxBuffers::new())
            .unwrap();
        assert!(!views[0].depth);
    }

    #[test]
    fn test_cache_invalidation() {
        let (engine, mut tracker, body) = setup();
        let mut drawer = DebugDrawer::new();
        let mut aux = AuxBuffers::new();
        drawer.collect(&engine, &tracker, &mut aux).unwrap();

        drawer.invalidate(body);
        assert_eq!(drawer.cached(), 0);

        tracker.set_debug(body, false);
        assert!(drawer.collect(&engine, &tracker, &mut aux).unwrap().is_empty());
    }

    #[test]
    fn test_character_colour() {
        assert_eq!(motion_type(BodyKind::Character), MotionType::Kinematic);
        assert_eq!(motion_type(BodyKind::Static), MotionType::Static);
    }
}
