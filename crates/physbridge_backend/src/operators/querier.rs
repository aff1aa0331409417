//! # Querier
//!
//! Ray and shape casts. Results are staged with the caller's callback
//! index and written before the tick's other records.
//!
//! A failed query still stages an empty result so the caller's callback
//! is always answered.

use physbridge_protocol::{QueryCommand, QueryHit, QueryResult, RayCast, Response, ShapeCast};

use super::World;
use crate::engine::{PhysicsEngine, RawHit};
use crate::error::{BackendError, BackendResult};

/// Querier family dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Querier;

impl Querier {
    /// Executes one query and stages its result.
    ///
    /// # Errors
    ///
    /// Invalid casts, unknown shape indices and engine refusals.
    pub fn execute<E: PhysicsEngine>(world: &mut World<E>, command: QueryCommand) -> BackendResult<()> {
        let (callback, first_only) = match &command {
            QueryCommand::CastRay(ray) => (ray.callback, ray.first_only.unwrap_or(false)),
            QueryCommand::CastShape(cast) => (cast.callback, cast.first_only.unwrap_or(false)),
        };

        let mut raw = Vec::new();
        let outcome = match &command {
            QueryCommand::CastRay(ray) => cast_ray(world, ray, &mut raw),
            QueryCommand::CastShape(cast) => cast_shape(world, cast, &mut raw),
        };
        if outcome.is_err() {
            raw.clear();
        }

        let hits = raw
            .iter()
            .filter_map(|hit| {
                world.tracker.pcid_of(hit.body).map(|pcid| QueryHit {
                    pcid,
                    point: hit.point,
                    normal: hit.normal,
                })
            })
            .collect::<Vec<_>>();
        tracing::trace!("Query {} found {} hits", callback, hits.len());

        world.staged.push(Response::QueryResult(QueryResult {
            callback,
            first_only,
            hits,
        }));
        outcome
    }
}

fn cast_ray<E: PhysicsEngine>(world: &World<E>, ray: &RayCast, out: &mut Vec<RawHit>) -> BackendResult<()> {
    world.check_vec3("ray origin", ray.origin)?;
    world.check_vec3("ray direction", ray.direction)?;
    world.engine.cast_ray(ray, out)?;
    Ok(())
}

fn cast_shape<E: PhysicsEngine>(world: &World<E>, cast: &ShapeCast, out: &mut Vec<RawHit>) -> BackendResult<()> {
    let shape = *world
        .shapes
        .get(cast.shape_index)
        .ok_or(BackendError::MissingShape(cast.shape_index))?;
    world.check_vec3("cast position", cast.position)?;
    world.check_quat("cast rotation", cast.rotation)?;
    world.check_vec3("cast direction", cast.direction)?;
    world.engine.cast_shape(cast, shape, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SandboxEngine;
    use crate::operators::Creator;
    use physbridge_core::{AuxBuffers, Quat, Vec3};
    use physbridge_protocol::{BodyDesc, CreateCommand, MotionType, ShapeSettings};

    fn world() -> World<SandboxEngine> {
        let mut world = World::new(SandboxEngine::default(), true, false);
        for (pcid, x) in [(1u32, 5.0f32), (2, 10.0)] {
            let desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::ONE), MotionType::Static).at(Vec3::new(x, 0.0, 0.0));
            Creator::execute(&mut world, CreateCommand::Body(Box::new(desc)), &AuxBuffers::new()).unwrap();
        }
        world
    }

    fn ray(first_only: bool) -> RayCast {
        RayCast {
            callback: 6,
            origin: Vec3::ZERO,
            direction: Vec3::new(20.0, 0.0, 0.0),
            first_only: Some(first_only),
            calculate_normal: Some(true),
            ignore_back_faces: None,
            treat_convex_as_solid: None,
        }
    }

    fn staged_result(world: &World<SandboxEngine>) -> &QueryResult {
        match world.staged.last() {
            Some(Response::QueryResult(result)) => result,
            other => panic!("expected a query result, got {other:?}"),
        }
    }

    #[test]
    fn test_ray_hits_resolved_to_pcids() {
        let mut world = world();
        Querier::execute(&mut world, QueryCommand::CastRay(ray(false))).unwrap();

        let result = staged_result(&world);
        assert_eq!(result.callback, 6);
        assert_eq!(result.hits.iter().map(|h| h.pcid).collect::<Vec<_>>(), vec![1, 2]);
        assert!((result.hits[0].point.x - 4.0).abs() < 1e-4);
        assert_eq!(result.hits[0].normal, Some(Vec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_first_only() {
        let mut world = world();
        Querier::execute(&mut world, QueryCommand::CastRay(ray(true))).unwrap();

        let result = staged_result(&world);
        assert!(result.first_only);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].pcid, 1);
    }

    #[test]
    fn test_missing_shape_still_answers() {
        let mut world = world();
        let cast = ShapeCast {
            callback: 2,
            shape_index: 40,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            direction: Vec3::new(20.0, 0.0, 0.0),
            scale: None,
            offset: None,
            back_face_mode: None,
            first_only: None,
            calculate_normal: None,
        };

        let result = Querier::execute(&mut world, QueryCommand::CastShape(cast));
        assert!(matches!(result, Err(BackendError::MissingShape(40))));
        let staged = staged_result(&world);
        assert_eq!(staged.callback, 2);
        assert!(staged.hits.is_empty());
    }
}
