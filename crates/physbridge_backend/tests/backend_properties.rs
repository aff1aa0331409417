//! Backend properties exercised through the full command path.

use physbridge_backend::{
    Backend, BackendConfig, BackendError, BodyHandle, BodyKind, BodyState, ConstraintHandle, EngineError,
    EngineResult, GroundInfo, Inbound, PhysicsEngine, RawContact, RawHit, SandboxEngine, ShapeHandle, StepOutput,
    TickOutcome,
};
use physbridge_core::{AuxBuffers, CommandsBuffer, Quat, Vec3};
use physbridge_protocol::{
    BodyDesc, BodyMutation, CharacterDesc, CharacterMutation, CleanCommand, Command, ConstraintDesc,
    ConstraintMutation, ConstraintType, CreateCommand, ModifyCommand, MotionType, RayCast, ShapeSettings,
};

const STEP: f32 = 1.0 / 60.0;

// =============================================================================
// COUNTING ENGINE
// =============================================================================

/// Sandbox engine that counts steps and can be told to fail them.
#[derive(Debug, Default)]
struct CountingEngine {
    inner: SandboxEngine,
    steps: u32,
    fail_step: bool,
}

impl PhysicsEngine for CountingEngine {
    fn create_shape(&mut self, settings: &ShapeSettings, aux: &AuxBuffers) -> EngineResult<ShapeHandle> {
        self.inner.create_shape(settings, aux)
    }

    fn release_shape(&mut self, shape: ShapeHandle) {
        self.inner.release_shape(shape);
    }

    fn create_group_table(&mut self, sub_groups: u32) -> EngineResult<u32> {
        self.inner.create_group_table(sub_groups)
    }

    fn toggle_group_pair(&mut self, group: u32, sub_group1: u32, sub_group2: u32, enable: bool) -> EngineResult<()> {
        self.inner.toggle_group_pair(group, sub_group1, sub_group2, enable)
    }

    fn create_body(&mut self, desc: &BodyDesc, shape: ShapeHandle) -> EngineResult<BodyHandle> {
        self.inner.create_body(desc, shape)
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        self.inner.destroy_body(body);
    }

    fn body_kind(&self, body: BodyHandle) -> Option<BodyKind> {
        self.inner.body_kind(body)
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.inner.body_state(body)
    }

    fn active_bodies(&self, out: &mut Vec<BodyHandle>) {
        self.inner.active_bodies(out);
    }

    fn activate_body(&mut self, body: BodyHandle) {
        self.inner.activate_body(body);
    }

    fn apply(&mut self, body: BodyHandle, mutation: &BodyMutation) -> EngineResult<()> {
        self.inner.apply(body, mutation)
    }

    fn set_shape(&mut self, body: BodyHandle, shape: ShapeHandle) -> EngineResult<()> {
        self.inner.set_shape(body, shape)
    }

    fn add_child_shape(
        &mut self,
        body: BodyHandle,
        shape: ShapeHandle,
        position: Vec3,
        rotation: Quat,
        user_data: u32,
    ) -> EngineResult<()> {
        self.inner.add_child_shape(body, shape, position, rotation, user_data)
    }

    fn remove_child_shape(&mut self, body: BodyHandle, child: u32) -> EngineResult<()> {
        self.inner.remove_child_shape(body, child)
    }

    fn modify_child_shape(
        &mut self,
        body: BodyHandle,
        child: u32,
        position: Vec3,
        rotation: Quat,
        shape: Option<ShapeHandle>,
    ) -> EngineResult<()> {
        self.inner.modify_child_shape(body, child, position, rotation, shape)
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.inner.set_gravity(gravity);
    }

    fn gravity(&self) -> Vec3 {
        self.inner.gravity()
    }

    fn create_constraint(
        &mut self,
        desc: &ConstraintDesc,
        body1: BodyHandle,
        body2: BodyHandle,
    ) -> EngineResult<ConstraintHandle> {
        self.inner.create_constraint(desc, body1, body2)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintHandle) {
        self.inner.destroy_constraint(constraint);
    }

    fn modify_constraint(&mut self, constraint: ConstraintHandle, mutation: &ConstraintMutation) -> EngineResult<()> {
        self.inner.modify_constraint(constraint, mutation)
    }

    fn create_character(&mut self, desc: &CharacterDesc, shape: ShapeHandle) -> EngineResult<BodyHandle> {
        self.inner.create_character(desc, shape)
    }

    fn update_character(&mut self, character: BodyHandle, dt: f32) -> EngineResult<()> {
        self.inner.update_character(character, dt)
    }

    fn modify_character(&mut self, character: BodyHandle, mutation: &CharacterMutation) -> EngineResult<()> {
        self.inner.modify_character(character, mutation)
    }

    fn set_character_shape(&mut self, character: BodyHandle, shape: ShapeHandle) -> EngineResult<bool> {
        self.inner.set_character_shape(character, shape)
    }

    fn character_ground(&self, character: BodyHandle) -> Option<GroundInfo> {
        self.inner.character_ground(character)
    }

    fn step(&mut self, dt: f32, sub_steps: u32) -> EngineResult<()> {
        if self.fail_step {
            return Err(EngineError::StepFailed("solver diverged".to_string()));
        }
        self.steps += 1;
        self.inner.step(dt, sub_steps)
    }

    fn drain_contacts(&mut self, out: &mut Vec<RawContact>) {
        self.inner.drain_contacts(out);
    }

    fn cast_ray(&self, ray: &RayCast, out: &mut Vec<RawHit>) -> EngineResult<()> {
        self.inner.cast_ray(ray, out)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn backend(engine: CountingEngine) -> Backend<CountingEngine> {
    Backend::new(engine, BackendConfig::default()).unwrap()
}

fn inbound(commands: Vec<Command>) -> Inbound {
    let mut buffer = CommandsBuffer::default();
    for command in commands {
        command.encode(&mut buffer).unwrap();
    }
    Inbound::take(&mut buffer)
}

fn run(backend: &mut Backend<CountingEngine>, commands: Vec<Command>) -> StepOutput {
    match backend.step(Some(inbound(commands)), STEP).unwrap() {
        TickOutcome::Ran(output) => output,
        other => panic!("tick did not run: {other:?}"),
    }
}

fn body(pcid: u32, x: f32) -> Command {
    let desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::ONE), MotionType::Dynamic).at(Vec3::new(x, 10.0, 0.0));
    Command::Create(CreateCommand::Body(Box::new(desc)))
}

fn destroy(pcid: u32) -> Command {
    Command::Clean(CleanCommand::DestroyBody(pcid))
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[test]
fn test_idempotent_destroy() {
    let mut backend = backend(CountingEngine::default());
    run(&mut backend, vec![body(1, 0.0), body(2, 5.0)]);

    let impulse = Command::Modify(ModifyCommand::Body {
        pcid: 1,
        mutation: BodyMutation::AddImpulse {
            impulse: Vec3::Y,
            offset: None,
        },
    });
    let output = run(&mut backend, vec![destroy(1), destroy(1), impulse]);

    assert!(output.is_ok());
    assert!(!backend.world().tracker.contains(1));
    assert!(backend.world().tracker.contains(2));
    let handle = backend.world().tracker.handle_of(2).unwrap();
    assert!(backend.world().engine.body_state(handle).is_some());
}

#[test]
fn test_tracker_bijection() {
    let mut backend = backend(CountingEngine::default());
    run(&mut backend, (0..20).map(|pcid| body(pcid, pcid as f32 * 3.0)).collect());
    run(&mut backend, (0..20).step_by(3).map(destroy).collect());
    run(&mut backend, vec![body(3, 100.0), body(6, 110.0)]);

    let tracker = &backend.world().tracker;
    assert!(tracker.is_consistent());
    assert_eq!(tracker.len(), 15);
    for (handle, pcid) in tracker.iter() {
        assert_eq!(tracker.handle_of(pcid), Some(handle));
    }
}

#[test]
fn test_constraint_cascade() {
    let mut backend = backend(CountingEngine::default());
    let link = Command::Create(CreateCommand::Constraint(Box::new(ConstraintDesc::new(
        ConstraintType::Fixed,
        4,
        1,
        2,
    ))));
    run(&mut backend, vec![body(1, 0.0), body(2, 3.0), link]);
    let b = backend.world().tracker.handle_of(2).unwrap();
    assert_eq!(backend.world().constraints.of_body(b), &[4]);

    run(&mut backend, vec![destroy(1)]);

    let world = backend.world();
    assert!(world.constraints.of_body(b).is_empty());
    assert!(world.constraints.get(4).is_none());
    assert!(world.engine.inner.is_awake(b));
    assert!(world.engine.body_state(b).is_some());
}

#[test]
fn test_fixed_step_exactness() {
    let mut backend = backend(CountingEngine::default());
    for _ in 0..3 {
        run(&mut backend, Vec::new());
    }

    assert_eq!(backend.world().engine.steps, 3);
    assert_eq!(backend.step_count(), 3);
    assert!(backend.clock().accumulator().abs() < 1e-9);
}

#[test]
fn test_fatal_halt() {
    let mut backend = backend(CountingEngine {
        fail_step: true,
        ..CountingEngine::default()
    });

    let result = backend.step(Some(inbound(vec![body(1, 0.0)])), STEP);
    assert!(matches!(result, Err(BackendError::Engine(EngineError::StepFailed(_)))));
    assert!(backend.is_halted());
    assert_eq!(backend.world().tracker.len(), 1);

    for _ in 0..3 {
        let outcome = backend.step(Some(inbound(vec![body(2, 5.0)])), STEP).unwrap();
        assert!(matches!(outcome, TickOutcome::Halted));
    }
    assert!(!backend.world().tracker.contains(2));
    assert_eq!(backend.world().engine.steps, 0);
}

#[test]
fn test_unknown_operator_is_fatal() {
    let mut backend = backend(CountingEngine::default());
    let mut buffer = CommandsBuffer::default();
    buffer.write_operator(9);
    buffer.write_command(0);

    let result = backend.step(Some(Inbound::take(&mut buffer)), STEP);
    assert!(matches!(result, Err(BackendError::Protocol(_))));
    assert!(backend.is_halted());
}

#[test]
fn test_halt_on_command_failure() {
    let config = BackendConfig {
        halt_on_command_failure: true,
        ..BackendConfig::default()
    };
    let mut backend = Backend::new(CountingEngine::default(), config).unwrap();

    let result = backend.step(Some(inbound(vec![body(1, 0.0), body(1, 0.0)])), STEP);
    assert!(matches!(result, Err(BackendError::DuplicateBody(1))));
    assert!(backend.is_halted());
}

#[test]
fn test_shutdown_destroys_everything() {
    let mut backend = backend(CountingEngine::default());
    run(&mut backend, vec![body(1, 0.0), body(2, 3.0)]);

    let engine = backend.shutdown();
    assert_eq!(engine.inner.body_count(), 0);
}
