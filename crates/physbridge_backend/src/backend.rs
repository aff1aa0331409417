//! # Backend
//!
//! The simulation side of the bridge. One call to [`Backend::step`] is one
//! tick.
//!
//! ```text
//! inbound bytes ──→ decode ──→ operators ──→ World
//!                                              │
//!            fixed clock: characters, engine step (× n)
//!                                              │
//! outbound bytes ←── staged, contacts, character contacts,
//!                    transforms, characters (+ debug draw views)
//! ```
//!
//! ## Failure
//!
//! A command that fails is logged and counted; the rest of the tick runs.
//! A stream that cannot be decoded, an engine step that fails or an
//! outbound buffer that refuses a record halts the backend for good.

use physbridge_core::{AuxBuffers, CommandsBuffer, Isometry};
use physbridge_protocol::{
    BodyTransform, CharacterState, Command, DebugDrawView, GroundState, GroundSupport, IsometryUpdate, ProtocolResult,
    Response,
};

use crate::clock::FixedClock;
use crate::config::BackendConfig;
use crate::engine::{BodyHandle, PhysicsEngine};
use crate::error::BackendResult;
use crate::listener::{ContactFilter, ContactListener};
use crate::motion_state::MotionStates;
use crate::operators::{Cleaner, World};

// =============================================================================
// TICK INPUT / OUTPUT
// =============================================================================

/// A commands buffer handed over to the backend.
#[derive(Debug, Default)]
pub struct Inbound {
    /// Encoded commands, header included.
    pub bytes: Vec<u8>,
    /// Side buffers the commands reference.
    pub aux: AuxBuffers,
}

impl Inbound {
    /// Wraps received bytes and side buffers.
    #[must_use]
    pub const fn new(bytes: Vec<u8>, aux: AuxBuffers) -> Self {
        Self { bytes, aux }
    }

    /// Takes the contents of a filled commands buffer, leaving it empty.
    pub fn take(buffer: &mut CommandsBuffer) -> Self {
        let aux = buffer.take_aux();
        Self {
            bytes: buffer.take_bytes(),
            aux,
        }
    }
}

/// Everything one tick produced.
#[derive(Debug, Default)]
pub struct StepOutput {
    /// Encoded responses, header included.
    pub bytes: Vec<u8>,
    /// Side buffers the responses and draw views reference.
    pub aux: AuxBuffers,
    /// Engine steps run during the tick.
    pub steps: u32,
    /// Debug draw views. Empty unless debug draw is on.
    pub draw: Vec<DebugDrawView>,
    /// Commands that failed without halting the backend.
    pub failed_commands: u32,
    /// Storage of the inbound buffer, returned for reuse.
    pub recycled: Option<Vec<u8>>,
}

impl StepOutput {
    /// True if every command of the tick succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.failed_commands == 0
    }

    /// Decodes the response records.
    ///
    /// # Errors
    ///
    /// The first record that fails to decode.
    pub fn responses(&self) -> ProtocolResult<Vec<Response>> {
        let mut buffer = CommandsBuffer::from_bytes(self.bytes.clone());
        Response::decode_all(&mut buffer)
    }
}

/// What a call to [`Backend::step`] did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A previous failure halted the backend. Nothing ran.
    Halted,
    /// No commands buffer was ever attached. Nothing ran.
    Idle,
    /// The tick ran.
    Ran(StepOutput),
}

impl TickOutcome {
    /// Output of a tick that ran.
    #[must_use]
    pub fn into_output(self) -> Option<StepOutput> {
        match self {
            Self::Ran(output) => Some(output),
            Self::Halted | Self::Idle => None,
        }
    }
}

/// Counters over the backend's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Ticks that ran.
    pub ticks: u64,
    /// Commands decoded.
    pub commands: u64,
    /// Commands that failed.
    pub failed_commands: u64,
}

// =============================================================================
// BACKEND
// =============================================================================

/// Runs a [`PhysicsEngine`] behind the command protocol.
#[derive(Debug)]
pub struct Backend<E: PhysicsEngine> {
    config: BackendConfig,
    world: World<E>,
    clock: FixedClock,
    listener: ContactListener,
    inbound: CommandsBuffer,
    outbound: CommandsBuffer,
    attached: bool,
    fatal: bool,
    stats: BackendStats,
}

impl<E: PhysicsEngine> Backend<E> {
    /// Wraps `engine`.
    ///
    /// # Errors
    ///
    /// [`BackendError::Config`](crate::BackendError::Config) for an invalid
    /// configuration.
    pub fn new(engine: E, config: BackendConfig) -> BackendResult<Self> {
        config.validate()?;

        let world = World::new(engine, cfg!(debug_assertions), config.debug_draw);
        let backend = Self {
            clock: FixedClock::from_config(&config),
            listener: ContactListener::new(ContactFilter::from_config(&config)),
            inbound: CommandsBuffer::with_growth(config.commands_buffer_size, config.allow_buffer_growth),
            outbound: CommandsBuffer::with_growth(config.out_buffer_size, config.allow_buffer_growth),
            attached: false,
            fatal: false,
            stats: BackendStats::default(),
            world,
            config,
        };

        tracing::info!(
            "Backend created: step {}s, {} sub steps, debug draw {}",
            backend.config.fixed_step,
            backend.config.sub_steps,
            backend.config.debug_draw
        );
        Ok(backend)
    }

    /// Runs one tick.
    ///
    /// `inbound` is executed before time advances. Without it the tick only
    /// advances time, once a buffer has been attached at least once.
    ///
    /// # Errors
    ///
    /// The failure that halted the backend. Later calls return
    /// [`TickOutcome::Halted`].
    pub fn step(&mut self, inbound: Option<Inbound>, dt: f32) -> BackendResult<TickOutcome> {
        if self.fatal {
            return Ok(TickOutcome::Halted);
        }

        match self.tick(inbound, dt) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.fatal = true;
                self.world.staged.clear();
                self.outbound.reset();
                tracing::error!("Backend halted: {}", error);
                Err(error)
            }
        }
    }

    /// Destroys every object and empties all state. The backend keeps
    /// running.
    pub fn clear(&mut self) {
        Cleaner::clear(&mut self.world);
        self.clock.reset();
    }

    /// Destroys every object and consumes the backend.
    pub fn shutdown(mut self) -> E {
        Cleaner::clear(&mut self.world);
        tracing::info!(
            "Backend shut down after {} steps, {} failed commands",
            self.clock.step_count(),
            self.stats.failed_commands
        );
        self.world.engine
    }

    /// True once a failure halted the backend.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.fatal
    }

    /// Total engine steps run.
    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.clock.step_count()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The simulated world.
    #[must_use]
    pub const fn world(&self) -> &World<E> {
        &self.world
    }

    /// The fixed step clock.
    #[must_use]
    pub const fn clock(&self) -> &FixedClock {
        &self.clock
    }

    /// Lifetime counters.
    #[must_use]
    pub const fn stats(&self) -> &BackendStats {
        &self.stats
    }

    // =========================================================================
    // TICK
    // =========================================================================

    fn tick(&mut self, inbound: Option<Inbound>, dt: f32) -> BackendResult<TickOutcome> {
        let mut failed_commands = 0;
        let mut recycled = None;
        if let Some(inbound) = inbound {
            self.attached = true;
            failed_commands = self.dispatch(inbound)?;
            recycled = Some(self.inbound.take_bytes());
        }
        if !self.attached {
            return Ok(TickOutcome::Idle);
        }

        let steps = self.advance(dt)?;
        let mut aux = AuxBuffers::new();
        let draw = self.serialize(steps > 0, &mut aux)?;

        let bytes = self.outbound.as_slice().to_vec();
        self.outbound.reset();
        self.stats.ticks += 1;

        Ok(TickOutcome::Ran(StepOutput {
            bytes,
            aux,
            steps,
            draw,
            failed_commands,
            recycled,
        }))
    }

    /// Executes every command of `inbound` in write order.
    fn dispatch(&mut self, inbound: Inbound) -> BackendResult<u32> {
        self.inbound.attach(inbound.bytes);
        let count = self.inbound.commands_count();

        let mut failed = 0;
        for _ in 0..count {
            let command = Command::decode(&mut self.inbound)?;
            let code = command.code();
            if let Err(error) = self.world.execute(command, &inbound.aux) {
                if error.is_stream_error() || self.config.halt_on_command_failure {
                    return Err(error);
                }
                failed += 1;
                tracing::warn!("Command {} failed: {}", code, error);
            }
        }

        self.stats.commands += u64::from(count);
        self.stats.failed_commands += u64::from(failed);
        Ok(failed)
    }

    /// Runs every whole step the clock has accumulated.
    fn advance(&mut self, dt: f32) -> BackendResult<u32> {
        if !self.clock.accumulate(dt) {
            return Ok(0);
        }

        let fixed_step = self.clock.fixed_step();
        while self.clock.next_step() {
            for character in self.world.tracker.characters() {
                self.world.engine.update_character(character, fixed_step)?;
            }
            self.world.engine.step(fixed_step, self.config.sub_steps)?;
        }
        Ok(self.clock.steps_this_tick())
    }

    /// Writes the tick's records in their fixed order.
    fn serialize(&mut self, stepped: bool, aux: &mut AuxBuffers) -> BackendResult<Vec<DebugDrawView>> {
        for response in self.world.staged.drain(..) {
            response.encode(&mut self.outbound)?;
        }

        let mut contacts = Vec::new();
        self.listener
            .collect(&mut self.world.engine, &self.world.tracker, &mut contacts);
        if !contacts.is_empty() {
            Response::Contacts(contacts).encode(&mut self.outbound)?;
        }

        let mut character_contacts = Vec::new();
        self.listener
            .collect_characters(&mut self.world.engine, &self.world.tracker, &mut character_contacts);
        if !character_contacts.is_empty() {
            Response::CharacterContacts(character_contacts).encode(&mut self.outbound)?;
        }

        let alpha = self.clock.alpha();
        self.write_transforms(alpha, stepped)?;
        self.write_characters(alpha, stepped)?;

        if !self.world.debug_draw {
            return Ok(Vec::new());
        }
        let world = &mut self.world;
        Ok(world.drawer.collect(&world.engine, &world.tracker, aux)?)
    }

    fn write_transforms(&mut self, alpha: f32, stepped: bool) -> BackendResult<()> {
        let interpolate = self.config.use_motion_states;
        let world = &mut self.world;

        let mut active = Vec::new();
        world.engine.active_bodies(&mut active);
        for handle in world.tracker.always_reported() {
            if !active.contains(&handle) {
                active.push(handle);
            }
        }
        for handle in active {
            // The caller owns this transform
            if world.tracker.isometry_update(handle) == IsometryUpdate::FrontToBack {
                continue;
            }
            let (Some(pcid), Some(state)) = (world.tracker.pcid_of(handle), world.engine.body_state(handle)) else {
                continue;
            };
            let isometry = reported(&mut world.motion_states, interpolate, handle, state.isometry(), alpha, stepped);

            let mut wheels = Vec::new();
            if let Some(vehicle) = world.constraints.vehicle_of(handle) {
                world.engine.vehicle_wheels(vehicle, &mut wheels);
            }

            Response::Transform(BodyTransform {
                pcid,
                position: isometry.position,
                rotation: isometry.rotation,
                linear_velocity: state.linear_velocity,
                angular_velocity: state.angular_velocity,
                wheels,
            })
            .encode(&mut self.outbound)?;
        }
        Ok(())
    }

    fn write_characters(&mut self, alpha: f32, stepped: bool) -> BackendResult<()> {
        let interpolate = self.config.use_motion_states;
        let world = &mut self.world;

        let mut states = Vec::new();
        for handle in world.tracker.characters() {
            let (Some(pcid), Some(body)) = (world.tracker.pcid_of(handle), world.engine.body_state(handle)) else {
                continue;
            };
            let isometry = reported(&mut world.motion_states, interpolate, handle, body.isometry(), alpha, stepped);

            let ground = world.engine.character_ground(handle);
            let support = ground
                .filter(|info| matches!(info.state, GroundState::OnGround | GroundState::OnSteepGround))
                .map(|info| GroundSupport {
                    ground: info.body.and_then(|body| world.tracker.pcid_of(body)),
                    too_steep: info.too_steep,
                    ground_velocity: info.velocity,
                    ground_normal: info.normal,
                });

            states.push(CharacterState {
                pcid,
                position: isometry.position,
                rotation: isometry.rotation,
                linear_velocity: body.linear_velocity,
                ground_state: ground.map_or(GroundState::InAir, |info| info.state),
                support,
            });
        }

        if !states.is_empty() {
            Response::Characters(states).encode(&mut self.outbound)?;
        }
        Ok(())
    }
}

/// Transform to report for a body: interpolated when it has a motion state.
fn reported(
    motion_states: &mut MotionStates,
    interpolate: bool,
    body: BodyHandle,
    engine: Isometry,
    alpha: f32,
    stepped: bool,
) -> Isometry {
    if !interpolate {
        return engine;
    }
    motion_states
        .get_mut(body)
        .map_or(engine, |state| state.update(engine, alpha, stepped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SandboxEngine;
    use physbridge_core::Vec3;
    use physbridge_protocol::{
        BodyDesc, BodyMutation, CharacterDesc, CharacterMutation, CreateCommand, ModifyCommand, MotionType,
        QueryCommand, RayCast, ShapeSettings,
    };

    fn backend() -> Backend<SandboxEngine> {
        let config = BackendConfig {
            debug_draw: true,
            ..BackendConfig::default()
        };
        Backend::new(SandboxEngine::from_config(&config), config).unwrap()
    }

    fn inbound(commands: Vec<Command>) -> Inbound {
        let mut buffer = CommandsBuffer::default();
        for command in commands {
            command.encode(&mut buffer).unwrap();
        }
        Inbound::take(&mut buffer)
    }

    fn body(pcid: u32, position: Vec3) -> Command {
        let mut desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::ONE), MotionType::Dynamic).at(position);
        desc.debug_draw = true;
        Command::Create(CreateCommand::Body(Box::new(desc)))
    }

    #[test]
    fn test_idle_until_attached() {
        let mut backend = backend();
        assert!(matches!(backend.step(None, 1.0 / 60.0).unwrap(), TickOutcome::Idle));
        assert_eq!(backend.step_count(), 0);

        let output = backend.step(Some(Inbound::default()), 1.0 / 60.0).unwrap().into_output().unwrap();
        assert_eq!(output.steps, 1);
        // Attached once is enough
        assert!(backend.step(None, 1.0 / 60.0).unwrap().into_output().is_some());
    }

    #[test]
    fn test_falling_body_reported() {
        let mut backend = backend();
        let output = backend
            .step(Some(inbound(vec![body(1, Vec3::new(0.0, 10.0, 0.0))])), 1.0 / 60.0)
            .unwrap()
            .into_output()
            .unwrap();

        assert!(output.is_ok());
        let responses = output.responses().unwrap();
        let Some(Response::Transform(transform)) = responses.first() else {
            panic!("expected a transform, got {responses:?}");
        };
        assert_eq!(transform.pcid, 1);
        assert!(transform.linear_velocity.y < 0.0);
        assert!(transform.wheels.is_empty());

        assert_eq!(output.draw.len(), 1);
        assert_eq!(output.draw[0].pcid, 1);
        assert_eq!(output.aux.len(), 1);
    }

    #[test]
    fn test_staged_responses_come_first() {
        let mut backend = backend();
        let ray = RayCast {
            callback: 3,
            origin: Vec3::new(0.0, 10.0, -5.0),
            direction: Vec3::new(0.0, 0.0, 10.0),
            first_only: None,
            calculate_normal: None,
            ignore_back_faces: None,
            treat_convex_as_solid: None,
        };
        let commands = vec![body(1, Vec3::new(0.0, 10.0, 0.0)), Command::Query(QueryCommand::CastRay(ray))];

        let output = backend.step(Some(inbound(commands)), 1.0 / 60.0).unwrap().into_output().unwrap();
        let responses = output.responses().unwrap();
        assert!(matches!(&responses[0], Response::QueryResult(result) if result.callback == 3 && result.hits.len() == 1));
        assert!(matches!(&responses[1], Response::Transform(_)));
    }

    #[test]
    fn test_failed_command_does_not_stop_tick() {
        let mut backend = backend();
        let commands = vec![body(1, Vec3::ZERO), body(1, Vec3::Y), body(2, Vec3::new(5.0, 0.0, 0.0))];

        let output = backend.step(Some(inbound(commands)), 1.0 / 60.0).unwrap().into_output().unwrap();
        assert_eq!(output.failed_commands, 1);
        assert!(!backend.is_halted());
        assert_eq!(backend.world().tracker.len(), 2);
        assert_eq!(backend.stats().failed_commands, 1);
    }

    #[test]
    fn test_character_shape_change_echoed() {
        let mut backend = backend();
        let create = Command::Create(CreateCommand::Character(Box::new(CharacterDesc::new(
            5,
            ShapeSettings::capsule(0.9, 0.3),
        ))));
        backend.step(Some(inbound(vec![create])), 0.0).unwrap();

        let change = Command::Modify(ModifyCommand::Character {
            pcid: 5,
            mutation: CharacterMutation::SetShape {
                callback: Some(12),
                shape: Box::new(ShapeSettings::capsule(0.4, 0.3)),
            },
        });
        let output = backend.step(Some(inbound(vec![change])), 0.0).unwrap().into_output().unwrap();
        let responses = output.responses().unwrap();

        assert_eq!(responses[0], Response::CharacterShapeChanged { callback: 12 });
        assert!(matches!(&responses[1], Response::Characters(states) if states[0].pcid == 5));
    }

    #[test]
    fn test_isometry_ownership_filters_transforms() {
        let mut backend = backend();
        let floor = BodyDesc::new(2, ShapeSettings::cuboid(Vec3::ONE), MotionType::Static).at(Vec3::new(0.0, -20.0, 0.0));
        let isometry = |pcid, mode| {
            Command::Modify(ModifyCommand::Body {
                pcid,
                mutation: BodyMutation::SetAutoUpdateIsometry(mode),
            })
        };
        let commands = vec![
            body(1, Vec3::new(0.0, 10.0, 0.0)),
            body(3, Vec3::new(5.0, 10.0, 0.0)),
            Command::Create(CreateCommand::Body(Box::new(floor))),
            isometry(1, IsometryUpdate::FrontToBack),
            isometry(2, IsometryUpdate::BackToFront),
        ];

        let output = backend.step(Some(inbound(commands)), 1.0 / 60.0).unwrap().into_output().unwrap();
        assert!(output.is_ok());
        let mut reported: Vec<u32> = output
            .responses()
            .unwrap()
            .iter()
            .filter_map(|response| match response {
                Response::Transform(transform) => Some(transform.pcid),
                _ => None,
            })
            .collect();
        reported.sort_unstable();
        assert_eq!(reported, vec![2, 3]);
    }

    #[test]
    fn test_extreme_table_indices_are_cheap() {
        let mut backend = backend();
        let sphere = |index| {
            Command::Create(CreateCommand::Shape {
                index,
                settings: ShapeSettings::sphere(1.0),
            })
        };
        let commands = vec![
            sphere(u32::MAX),
            sphere(3_000_000_000),
            Command::Create(CreateCommand::Groups(vec![u32::MAX, 2])),
            Command::Modify(ModifyCommand::ToggleGroupPair {
                group: 0,
                sub_group1: u32::MAX - 1,
                sub_group2: 7,
                enable: false,
            }),
            body(1, Vec3::ZERO),
            Command::Modify(ModifyCommand::Body {
                pcid: 1,
                mutation: BodyMutation::SetCustomShape(u32::MAX),
            }),
        ];

        let output = backend.step(Some(inbound(commands)), 1.0 / 60.0).unwrap().into_output().unwrap();
        assert!(output.is_ok());
        assert_eq!(backend.world().shapes.len(), 2);
    }

    #[test]
    fn test_truncated_stream_halts() {
        let mut backend = backend();
        let mut bytes = inbound(vec![body(1, Vec3::ZERO)]).bytes;
        bytes.truncate(20);

        assert!(backend.step(Some(Inbound::new(bytes, AuxBuffers::new())), 1.0 / 60.0).is_err());
        assert!(backend.is_halted());
        assert!(matches!(backend.step(None, 1.0 / 60.0).unwrap(), TickOutcome::Halted));
    }
}
