//! # Physics Client
//!
//! The caller side of the bridge. Encodes commands into a commands buffer,
//! hands out wire indices and decodes what the backend sends back.
//!
//! Three index tables live here:
//! - shapes, addressed by create/destroy shape and shape casts
//! - constraints and vehicles
//! - callbacks, one per pending query or character shape change
//!
//! A callback index is freed when its answer is applied.

use std::collections::HashMap;

use physbridge_backend::{Inbound, StepOutput};
use physbridge_core::{CommandsBuffer, IndexedRegistry, DEFAULT_CAPACITY};
use physbridge_protocol::{
    BodyTransform, CharacterContacts, CharacterMutation, CharacterState, CleanCommand, Command, ConstraintDesc,
    ContactEvent, CreateCommand, ModifyCommand, QueryCommand, QueryResult, RayCast, Response, ShapeCast,
    ShapeSettings, VehicleDesc,
};

use crate::error::ClientResult;

/// What a callback index is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    RayCast,
    ShapeCast,
    CharacterShape { pcid: u32 },
}

/// Something the caller should react to, decoded from one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Answer to [`PhysicsClient::cast_ray`].
    RayResult(QueryResult),
    /// Answer to [`PhysicsClient::cast_shape`].
    ShapeCastResult(QueryResult),
    /// A character finished switching shape.
    CharacterShapeChanged {
        /// Callback index returned by [`PhysicsClient::set_character_shape`].
        callback: u32,
        /// The character.
        pcid: u32,
    },
    /// Contact events of the tick.
    Contacts(Vec<ContactEvent>),
    /// Character contacts of the tick.
    CharacterContacts(Vec<CharacterContacts>),
}

/// Caller side encoder and response cache.
#[derive(Debug)]
pub struct PhysicsClient {
    commands: CommandsBuffer,
    shapes: IndexedRegistry<()>,
    constraints: IndexedRegistry<()>,
    callbacks: IndexedRegistry<Pending>,
    transforms: HashMap<u32, BodyTransform>,
    characters: HashMap<u32, CharacterState>,
}

impl PhysicsClient {
    /// Creates a client with a growable commands buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: CommandsBuffer::new(capacity),
            shapes: IndexedRegistry::new(),
            constraints: IndexedRegistry::new(),
            callbacks: IndexedRegistry::new(),
            transforms: HashMap::new(),
            characters: HashMap::new(),
        }
    }

    /// Queues a command.
    ///
    /// # Errors
    ///
    /// [`ClientError::Protocol`](crate::ClientError::Protocol) if the
    /// buffer refuses the record.
    pub fn push(&mut self, command: impl Into<Command>) -> ClientResult<()> {
        command.into().encode(&mut self.commands)?;
        Ok(())
    }

    /// Commands queued since the last flush.
    #[must_use]
    pub fn queued(&self) -> u16 {
        self.commands.commands_count()
    }

    /// Takes the queued commands for the backend.
    pub fn flush(&mut self) -> Inbound {
        Inbound::take(&mut self.commands)
    }

    /// Reuses storage the backend gave back.
    pub fn recycle(&mut self, bytes: Vec<u8>) {
        if self.commands.is_dirty() || bytes.len() <= self.commands.capacity() {
            return;
        }
        self.commands.attach(bytes);
        self.commands.reset();
    }

    // =========================================================================
    // INDEXED COMMANDS
    // =========================================================================

    /// Registers a shape and returns its index.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`]. The index is not kept.
    pub fn create_shape(&mut self, settings: ShapeSettings) -> ClientResult<u32> {
        let index = self.shapes.allocate(());
        self.push_indexed(CreateCommand::Shape { index, settings }, index, Table::Shapes)
    }

    /// Releases a shape index.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`].
    pub fn destroy_shape(&mut self, index: u32) -> ClientResult<()> {
        self.shapes.free(index);
        self.push(CleanCommand::DestroyShape(index))
    }

    /// Creates a constraint, assigning its index.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`]. The index is not kept.
    pub fn create_constraint(&mut self, mut desc: ConstraintDesc) -> ClientResult<u32> {
        let index = self.constraints.allocate(());
        desc.index = index;
        self.push_indexed(CreateCommand::Constraint(Box::new(desc)), index, Table::Constraints)
    }

    /// Creates a vehicle, assigning its constraint index.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`]. The index is not kept.
    pub fn create_vehicle(&mut self, mut desc: VehicleDesc) -> ClientResult<u32> {
        let index = self.constraints.allocate(());
        desc.index = index;
        self.push_indexed(CreateCommand::Vehicle(Box::new(desc)), index, Table::Constraints)
    }

    /// Destroys a constraint or vehicle and releases its index.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`].
    pub fn destroy_constraint(&mut self, index: u32) -> ClientResult<()> {
        self.constraints.free(index);
        self.push(CleanCommand::DestroyConstraint(index))
    }

    /// Destroys a body and forgets its last reported state.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`].
    pub fn destroy_body(&mut self, pcid: u32) -> ClientResult<()> {
        self.transforms.remove(&pcid);
        self.characters.remove(&pcid);
        self.push(CleanCommand::DestroyBody(pcid))
    }

    // =========================================================================
    // CALLBACK COMMANDS
    // =========================================================================

    /// Casts a ray. The result arrives as [`ClientEvent::RayResult`] with
    /// the returned callback index.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`]. The callback is not kept.
    pub fn cast_ray(&mut self, mut ray: RayCast) -> ClientResult<u32> {
        let callback = self.callbacks.allocate(Pending::RayCast);
        ray.callback = callback;
        self.push_indexed(QueryCommand::CastRay(ray), callback, Table::Callbacks)
    }

    /// Sweeps a registered shape. The result arrives as
    /// [`ClientEvent::ShapeCastResult`].
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`]. The callback is not kept.
    pub fn cast_shape(&mut self, mut cast: ShapeCast) -> ClientResult<u32> {
        let callback = self.callbacks.allocate(Pending::ShapeCast);
        cast.callback = callback;
        self.push_indexed(QueryCommand::CastShape(cast), callback, Table::Callbacks)
    }

    /// Switches the shape of a character. Success arrives as
    /// [`ClientEvent::CharacterShapeChanged`]; a switch the backend refuses
    /// is never answered and stays pending.
    ///
    /// # Errors
    ///
    /// As [`PhysicsClient::push`]. The callback is not kept.
    pub fn set_character_shape(&mut self, pcid: u32, shape: ShapeSettings) -> ClientResult<u32> {
        let callback = self.callbacks.allocate(Pending::CharacterShape { pcid });
        let command = ModifyCommand::Character {
            pcid,
            mutation: CharacterMutation::SetShape {
                callback: Some(callback),
                shape: Box::new(shape),
            },
        };
        self.push_indexed(command, callback, Table::Callbacks)
    }

    /// Callbacks still waiting for an answer.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Forgets a callback that will never be answered.
    pub fn cancel_callback(&mut self, callback: u32) -> bool {
        self.callbacks.free(callback).is_some()
    }

    // =========================================================================
    // RESPONSES
    // =========================================================================

    /// Decodes one tick of output, updates the state caches and returns
    /// the events in the order they were written.
    ///
    /// # Errors
    ///
    /// [`ClientError::Protocol`](crate::ClientError::Protocol) for output
    /// that does not decode.
    pub fn apply(&mut self, output: &StepOutput) -> ClientResult<Vec<ClientEvent>> {
        let mut events = Vec::new();
        for response in output.responses()? {
            match response {
                Response::Transform(transform) => {
                    self.transforms.insert(transform.pcid, transform);
                }
                Response::Characters(states) => {
                    for state in states {
                        self.characters.insert(state.pcid, state);
                    }
                }
                Response::Contacts(contacts) => events.push(ClientEvent::Contacts(contacts)),
                Response::CharacterContacts(contacts) => events.push(ClientEvent::CharacterContacts(contacts)),
                Response::QueryResult(result) => match self.callbacks.free(result.callback) {
                    Some(Pending::RayCast) => events.push(ClientEvent::RayResult(result)),
                    Some(Pending::ShapeCast) => events.push(ClientEvent::ShapeCastResult(result)),
                    other => tracing::warn!("Query result for unexpected callback {} ({:?})", result.callback, other),
                },
                Response::CharacterShapeChanged { callback } => match self.callbacks.free(callback) {
                    Some(Pending::CharacterShape { pcid }) => {
                        events.push(ClientEvent::CharacterShapeChanged { callback, pcid });
                    }
                    other => tracing::warn!("Shape change for unexpected callback {} ({:?})", callback, other),
                },
            }
        }
        Ok(events)
    }

    /// Last reported transform of an active body.
    #[must_use]
    pub fn transform(&self, pcid: u32) -> Option<&BodyTransform> {
        self.transforms.get(&pcid)
    }

    /// Last reported state of a character.
    #[must_use]
    pub fn character(&self, pcid: u32) -> Option<&CharacterState> {
        self.characters.get(&pcid)
    }

    /// Every last reported transform.
    pub fn transforms(&self) -> impl Iterator<Item = &BodyTransform> {
        self.transforms.values()
    }

    fn push_indexed(&mut self, command: impl Into<Command>, index: u32, table: Table) -> ClientResult<u32> {
        if let Err(error) = self.push(command) {
            match table {
                Table::Shapes => drop(self.shapes.free(index)),
                Table::Constraints => drop(self.constraints.free(index)),
                Table::Callbacks => drop(self.callbacks.free(index)),
            }
            return Err(error);
        }
        Ok(index)
    }
}

impl Default for PhysicsClient {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Index table an allocation came from.
#[derive(Clone, Copy, Debug)]
enum Table {
    Shapes,
    Constraints,
    Callbacks,
}
