//! # Response Records
//!
//! Records written by the backend into the outbound buffer once per tick
//! and decoded by the caller.
//!
//! Outbound order within a tick is fixed:
//!
//! 1. contact events
//! 2. character contacts
//! 3. one transform record per active body
//! 4. character states
//!
//! Query results and character shape changes are written while commands
//! are executed, so they precede everything above.

use physbridge_core::{CommandsBuffer, Isometry, Quat, Vec3, WireValue};

use crate::codec::{put, put_enum, put_len, put_opt, take_enum, take_len};
use crate::constants::{
    ContactType, GroundState, MotionType, ResponseOperator, CMD_CHAR_SHAPE_CHANGED, CMD_QUERY_RESULTS,
    CMD_REPORT_CHAR_CONTACTS, CMD_REPORT_CONTACTS, CMD_UPDATE_TRANSFORMS,
};
use crate::error::{ProtocolError, ProtocolResult};

// =============================================================================
// BODY TRANSFORMS
// =============================================================================

/// Transform and velocities of one active body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyTransform {
    /// Body id.
    pub pcid: u32,
    /// World position (interpolated when motion states are on).
    pub position: Vec3,
    /// World rotation (interpolated when motion states are on).
    pub rotation: Quat,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
    /// Local wheel transforms, empty unless the body drives a vehicle.
    pub wheels: Vec<Isometry>,
}

impl BodyTransform {
    fn encode_payload(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put(buffer, self.pcid)?;
        put(buffer, self.position)?;
        put(buffer, self.rotation)?;
        put(buffer, self.linear_velocity)?;
        put(buffer, self.angular_velocity)?;
        put_len(buffer, self.wheels.len())?;
        for wheel in &self.wheels {
            put(buffer, wheel.position)?;
            put(buffer, wheel.rotation)?;
        }
        Ok(())
    }

    fn decode_payload(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let pcid = buffer.read();
        let position = buffer.read();
        let rotation = buffer.read();
        let linear_velocity = buffer.read();
        let angular_velocity = buffer.read();
        let count = take_len(buffer, Vec3::SIZE + Quat::SIZE)?;
        let wheels = (0..count)
            .map(|_| Isometry::new(buffer.read(), buffer.read()))
            .collect();

        Ok(Self {
            pcid,
            position,
            rotation,
            linear_velocity,
            angular_velocity,
            wheels,
        })
    }
}

// =============================================================================
// CHARACTERS
// =============================================================================

/// Ground contact of a supported character.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundSupport {
    /// Id of the supporting body, if it is tracked.
    pub ground: Option<u32>,
    /// The ground slope exceeds the character's max slope.
    pub too_steep: bool,
    /// Velocity of the ground under the character.
    pub ground_velocity: Vec3,
    /// Ground surface normal.
    pub ground_normal: Vec3,
}

/// State of one character after the tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterState {
    /// Character id.
    pub pcid: u32,
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Ground classification.
    pub ground_state: GroundState,
    /// Present when the character is supported.
    pub support: Option<GroundSupport>,
}

impl CharacterState {
    /// True if the character stands on something.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.support.is_some()
    }

    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put(buffer, self.pcid)?;
        put(buffer, self.position)?;
        put(buffer, self.rotation)?;
        put(buffer, self.linear_velocity)?;
        put(buffer, self.support.is_some())?;
        put_enum(buffer, self.ground_state)?;
        if let Some(support) = &self.support {
            put_opt(buffer, support.ground)?;
            put(buffer, support.too_steep)?;
            put(buffer, support.ground_velocity)?;
            put(buffer, support.ground_normal)?;
        }
        Ok(())
    }

    fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let pcid = buffer.read();
        let position = buffer.read();
        let rotation = buffer.read();
        let linear_velocity = buffer.read();
        let supported = buffer.read_flag();
        let ground_state = take_enum(buffer)?;
        let support = if supported {
            Some(GroundSupport {
                ground: buffer.read_opt(),
                too_steep: buffer.read(),
                ground_velocity: buffer.read(),
                ground_normal: buffer.read(),
            })
        } else {
            None
        };

        Ok(Self {
            pcid,
            position,
            rotation,
            linear_velocity,
            ground_state,
            support,
        })
    }
}

// =============================================================================
// CONTACTS
// =============================================================================

/// Contact point data attached to an added contact.
#[derive(Clone, Debug, PartialEq)]
pub enum ContactPoints {
    /// One point averaged over the manifold.
    Averaged(Vec3),
    /// Every point on both bodies, relative to `offset`.
    Full {
        /// Base offset of the manifold.
        offset: Vec3,
        /// Points on the first body.
        points1: Vec<Vec3>,
        /// Points on the second body.
        points2: Vec<Vec3>,
    },
}

/// Manifold data of a contact that started this step.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactManifold {
    /// Contact normal, pointing from body 1 to body 2.
    pub normal: Vec3,
    /// Penetration depth.
    pub depth: f32,
    /// Point data, absent when point reporting is off.
    pub points: Option<ContactPoints>,
}

/// Contact phase with its phase specific data.
#[derive(Clone, Debug, PartialEq)]
pub enum ContactPhase {
    /// Contact started this step.
    Added(ContactManifold),
    /// Contact continued.
    Persisted,
    /// Contact ended.
    Removed,
}

impl ContactPhase {
    /// Wire tag of this phase.
    #[must_use]
    pub const fn contact_type(&self) -> ContactType {
        match self {
            Self::Added(_) => ContactType::Added,
            Self::Persisted => ContactType::Persisted,
            Self::Removed => ContactType::Removed,
        }
    }
}

/// One contact event between two bodies.
///
/// A body id is absent when the body was destroyed before the events were
/// written.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactEvent {
    /// First body.
    pub body1: Option<u32>,
    /// Second body.
    pub body2: Option<u32>,
    /// Phase.
    pub phase: ContactPhase,
}

impl ContactEvent {
    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put_enum(buffer, self.phase.contact_type())?;
        put_opt(buffer, self.body1)?;
        put_opt(buffer, self.body2)?;

        let ContactPhase::Added(manifold) = &self.phase else {
            return Ok(());
        };
        put(buffer, manifold.normal)?;
        put(buffer, manifold.depth)?;
        put(buffer, manifold.points.is_some())?;
        match &manifold.points {
            None => Ok(()),
            Some(ContactPoints::Averaged(point)) => {
                put(buffer, true)?;
                put(buffer, *point)
            }
            Some(ContactPoints::Full { offset, points1, points2 }) => {
                put(buffer, false)?;
                put(buffer, *offset)?;
                put_len(buffer, points1.len())?;
                put_len(buffer, points2.len())?;
                for point in points1.iter().chain(points2) {
                    put(buffer, *point)?;
                }
                Ok(())
            }
        }
    }

    fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let kind: ContactType = take_enum(buffer)?;
        let body1 = buffer.read_opt();
        let body2 = buffer.read_opt();

        let phase = match kind {
            ContactType::Persisted => ContactPhase::Persisted,
            ContactType::Removed => ContactPhase::Removed,
            ContactType::Added => {
                let normal = buffer.read();
                let depth = buffer.read();
                let points = if buffer.read_flag() {
                    if buffer.read_flag() {
                        Some(ContactPoints::Averaged(buffer.read()))
                    } else {
                        let offset = buffer.read();
                        let count1 = take_len(buffer, 0)?;
                        let count2 = take_len(buffer, 0)?;
                        if (count1 + count2).saturating_mul(Vec3::SIZE) > buffer.remaining() {
                            return Err(ProtocolError::Truncated { offset: buffer.cursor() });
                        }
                        let points1 = (0..count1).map(|_| buffer.read()).collect();
                        let points2 = (0..count2).map(|_| buffer.read()).collect();
                        Some(ContactPoints::Full { offset, points1, points2 })
                    }
                } else {
                    None
                };
                ContactPhase::Added(ContactManifold { normal, depth, points })
            }
        };

        Ok(Self { body1, body2, phase })
    }
}

// =============================================================================
// CHARACTER CONTACTS
// =============================================================================

/// One contact reported by a character controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterContact {
    /// Id of the touched body, if it is tracked.
    pub other: Option<u32>,
    /// Contact position.
    pub position: Vec3,
    /// Contact normal.
    pub normal: Vec3,
    /// Velocity of the touched surface.
    pub velocity: Vec3,
    /// Character velocity after the contact was resolved.
    pub new_character_velocity: Vec3,
}

/// Every contact of one character during the tick.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterContacts {
    /// Character id.
    pub pcid: u32,
    /// Contacts in the order they were reported.
    pub contacts: Vec<CharacterContact>,
}

const CHARACTER_CONTACT_MIN_SIZE: usize = 1 + 4 * Vec3::SIZE;

impl CharacterContacts {
    fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put(buffer, self.pcid)?;
        put_len(buffer, self.contacts.len())?;
        for contact in &self.contacts {
            put_opt(buffer, contact.other)?;
            put(buffer, contact.position)?;
            put(buffer, contact.normal)?;
            put(buffer, contact.velocity)?;
            put(buffer, contact.new_character_velocity)?;
        }
        Ok(())
    }

    fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let pcid = buffer.read();
        let count = take_len(buffer, CHARACTER_CONTACT_MIN_SIZE)?;
        let contacts = (0..count)
            .map(|_| CharacterContact {
                other: buffer.read_opt(),
                position: buffer.read(),
                normal: buffer.read(),
                velocity: buffer.read(),
                new_character_velocity: buffer.read(),
            })
            .collect();
        Ok(Self { pcid, contacts })
    }
}

// =============================================================================
// QUERY RESULTS
// =============================================================================

/// One hit of a ray or shape cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryHit {
    /// Id of the hit body.
    pub pcid: u32,
    /// Hit point in world space.
    pub point: Vec3,
    /// Surface normal, when requested.
    pub normal: Option<Vec3>,
}

/// Result of one query, keyed by the caller's callback index.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    /// Callback index from the query command.
    pub callback: u32,
    /// The query asked for the closest hit only.
    pub first_only: bool,
    /// Hits, closest first when `first_only` is set.
    pub hits: Vec<QueryHit>,
}

const QUERY_HIT_MIN_SIZE: usize = 4 + Vec3::SIZE + 1;

impl QueryResult {
    fn encode_payload(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        let hits = u16::try_from(self.hits.len()).map_err(|_| ProtocolError::Overflow)?;
        put(buffer, self.callback)?;
        put(buffer, self.first_only)?;
        put(buffer, hits)?;
        for hit in &self.hits {
            put(buffer, hit.pcid)?;
            put(buffer, hit.point)?;
            put_opt(buffer, hit.normal)?;
        }
        Ok(())
    }

    fn decode_payload(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let callback = buffer.read();
        let first_only = buffer.read();
        let offset = buffer.cursor();
        let count = usize::from(buffer.read::<u16>());
        if count.saturating_mul(QUERY_HIT_MIN_SIZE) > buffer.remaining() {
            return Err(ProtocolError::Truncated { offset });
        }
        let hits = (0..count)
            .map(|_| QueryHit {
                pcid: buffer.read(),
                point: buffer.read(),
                normal: buffer.read_opt(),
            })
            .collect();
        Ok(Self {
            callback,
            first_only,
            hits,
        })
    }
}

// =============================================================================
// DEBUG DRAW
// =============================================================================

/// Triangle soup of one debug-drawn body.
///
/// Vertices travel in the outbound auxiliary list as packed `f32` triples,
/// three vertices per triangle. Views are returned beside the outbound
/// bytes, not inside them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugDrawView {
    /// Body id.
    pub pcid: u32,
    /// Motion type used to colour the body. Characters report kinematic.
    pub motion_type: MotionType,
    /// Index into the outbound auxiliary list.
    pub buffer: u32,
    /// Number of `f32` values in the buffer.
    pub float_count: u32,
    /// Whether the triangles are depth tested. Off draws them on top.
    pub depth: bool,
}

// =============================================================================
// RESPONSE
// =============================================================================

/// One outbound record.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// Transform of one active body.
    Transform(BodyTransform),
    /// States of every character.
    Characters(Vec<CharacterState>),
    /// Contact events collected during the tick.
    Contacts(Vec<ContactEvent>),
    /// Character contacts collected during the tick.
    CharacterContacts(Vec<CharacterContacts>),
    /// Result of one query.
    QueryResult(QueryResult),
    /// A character finished switching its shape.
    CharacterShapeChanged {
        /// Callback index from the shape change command.
        callback: u32,
    },
}

impl Response {
    /// Response family of this record.
    #[must_use]
    pub const fn operator(&self) -> ResponseOperator {
        match self {
            Self::Transform(_) | Self::Contacts(_) => ResponseOperator::Body,
            Self::Characters(_) | Self::CharacterContacts(_) | Self::CharacterShapeChanged { .. } => {
                ResponseOperator::Character
            }
            Self::QueryResult(_) => ResponseOperator::Manager,
        }
    }

    /// Response code of this record.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Transform(_) | Self::Characters(_) => CMD_UPDATE_TRANSFORMS,
            Self::Contacts(_) => CMD_REPORT_CONTACTS,
            Self::CharacterContacts(_) => CMD_REPORT_CHAR_CONTACTS,
            Self::QueryResult(_) => CMD_QUERY_RESULTS,
            Self::CharacterShapeChanged { .. } => CMD_CHAR_SHAPE_CHANGED,
        }
    }

    /// Appends the record and bumps the command counter.
    ///
    /// On overflow of a fixed buffer the partial record is rolled back.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Overflow`] when the buffer refuses the write.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        let checkpoint = buffer.checkpoint();
        let result = self.encode_record(buffer);
        if result.is_err() {
            buffer.rollback(checkpoint);
        }
        result
    }

    fn encode_record(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        if !buffer.write_operator(self.operator() as u8) || !buffer.write_command(self.code()) {
            return Err(ProtocolError::Overflow);
        }
        match self {
            Self::Transform(transform) => transform.encode_payload(buffer),
            Self::Characters(states) => {
                put_len(buffer, states.len())?;
                states.iter().try_for_each(|state| state.encode(buffer))
            }
            Self::Contacts(events) => {
                put_len(buffer, events.len())?;
                events.iter().try_for_each(|event| event.encode(buffer))
            }
            Self::CharacterContacts(characters) => {
                put_len(buffer, characters.len())?;
                characters.iter().try_for_each(|character| character.encode(buffer))
            }
            Self::QueryResult(result) => result.encode_payload(buffer),
            Self::CharacterShapeChanged { callback } => put(buffer, *callback),
        }
    }

    /// Reads the next record.
    ///
    /// # Errors
    ///
    /// Unknown response operators or codes, invalid enumeration values and
    /// records cut short by the end of the buffer.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let offset = buffer.cursor();
        let operator = ResponseOperator::try_from(buffer.read_operator())?;
        let code = buffer.read_command();

        let response = match (operator, code) {
            (ResponseOperator::Body, CMD_UPDATE_TRANSFORMS) => {
                Self::Transform(BodyTransform::decode_payload(buffer)?)
            }
            (ResponseOperator::Body, CMD_REPORT_CONTACTS) => {
                let count = take_len(buffer, 3)?;
                Self::Contacts(decode_list(buffer, count, ContactEvent::decode)?)
            }
            (ResponseOperator::Character, CMD_UPDATE_TRANSFORMS) => {
                let count = take_len(buffer, 4 + 2 * Vec3::SIZE + Quat::SIZE + 2)?;
                Self::Characters(decode_list(buffer, count, CharacterState::decode)?)
            }
            (ResponseOperator::Character, CMD_REPORT_CHAR_CONTACTS) => {
                let count = take_len(buffer, 8)?;
                Self::CharacterContacts(decode_list(buffer, count, CharacterContacts::decode)?)
            }
            (ResponseOperator::Character, CMD_CHAR_SHAPE_CHANGED) => Self::CharacterShapeChanged {
                callback: buffer.read(),
            },
            (ResponseOperator::Manager, CMD_QUERY_RESULTS) => {
                Self::QueryResult(QueryResult::decode_payload(buffer)?)
            }
            _ => {
                return Err(ProtocolError::UnknownCommand {
                    operator: operator as u8,
                    code,
                })
            }
        };

        if buffer.has_overrun() {
            return Err(ProtocolError::Truncated { offset });
        }
        Ok(response)
    }

    /// Decodes every record of an outbound buffer from its start.
    ///
    /// # Errors
    ///
    /// The first record that fails to decode.
    pub fn decode_all(buffer: &mut CommandsBuffer) -> ProtocolResult<Vec<Self>> {
        let count = buffer.commands_count();
        (0..count).map(|_| Self::decode(buffer)).collect()
    }
}

fn decode_list<T>(
    buffer: &mut CommandsBuffer,
    count: usize,
    decode: fn(&mut CommandsBuffer) -> ProtocolResult<T>,
) -> ProtocolResult<Vec<T>> {
    (0..count).map(|_| decode(buffer)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(response: &Response) -> Response {
        let mut buffer = CommandsBuffer::new(64);
        response.encode(&mut buffer).unwrap();
        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(reader.commands_count(), 1);
        Response::decode(&mut reader).unwrap()
    }

    #[test]
    fn test_vehicle_transform_carries_wheels() {
        let transform = Response::Transform(BodyTransform {
            pcid: 4,
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::new(0.0, -1.0, 0.0),
            angular_velocity: Vec3::ZERO,
            wheels: vec![Isometry::new(Vec3::new(-1.0, 0.0, 1.5), Quat::IDENTITY); 4],
        });
        assert_eq!(roundtrip(&transform), transform);
    }

    #[test]
    fn test_contacts_of_every_phase() {
        let contacts = Response::Contacts(vec![
            ContactEvent {
                body1: Some(1),
                body2: Some(2),
                phase: ContactPhase::Added(ContactManifold {
                    normal: Vec3::Y,
                    depth: 0.01,
                    points: Some(ContactPoints::Full {
                        offset: Vec3::ZERO,
                        points1: vec![Vec3::new(0.5, 0.0, 0.5)],
                        points2: vec![Vec3::new(0.5, 0.01, 0.5), Vec3::ZERO],
                    }),
                }),
            },
            ContactEvent {
                body1: Some(1),
                body2: None,
                phase: ContactPhase::Removed,
            },
            ContactEvent {
                body1: Some(3),
                body2: Some(1),
                phase: ContactPhase::Added(ContactManifold {
                    normal: Vec3::Y,
                    depth: 0.0,
                    points: Some(ContactPoints::Averaged(Vec3::X)),
                }),
            },
        ]);
        assert_eq!(roundtrip(&contacts), contacts);
    }

    #[test]
    fn test_character_without_support_omits_ground() {
        let state = CharacterState {
            pcid: 9,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            ground_state: GroundState::InAir,
            support: None,
        };
        let mut buffer = CommandsBuffer::new(64);
        Response::Characters(vec![state]).encode(&mut buffer).unwrap();

        // header, op, code, count, pcid, position, rotation, velocity, supported, ground state
        assert_eq!(buffer.cursor(), 2 + 1 + 2 + 4 + 4 + 12 + 16 + 12 + 1 + 1);
        assert!(!state.is_supported());
    }

    #[test]
    fn test_query_result_order_and_callback() {
        let result = Response::QueryResult(QueryResult {
            callback: 17,
            first_only: false,
            hits: vec![
                QueryHit {
                    pcid: 1,
                    point: Vec3::ZERO,
                    normal: Some(Vec3::Y),
                },
                QueryHit {
                    pcid: 2,
                    point: Vec3::X,
                    normal: None,
                },
            ],
        });
        assert_eq!(roundtrip(&result), result);
        assert_eq!(result.operator(), ResponseOperator::Manager);
    }

    #[test]
    fn test_unknown_response_code() {
        let mut buffer = CommandsBuffer::new(16);
        buffer.write_operator(ResponseOperator::Manager as u8);
        buffer.write_command(CMD_UPDATE_TRANSFORMS);

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(
            Response::decode(&mut reader),
            Err(ProtocolError::UnknownCommand { operator: 12, code: 800 })
        );
    }

    #[test]
    fn test_corrupted_hit_count_is_truncated() {
        let mut buffer = CommandsBuffer::new(16);
        buffer.write_operator(ResponseOperator::Manager as u8);
        buffer.write_command(CMD_QUERY_RESULTS);
        buffer.write(1u32);
        buffer.write(true);
        buffer.write(u16::MAX);

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert!(matches!(
            Response::decode(&mut reader),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
