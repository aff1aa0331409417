//! # Commands
//!
//! Typed records carried by the inbound commands buffer.
//!
//! Every record is `[u8 operator][u16 code][payload]`. Decoding a record
//! always consumes its full payload, so a handler that skips the command
//! (missing pcid, missing shape) leaves the cursor on the next record.

pub mod clean;
pub mod create;
pub mod modify;
pub mod query;

use physbridge_core::CommandsBuffer;

use crate::constants::Operator;
use crate::error::{ProtocolError, ProtocolResult};

pub use clean::CleanCommand;
pub use create::{
    AxisLimit, BodyDesc, CharacterDesc, ConstraintDesc, CreateCommand, EngineDesc, MassOverride,
    MotorSettings, SoftBodyDesc, SpringSettings, TransmissionDesc, VehicleDesc, WheelDesc,
};
pub use modify::{Buoyancy, BodyMutation, CharacterMutation, ConstraintMutation, ModifyCommand, VehicleInput};
pub use query::{QueryCommand, RayCast, ShapeCast};

/// One inbound command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Creator family.
    Create(CreateCommand),
    /// Modifier family.
    Modify(ModifyCommand),
    /// Querier family.
    Query(QueryCommand),
    /// Cleaner family.
    Clean(CleanCommand),
}

impl Command {
    /// Operator byte of this command.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        match self {
            Self::Create(_) => Operator::Creator,
            Self::Modify(_) => Operator::Modifier,
            Self::Query(_) => Operator::Querier,
            Self::Clean(_) => Operator::Cleaner,
        }
    }

    /// Command code of this command.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Create(command) => command.code(),
            Self::Modify(command) => command.code(),
            Self::Query(command) => command.code(),
            Self::Clean(command) => command.code(),
        }
    }

    /// Appends the record and bumps the command counter.
    ///
    /// On [`ProtocolError::Overflow`] the partial record is rolled back and
    /// the buffer is left as it was.
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
            Self::Create(command) => command.encode_payload(buffer),
            Self::Modify(command) => command.encode_payload(buffer),
            Self::Query(command) => command.encode_payload(buffer),
            Self::Clean(command) => command.encode_payload(buffer),
        }
    }

    /// Reads the next record.
    ///
    /// # Errors
    ///
    /// Unknown operators, unknown codes, invalid enumeration values and
    /// records cut short by the end of the buffer.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let offset = buffer.cursor();
        let operator = Operator::try_from(buffer.read_operator())?;
        let code = buffer.read_command();

        let command = match operator {
            Operator::Creator => Self::Create(CreateCommand::decode_payload(code, buffer)?),
            Operator::Modifier => Self::Modify(ModifyCommand::decode_payload(code, buffer)?),
            Operator::Querier => Self::Query(QueryCommand::decode_payload(code, buffer)?),
            Operator::Cleaner => Self::Clean(CleanCommand::decode_payload(code, buffer)?),
        };

        if buffer.has_overrun() {
            return Err(ProtocolError::Truncated { offset });
        }
        Ok(command)
    }
}

impl From<CreateCommand> for Command {
    fn from(command: CreateCommand) -> Self {
        Self::Create(command)
    }
}

impl From<ModifyCommand> for Command {
    fn from(command: ModifyCommand) -> Self {
        Self::Modify(command)
    }
}

impl From<QueryCommand> for Command {
    fn from(command: QueryCommand) -> Self {
        Self::Query(command)
    }
}

impl From<CleanCommand> for Command {
    fn from(command: CleanCommand) -> Self {
        Self::Clean(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physbridge_core::Vec3;

    #[test]
    fn test_unknown_operator_is_error() {
        let mut buffer = CommandsBuffer::new(16);
        buffer.write_operator(9);
        buffer.write_command(0);

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(Command::decode(&mut reader), Err(ProtocolError::UnknownOperator(9)));
    }

    #[test]
    fn test_unknown_code_is_error() {
        let mut buffer = CommandsBuffer::new(16);
        buffer.write_operator(Operator::Cleaner as u8);
        buffer.write_command(799);

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(
            Command::decode(&mut reader),
            Err(ProtocolError::UnknownCommand { operator: 3, code: 799 })
        );
    }

    #[test]
    fn test_truncated_record() {
        let mut buffer = CommandsBuffer::new(64);
        Command::Modify(ModifyCommand::ChangeGravity(Vec3::ZERO))
            .encode(&mut buffer)
            .unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes.truncate(bytes.len() - 4);

        let mut reader = CommandsBuffer::from_bytes(bytes);
        assert_eq!(
            Command::decode(&mut reader),
            Err(ProtocolError::Truncated { offset: 2 })
        );
    }

    #[test]
    fn test_overflow_rolls_back() {
        let mut buffer = CommandsBuffer::fixed(12);
        Command::Clean(CleanCommand::DestroyBody(1)).encode(&mut buffer).unwrap();
        let result = Command::Modify(ModifyCommand::ChangeGravity(Vec3::ZERO)).encode(&mut buffer);

        assert_eq!(result, Err(ProtocolError::Overflow));
        assert_eq!(buffer.commands_count(), 1);
        assert_eq!(buffer.cursor(), 9);
    }
}
