//! Cleaner payloads (codes 700 - 799).
//!
//! Destroying something that does not exist is not an error.

use physbridge_core::CommandsBuffer;

use crate::codec::put;
use crate::constants::{Operator, CMD_DESTROY_BODY, CMD_DESTROY_CONSTRAINT, CMD_DESTROY_SHAPE};
use crate::error::{ProtocolError, ProtocolResult};

/// Any cleaner command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanCommand {
    /// Destroy a body or character with its constraints.
    DestroyBody(u32),
    /// Release a registered shape.
    DestroyShape(u32),
    /// Destroy a constraint.
    DestroyConstraint(u32),
}

impl CleanCommand {
    /// Wire code of this command.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::DestroyBody(_) => CMD_DESTROY_BODY,
            Self::DestroyShape(_) => CMD_DESTROY_SHAPE,
            Self::DestroyConstraint(_) => CMD_DESTROY_CONSTRAINT,
        }
    }

    pub(crate) fn encode_payload(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match *self {
            Self::DestroyBody(id) | Self::DestroyShape(id) | Self::DestroyConstraint(id) => put(buffer, id),
        }
    }

    pub(crate) fn decode_payload(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        match code {
            CMD_DESTROY_BODY => Ok(Self::DestroyBody(buffer.read())),
            CMD_DESTROY_SHAPE => Ok(Self::DestroyShape(buffer.read())),
            CMD_DESTROY_CONSTRAINT => Ok(Self::DestroyConstraint(buffer.read())),
            _ => Err(ProtocolError::UnknownCommand {
                operator: Operator::Cleaner as u8,
                code,
            }),
        }
    }
}
