//! Querier payloads (codes 600 - 699).

use physbridge_core::{CommandsBuffer, Quat, Vec3};

use crate::codec::{put, put_opt, take_enum};
use crate::constants::{BackFaceMode, Operator, CMD_CAST_RAY, CMD_CAST_SHAPE};
use crate::error::{ProtocolError, ProtocolResult};

/// Ray cast request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCast {
    /// Caller side callback index, echoed in the result.
    pub callback: u32,
    /// Ray origin.
    pub origin: Vec3,
    /// Ray direction. Its length is the ray length.
    pub direction: Vec3,
    /// Stop at the closest hit.
    pub first_only: Option<bool>,
    /// Compute surface normals.
    pub calculate_normal: Option<bool>,
    /// Skip back facing triangles.
    pub ignore_back_faces: Option<bool>,
    /// Report hits from inside convex shapes.
    pub treat_convex_as_solid: Option<bool>,
}

impl RayCast {
    /// Creates a ray cast with default options.
    #[must_use]
    pub const fn new(callback: u32, origin: Vec3, direction: Vec3) -> Self {
        Self {
            callback,
            origin,
            direction,
            first_only: None,
            calculate_normal: None,
            ignore_back_faces: None,
            treat_convex_as_solid: None,
        }
    }
}

/// Shape sweep request against a registered shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeCast {
    /// Caller side callback index, echoed in the result.
    pub callback: u32,
    /// Registered shape index.
    pub shape_index: u32,
    /// Start position.
    pub position: Vec3,
    /// Start rotation.
    pub rotation: Quat,
    /// Sweep direction. Its length is the sweep distance.
    pub direction: Vec3,
    /// Scale applied to the shape.
    pub scale: Option<Vec3>,
    /// Base offset for returned points.
    pub offset: Option<Vec3>,
    /// Back face handling.
    pub back_face_mode: Option<BackFaceMode>,
    /// Stop at the closest hit.
    pub first_only: Option<bool>,
    /// Compute surface normals.
    pub calculate_normal: Option<bool>,
}

/// Any querier command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QueryCommand {
    /// Ray cast.
    CastRay(RayCast),
    /// Shape cast.
    CastShape(ShapeCast),
}

impl QueryCommand {
    /// Wire code of this command.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::CastRay(_) => CMD_CAST_RAY,
            Self::CastShape(_) => CMD_CAST_SHAPE,
        }
    }

    /// Callback index the result will carry.
    #[must_use]
    pub const fn callback(&self) -> u32 {
        match self {
            Self::CastRay(ray) => ray.callback,
            Self::CastShape(cast) => cast.callback,
        }
    }

    pub(crate) fn encode_payload(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        match self {
            Self::CastRay(ray) => {
                put(buffer, ray.callback)?;
                put(buffer, ray.origin)?;
                put(buffer, ray.direction)?;
                put_opt(buffer, ray.first_only)?;
                put_opt(buffer, ray.calculate_normal)?;
                put_opt(buffer, ray.ignore_back_faces)?;
                put_opt(buffer, ray.treat_convex_as_solid)
            }
            Self::CastShape(cast) => {
                put(buffer, cast.callback)?;
                put(buffer, cast.shape_index)?;
                put(buffer, cast.position)?;
                put(buffer, cast.rotation)?;
                put(buffer, cast.direction)?;
                put_opt(buffer, cast.scale)?;
                put_opt(buffer, cast.offset)?;
                put_opt(buffer, cast.back_face_mode.map(u8::from))?;
                put_opt(buffer, cast.first_only)?;
                put_opt(buffer, cast.calculate_normal)
            }
        }
    }

    pub(crate) fn decode_payload(code: u16, buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        match code {
            CMD_CAST_RAY => Ok(Self::CastRay(RayCast {
                callback: buffer.read(),
                origin: buffer.read(),
                direction: buffer.read(),
                first_only: buffer.read_opt(),
                calculate_normal: buffer.read_opt(),
                ignore_back_faces: buffer.read_opt(),
                treat_convex_as_solid: buffer.read_opt(),
            })),
            CMD_CAST_SHAPE => Ok(Self::CastShape(ShapeCast {
                callback: buffer.read(),
                shape_index: buffer.read(),
                position: buffer.read(),
                rotation: buffer.read(),
                direction: buffer.read(),
                scale: buffer.read_opt(),
                offset: buffer.read_opt(),
                back_face_mode: if buffer.read_flag() { Some(take_enum(buffer)?) } else { None },
                first_only: buffer.read_opt(),
                calculate_normal: buffer.read_opt(),
            })),
            _ => Err(ProtocolError::UnknownCommand {
                operator: Operator::Querier as u8,
                code,
            }),
        }
    }
}
