//! # Shape Settings
//!
//! Inline shape description used by body creation, shape registration,
//! shape replacement and shape casts.
//!
//! ## Layout
//!
//! ```text
//! [u8 type][scale?][type fields][bool compound child][f32 density unless child]
//! [offset? (vec3 + quat)][center of mass? vec3]
//! ```
//!
//! Mesh and height field data is not copied inline. The record carries the
//! index of the auxiliary buffer holding it.

use physbridge_core::{CommandsBuffer, Quat, Vec3};

use crate::codec::{put, put_enum, put_len, put_opt, take_enum, take_len};
use crate::constants::ShapeType;
use crate::error::ProtocolResult;

/// Default density, in kg/m^3.
pub const DEFAULT_DENSITY: f32 = 1000.0;

/// Reference to triangle data held in auxiliary buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshRef {
    /// Auxiliary buffer with `f32` positions.
    pub positions: u32,
    /// Auxiliary buffer with 16-bit (or 32-bit when `index_count > 65535`) indices.
    pub indices: u32,
    /// First index to read.
    pub base: u8,
    /// Byte offset into the positions buffer.
    pub offset: u32,
    /// Floats per vertex.
    pub stride: u8,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Byte offset into the indices buffer.
    pub index_offset: u32,
}

impl MeshRef {
    /// True when indices are 32-bit wide.
    #[must_use]
    pub const fn wide_indices(&self) -> bool {
        self.index_count > u16::MAX as u32
    }

    /// Writes a mesh reference.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put(buffer, self.positions)?;
        put(buffer, self.indices)?;
        put(buffer, self.base)?;
        put(buffer, self.offset)?;
        put(buffer, self.stride)?;
        put(buffer, self.vertex_count)?;
        put(buffer, self.index_count)?;
        put(buffer, self.index_offset)
    }

    /// Reads a mesh reference.
    pub fn decode(buffer: &mut CommandsBuffer) -> Self {
        Self {
            positions: buffer.read(),
            indices: buffer.read(),
            base: buffer.read(),
            offset: buffer.read(),
            stride: buffer.read(),
            vertex_count: buffer.read(),
            index_count: buffer.read(),
            index_offset: buffer.read(),
        }
    }
}

/// Reference to height samples held in an auxiliary buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightFieldRef {
    /// Auxiliary buffer with `f32` samples. Negative samples are holes.
    pub samples: u32,
    /// Offset of the first sample.
    pub offset: Vec3,
    /// Scale applied to the grid.
    pub scale: Vec3,
    /// Samples per side.
    pub sample_count: u32,
    /// Block size of the acceleration structure.
    pub block_size: u8,
    /// Compression bits per sample.
    pub bits_per_sample: u8,
    /// Cosine threshold for active edge detection.
    pub active_edge_cos_threshold: f32,
}

/// Child of a static compound.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundChild {
    /// Child shape. Its density is ignored.
    pub shape: ShapeSettings,
    /// Position relative to the compound.
    pub position: Vec3,
    /// Rotation relative to the compound.
    pub rotation: Quat,
}

/// Type specific shape data.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeGeometry {
    /// Box.
    Box {
        /// Half size on each axis.
        half_extent: Vec3,
        /// Rounding radius.
        convex_radius: f32,
    },
    /// Capsule along Y.
    Capsule {
        /// Half height of the cylindrical part.
        half_height: f32,
        /// Radius.
        radius: f32,
    },
    /// Cylinder along Y.
    Cylinder {
        /// Half height.
        half_height: f32,
        /// Radius.
        radius: f32,
        /// Rounding radius.
        convex_radius: f32,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Triangle mesh.
    Mesh(MeshRef),
    /// Convex hull of the referenced vertices.
    ConvexHull(MeshRef),
    /// Immutable compound.
    StaticCompound(Vec<CompoundChild>),
    /// Height field.
    HeightField(HeightFieldRef),
    /// Compound whose children change after creation. May start empty.
    MutableCompound(Vec<CompoundChild>),
}

impl ShapeGeometry {
    /// Wire tag of this geometry.
    #[must_use]
    pub const fn shape_type(&self) -> ShapeType {
        match self {
            Self::Box { .. } => ShapeType::Box,
            Self::Capsule { .. } => ShapeType::Capsule,
            Self::Cylinder { .. } => ShapeType::Cylinder,
            Self::Sphere { .. } => ShapeType::Sphere,
            Self::Mesh(_) => ShapeType::Mesh,
            Self::ConvexHull(_) => ShapeType::ConvexHull,
            Self::StaticCompound(_) => ShapeType::StaticCompound,
            Self::HeightField(_) => ShapeType::HeightField,
            Self::MutableCompound(_) => ShapeType::MutableCompound,
        }
    }
}

/// Complete inline shape description.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeSettings {
    /// Type specific data.
    pub geometry: ShapeGeometry,
    /// Non-uniform scale.
    pub scale: Option<Vec3>,
    /// Density. `None` marks a compound child.
    pub density: Option<f32>,
    /// Local translation and rotation of the shape.
    pub offset: Option<(Vec3, Quat)>,
    /// Center of mass shift.
    pub center_of_mass: Option<Vec3>,
}

impl ShapeSettings {
    /// Creates settings with default density and no modifiers.
    #[must_use]
    pub const fn new(geometry: ShapeGeometry) -> Self {
        Self {
            geometry,
            scale: None,
            density: Some(DEFAULT_DENSITY),
            offset: None,
            center_of_mass: None,
        }
    }

    /// Box with no rounding.
    #[must_use]
    pub const fn cuboid(half_extent: Vec3) -> Self {
        Self::new(ShapeGeometry::Box {
            half_extent,
            convex_radius: 0.05,
        })
    }

    /// Sphere.
    #[must_use]
    pub const fn sphere(radius: f32) -> Self {
        Self::new(ShapeGeometry::Sphere { radius })
    }

    /// Capsule along Y.
    #[must_use]
    pub const fn capsule(half_height: f32, radius: f32) -> Self {
        Self::new(ShapeGeometry::Capsule { half_height, radius })
    }

    /// Returns the settings with a scale applied.
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Returns the settings marked as a compound child.
    #[must_use]
    pub fn as_child(mut self) -> Self {
        self.density = None;
        self
    }

    /// Writes the settings.
    pub fn encode(&self, buffer: &mut CommandsBuffer) -> ProtocolResult<()> {
        put_enum(buffer, self.geometry.shape_type())?;
        put_opt(buffer, self.scale)?;

        match &self.geometry {
            ShapeGeometry::Box {
                half_extent,
                convex_radius,
            } => {
                put(buffer, *half_extent)?;
                put(buffer, *convex_radius)?;
            }
            ShapeGeometry::Capsule { half_height, radius } => {
                put(buffer, *half_height)?;
                put(buffer, *radius)?;
            }
            ShapeGeometry::Cylinder {
                half_height,
                radius,
                convex_radius,
            } => {
                put(buffer, *half_height)?;
                put(buffer, *radius)?;
                put(buffer, *convex_radius)?;
            }
            ShapeGeometry::Sphere { radius } => put(buffer, *radius)?,
            ShapeGeometry::Mesh(mesh) | ShapeGeometry::ConvexHull(mesh) => mesh.encode(buffer)?,
            ShapeGeometry::StaticCompound(children) | ShapeGeometry::MutableCompound(children) => {
                put_len(buffer, children.len())?;
                for child in children {
                    child.shape.encode(buffer)?;
                    put(buffer, child.position)?;
                    put(buffer, child.rotation)?;
                }
            }
            ShapeGeometry::HeightField(field) => {
                put(buffer, field.samples)?;
                put(buffer, field.offset)?;
                put(buffer, field.scale)?;
                put(buffer, field.sample_count)?;
                put(buffer, field.block_size)?;
                put(buffer, field.bits_per_sample)?;
                put(buffer, field.active_edge_cos_threshold)?;
            }
        }

        match self.density {
            Some(density) => {
                put(buffer, false)?;
                put(buffer, density)?;
            }
            None => put(buffer, true)?,
        }

        match self.offset {
            Some((position, rotation)) => {
                put(buffer, true)?;
                put(buffer, position)?;
                put(buffer, rotation)?;
            }
            None => put(buffer, false)?,
        }

        put_opt(buffer, self.center_of_mass)
    }

    /// Reads the settings.
    pub fn decode(buffer: &mut CommandsBuffer) -> ProtocolResult<Self> {
        let shape_type: ShapeType = take_enum(buffer)?;
        let scale = buffer.read_opt();

        let geometry = match shape_type {
            ShapeType::Box => ShapeGeometry::Box {
                half_extent: buffer.read(),
                convex_radius: buffer.read(),
            },
            ShapeType::Capsule => ShapeGeometry::Capsule {
                half_height: buffer.read(),
                radius: buffer.read(),
            },
            ShapeType::Cylinder => ShapeGeometry::Cylinder {
                half_height: buffer.read(),
                radius: buffer.read(),
                convex_radius: buffer.read(),
            },
            ShapeType::Sphere => ShapeGeometry::Sphere {
                radius: buffer.read(),
            },
            ShapeType::Mesh => ShapeGeometry::Mesh(MeshRef::decode(buffer)),
            ShapeType::ConvexHull => ShapeGeometry::ConvexHull(MeshRef::decode(buffer)),
            ShapeType::StaticCompound => ShapeGeometry::StaticCompound(Self::decode_children(buffer)?),
            ShapeType::MutableCompound => ShapeGeometry::MutableCompound(Self::decode_children(buffer)?),
            ShapeType::HeightField => ShapeGeometry::HeightField(HeightFieldRef {
                samples: buffer.read(),
                offset: buffer.read(),
                scale: buffer.read(),
                sample_count: buffer.read(),
                block_size: buffer.read(),
                bits_per_sample: buffer.read(),
                active_edge_cos_threshold: buffer.read(),
            }),
        };

        let is_child: bool = buffer.read();
        let density = if is_child { None } else { Some(buffer.read()) };
        let offset = if buffer.read_flag() {
            Some((buffer.read(), buffer.read()))
        } else {
            None
        };
        let center_of_mass = buffer.read_opt();

        Ok(Self {
            geometry,
            scale,
            density,
            offset,
            center_of_mass,
        })
    }

    fn decode_children(buffer: &mut CommandsBuffer) -> ProtocolResult<Vec<CompoundChild>> {
        // type + scale flag + child flag + offset flag + com flag + position + rotation
        let count = take_len(buffer, 33)?;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            children.push(CompoundChild {
                shape: Self::decode(buffer)?,
                position: buffer.read(),
                rotation: buffer.read(),
            });
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(settings: &ShapeSettings) -> ShapeSettings {
        let mut buffer = CommandsBuffer::new(16);
        settings.encode(&mut buffer).unwrap();
        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        let decoded = ShapeSettings::decode(&mut reader).unwrap();
        assert!(!reader.has_overrun());
        decoded
    }

    #[test]
    fn test_box_with_modifiers() {
        let mut settings = ShapeSettings::cuboid(Vec3::new(1.0, 2.0, 3.0)).with_scale(Vec3::ONE);
        settings.offset = Some((Vec3::Y, Quat::IDENTITY));
        settings.center_of_mass = Some(Vec3::new(0.0, -0.5, 0.0));

        assert_eq!(roundtrip(&settings), settings);
    }

    #[test]
    fn test_static_compound_children() {
        let settings = ShapeSettings::new(ShapeGeometry::StaticCompound(vec![
            CompoundChild {
                shape: ShapeSettings::sphere(0.5).as_child(),
                position: Vec3::X,
                rotation: Quat::IDENTITY,
            },
            CompoundChild {
                shape: ShapeSettings::capsule(1.0, 0.25).as_child(),
                position: -Vec3::X,
                rotation: Quat::IDENTITY,
            },
        ]));

        assert_eq!(roundtrip(&settings), settings);
    }

    #[test]
    fn test_mutable_compound_may_start_empty() {
        let empty = ShapeSettings::new(ShapeGeometry::MutableCompound(Vec::new()));
        assert_eq!(roundtrip(&empty), empty);

        let one = ShapeSettings::new(ShapeGeometry::MutableCompound(vec![CompoundChild {
            shape: ShapeSettings::cuboid(Vec3::ONE).as_child(),
            position: Vec3::Y,
            rotation: Quat::IDENTITY,
        }]));
        assert_eq!(roundtrip(&one).geometry.shape_type(), ShapeType::MutableCompound);
    }

    #[test]
    fn test_height_field_reference() {
        let settings = ShapeSettings::new(ShapeGeometry::HeightField(HeightFieldRef {
            samples: 2,
            offset: Vec3::ZERO,
            scale: Vec3::ONE,
            sample_count: 16,
            block_size: 4,
            bits_per_sample: 8,
            active_edge_cos_threshold: 0.996,
        }));

        assert_eq!(roundtrip(&settings), settings);
    }

    #[test]
    fn test_invalid_shape_type() {
        let mut reader = CommandsBuffer::from_bytes(vec![0, 0, 42, 0]);
        assert!(ShapeSettings::decode(&mut reader).is_err());
    }
}
