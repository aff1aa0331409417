//! # Sandbox Engine
//!
//! A small box-based solver implementing every [`PhysicsEngine`] capability.
//!
//! Features:
//! - Gravity, damping and velocity clamping
//! - World-space AABB collision with restitution and friction
//! - Object layer and group filtering
//! - Contact tracking across steps (added, persisted, removed)
//! - Characters with ground probing
//! - Ray and shape casts
//! - Distance keeping constraints and throttle driven vehicles
//!
//! Rotated shapes collide through the AABB of their rotated bounds, so
//! results are plausible rather than exact.

use std::collections::{BTreeMap, BTreeSet};

use physbridge_core::{AuxBuffers, IndexedRegistry, Isometry, Quat, Vec3};
use physbridge_protocol::constants::{
    DOF_ROTATION_X, DOF_ROTATION_Y, DOF_ROTATION_Z, DOF_TRANSLATION_X, DOF_TRANSLATION_Y,
    DOF_TRANSLATION_Z,
};
use physbridge_protocol::{
    BodyDesc, BodyMutation, Buoyancy, CharacterDesc, CharacterMutation, CompoundChild, ConstraintDesc,
    ConstraintMutation, ConstraintType, ContactType, GroundState, HeightFieldRef, MassOverride, MeshRef,
    MotionType, MotorState, RayCast, ShapeCast, ShapeGeometry, ShapeSettings, SoftBodyDesc, VehicleDesc,
    VehicleInput, WheelDesc, DEFAULT_DENSITY,
};

use super::{
    BodyHandle, BodyKind, BodyState, ConstraintHandle, GroundInfo, PhysicsEngine, RawCharacterContact,
    RawContact, RawHit, ShapeHandle,
};
use crate::config::BackendConfig;
use crate::error::{EngineError, EngineResult};

/// Speed below which a body counts as resting.
const SLEEP_SPEED: f32 = 0.05;
/// Seconds a body must rest before it falls asleep.
const SLEEP_TIME: f32 = 0.5;
/// How far below a character's feet ground is searched for.
const GROUND_REACH: f32 = 0.05;
/// Deepest overlap a character shape switch tolerates.
const MAX_SHAPE_PENETRATION: f32 = 0.1;
/// Lightest body the solver accepts.
const MIN_MASS: f32 = 0.001;
/// Fraction of speed a fully pressed brake removes per step.
const BRAKE_RATE: f32 = 0.1;
/// Object layer of characters.
const CHARACTER_LAYER: u16 = 1;

/// Corner indices of the box triangles, two per face.
const BOX_FACES: [[usize; 6]; 6] = [
    // Bottom
    [0, 1, 2, 0, 2, 3],
    // Top
    [4, 6, 5, 4, 7, 6],
    // Front
    [0, 4, 5, 0, 5, 1],
    // Back
    [3, 2, 6, 3, 6, 7],
    // Left
    [0, 3, 7, 0, 7, 4],
    // Right
    [1, 5, 6, 1, 6, 2],
];

// ============================================================================
// AABB (Axis-Aligned Bounding Box)
// ============================================================================

/// Axis-Aligned Bounding Box for collision detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two opposite corners in any order.
    #[must_use]
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    /// Creates a box centered at `center`.
    #[must_use]
    pub fn from_center(center: Vec3, half_extent: Vec3) -> Self {
        Self::from_corners(center - half_extent, center + half_extent)
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size on each axis.
    #[must_use]
    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Enclosed volume.
    #[must_use]
    pub fn volume(&self) -> f32 {
        let size = self.max - self.min;
        size.x * size.y * size.z
    }

    /// Checks if this box intersects another. Touching faces do not count.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// True if `point` is inside or on the box.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Returns the overlap amount on each axis. Positive = overlap, Negative = gap.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Vec3 {
        self.max.min(other.max) - self.min.max(other.min)
    }

    /// Smallest box holding both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grows the box by `by` on every side.
    #[must_use]
    pub fn expand(&self, by: Vec3) -> Self {
        Self::from_corners(self.min - by, self.max + by)
    }

    /// Moves the box by delta.
    #[must_use]
    pub fn translate(&self, delta: Vec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Scales both corners around the origin.
    #[must_use]
    pub fn scaled(&self, scale: Vec3) -> Self {
        Self::from_corners(self.min.mul_elements(scale), self.max.mul_elements(scale))
    }

    /// Bounds of this box after a rotation and translation.
    #[must_use]
    pub fn transformed(&self, position: Vec3, rotation: Quat) -> Self {
        let half = self.half_extent();
        let extent = abs(rotation.rotate(Vec3::X)) * half.x
            + abs(rotation.rotate(Vec3::Y)) * half.y
            + abs(rotation.rotate(Vec3::Z)) * half.z;
        Self::from_center(position + rotation.rotate(self.center()), extent)
    }

    /// Slab test for the segment `origin .. origin + direction`.
    ///
    /// Returns the entry fraction and face normal. A segment starting inside
    /// the box hits at fraction 0 with a zero normal.
    #[must_use]
    pub fn ray_hit(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x, Vec3::X),
            (origin.y, direction.y, self.min.y, self.max.y, Vec3::Y),
            (origin.z, direction.z, self.min.z, self.max.z, Vec3::Z),
        ];

        let mut enter = 0.0_f32;
        let mut exit = 1.0_f32;
        let mut normal = Vec3::ZERO;

        for (o, d, lo, hi, axis) in axes {
            if d.abs() <= f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (mut near, mut far) = ((lo - o) * inv, (hi - o) * inv);
            let mut face = -axis;
            if near > far {
                std::mem::swap(&mut near, &mut far);
                face = axis;
            }
            if near > enter {
                enter = near;
                normal = face;
            }
            exit = exit.min(far);
            if enter > exit {
                return None;
            }
        }

        Some((enter, normal))
    }

    /// Vertices of the 12 triangles of the box, as packed `f32` triples.
    pub fn push_triangles(&self, out: &mut Vec<f32>) {
        let (x0, y0, z0) = (self.min.x, self.min.y, self.min.z);
        let (x1, y1, z1) = (self.max.x, self.max.y, self.max.z);

        let corners = [
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y0, z1],
            [x0, y0, z1],
            [x0, y1, z0],
            [x1, y1, z0],
            [x1, y1, z1],
            [x0, y1, z1],
        ];

        for face in BOX_FACES {
            for corner in face {
                out.extend_from_slice(&corners[corner]);
            }
        }
    }
}

fn abs(v: Vec3) -> Vec3 {
    Vec3::new(v.x.abs(), v.y.abs(), v.z.abs())
}

/// Axis of least penetration, pointing along `towards`.
fn separation_axis(overlap: Vec3, towards: Vec3) -> (Vec3, f32) {
    let pick = |axis: Vec3, component: f32| if component < 0.0 { -axis } else { axis };
    if overlap.x <= overlap.y && overlap.x <= overlap.z {
        (pick(Vec3::X, towards.x), overlap.x)
    } else if overlap.y <= overlap.z {
        (pick(Vec3::Y, towards.y), overlap.y)
    } else {
        (pick(Vec3::Z, towards.z), overlap.z)
    }
}

fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let m = origin - center;
    let c = m.dot(m) - radius * radius;
    if c <= 0.0 {
        return Some((0.0, Vec3::ZERO));
    }
    let a = direction.dot(direction);
    if a <= f32::EPSILON {
        return None;
    }
    let b = m.dot(direction);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / a;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let point = origin + direction * t;
    Some((t, (point - center).normalize_or_zero()))
}

fn integrate_rotation(rotation: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
    let angle = angular_velocity.length() * dt;
    if angle <= f32::EPSILON {
        return rotation;
    }
    (Quat::from_axis_angle(angular_velocity, angle) * rotation).normalize()
}

/// Angular velocity that turns `from` into `to` over `time` seconds.
fn angular_velocity_between(from: Quat, to: Quat, time: f32) -> Vec3 {
    let mut delta = to * Quat::new(-from.x, -from.y, -from.z, from.w);
    if delta.w < 0.0 {
        delta = Quat::new(-delta.x, -delta.y, -delta.z, -delta.w);
    }
    let axis = Vec3::new(delta.x, delta.y, delta.z);
    let sin = axis.length();
    if sin <= f32::EPSILON {
        return Vec3::ZERO;
    }
    let angle = 2.0 * sin.atan2(delta.w);
    axis * (angle / (sin * time))
}

fn clamp_speed(velocity: Vec3, min: f32, max: f32) -> EngineResult<Vec3> {
    if !(min >= 0.0 && min <= max) {
        return Err(EngineError::InvalidValue(format!("speed range [{min}, {max}]")));
    }
    Ok(velocity.clamp_length(min, max))
}

fn non_negative(value: f32, what: &str) -> EngineResult<f32> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidValue(format!("{what} must be non-negative, got {value}")))
    }
}

// ============================================================================
// SHAPES
// ============================================================================

/// Collision summary of a built shape.
#[derive(Clone, Debug, PartialEq)]
struct ShapeData {
    /// Bounds in body space.
    bounds: Aabb,
    /// Radius, for a centered uniform sphere.
    sphere: Option<f32>,
    /// Mass from density and volume.
    mass: f32,
    /// Children, for a mutable compound.
    parts: Option<CompoundParts>,
}

impl ShapeData {
    /// An emptied mutable compound touches nothing.
    fn is_hollow(&self) -> bool {
        self.parts.as_ref().is_some_and(|parts| parts.children.is_empty())
    }
}

/// One child of a mutable compound.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CompoundPart {
    /// Child bounds in child space.
    local: Aabb,
    position: Vec3,
    rotation: Quat,
    user_data: u32,
}

impl CompoundPart {
    fn bounds(&self) -> Aabb {
        self.local.transformed(self.position, self.rotation)
    }
}

/// Children of a mutable compound plus the compound's own scale and offset,
/// kept so the bounds can be rebuilt after every edit.
#[derive(Clone, Debug, PartialEq)]
struct CompoundParts {
    children: Vec<CompoundPart>,
    scale: Option<Vec3>,
    offset: Option<(Vec3, Quat)>,
}

impl CompoundParts {
    fn bounds(&self) -> Aabb {
        let mut bounds = self
            .children
            .iter()
            .map(CompoundPart::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| Aabb::from_center(Vec3::ZERO, Vec3::ZERO));
        if let Some(scale) = self.scale {
            bounds = bounds.scaled(scale);
        }
        if let Some((position, rotation)) = self.offset {
            bounds = bounds.transformed(position, rotation);
        }
        bounds
    }
}

fn build_shape(settings: &ShapeSettings, aux: &AuxBuffers) -> EngineResult<ShapeData> {
    let (bounds, mut sphere) = match &settings.geometry {
        ShapeGeometry::Box { half_extent, .. } => (Aabb::from_center(Vec3::ZERO, *half_extent), None),
        ShapeGeometry::Capsule { half_height, radius } => (
            Aabb::from_center(Vec3::ZERO, Vec3::new(*radius, half_height + radius, *radius)),
            None,
        ),
        ShapeGeometry::Cylinder {
            half_height, radius, ..
        } => (
            Aabb::from_center(Vec3::ZERO, Vec3::new(*radius, *half_height, *radius)),
            None,
        ),
        ShapeGeometry::Sphere { radius } => (
            Aabb::from_center(Vec3::ZERO, Vec3::new(*radius, *radius, *radius)),
            Some(*radius),
        ),
        ShapeGeometry::Mesh(mesh) => (mesh_bounds(mesh, aux, true)?, None),
        ShapeGeometry::ConvexHull(mesh) => (mesh_bounds(mesh, aux, false)?, None),
        ShapeGeometry::StaticCompound(children) => (compound_bounds(children, aux)?, None),
        ShapeGeometry::HeightField(field) => (height_field_bounds(field, aux)?, None),
        ShapeGeometry::MutableCompound(children) => {
            let parts = CompoundParts {
                children: compound_parts(children, aux)?,
                scale: settings.scale,
                offset: settings.offset,
            };
            let density = settings.density.unwrap_or(DEFAULT_DENSITY);
            let bounds = parts.bounds();
            return Ok(ShapeData {
                bounds,
                sphere: None,
                mass: (density * bounds.volume()).max(MIN_MASS),
                parts: Some(parts),
            });
        }
    };

    let half = bounds.half_extent();
    if !(bounds.min.is_finite() && bounds.max.is_finite()) || half.x < 0.0 || half.y < 0.0 || half.z < 0.0 {
        return Err(EngineError::InvalidGeometry(format!(
            "{:?} has invalid extents",
            settings.geometry.shape_type()
        )));
    }

    let mut bounds = bounds;
    if let Some(scale) = settings.scale {
        bounds = bounds.scaled(scale);
        let uniform = (scale.x.abs() - scale.y.abs()).abs() <= f32::EPSILON
            && (scale.x.abs() - scale.z.abs()).abs() <= f32::EPSILON;
        sphere = sphere.filter(|_| uniform).map(|radius| radius * scale.x.abs());
    }
    if let Some((position, rotation)) = settings.offset {
        bounds = bounds.transformed(position, rotation);
    }

    let volume = match sphere {
        Some(radius) => 4.0 / 3.0 * std::f32::consts::PI * radius * radius * radius,
        None => bounds.volume(),
    };
    let density = settings.density.unwrap_or(DEFAULT_DENSITY);

    Ok(ShapeData {
        bounds,
        sphere: sphere.filter(|_| settings.offset.is_none()),
        mass: (density * volume).max(MIN_MASS),
        parts: None,
    })
}

fn mesh_bounds(mesh: &MeshRef, aux: &AuxBuffers, triangles: bool) -> EngineResult<Aabb> {
    if mesh.stride < 3 || mesh.vertex_count == 0 {
        return Err(EngineError::InvalidGeometry(format!(
            "mesh needs at least one vertex of 3 floats, got {} x {}",
            mesh.vertex_count, mesh.stride
        )));
    }

    let stride = usize::from(mesh.stride);
    let floats = aux.f32_values(mesh.positions, mesh.offset as usize, mesh.vertex_count as usize * stride)?;

    if triangles && (mesh.index_count == 0 || mesh.index_count % 3 != 0) {
        return Err(EngineError::InvalidGeometry(format!(
            "triangle mesh needs whole triangles, got {} indices",
            mesh.index_count
        )));
    }
    if mesh.index_count > 0 {
        let indices = aux.index_values(
            mesh.indices,
            mesh.index_offset as usize,
            mesh.index_count as usize,
            mesh.wide_indices(),
        )?;
        if let Some(bad) = indices
            .iter()
            .skip(usize::from(mesh.base))
            .find(|&&index| index >= mesh.vertex_count)
        {
            return Err(EngineError::InvalidGeometry(format!(
                "index {bad} out of range for {} vertices",
                mesh.vertex_count
            )));
        }
    }

    let mut vertices = floats
        .chunks_exact(stride)
        .map(|v| Vec3::new(v[0], v[1], v[2]));
    let first = vertices
        .next()
        .ok_or_else(|| EngineError::InvalidGeometry("mesh has no vertices".to_string()))?;
    Ok(vertices.fold(Aabb::from_corners(first, first), |bounds, v| {
        bounds.union(&Aabb::from_corners(v, v))
    }))
}

fn compound_bounds(children: &[CompoundChild], aux: &AuxBuffers) -> EngineResult<Aabb> {
    let mut bounds: Option<Aabb> = None;
    for child in children {
        let child_bounds = build_shape(&child.shape, aux)?
            .bounds
            .transformed(child.position, child.rotation);
        bounds = Some(bounds.map_or(child_bounds, |b| b.union(&child_bounds)));
    }
    bounds.ok_or_else(|| EngineError::InvalidGeometry("static compound has no children".to_string()))
}

fn compound_parts(children: &[CompoundChild], aux: &AuxBuffers) -> EngineResult<Vec<CompoundPart>> {
    children
        .iter()
        .map(|child| {
            Ok(CompoundPart {
                local: build_shape(&child.shape, aux)?.bounds,
                position: child.position,
                rotation: child.rotation.normalize(),
                user_data: 0,
            })
        })
        .collect()
}

/// Samples below zero are holes.
fn height_field_bounds(field: &HeightFieldRef, aux: &AuxBuffers) -> EngineResult<Aabb> {
    let count = field.sample_count as usize;
    if count < 2 {
        return Err(EngineError::InvalidGeometry(format!(
            "height field needs at least 2x2 samples, got {count}"
        )));
    }

    let samples = aux.f32_values(field.samples, 0, count * count)?;
    let (low, high) = samples
        .iter()
        .copied()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .fold(None, |range: Option<(f32, f32)>, s| {
            Some(range.map_or((s, s), |(lo, hi)| (lo.min(s), hi.max(s))))
        })
        .ok_or_else(|| EngineError::InvalidGeometry("height field has no solid samples".to_string()))?;

    #[allow(clippy::cast_precision_loss)]
    let extent = (count - 1) as f32;
    let origin = field.offset;
    Ok(Aabb::from_corners(
        Vec3::new(origin.x, origin.y + low * field.scale.y, origin.z),
        Vec3::new(
            origin.x + extent * field.scale.x,
            origin.y + high * field.scale.y,
            origin.z + extent * field.scale.z,
        ),
    ))
}

// ============================================================================
// BODIES
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct CharacterData {
    up: Vec3,
    max_slope_cos: f32,
    ground: GroundInfo,
}

#[derive(Clone, Debug)]
struct SandboxBody {
    kind: BodyKind,
    shape: ShapeData,
    position: Vec3,
    rotation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    force: Vec3,
    torque: Vec3,
    mass: f32,
    inverse_mass: f32,
    gravity_factor: f32,
    linear_damping: f32,
    angular_damping: f32,
    max_linear_velocity: f32,
    max_angular_velocity: f32,
    friction: f32,
    restitution: f32,
    allowed_dofs: u8,
    is_sensor: bool,
    allow_sleeping: bool,
    awake: bool,
    sleep_timer: f32,
    object_layer: u16,
    group: Option<u32>,
    sub_group: Option<u32>,
    /// Group and mask bits; replaces the layer pair test when both bodies carry one.
    bit_filter: Option<(u32, u32)>,
    solver: SolverSettings,
    character: Option<CharacterData>,
}

/// Per-body solver switches the box solver stores but does not model,
/// apart from kinematic contacts with non-dynamic bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverSettings {
    /// Kinematic body reports contacts with static and kinematic bodies.
    pub collide_kinematic_vs_non_dynamic: bool,
    /// Gyroscopic force is applied.
    pub gyroscopic_force: bool,
    /// Enhanced internal edge removal.
    pub enhanced_internal_edge_removal: bool,
    /// Velocity step override, 0 for the world default.
    pub velocity_steps: u32,
    /// Position step override, 0 for the world default.
    pub position_steps: u32,
}

impl SandboxBody {
    fn new(kind: BodyKind, shape: ShapeData, position: Vec3, rotation: Quat, mass: f32) -> Self {
        let mut body = Self {
            kind,
            shape,
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass: mass.max(MIN_MASS),
            inverse_mass: 0.0,
            gravity_factor: 1.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
            max_linear_velocity: 500.0,
            max_angular_velocity: 0.25 * std::f32::consts::PI * 60.0,
            friction: 0.2,
            restitution: 0.0,
            allowed_dofs: physbridge_protocol::constants::DOF_ALL,
            is_sensor: false,
            allow_sleeping: true,
            awake: false,
            sleep_timer: 0.0,
            object_layer: 1,
            group: None,
            sub_group: None,
            bit_filter: None,
            solver: SolverSettings::default(),
            character: None,
        };
        body.set_kind(kind);
        body
    }

    fn set_kind(&mut self, kind: BodyKind) {
        self.kind = kind;
        self.inverse_mass = if kind == BodyKind::Dynamic { 1.0 / self.mass } else { 0.0 };
        if kind == BodyKind::Static {
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
            self.awake = false;
        } else {
            self.wake();
        }
    }

    fn wake(&mut self) {
        if self.kind != BodyKind::Static {
            self.awake = true;
            self.sleep_timer = 0.0;
        }
    }

    fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Kinematic bodies that asked for contacts with non-dynamic bodies.
    fn touches_non_dynamic(&self) -> bool {
        self.kind == BodyKind::Kinematic && self.solver.collide_kinematic_vs_non_dynamic
    }

    fn compound_mut(&mut self) -> EngineResult<&mut CompoundParts> {
        self.shape
            .parts
            .as_mut()
            .ok_or_else(|| EngineError::InvalidValue("body shape is not a mutable compound".to_string()))
    }

    /// Rebuilds the bounds after a child edit.
    fn refit(&mut self) {
        if let Some(parts) = &self.shape.parts {
            self.shape.bounds = parts.bounds();
        }
        self.wake();
    }

    fn is_solid_for_characters(&self) -> bool {
        self.character.is_none() && !self.is_sensor
    }

    fn bounds(&self) -> Aabb {
        self.shape.bounds.transformed(self.position, self.rotation)
    }

    fn state(&self) -> BodyState {
        BodyState {
            position: self.position,
            rotation: self.rotation,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
        }
    }

    fn mask_dofs(&mut self) {
        let dofs = self.allowed_dofs;
        let keep = |bit: u8, value: f32| if dofs & bit == 0 { 0.0 } else { value };
        let (v, w) = (self.linear_velocity, self.angular_velocity);
        self.linear_velocity = Vec3::new(
            keep(DOF_TRANSLATION_X, v.x),
            keep(DOF_TRANSLATION_Y, v.y),
            keep(DOF_TRANSLATION_Z, v.z),
        );
        self.angular_velocity = Vec3::new(
            keep(DOF_ROTATION_X, w.x),
            keep(DOF_ROTATION_Y, w.y),
            keep(DOF_ROTATION_Z, w.z),
        );
    }

    fn apply_buoyancy(&mut self, buoyancy: &Buoyancy, gravity: Vec3, dt: f32) {
        let normal = buoyancy.surface_normal.normalize_or_zero();
        let bounds = self.bounds();
        let half = bounds.half_extent();
        let reach = abs(normal).dot(half);
        if reach <= f32::EPSILON {
            return;
        }
        // Signed depth of the body center below the surface
        let depth = (buoyancy.surface_position - bounds.center()).dot(normal);
        let submerged = ((depth + reach) / (2.0 * reach)).clamp(0.0, 1.0);
        if submerged <= 0.0 {
            return;
        }

        self.linear_velocity += gravity * (-buoyancy.buoyancy * submerged * dt);
        self.linear_velocity += (buoyancy.fluid_velocity - self.linear_velocity)
            * (buoyancy.linear_drag * submerged * dt).min(1.0);
        self.angular_velocity = self.angular_velocity * (1.0 - buoyancy.angular_drag * submerged * dt).max(0.0);
        self.wake();
    }
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

#[derive(Clone, Debug)]
struct SandboxVehicle {
    up: Vec3,
    forward: Vec3,
    max_torque: f32,
    wheels: Vec<WheelDesc>,
    input: VehicleInput,
}

#[derive(Clone, Debug)]
enum Joint {
    /// Keeps the distance between two bodies inside a range.
    Link {
        kind: ConstraintType,
        body2: BodyHandle,
        min_distance: f32,
        max_distance: f32,
    },
    Vehicle(SandboxVehicle),
}

#[derive(Clone, Debug)]
struct SandboxConstraint {
    body1: BodyHandle,
    joint: Joint,
    enabled: bool,
    motor_state: MotorState,
    target_velocity: f32,
}

// ============================================================================
// CONTACTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
struct Manifold {
    normal: Vec3,
    depth: f32,
    offset: Vec3,
}

impl Manifold {
    fn between(a: &Aabb, b: &Aabb, normal: Vec3, depth: f32) -> Self {
        let region = Aabb::from_corners(a.min.max(b.min), a.max.min(b.max));
        Self {
            normal,
            depth,
            offset: region.center(),
        }
    }

    fn to_raw(self, kind: ContactType, (body1, body2): (BodyHandle, BodyHandle)) -> RawContact {
        let half = self.normal * (self.depth * 0.5);
        RawContact {
            kind,
            body1,
            body2,
            normal: self.normal,
            depth: self.depth,
            offset: self.offset,
            points1: vec![half],
            points2: vec![-half],
        }
    }
}

/// Outcome of one colliding pair.
struct Resolution {
    manifold: Manifold,
    push1: Vec3,
    push2: Vec3,
    velocity1: Vec3,
    velocity2: Vec3,
    wake1: bool,
    wake2: bool,
}

type Pair = (BodyHandle, BodyHandle);

/// Group filter table. Every pair collides unless listed as disabled, so
/// the table costs nothing until pairs are switched off.
#[derive(Clone, Debug, Default)]
struct GroupTable {
    sub_groups: u32,
    disabled: BTreeSet<(u32, u32)>,
}

impl GroupTable {
    fn key(a: u32, b: u32) -> (u32, u32) {
        (a.min(b), a.max(b))
    }

    fn collides(&self, a: u32, b: u32) -> bool {
        !self.disabled.contains(&Self::key(a, b))
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Reference engine used by the headless backend and the tests.
#[derive(Debug)]
pub struct SandboxEngine {
    gravity: Vec3,
    layer_pairs: Vec<[u16; 2]>,
    shapes: IndexedRegistry<ShapeData>,
    bodies: IndexedRegistry<SandboxBody>,
    constraints: IndexedRegistry<SandboxConstraint>,
    groups: Vec<GroupTable>,
    touching: BTreeMap<Pair, Manifold>,
    contacts: Vec<RawContact>,
    character_contacts: Vec<RawCharacterContact>,
    last_step: f32,
}

impl SandboxEngine {
    /// Creates an empty world.
    #[must_use]
    pub fn new(gravity: Vec3, layer_pairs: Vec<[u16; 2]>) -> Self {
        Self {
            gravity,
            layer_pairs,
            shapes: IndexedRegistry::new(),
            bodies: IndexedRegistry::new(),
            constraints: IndexedRegistry::new(),
            groups: Vec::new(),
            touching: BTreeMap::new(),
            contacts: Vec::new(),
            character_contacts: Vec::new(),
            last_step: 1.0 / 60.0,
        }
    }

    /// Creates an empty world with the configured gravity and layers.
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.gravity(), config.layer_pairs.clone())
    }

    /// Bodies and characters in the world.
    #[must_use]
    pub const fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Shapes still referenced by the caller.
    #[must_use]
    pub const fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Constraints and vehicles in the world.
    #[must_use]
    pub const fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// True if the body exists and is awake.
    #[must_use]
    pub fn is_awake(&self, body: BodyHandle) -> bool {
        self.bodies.get(body.raw()).is_some_and(|b| b.awake)
    }

    /// Solver switches of a body.
    #[must_use]
    pub fn solver_settings(&self, body: BodyHandle) -> Option<SolverSettings> {
        self.bodies.get(body.raw()).map(|b| b.solver)
    }

    /// Number of children of a body's mutable compound.
    #[must_use]
    pub fn child_count(&self, body: BodyHandle) -> Option<usize> {
        let parts = self.bodies.get(body.raw())?.shape.parts.as_ref()?;
        Some(parts.children.len())
    }

    /// Local transform and user data of one child of a mutable compound.
    #[must_use]
    pub fn child(&self, body: BodyHandle, child: u32) -> Option<(Isometry, u32)> {
        let parts = self.bodies.get(body.raw())?.shape.parts.as_ref()?;
        let part = parts.children.get(child as usize)?;
        Some((Isometry::new(part.position, part.rotation), part.user_data))
    }

    fn layers_collide(&self, a: &SandboxBody, b: &SandboxBody) -> bool {
        if let (Some((group1, mask1)), Some((group2, mask2))) = (a.bit_filter, b.bit_filter) {
            return group1 & mask2 != 0 && group2 & mask1 != 0;
        }
        self.layer_ids_collide(a.object_layer, b.object_layer)
    }

    fn layer_ids_collide(&self, a: u16, b: u16) -> bool {
        self.layer_pairs
            .iter()
            .any(|&[x, y]| (x == a && y == b) || (x == b && y == a))
    }

    fn groups_collide(&self, a: &SandboxBody, b: &SandboxBody) -> bool {
        match (a.group, b.group, a.sub_group, b.sub_group) {
            (Some(group), Some(other), Some(sub1), Some(sub2)) if group == other => self
                .groups
                .get(group as usize)
                .map_or(true, |table| table.collides(sub1, sub2)),
            _ => true,
        }
    }

    fn can_collide(&self, a: &SandboxBody, b: &SandboxBody) -> bool {
        self.layers_collide(a, b) && self.groups_collide(a, b)
    }

    fn check_group(&self, group: Option<u32>, sub_group: Option<u32>) -> EngineResult<()> {
        let Some(group) = group else {
            return Ok(());
        };
        let table = self
            .groups
            .get(group as usize)
            .ok_or(EngineError::MissingGroup(group))?;
        match sub_group {
            Some(sub_group) if sub_group >= table.sub_groups => {
                Err(EngineError::SubGroupOutOfRange { group, sub_group })
            }
            _ => Ok(()),
        }
    }

    fn shape(&self, shape: ShapeHandle) -> EngineResult<ShapeData> {
        self.shapes
            .get(shape.raw())
            .cloned()
            .ok_or(EngineError::InvalidHandle(shape.raw()))
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    fn drive_vehicles(&mut self) {
        for (_, constraint) in self.constraints.iter() {
            let Joint::Vehicle(vehicle) = &constraint.joint else {
                continue;
            };
            if !constraint.enabled {
                continue;
            }
            let Some(chassis) = self.bodies.get_mut(constraint.body1.raw()) else {
                continue;
            };
            if !chassis.is_dynamic() {
                continue;
            }

            let input = vehicle.input;
            let throttle = input.forward.clamp(-1.0, 1.0);
            let steer = input.right.clamp(-1.0, 1.0);
            if throttle.abs() > f32::EPSILON || steer.abs() > f32::EPSILON {
                chassis.wake();
            }

            chassis.force += chassis.rotation.rotate(vehicle.forward) * (vehicle.max_torque * throttle);
            // Steering right turns clockwise around up
            chassis.torque += chassis.rotation.rotate(vehicle.up) * (-vehicle.max_torque * steer);

            let brake = input.brake.max(input.hand_brake).clamp(0.0, 1.0);
            if brake > 0.0 {
                chassis.linear_velocity = chassis.linear_velocity * (1.0 - brake * BRAKE_RATE);
            }
        }
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        for (_, body) in self.bodies.iter_mut() {
            if !body.awake || body.character.is_some() {
                continue;
            }
            match body.kind {
                BodyKind::Dynamic => {
                    let acceleration = gravity * body.gravity_factor + body.force * body.inverse_mass;
                    body.linear_velocity += acceleration * dt;
                    body.angular_velocity += body.torque * (body.inverse_mass * dt);
                    body.linear_velocity = body.linear_velocity * (1.0 / (1.0 + body.linear_damping * dt));
                    body.angular_velocity = body.angular_velocity * (1.0 / (1.0 + body.angular_damping * dt));
                    body.linear_velocity = body.linear_velocity.clamp_length(0.0, body.max_linear_velocity);
                    body.angular_velocity = body.angular_velocity.clamp_length(0.0, body.max_angular_velocity);
                    body.mask_dofs();
                }
                BodyKind::Kinematic => {}
                BodyKind::Static | BodyKind::Character => continue,
            }
            body.position += body.linear_velocity * dt;
            body.rotation = integrate_rotation(body.rotation, body.angular_velocity, dt);
        }
    }

    fn solve_constraints(&mut self) {
        for (_, constraint) in self.constraints.iter() {
            let Joint::Link {
                body2,
                min_distance,
                max_distance,
                ..
            } = constraint.joint
            else {
                continue;
            };
            if !constraint.enabled {
                continue;
            }
            let (id1, id2) = (constraint.body1.raw(), body2.raw());
            let (Some(a), Some(b)) = (self.bodies.get(id1), self.bodies.get(id2)) else {
                continue;
            };

            let total = a.inverse_mass + b.inverse_mass;
            let delta = b.position - a.position;
            let distance = delta.length();
            if total <= 0.0 || distance <= f32::EPSILON {
                continue;
            }
            let error = distance - distance.clamp(min_distance, max_distance);
            let motor = constraint.motor_state == MotorState::Velocity;
            if error.abs() <= f32::EPSILON && !motor {
                continue;
            }

            let normal = delta * (1.0 / distance);
            let (w1, w2) = (a.inverse_mass / total, b.inverse_mass / total);
            let separating = (b.linear_velocity - a.linear_velocity).dot(normal);
            // Only cancel velocity that makes the error worse
            let mut correction = if separating * error > 0.0 { separating } else { 0.0 };
            if motor {
                correction = separating - constraint.target_velocity;
            }

            if let Some(a) = self.bodies.get_mut(id1) {
                a.position += normal * (error * w1);
                a.linear_velocity += normal * (correction * w1);
            }
            if let Some(b) = self.bodies.get_mut(id2) {
                b.position = b.position - normal * (error * w2);
                b.linear_velocity = b.linear_velocity - normal * (correction * w2);
            }
        }
    }

    fn resolve_pair(&self, id1: u32, id2: u32) -> Option<Resolution> {
        let (a, b) = (self.bodies.get(id1)?, self.bodies.get(id2)?);
        if !a.is_dynamic() && !b.is_dynamic() && !a.touches_non_dynamic() && !b.touches_non_dynamic() {
            return None;
        }
        if a.shape.is_hollow() || b.shape.is_hollow() {
            return None;
        }
        if !a.awake && !b.awake {
            return None;
        }
        if !self.can_collide(a, b) {
            return None;
        }

        let (bounds1, bounds2) = (a.bounds(), b.bounds());
        if !bounds1.intersects(&bounds2) {
            return None;
        }
        let (normal, depth) = separation_axis(bounds1.overlap(&bounds2), bounds2.center() - bounds1.center());
        let manifold = Manifold::between(&bounds1, &bounds2, normal, depth);

        let mut resolution = Resolution {
            manifold,
            push1: Vec3::ZERO,
            push2: Vec3::ZERO,
            velocity1: a.linear_velocity,
            velocity2: b.linear_velocity,
            wake1: !a.awake && b.linear_velocity.length() > SLEEP_SPEED,
            wake2: !b.awake && a.linear_velocity.length() > SLEEP_SPEED,
        };
        let total = a.inverse_mass + b.inverse_mass;
        if a.is_sensor || b.is_sensor || total <= 0.0 {
            return Some(resolution);
        }

        resolution.push1 = normal * (-depth * a.inverse_mass / total);
        resolution.push2 = normal * (depth * b.inverse_mass / total);

        let approaching = (b.linear_velocity - a.linear_velocity).dot(normal);
        if approaching < 0.0 {
            let restitution = a.restitution.max(b.restitution);
            let impulse = -(1.0 + restitution) * approaching / total;
            let mut v1 = a.linear_velocity - normal * (impulse * a.inverse_mass);
            let mut v2 = b.linear_velocity + normal * (impulse * b.inverse_mass);

            let relative = v2 - v1;
            let tangent = relative - normal * relative.dot(normal);
            let speed = tangent.length();
            if speed > f32::EPSILON {
                let friction = (a.friction * b.friction).max(0.0).sqrt();
                let friction_impulse = (speed / total).min(friction * impulse);
                let direction = tangent * (1.0 / speed);
                v1 += direction * (friction_impulse * a.inverse_mass);
                v2 = v2 - direction * (friction_impulse * b.inverse_mass);
            }

            resolution.velocity1 = v1;
            resolution.velocity2 = v2;
        }
        Some(resolution)
    }

    fn collide(&mut self, current: &mut BTreeMap<Pair, Manifold>) {
        let ids: Vec<u32> = self
            .bodies
            .iter()
            .filter(|(_, body)| body.character.is_none())
            .map(|(id, _)| id)
            .collect();

        for (n, &id1) in ids.iter().enumerate() {
            for &id2 in &ids[n + 1..] {
                let Some(resolution) = self.resolve_pair(id1, id2) else {
                    continue;
                };
                current.insert(
                    (BodyHandle::from_raw(id1), BodyHandle::from_raw(id2)),
                    resolution.manifold,
                );

                if let Some(a) = self.bodies.get_mut(id1) {
                    a.position += resolution.push1;
                    if a.is_dynamic() {
                        a.linear_velocity = resolution.velocity1;
                    }
                    if resolution.wake1 {
                        a.wake();
                    }
                }
                if let Some(b) = self.bodies.get_mut(id2) {
                    b.position += resolution.push2;
                    if b.is_dynamic() {
                        b.linear_velocity = resolution.velocity2;
                    }
                    if resolution.wake2 {
                        b.wake();
                    }
                }
            }
        }
    }

    fn update_sleep(&mut self, dt: f32) {
        for (_, body) in self.bodies.iter_mut() {
            if !body.awake || body.character.is_some() {
                continue;
            }
            if !body.allow_sleeping {
                body.sleep_timer = 0.0;
                continue;
            }
            let resting = body.linear_velocity.length() < SLEEP_SPEED && body.angular_velocity.length() < SLEEP_SPEED;
            if !resting {
                body.sleep_timer = 0.0;
                continue;
            }
            body.sleep_timer += dt;
            if body.sleep_timer >= SLEEP_TIME {
                body.awake = false;
                body.linear_velocity = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
            }
        }
    }

    fn both_asleep(&self, (body1, body2): Pair) -> bool {
        let asleep = |body: BodyHandle| self.bodies.get(body.raw()).is_some_and(|b| !b.awake);
        asleep(body1) && asleep(body2)
    }

    fn publish_contacts(&mut self, mut current: BTreeMap<Pair, Manifold>) {
        let previous = std::mem::take(&mut self.touching);

        for (&pair, manifold) in &current {
            let kind = if previous.contains_key(&pair) {
                ContactType::Persisted
            } else {
                ContactType::Added
            };
            self.contacts.push(manifold.to_raw(kind, pair));
        }
        for (pair, manifold) in previous {
            if current.contains_key(&pair) {
                continue;
            }
            // Sleeping pairs keep their contact without reporting it
            if self.both_asleep(pair) {
                current.insert(pair, manifold);
            } else {
                self.contacts.push(manifold.to_raw(ContactType::Removed, pair));
            }
        }

        self.touching = current;
    }

    /// Overlap of a candidate character box with the world.
    fn deepest_overlap(&self, character: u32, bounds: &Aabb, layer: u16) -> f32 {
        self.bodies
            .iter()
            .filter(|&(id, other)| {
                id != character && other.is_solid_for_characters() && self.layer_ids_collide(layer, other.object_layer)
            })
            .map(|(_, other)| other.bounds())
            .filter(|other| bounds.intersects(other))
            .map(|other| separation_axis(bounds.overlap(&other), Vec3::ZERO).1)
            .fold(0.0, f32::max)
    }
}

impl Default for SandboxEngine {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

impl PhysicsEngine for SandboxEngine {
    fn create_shape(&mut self, settings: &ShapeSettings, aux: &AuxBuffers) -> EngineResult<ShapeHandle> {
        let data = build_shape(settings, aux)?;
        Ok(ShapeHandle::from_raw(self.shapes.allocate(data)))
    }

    fn release_shape(&mut self, shape: ShapeHandle) {
        self.shapes.free(shape.raw());
    }

    fn create_group_table(&mut self, sub_groups: u32) -> EngineResult<u32> {
        let index = u32::try_from(self.groups.len())
            .map_err(|_| EngineError::InvalidValue("too many group tables".to_string()))?;
        self.groups.push(GroupTable {
            sub_groups,
            disabled: BTreeSet::new(),
        });
        Ok(index)
    }

    fn toggle_group_pair(&mut self, group: u32, sub_group1: u32, sub_group2: u32, enable: bool) -> EngineResult<()> {
        let table = self
            .groups
            .get_mut(group as usize)
            .ok_or(EngineError::MissingGroup(group))?;
        for sub_group in [sub_group1, sub_group2] {
            if sub_group >= table.sub_groups {
                return Err(EngineError::SubGroupOutOfRange { group, sub_group });
            }
        }
        let key = GroupTable::key(sub_group1, sub_group2);
        if enable {
            table.disabled.remove(&key);
        } else {
            table.disabled.insert(key);
        }
        Ok(())
    }

    fn create_body(&mut self, desc: &BodyDesc, shape: ShapeHandle) -> EngineResult<BodyHandle> {
        let shape = self.shape(shape)?;
        self.check_group(desc.group, desc.sub_group)?;

        let mass = match desc.mass {
            MassOverride::Calculate => shape.mass,
            MassOverride::CalculateInertia { mass } | MassOverride::Provided { mass, .. } => {
                if !(mass.is_finite() && mass > 0.0) {
                    return Err(EngineError::InvalidValue(format!("mass must be positive, got {mass}")));
                }
                mass
            }
        };
        let kind = match desc.motion_type {
            MotionType::Static => BodyKind::Static,
            MotionType::Kinematic => BodyKind::Kinematic,
            MotionType::Dynamic => BodyKind::Dynamic,
        };

        let mut body = SandboxBody::new(kind, shape, desc.position, desc.rotation.normalize(), mass);
        if kind != BodyKind::Static {
            body.linear_velocity = desc.linear_velocity;
            body.angular_velocity = desc.angular_velocity;
        }
        body.max_linear_velocity = non_negative(desc.max_linear_velocity, "max linear velocity")?;
        body.max_angular_velocity = non_negative(desc.max_angular_velocity, "max angular velocity")?;
        body.friction = desc.friction;
        body.restitution = desc.restitution;
        body.linear_damping = desc.linear_damping;
        body.angular_damping = desc.angular_damping;
        body.gravity_factor = desc.gravity_factor;
        body.allowed_dofs = desc.allowed_dofs;
        body.is_sensor = desc.is_sensor;
        body.allow_sleeping = desc.allow_sleeping;
        body.object_layer = desc.object_layer;
        body.group = desc.group;
        body.sub_group = desc.sub_group;

        let id = self.bodies.allocate(body);
        tracing::trace!("Sandbox body {} created ({:?})", id, kind);
        Ok(BodyHandle::from_raw(id))
    }

    fn create_soft_body(&mut self, desc: &SoftBodyDesc, aux: &AuxBuffers) -> EngineResult<BodyHandle> {
        self.check_group(desc.group, desc.sub_group)?;
        let bounds = mesh_bounds(&desc.mesh, aux, true)?;
        let shape = ShapeData {
            bounds,
            sphere: None,
            mass: (bounds.volume() * DEFAULT_DENSITY).max(MIN_MASS),
            parts: None,
        };
        let rotation = if desc.make_rotation_identity {
            Quat::IDENTITY
        } else {
            desc.rotation.normalize()
        };

        let mass = shape.mass;
        let mut body = SandboxBody::new(BodyKind::Dynamic, shape, desc.position, rotation, mass);
        body.linear_damping = desc.linear_damping;
        body.max_linear_velocity = non_negative(desc.max_linear_velocity, "max linear velocity")?;
        body.restitution = desc.restitution;
        body.friction = desc.friction;
        body.gravity_factor = desc.gravity_factor;
        body.allow_sleeping = desc.allow_sleeping;
        body.object_layer = desc.object_layer;
        body.group = desc.group;
        body.sub_group = desc.sub_group;

        Ok(BodyHandle::from_raw(self.bodies.allocate(body)))
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        if self.bodies.free(body.raw()).is_none() {
            return;
        }
        let ended: Vec<Pair> = self
            .touching
            .keys()
            .filter(|(a, b)| *a == body || *b == body)
            .copied()
            .collect();
        for pair in ended {
            if let Some(manifold) = self.touching.remove(&pair) {
                self.contacts.push(manifold.to_raw(ContactType::Removed, pair));
            }
        }
    }

    fn body_kind(&self, body: BodyHandle) -> Option<BodyKind> {
        self.bodies.get(body.raw()).map(|b| b.kind)
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(body.raw()).map(SandboxBody::state)
    }

    fn active_bodies(&self, out: &mut Vec<BodyHandle>) {
        out.extend(
            self.bodies
                .iter()
                .filter(|(_, b)| b.awake && b.character.is_none() && b.kind != BodyKind::Static)
                .map(|(id, _)| BodyHandle::from_raw(id)),
        );
    }

    fn activate_body(&mut self, body: BodyHandle) {
        if let Some(body) = self.bodies.get_mut(body.raw()) {
            body.wake();
        }
    }

    fn apply(&mut self, handle: BodyHandle, mutation: &BodyMutation) -> EngineResult<()> {
        if let BodyMutation::SetCollisionGroup { group, sub_group } = *mutation {
            let current = self.bodies.get(handle.raw()).and_then(|b| b.group);
            self.check_group(group.or(current), sub_group)?;
        }
        let (gravity, dt) = (self.gravity, self.last_step);
        let Some(body) = self.bodies.get_mut(handle.raw()) else {
            return Ok(());
        };

        match *mutation {
            BodyMutation::AddForce { force, offset } => {
                body.force += force;
                if let Some(point) = offset {
                    body.torque += (point - body.position).cross(force);
                }
                body.wake();
            }
            BodyMutation::AddImpulse { impulse, offset } => {
                body.linear_velocity += impulse * body.inverse_mass;
                if let Some(point) = offset {
                    body.angular_velocity += (point - body.position).cross(impulse) * body.inverse_mass;
                }
                body.wake();
            }
            BodyMutation::AddAngularImpulse(impulse) => {
                body.angular_velocity += impulse * body.inverse_mass;
                body.wake();
            }
            BodyMutation::ApplyBuoyancyImpulse(ref buoyancy) => {
                if body.is_dynamic() {
                    body.apply_buoyancy(buoyancy, gravity, dt);
                }
            }
            BodyMutation::AddTorque(torque) => {
                body.torque += torque;
                body.wake();
            }
            BodyMutation::MoveBody { position, rotation } => {
                body.position = position;
                body.rotation = rotation.normalize();
                body.wake();
            }
            BodyMutation::MoveKinematic {
                position,
                rotation,
                time,
            } => {
                if !(time.is_finite() && time > 0.0) {
                    return Err(EngineError::InvalidValue(format!("kinematic move time {time}")));
                }
                body.linear_velocity = (position - body.position) * (1.0 / time);
                body.angular_velocity = angular_velocity_between(body.rotation, rotation.normalize(), time);
                body.wake();
            }
            BodyMutation::SetLinearVelocity(velocity) => {
                if body.kind != BodyKind::Static {
                    body.linear_velocity = velocity;
                    body.wake();
                }
            }
            BodyMutation::SetAngularVelocity(velocity) => {
                if body.kind != BodyKind::Static {
                    body.angular_velocity = velocity;
                    body.wake();
                }
            }
            BodyMutation::ResetMotion => {
                body.linear_velocity = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
                body.force = Vec3::ZERO;
                body.torque = Vec3::ZERO;
            }
            BodyMutation::SetMotionType(motion_type) => body.set_kind(match motion_type {
                MotionType::Static => BodyKind::Static,
                MotionType::Kinematic => BodyKind::Kinematic,
                MotionType::Dynamic => BodyKind::Dynamic,
            }),
            BodyMutation::SetObjectLayer(layer) => body.object_layer = layer,
            BodyMutation::SetGravityFactor(factor) => {
                body.gravity_factor = factor;
                body.wake();
            }
            BodyMutation::SetAllowedDofs(dofs) => {
                body.allowed_dofs = dofs;
                body.mask_dofs();
            }
            BodyMutation::SetAllowSleeping(allow) => {
                body.allow_sleeping = allow;
                if !allow {
                    body.wake();
                }
            }
            BodyMutation::SetCollisionGroup { group, sub_group } => {
                if group.is_some() {
                    body.group = group;
                }
                if sub_group.is_some() {
                    body.sub_group = sub_group;
                }
            }
            BodyMutation::SetFriction(friction) => body.friction = friction,
            BodyMutation::SetIsSensor(sensor) => body.is_sensor = sensor,
            BodyMutation::SetRestitution(restitution) => body.restitution = restitution,
            BodyMutation::ResetSleepTimer => body.wake(),
            BodyMutation::SetMaxLinearVelocity(max) => {
                body.max_linear_velocity = non_negative(max, "max linear velocity")?;
            }
            BodyMutation::SetMaxAngularVelocity(max) => {
                body.max_angular_velocity = non_negative(max, "max angular velocity")?;
            }
            BodyMutation::ClampLinearVelocity { min, max } => {
                body.linear_velocity = clamp_speed(body.linear_velocity, min, max)?;
            }
            BodyMutation::ClampAngularVelocity { min, max } => {
                body.angular_velocity = clamp_speed(body.angular_velocity, min, max)?;
            }
            BodyMutation::SetLinearVelocityClamped(velocity) => {
                if body.kind != BodyKind::Static {
                    body.linear_velocity = velocity.clamp_length(0.0, body.max_linear_velocity);
                    body.wake();
                }
            }
            BodyMutation::SetAngularVelocityClamped(velocity) => {
                if body.kind != BodyKind::Static {
                    body.angular_velocity = velocity.clamp_length(0.0, body.max_angular_velocity);
                    body.wake();
                }
            }
            BodyMutation::SetAngularFactor(damping) => {
                body.angular_damping = non_negative(damping, "angular damping")?;
            }
            BodyMutation::UpdateBitFilter { group, mask } => {
                body.bit_filter = Some((group, mask));
                body.wake();
            }
            BodyMutation::SetKinematicCollideNonDynamic(enabled) => {
                body.solver.collide_kinematic_vs_non_dynamic = enabled;
            }
            BodyMutation::SetApplyGyroscopicForce(enabled) => body.solver.gyroscopic_force = enabled,
            BodyMutation::SetEnhancedInternalEdgeRemoval(enabled) => {
                body.solver.enhanced_internal_edge_removal = enabled;
            }
            BodyMutation::SetVelocitySteps(steps) => body.solver.velocity_steps = steps,
            BodyMutation::SetPositionSteps(steps) => body.solver.position_steps = steps,
            // Solver quality has no meaning here; the rest never reaches the engine.
            BodyMutation::SetMotionQuality(_)
            | BodyMutation::UseMotionState(_)
            | BodyMutation::SetShape(_)
            | BodyMutation::SetCustomShape(_)
            | BodyMutation::SetDebugDraw(_)
            | BodyMutation::SetDebugDrawDepth(_)
            | BodyMutation::SetAutoUpdateIsometry(_)
            | BodyMutation::AddShape { .. }
            | BodyMutation::RemoveShape(_)
            | BodyMutation::ModifyShape { .. }
            | BodyMutation::SetVehicleInput(_) => {}
        }
        Ok(())
    }

    fn set_shape(&mut self, body: BodyHandle, shape: ShapeHandle) -> EngineResult<()> {
        let shape = self.shape(shape)?;
        if let Some(body) = self.bodies.get_mut(body.raw()) {
            body.shape = shape;
            body.wake();
        }
        Ok(())
    }

    fn add_child_shape(
        &mut self,
        handle: BodyHandle,
        shape: ShapeHandle,
        position: Vec3,
        rotation: Quat,
        user_data: u32,
    ) -> EngineResult<()> {
        let local = self.shape(shape)?.bounds;
        let Some(body) = self.bodies.get_mut(handle.raw()) else {
            return Ok(());
        };
        body.compound_mut()?.children.push(CompoundPart {
            local,
            position,
            rotation: rotation.normalize(),
            user_data,
        });
        body.refit();
        Ok(())
    }

    fn remove_child_shape(&mut self, handle: BodyHandle, child: u32) -> EngineResult<()> {
        let Some(body) = self.bodies.get_mut(handle.raw()) else {
            return Ok(());
        };
        let children = &mut body.compound_mut()?.children;
        if child as usize >= children.len() {
            tracing::debug!("Child {} past the end of a {} child compound, nothing removed", child, children.len());
            return Ok(());
        }
        children.remove(child as usize);
        body.refit();
        Ok(())
    }

    fn modify_child_shape(
        &mut self,
        handle: BodyHandle,
        child: u32,
        position: Vec3,
        rotation: Quat,
        shape: Option<ShapeHandle>,
    ) -> EngineResult<()> {
        let local = shape.map(|shape| self.shape(shape)).transpose()?.map(|data| data.bounds);
        let Some(body) = self.bodies.get_mut(handle.raw()) else {
            return Ok(());
        };
        let part = body
            .compound_mut()?
            .children
            .get_mut(child as usize)
            .ok_or_else(|| EngineError::InvalidValue(format!("compound has no child {child}")))?;
        part.position = position;
        part.rotation = rotation.normalize();
        if let Some(local) = local {
            part.local = local;
        }
        body.refit();
        Ok(())
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
        for (_, body) in self.bodies.iter_mut() {
            if body.is_dynamic() {
                body.wake();
            }
        }
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn create_constraint(
        &mut self,
        desc: &ConstraintDesc,
        body1: BodyHandle,
        body2: BodyHandle,
    ) -> EngineResult<ConstraintHandle> {
        let a = self
            .bodies
            .get(body1.raw())
            .ok_or(EngineError::InvalidHandle(body1.raw()))?;
        let b = self
            .bodies
            .get(body2.raw())
            .ok_or(EngineError::InvalidHandle(body2.raw()))?;

        let rest = (b.position - a.position).length();
        let (min_distance, max_distance) = match desc.kind {
            ConstraintType::Distance => {
                let min = desc.limits_min.unwrap_or(rest);
                let max = desc.limits_max.unwrap_or(rest);
                if !(min >= 0.0 && min <= max) {
                    return Err(EngineError::InvalidValue(format!("distance range [{min}, {max}]")));
                }
                (min, max)
            }
            _ => (rest, rest),
        };

        let constraint = SandboxConstraint {
            body1,
            joint: Joint::Link {
                kind: desc.kind,
                body2,
                min_distance,
                max_distance,
            },
            enabled: true,
            motor_state: MotorState::Off,
            target_velocity: 0.0,
        };
        Ok(ConstraintHandle::from_raw(self.constraints.allocate(constraint)))
    }

    fn destroy_constraint(&mut self, constraint: ConstraintHandle) {
        self.constraints.free(constraint.raw());
    }

    fn modify_constraint(&mut self, handle: ConstraintHandle, mutation: &ConstraintMutation) -> EngineResult<()> {
        let Some(constraint) = self.constraints.get_mut(handle.raw()) else {
            return Ok(());
        };

        match *mutation {
            ConstraintMutation::SetEnabled { enabled, activate } => {
                constraint.enabled = enabled;
                if activate {
                    let mut bodies = vec![constraint.body1];
                    if let Joint::Link { body2, .. } = constraint.joint {
                        bodies.push(body2);
                    }
                    for body in bodies {
                        if let Some(body) = self.bodies.get_mut(body.raw()) {
                            body.wake();
                        }
                    }
                }
            }
            ConstraintMutation::SetMotorState(state) => constraint.motor_state = state,
            ConstraintMutation::SetTargetVelocity(velocity) => constraint.target_velocity = velocity,
            ConstraintMutation::SetLimits { min, max } => {
                if let Joint::Link {
                    kind: ConstraintType::Distance,
                    ref mut min_distance,
                    ref mut max_distance,
                    ..
                } = constraint.joint
                {
                    if !(min >= 0.0 && min <= max) {
                        return Err(EngineError::InvalidValue(format!("distance range [{min}, {max}]")));
                    }
                    *min_distance = min;
                    *max_distance = max;
                }
            }
        }
        Ok(())
    }

    fn create_vehicle(&mut self, desc: &VehicleDesc, body: BodyHandle) -> EngineResult<ConstraintHandle> {
        if !self.bodies.contains(body.raw()) {
            return Err(EngineError::InvalidHandle(body.raw()));
        }
        if desc.wheels.is_empty() {
            return Err(EngineError::InvalidValue("vehicle has no wheels".to_string()));
        }

        let vehicle = SandboxVehicle {
            up: desc.up.normalize_or_zero(),
            forward: desc.forward.normalize_or_zero(),
            max_torque: desc.engine.max_torque,
            wheels: desc.wheels.clone(),
            input: VehicleInput::default(),
        };
        let constraint = SandboxConstraint {
            body1: body,
            joint: Joint::Vehicle(vehicle),
            enabled: true,
            motor_state: MotorState::Off,
            target_velocity: 0.0,
        };
        Ok(ConstraintHandle::from_raw(self.constraints.allocate(constraint)))
    }

    fn set_vehicle_input(&mut self, handle: ConstraintHandle, input: VehicleInput) -> EngineResult<()> {
        let Some(constraint) = self.constraints.get_mut(handle.raw()) else {
            return Ok(());
        };
        let Joint::Vehicle(vehicle) = &mut constraint.joint else {
            return Err(EngineError::InvalidHandle(handle.raw()));
        };
        vehicle.input = input;
        if let Some(chassis) = self.bodies.get_mut(constraint.body1.raw()) {
            chassis.wake();
        }
        Ok(())
    }

    fn vehicle_wheels(&self, handle: ConstraintHandle, out: &mut Vec<Isometry>) {
        let Some(SandboxConstraint {
            joint: Joint::Vehicle(vehicle),
            ..
        }) = self.constraints.get(handle.raw())
        else {
            return;
        };
        let steer = vehicle.input.right.clamp(-1.0, 1.0);
        out.extend(vehicle.wheels.iter().map(|wheel| {
            let rotation = if wheel.max_steer_angle > 0.0 {
                Quat::from_axis_angle(vehicle.up, -steer * wheel.max_steer_angle)
            } else {
                Quat::IDENTITY
            };
            Isometry::new(wheel.position, rotation)
        }));
    }

    fn create_character(&mut self, desc: &CharacterDesc, shape: ShapeHandle) -> EngineResult<BodyHandle> {
        let mut shape = self.shape(shape)?;
        shape.bounds = shape.bounds.translate(desc.shape_offset);
        shape.sphere = None;

        let up = desc.up.normalize_or_zero();
        let up = if up.length_squared() > 0.0 { up } else { Vec3::Y };

        let mut body = SandboxBody::new(BodyKind::Character, shape, desc.position, desc.rotation.normalize(), desc.mass);
        body.inverse_mass = 0.0;
        body.object_layer = CHARACTER_LAYER;
        body.character = Some(CharacterData {
            up,
            max_slope_cos: desc.max_slope_angle.cos(),
            ground: GroundInfo {
                state: GroundState::InAir,
                body: None,
                too_steep: false,
                velocity: Vec3::ZERO,
                normal: Vec3::ZERO,
            },
        });

        Ok(BodyHandle::from_raw(self.bodies.allocate(body)))
    }

    fn update_character(&mut self, handle: BodyHandle, dt: f32) -> EngineResult<()> {
        let id = handle.raw();
        let Some(character) = self.bodies.get(id) else {
            return Ok(());
        };
        let Some(data) = character.character else {
            return Err(EngineError::InvalidHandle(id));
        };

        let (local, rotation, layer) = (character.shape.bounds, character.rotation, character.object_layer);
        let mut position = character.position + character.linear_velocity * dt;
        let mut velocity = character.linear_velocity;

        let mut contacts = Vec::new();
        let mut walkable: Option<(BodyHandle, Vec3, Vec3)> = None;
        let mut steep: Option<(BodyHandle, Vec3, Vec3)> = None;

        for (other_id, other) in self.bodies.iter() {
            if other_id == id || !other.is_solid_for_characters() || !self.layer_ids_collide(layer, other.object_layer) {
                continue;
            }
            let mine = local.transformed(position, rotation);
            let theirs = other.bounds();
            if !mine.intersects(&theirs) {
                continue;
            }

            let (into_other, depth) = separation_axis(mine.overlap(&theirs), theirs.center() - mine.center());
            let normal = -into_other;
            position += normal * depth;
            let into = velocity.dot(normal);
            if into < 0.0 {
                velocity = velocity - normal * into;
            }

            let other_handle = BodyHandle::from_raw(other_id);
            let support = (other_handle, normal, other.linear_velocity);
            let slope = normal.dot(data.up);
            if slope >= data.max_slope_cos {
                walkable = walkable.or(Some(support));
            } else if slope > 0.0 {
                steep = steep.or(Some(support));
            }

            contacts.push(RawCharacterContact {
                character: handle,
                other: Some(other_handle),
                position: mine.center() - normal * abs(normal).dot(mine.half_extent()),
                normal,
                velocity: other.linear_velocity,
                new_character_velocity: Vec3::ZERO,
            });
        }

        // Extra ground check
        if walkable.is_none() && velocity.dot(data.up) <= 0.0 {
            let feet = local.transformed(position, rotation).translate(data.up * -GROUND_REACH);
            walkable = self
                .bodies
                .iter()
                .filter(|&(other_id, other)| {
                    other_id != id
                        && other.is_solid_for_characters()
                        && self.layer_ids_collide(layer, other.object_layer)
                })
                .find(|(_, other)| feet.intersects(&other.bounds()))
                .map(|(other_id, other)| (BodyHandle::from_raw(other_id), data.up, other.linear_velocity));
        }

        let ground = match (walkable, steep) {
            (Some((body, normal, velocity)), _) => GroundInfo {
                state: GroundState::OnGround,
                body: Some(body),
                too_steep: false,
                velocity,
                normal,
            },
            (None, Some((body, normal, velocity))) => GroundInfo {
                state: GroundState::OnSteepGround,
                body: Some(body),
                too_steep: true,
                velocity,
                normal,
            },
            (None, None) => GroundInfo {
                state: if contacts.is_empty() {
                    GroundState::InAir
                } else {
                    GroundState::NotSupported
                },
                body: None,
                too_steep: false,
                velocity: Vec3::ZERO,
                normal: Vec3::ZERO,
            },
        };

        for contact in &mut contacts {
            contact.new_character_velocity = velocity;
        }
        self.character_contacts.extend(contacts);

        if let Some(character) = self.bodies.get_mut(id) {
            character.position = position;
            character.linear_velocity = velocity;
            character.character = Some(CharacterData { ground, ..data });
        }
        Ok(())
    }

    fn modify_character(&mut self, handle: BodyHandle, mutation: &CharacterMutation) -> EngineResult<()> {
        let Some(body) = self.bodies.get_mut(handle.raw()) else {
            return Ok(());
        };
        let Some(data) = body.character.as_mut() else {
            return Err(EngineError::InvalidHandle(handle.raw()));
        };

        match *mutation {
            CharacterMutation::SetLinearVelocity(velocity) => body.linear_velocity = velocity,
            CharacterMutation::SetPosition(position) => body.position = position,
            CharacterMutation::SetRotation(rotation) => body.rotation = rotation.normalize(),
            CharacterMutation::SetMaxSlope(angle) => data.max_slope_cos = angle.cos(),
            CharacterMutation::SetShape { .. } => {}
        }
        Ok(())
    }

    fn set_character_shape(&mut self, handle: BodyHandle, shape: ShapeHandle) -> EngineResult<bool> {
        let mut shape = self.shape(shape)?;
        shape.sphere = None;
        let Some(character) = self.bodies.get(handle.raw()) else {
            return Ok(false);
        };

        let bounds = shape.bounds.transformed(character.position, character.rotation);
        if self.deepest_overlap(handle.raw(), &bounds, character.object_layer) > MAX_SHAPE_PENETRATION {
            return Ok(false);
        }
        if let Some(character) = self.bodies.get_mut(handle.raw()) {
            character.shape = shape;
        }
        Ok(true)
    }

    fn character_ground(&self, character: BodyHandle) -> Option<GroundInfo> {
        self.bodies
            .get(character.raw())
            .and_then(|b| b.character)
            .map(|data| data.ground)
    }

    #[allow(clippy::cast_precision_loss)]
    fn step(&mut self, dt: f32, sub_steps: u32) -> EngineResult<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(EngineError::StepFailed(format!("invalid time step {dt}")));
        }
        let sub_steps = sub_steps.max(1);
        let sub_dt = dt / sub_steps as f32;

        self.drive_vehicles();
        let mut current = BTreeMap::new();
        for _ in 0..sub_steps {
            self.integrate(sub_dt);
            self.solve_constraints();
            self.collide(&mut current);
        }
        self.update_sleep(dt);
        self.publish_contacts(current);

        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec3::ZERO;
            body.torque = Vec3::ZERO;
        }
        if let Some((id, _)) = self
            .bodies
            .iter()
            .find(|(_, b)| !(b.position.is_finite() && b.linear_velocity.is_finite()))
        {
            return Err(EngineError::StepFailed(format!("body {id} diverged")));
        }

        self.last_step = dt;
        Ok(())
    }

    fn drain_contacts(&mut self, out: &mut Vec<RawContact>) {
        out.append(&mut self.contacts);
    }

    fn drain_character_contacts(&mut self, out: &mut Vec<RawCharacterContact>) {
        out.append(&mut self.character_contacts);
    }

    fn cast_ray(&self, ray: &RayCast, out: &mut Vec<RawHit>) -> EngineResult<()> {
        if !(ray.origin.is_finite() && ray.direction.is_finite()) {
            return Err(EngineError::InvalidValue("ray is not finite".to_string()));
        }
        let solid = ray.treat_convex_as_solid.unwrap_or(true);
        let with_normal = ray.calculate_normal.unwrap_or(false);
        let start = out.len();

        for (id, body) in self.bodies.iter() {
            if body.character.is_some() || body.shape.is_hollow() {
                continue;
            }
            let hit = match body.shape.sphere {
                Some(radius) => ray_sphere(
                    ray.origin,
                    ray.direction,
                    body.position + body.rotation.rotate(body.shape.bounds.center()),
                    radius,
                ),
                None => body.bounds().ray_hit(ray.origin, ray.direction),
            };
            let Some((fraction, normal)) = hit else {
                continue;
            };
            if fraction <= 0.0 && !solid {
                continue;
            }
            out.push(RawHit {
                body: BodyHandle::from_raw(id),
                fraction,
                point: ray.origin + ray.direction * fraction,
                normal: with_normal.then_some(normal),
            });
        }

        finish_hits(&mut out[start..]);
        if ray.first_only.unwrap_or(false) {
            out.truncate((start + 1).min(out.len()));
        }
        Ok(())
    }

    fn cast_shape(&self, cast: &ShapeCast, shape: ShapeHandle, out: &mut Vec<RawHit>) -> EngineResult<()> {
        let shape = self.shape(shape)?;
        if !(cast.position.is_finite() && cast.direction.is_finite()) {
            return Err(EngineError::InvalidValue("shape cast is not finite".to_string()));
        }

        let swept = shape
            .bounds
            .scaled(cast.scale.unwrap_or(Vec3::ONE))
            .transformed(cast.position, cast.rotation);
        let (origin, half) = (swept.center(), swept.half_extent());
        let base = cast.offset.unwrap_or(Vec3::ZERO);
        let with_normal = cast.calculate_normal.unwrap_or(false);
        let start = out.len();

        for (id, body) in self.bodies.iter() {
            if body.character.is_some() {
                continue;
            }
            let Some((fraction, normal)) = body.bounds().expand(half).ray_hit(origin, cast.direction) else {
                continue;
            };
            out.push(RawHit {
                body: BodyHandle::from_raw(id),
                fraction,
                point: origin + cast.direction * fraction - base,
                normal: with_normal.then_some(normal),
            });
        }

        finish_hits(&mut out[start..]);
        if cast.first_only.unwrap_or(false) {
            out.truncate((start + 1).min(out.len()));
        }
        Ok(())
    }

    fn debug_triangles(&self, body: BodyHandle, out: &mut Vec<f32>) -> EngineResult<()> {
        if let Some(body) = self.bodies.get(body.raw()).filter(|b| !b.shape.is_hollow()) {
            body.shape.bounds.push_triangles(out);
        }
        Ok(())
    }
}

fn finish_hits(hits: &mut [RawHit]) {
    hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
}
