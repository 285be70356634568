//! ECS components understood by the renderer.
//!
//! An entity is drawn when it carries a geometry tag ([`Cuboid`] or
//! [`Rectangle`]) and a [`Transform3`]. [`Rgb`] is optional; an entity
//! without a color is drawn white.
//!
//! # Example
//!
//! ```
//! use phalanx::{Cuboid, Rgb, Transform3};
//! use glam::Vec3;
//!
//! let mut world = hecs::World::new();
//! world.spawn((
//!     Transform3::from_translation(Vec3::new(0.0, 0.0, -5.0)),
//!     Rgb::new(1.0, 0.0, 0.0),
//!     Cuboid::cube(1.0),
//! ));
//! ```

use glam::{Mat4, Quat, Vec3};

use crate::geometry::GeometryKind;

/// World transform of an entity as a full 4x4 matrix.
///
/// The matrix is copied to the GPU as-is (after the shape scale is applied),
/// so any affine transform is allowed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3 {
    pub value: Mat4,
}

impl Default for Transform3 {
    fn default() -> Self {
        Self {
            value: Mat4::IDENTITY,
        }
    }
}

impl Transform3 {
    pub fn new(value: Mat4) -> Self {
        Self { value }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(Mat4::from_translation(translation))
    }

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self::new(Mat4::from_rotation_translation(rotation, translation))
    }
}

/// Linear RGB color of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Box geometry tag with its edge lengths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cuboid {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Cuboid {
    pub fn new(width: f32, height: f32, depth: f32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn cube(size: f32) -> Self {
        Self::new(size, size, size)
    }
}

impl Default for Cuboid {
    fn default() -> Self {
        Self::cube(1.0)
    }
}

/// Flat rectangle geometry tag, lying in the local XY plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Rectangle {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Drawing surface size in physical pixels.
///
/// Lives on the entity the renderer is attached to. The windowing layer keeps
/// it current and the renderer reads it every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Marker placed on the canvas entity while a renderer is attached.
///
/// At most one entity in a world may carry it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveRenderer;

/// A component that selects one of the built-in primitives.
///
/// `scale` maps the component's dimensions onto the unit-sized primitive; the
/// result is applied before the entity transform.
pub trait GeometryTag: hecs::Component {
    const KIND: GeometryKind;

    fn scale(&self) -> Vec3;
}

impl GeometryTag for Cuboid {
    const KIND: GeometryKind = GeometryKind::Box;

    fn scale(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }
}

impl GeometryTag for Rectangle {
    const KIND: GeometryKind = GeometryKind::Rectangle;

    fn scale(&self) -> Vec3 {
        Vec3::new(self.width, self.height, 1.0)
    }
}
