//! Built-in primitive geometry shared by every batch of a kind.
//!
//! Each [`GeometryKind`] maps to an immutable [`GeometryDescriptor`] holding
//! interleaved vertex data and 16-bit indices. The descriptors live in static
//! memory. The renderer uploads each one at most once and reuses the buffers
//! for every instance of that kind.
//!
//! # Vertex Layout
//!
//! [`Vertex3d`] uses the following GPU layout (32 bytes per vertex):
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |
//!
//! # Unit Shapes
//!
//! Primitives are unit sized and centered on the origin. The per-entity
//! dimension component ([`Cuboid`](crate::Cuboid), [`Rectangle`](crate::Rectangle))
//! is folded into the instance matrix as a scale.
//!
//! - **Box**: 24 vertices (4 per face so normals stay flat), 36 indices, spans -0.5..0.5 on every axis
//! - **Rectangle**: 4 vertices, 6 indices, in the XY plane facing +Z
//!
//! All faces use counter-clockwise winding when viewed from outside.

/// A vertex with position, normal, and texture coordinates.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// Per-vertex buffer layout: stride 32, locations 0 to 2.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// The closed set of primitives the renderer knows how to batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Box,
    Rectangle,
}

impl GeometryKind {
    /// Every kind, in the order batches are gathered and drawn.
    pub const ALL: [GeometryKind; 2] = [GeometryKind::Box, GeometryKind::Rectangle];

    /// Dense index into per-kind tables.
    pub const fn index(self) -> usize {
        match self {
            GeometryKind::Box => 0,
            GeometryKind::Rectangle => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            GeometryKind::Box => "Box",
            GeometryKind::Rectangle => "Rectangle",
        }
    }

    pub fn descriptor(self) -> &'static GeometryDescriptor {
        match self {
            GeometryKind::Box => &BOX,
            GeometryKind::Rectangle => &RECTANGLE,
        }
    }
}

/// Static vertex and index data for one primitive.
#[derive(Debug)]
pub struct GeometryDescriptor {
    pub kind: GeometryKind,
    pub vertices: &'static [Vertex3d],
    pub indices: &'static [u16],
}

impl GeometryDescriptor {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_bytes(&self) -> &'static [u8] {
        bytemuck::cast_slice(self.vertices)
    }

    pub fn index_bytes(&self) -> &'static [u8] {
        bytemuck::cast_slice(self.indices)
    }
}

const H: f32 = 0.5;

const BOX_VERTICES: [Vertex3d; 24] = [
    // +Z
    Vertex3d::new([-H, -H, H], [0.0, 0.0, 1.0], [0.0, 1.0]),
    Vertex3d::new([H, -H, H], [0.0, 0.0, 1.0], [1.0, 1.0]),
    Vertex3d::new([H, H, H], [0.0, 0.0, 1.0], [1.0, 0.0]),
    Vertex3d::new([-H, H, H], [0.0, 0.0, 1.0], [0.0, 0.0]),
    // -Z
    Vertex3d::new([H, -H, -H], [0.0, 0.0, -1.0], [0.0, 1.0]),
    Vertex3d::new([-H, -H, -H], [0.0, 0.0, -1.0], [1.0, 1.0]),
    Vertex3d::new([-H, H, -H], [0.0, 0.0, -1.0], [1.0, 0.0]),
    Vertex3d::new([H, H, -H], [0.0, 0.0, -1.0], [0.0, 0.0]),
    // +X
    Vertex3d::new([H, -H, H], [1.0, 0.0, 0.0], [0.0, 1.0]),
    Vertex3d::new([H, -H, -H], [1.0, 0.0, 0.0], [1.0, 1.0]),
    Vertex3d::new([H, H, -H], [1.0, 0.0, 0.0], [1.0, 0.0]),
    Vertex3d::new([H, H, H], [1.0, 0.0, 0.0], [0.0, 0.0]),
    // -X
    Vertex3d::new([-H, -H, -H], [-1.0, 0.0, 0.0], [0.0, 1.0]),
    Vertex3d::new([-H, -H, H], [-1.0, 0.0, 0.0], [1.0, 1.0]),
    Vertex3d::new([-H, H, H], [-1.0, 0.0, 0.0], [1.0, 0.0]),
    Vertex3d::new([-H, H, -H], [-1.0, 0.0, 0.0], [0.0, 0.0]),
    // +Y
    Vertex3d::new([-H, H, H], [0.0, 1.0, 0.0], [0.0, 1.0]),
    Vertex3d::new([H, H, H], [0.0, 1.0, 0.0], [1.0, 1.0]),
    Vertex3d::new([H, H, -H], [0.0, 1.0, 0.0], [1.0, 0.0]),
    Vertex3d::new([-H, H, -H], [0.0, 1.0, 0.0], [0.0, 0.0]),
    // -Y
    Vertex3d::new([-H, -H, -H], [0.0, -1.0, 0.0], [0.0, 1.0]),
    Vertex3d::new([H, -H, -H], [0.0, -1.0, 0.0], [1.0, 1.0]),
    Vertex3d::new([H, -H, H], [0.0, -1.0, 0.0], [1.0, 0.0]),
    Vertex3d::new([-H, -H, H], [0.0, -1.0, 0.0], [0.0, 0.0]),
];

#[rustfmt::skip]
const BOX_INDICES: [u16; 36] = [
    0, 1, 2, 0, 2, 3,
    4, 5, 6, 4, 6, 7,
    8, 9, 10, 8, 10, 11,
    12, 13, 14, 12, 14, 15,
    16, 17, 18, 16, 18, 19,
    20, 21, 22, 20, 22, 23,
];

const RECTANGLE_VERTICES: [Vertex3d; 4] = [
    Vertex3d::new([-H, -H, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
    Vertex3d::new([H, -H, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
    Vertex3d::new([H, H, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
    Vertex3d::new([-H, H, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
];

const RECTANGLE_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

static BOX: GeometryDescriptor = GeometryDescriptor {
    kind: GeometryKind::Box,
    vertices: &BOX_VERTICES,
    indices: &BOX_INDICES,
};

static RECTANGLE: GeometryDescriptor = GeometryDescriptor {
    kind: GeometryKind::Rectangle,
    vertices: &RECTANGLE_VERTICES,
    indices: &RECTANGLE_INDICES,
};
