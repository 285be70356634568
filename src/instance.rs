//! Per-instance vertex data.
//!
//! Every instance occupies 19 floats (76 bytes) with no padding between
//! instances:
//!
//! | Field     | Format       | Offset | Shader Location |
//! |-----------|--------------|--------|-----------------|
//! | model[0]  | Float32x4    | 0      | 3               |
//! | model[1]  | Float32x4    | 16     | 4               |
//! | model[2]  | Float32x4    | 32     | 5               |
//! | model[3]  | Float32x4    | 48     | 6               |
//! | color     | Float32x3    | 64     | 7               |
//!
//! The model matrix is stored column-major (glam's native order) and the
//! shader rebuilds it from the four vectors as columns.

use glam::Mat4;

use crate::ecs::Rgb;
use crate::error::ResourceError;

/// Number of floats per packed instance.
pub const FLOATS_PER_INSTANCE: usize = 19;

/// Byte stride of one packed instance.
pub const INSTANCE_STRIDE: usize = FLOATS_PER_INSTANCE * std::mem::size_of::<f32>();

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 3],
}

impl InstanceRaw {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x3
    ];

    /// Per-instance buffer layout: stride 76, locations 3 to 7, instance step mode.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: INSTANCE_STRIDE as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &Self::ATTRIBUTES,
    };

    pub fn new(model: Mat4, color: Rgb) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// Serializes `count` instances into a tightly packed byte buffer.
///
/// Missing or short `transforms` fall back to the identity matrix, missing or
/// short `colors` to white. Matrices are written unchanged.
pub fn pack_instances(
    transforms: Option<&[Mat4]>,
    colors: Option<&[Rgb]>,
    count: usize,
) -> Result<Vec<u8>, ResourceError> {
    let bytes = count
        .checked_mul(INSTANCE_STRIDE)
        .ok_or(ResourceError::HostAllocation { bytes: usize::MAX })?;
    let mut packed = Vec::new();
    packed
        .try_reserve_exact(bytes)
        .map_err(|_| ResourceError::HostAllocation { bytes })?;

    for i in 0..count {
        let model = transforms
            .and_then(|t| t.get(i))
            .copied()
            .unwrap_or(Mat4::IDENTITY);
        let color = colors.and_then(|c| c.get(i)).copied().unwrap_or(Rgb::WHITE);
        packed.extend_from_slice(bytemuck::bytes_of(&InstanceRaw::new(model, color)));
    }

    Ok(packed)
}
