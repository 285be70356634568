//! Validated creation of GPU resources.
//!
//! Every function here checks its inputs, creates the resource through a
//! [`GpuBackend`], and logs then returns a [`ResourceError`] on failure. None
//! of them panic. Callers own the returned handles and are expected to create
//! each long-lived resource once and cache it; nothing here deduplicates.
//!
//! # Geometry Pipeline
//!
//! [`create_geometry_pipeline`] builds the single pipeline shared by every
//! primitive kind:
//!
//! - **Group 0**: camera uniform, vertex stage, 192 bytes
//! - **Group 1**: light uniform, fragment stage, 40 bytes
//! - **Buffer 0**: [`Vertex3d`], per vertex
//! - **Buffer 1**: [`InstanceRaw`], per instance
//!
//! Triangle lists, back-face culling with counter-clockwise front faces,
//! alpha blending into the surface format, and a `Depth24Plus` depth test
//! (less-than, writes enabled).

use crate::backend::{GpuBackend, PipelineDescriptor};
use crate::camera::CAMERA_UNIFORM_SIZE;
use crate::error::ResourceError;
use crate::geometry::Vertex3d;
use crate::instance::InstanceRaw;
use crate::light::LIGHT_UNIFORM_SIZE;

/// Depth attachment format used by the geometry pipeline.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Embedded WGSL for the geometry pipeline.
pub const GEOMETRY_VERTEX_SHADER: &str = include_str!("shaders/geometry_vertex.wgsl");
pub const GEOMETRY_FRAGMENT_SHADER: &str = include_str!("shaders/geometry_fragment.wgsl");

const CAMERA_GROUP: [wgpu::BindGroupLayoutEntry; 1] = [uniform_entry(
    wgpu::ShaderStages::VERTEX,
    CAMERA_UNIFORM_SIZE,
)];

const LIGHT_GROUP: [wgpu::BindGroupLayoutEntry; 1] = [uniform_entry(
    wgpu::ShaderStages::FRAGMENT,
    LIGHT_UNIFORM_SIZE,
)];

const fn uniform_entry(visibility: wgpu::ShaderStages, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

fn logged<T>(result: Result<T, ResourceError>) -> Result<T, ResourceError> {
    result.inspect_err(|error| log::error!("{error}"))
}

fn backend_error(label: &str) -> impl FnOnce(crate::error::GpuError) -> ResourceError + '_ {
    move |source| ResourceError::Backend {
        label: label.to_string(),
        source,
    }
}

/// Creates a buffer of `size` bytes, optionally filled with `contents`.
///
/// With contents the buffer is created mapped, filled, and unmapped before
/// this returns. Contents shorter than `size` leave the tail zeroed.
pub fn create_buffer<B: GpuBackend>(
    gpu: &B,
    label: &str,
    size: u64,
    usage: wgpu::BufferUsages,
    contents: Option<&[u8]>,
) -> Result<B::Buffer, ResourceError> {
    logged(
        validate_buffer(gpu, label, size, contents).and_then(|()| match contents {
            None => gpu
                .create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size,
                    usage,
                    mapped_at_creation: false,
                })
                .map_err(backend_error(label)),
            Some(data) if data.len() as u64 == size => gpu
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: data,
                    usage,
                })
                .map_err(backend_error(label)),
            Some(data) => {
                let mut padded = vec![0u8; size as usize];
                padded[..data.len()].copy_from_slice(data);
                gpu.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: &padded,
                    usage,
                })
                .map_err(backend_error(label))
            }
        }),
    )
}

fn validate_buffer<B: GpuBackend>(
    gpu: &B,
    label: &str,
    size: u64,
    contents: Option<&[u8]>,
) -> Result<(), ResourceError> {
    if size == 0 {
        return Err(ResourceError::ZeroSize {
            label: label.to_string(),
        });
    }
    let max = gpu.max_buffer_size();
    if size > max {
        return Err(ResourceError::TooLarge {
            label: label.to_string(),
            size,
            max,
        });
    }
    if let Some(data) = contents
        && data.len() as u64 > size
    {
        return Err(ResourceError::ContentsOverflow {
            label: label.to_string(),
            size,
            len: data.len(),
        });
    }
    Ok(())
}

/// Queues a write of `data` into `buffer` at `offset`.
pub fn update_buffer<B: GpuBackend>(
    gpu: &B,
    label: &str,
    buffer: &B::Buffer,
    offset: u64,
    data: &[u8],
) -> Result<(), ResourceError> {
    if data.is_empty() {
        return logged(Err(ResourceError::EmptyUpdate {
            label: label.to_string(),
        }));
    }
    gpu.write_buffer(buffer, offset, data);
    Ok(())
}

pub fn create_texture_2d<B: GpuBackend>(
    gpu: &B,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> Result<B::Texture, ResourceError> {
    if width == 0 || height == 0 {
        return logged(Err(ResourceError::InvalidTextureSize {
            label: label.to_string(),
            width,
            height,
        }));
    }
    logged(
        gpu.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
        .map_err(backend_error(label)),
    )
}

/// Creates the depth attachment for a `width` x `height` surface.
pub fn create_depth_texture<B: GpuBackend>(
    gpu: &B,
    width: u32,
    height: u32,
) -> Result<B::Texture, ResourceError> {
    create_texture_2d(
        gpu,
        "Depth Texture",
        width,
        height,
        DEPTH_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

/// Depth-only view of a depth texture, for use as a pass attachment.
pub fn create_depth_view<B: GpuBackend>(gpu: &B, texture: &B::Texture) -> B::TextureView {
    gpu.create_texture_view(
        texture,
        &wgpu::TextureViewDescriptor {
            label: Some("Depth View"),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        },
    )
}

pub fn create_shader_module<B: GpuBackend>(
    gpu: &B,
    label: &str,
    source: &str,
) -> Result<B::ShaderModule, ResourceError> {
    if source.trim().is_empty() {
        return logged(Err(ResourceError::EmptyShaderSource {
            label: label.to_string(),
        }));
    }
    logged(
        gpu.create_shader_module(label, source)
            .map_err(backend_error(label)),
    )
}

/// Builds the shared instanced geometry pipeline.
pub fn create_geometry_pipeline<B: GpuBackend>(
    gpu: &B,
    vertex_module: &B::ShaderModule,
    fragment_module: &B::ShaderModule,
) -> Result<B::Pipeline, ResourceError> {
    let label = "Geometry Pipeline";
    let desc = PipelineDescriptor {
        label,
        vertex_module,
        vertex_entry: "vs_main",
        fragment_module,
        fragment_entry: "fs_main",
        bind_group_layouts: &[&CAMERA_GROUP, &LIGHT_GROUP],
        vertex_buffers: &[Vertex3d::LAYOUT, InstanceRaw::LAYOUT],
        color_target: wgpu::ColorTargetState {
            format: gpu.surface_format(),
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
    };

    logged(gpu.create_render_pipeline(&desc).map_err(backend_error(label)))
}

fn create_uniform_buffer<B: GpuBackend>(
    gpu: &B,
    label: &str,
    size: u64,
) -> Result<B::Buffer, ResourceError> {
    create_buffer(
        gpu,
        label,
        size,
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        None,
    )
}

pub fn create_camera_uniform_buffer<B: GpuBackend>(gpu: &B) -> Result<B::Buffer, ResourceError> {
    create_uniform_buffer(gpu, "Camera Uniforms", CAMERA_UNIFORM_SIZE)
}

pub fn create_light_uniform_buffer<B: GpuBackend>(gpu: &B) -> Result<B::Buffer, ResourceError> {
    create_uniform_buffer(gpu, "Light Uniforms", LIGHT_UNIFORM_SIZE)
}

pub fn create_camera_bind_group<B: GpuBackend>(
    gpu: &B,
    pipeline: &B::Pipeline,
    buffer: &B::Buffer,
) -> Result<B::BindGroup, ResourceError> {
    let label = "Camera Bind Group";
    logged(
        gpu.create_uniform_bind_group(label, pipeline, 0, buffer)
            .map_err(backend_error(label)),
    )
}

pub fn create_light_bind_group<B: GpuBackend>(
    gpu: &B,
    pipeline: &B::Pipeline,
    buffer: &B::Buffer,
) -> Result<B::BindGroup, ResourceError> {
    let label = "Light Bind Group";
    logged(
        gpu.create_uniform_bind_group(label, pipeline, 1, buffer)
            .map_err(backend_error(label)),
    )
}
