//! The seam between the renderer and the GPU API.
//!
//! [`GpuBackend`] lists every operation the resource manager and frame
//! executor perform. [`GpuContext`](crate::GpuContext) implements it on top of
//! wgpu; tests substitute a recording implementation so batching and frame
//! sequencing can be checked without a device.
//!
//! Descriptors are wgpu's own types wherever they carry no GPU handles. The
//! pipeline description, which references shader modules, goes through
//! [`PipelineDescriptor`] instead.

use std::ops::Range;

use crate::error::{GpuError, RenderError};

/// Everything needed to build a render pipeline from two shader modules.
///
/// Bind group layouts are described by their entries only; the backend
/// creates them, builds the pipeline layout, and drops both once the pipeline
/// exists. Bind groups are later created against the pipeline's own layouts.
pub struct PipelineDescriptor<'a, M> {
    pub label: &'a str,
    pub vertex_module: &'a M,
    pub vertex_entry: &'a str,
    pub fragment_module: &'a M,
    pub fragment_entry: &'a str,
    pub bind_group_layouts: &'a [&'a [wgpu::BindGroupLayoutEntry]],
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub color_target: wgpu::ColorTargetState,
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
}

/// Attachments and clear values for the frame's render pass.
pub struct PassTargets<'a, V> {
    pub color: &'a V,
    pub depth: &'a V,
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
}

/// GPU operations used by the renderer.
///
/// Creation methods report failures as [`GpuError`]s captured at creation
/// time. Recording methods (`set_*`, `draw_indexed`) cannot fail here; wgpu
/// reports misuse through the uncaptured-error handler instead.
pub trait GpuBackend {
    type Buffer;
    type Texture;
    type TextureView;
    type ShaderModule;
    type Pipeline;
    type BindGroup;
    type SurfaceTexture;
    type Encoder;
    type Pass;
    type CommandBuffer;

    fn surface_format(&self) -> wgpu::TextureFormat;

    /// Current surface size in pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Reconfigures the surface. Zero-sized requests are ignored.
    fn resize_surface(&mut self, width: u32, height: u32);

    fn max_buffer_size(&self) -> u64;

    // Resources

    fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> Result<Self::Buffer, GpuError>;

    /// Creates a buffer mapped at creation, copies `desc.contents` in, and
    /// unmaps it before returning.
    fn create_buffer_init(
        &self,
        desc: &wgpu::util::BufferInitDescriptor<'_>,
    ) -> Result<Self::Buffer, GpuError>;

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    fn create_texture(
        &self,
        desc: &wgpu::TextureDescriptor<'_>,
    ) -> Result<Self::Texture, GpuError>;

    fn create_texture_view(
        &self,
        texture: &Self::Texture,
        desc: &wgpu::TextureViewDescriptor<'_>,
    ) -> Self::TextureView;

    fn create_shader_module(
        &self,
        label: &str,
        wgsl: &str,
    ) -> Result<Self::ShaderModule, GpuError>;

    fn create_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_, Self::ShaderModule>,
    ) -> Result<Self::Pipeline, GpuError>;

    /// Binds `buffer` at binding 0 of the pipeline's bind group `group`.
    fn create_uniform_bind_group(
        &self,
        label: &str,
        pipeline: &Self::Pipeline,
        group: u32,
        buffer: &Self::Buffer,
    ) -> Result<Self::BindGroup, GpuError>;

    // Frame

    fn acquire_surface_texture(&self) -> Result<Self::SurfaceTexture, RenderError>;

    fn surface_texture_view(&self, texture: &Self::SurfaceTexture) -> Self::TextureView;

    fn create_command_encoder(&self, label: &str) -> Self::Encoder;

    fn begin_render_pass(
        &self,
        encoder: &mut Self::Encoder,
        targets: &PassTargets<'_, Self::TextureView>,
    ) -> Self::Pass;

    fn set_pipeline(&self, pass: &mut Self::Pass, pipeline: &Self::Pipeline);

    fn set_bind_group(&self, pass: &mut Self::Pass, index: u32, group: &Self::BindGroup);

    fn set_vertex_buffer(&self, pass: &mut Self::Pass, slot: u32, buffer: &Self::Buffer);

    /// Binds a buffer of 16-bit indices.
    fn set_index_buffer(&self, pass: &mut Self::Pass, buffer: &Self::Buffer);

    fn draw_indexed(
        &self,
        pass: &mut Self::Pass,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    );

    fn end_render_pass(&self, pass: Self::Pass);

    fn finish(&self, encoder: Self::Encoder) -> Self::CommandBuffer;

    fn submit(&self, commands: Self::CommandBuffer);

    fn present(&self, texture: Self::SurfaceTexture);
}
