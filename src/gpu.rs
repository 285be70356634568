//! wgpu implementation of [`GpuBackend`].
//!
//! [`GpuContext`] holds the surface, device, queue and surface configuration.
//! It is created asynchronously by [`GpuContext::request`], which returns a
//! [`DeviceRequest`] the renderer polls each frame:
//!
//! 1. Creates a wgpu instance and a surface for the window
//! 2. Requests an adapter compatible with that surface
//! 3. Requests the logical device and queue
//! 4. Routes uncaptured errors and device loss into an [`ErrorLatch`]
//! 5. Configures the surface with an sRGB format when one is available
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use phalanx::{GpuContext, RendererConfig};
//!
//! # fn demo(window: Arc<winit::window::Window>) {
//! let request = GpuContext::request(window, &RendererConfig::default());
//! // Hand the request to Renderer::attach; it resolves on a later frame.
//! # }
//! ```
//!
//! Creation calls run inside validation and out-of-memory error scopes on
//! native targets, so a failed buffer or pipeline comes back as an `Err`
//! instead of a deferred uncaptured error. On the web the scopes cannot be
//! awaited synchronously; failures there go through the latch.

use std::ops::Range;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{GpuBackend, PassTargets, PipelineDescriptor};
use crate::config::RendererConfig;
use crate::device::DeviceRequest;
use crate::error::{DeviceRequestError, ErrorLatch, GpuError, GpuErrorKind, RenderError};

/// Core GPU context holding wgpu resources.
///
/// All fields are public to allow direct access to wgpu APIs when needed.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Starts acquiring a device for `window`.
    ///
    /// Nothing happens until the returned request is polled.
    pub fn request(window: Arc<Window>, config: &RendererConfig) -> DeviceRequest<GpuContext> {
        let latch = ErrorLatch::new();
        let handler_latch = latch.clone();
        let config = config.clone();

        DeviceRequest::new(latch, async move {
            let size = window.inner_size();

            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::PRIMARY,
                ..Default::default()
            });

            let surface = instance.create_surface(window)?;

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: config.power_preference,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await?;

            let info = adapter.get_info();
            log::info!("adapter acquired: {} ({:?})", info.name, info.backend);

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some(config.label.as_str()),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                    trace: Default::default(),
                    experimental_features: Default::default(),
                })
                .await?;

            install_error_handlers(&device, handler_latch);

            let caps = surface.get_capabilities(&adapter);
            let format = caps
                .formats
                .iter()
                .find(|f| f.is_srgb())
                .or_else(|| caps.formats.first())
                .copied()
                .ok_or(DeviceRequestError::UnsupportedSurface)?;

            let present_mode = if caps.present_modes.contains(&config.present_mode) {
                config.present_mode
            } else {
                log::warn!(
                    "present mode {:?} unsupported, falling back to Fifo",
                    config.present_mode
                );
                wgpu::PresentMode::Fifo
            };

            let surface_config = wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: size.width.max(1),
                height: size.height.max(1),
                present_mode,
                alpha_mode: caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            };
            surface.configure(&device, &surface_config);

            log::info!(
                "device ready: {}x{} {:?}",
                surface_config.width,
                surface_config.height,
                format
            );

            Ok::<_, DeviceRequestError>(GpuContext {
                surface,
                device,
                queue,
                config: surface_config,
            })
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Ignores zero-sized dimensions (which occur while a window is minimized).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Runs `create` inside validation and out-of-memory error scopes.
    #[cfg(not(target_arch = "wasm32"))]
    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(error) => Err(error.into()),
            None => Ok(value),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, GpuError> {
        Ok(create(&self.device))
    }
}

fn install_error_handlers(device: &wgpu::Device, latch: ErrorLatch) {
    let uncaptured = latch.clone();
    let handler: Box<dyn wgpu::UncapturedErrorHandler> = Box::new(move |error: wgpu::Error| {
        uncaptured.raise(GpuError::from(error));
    });
    device.on_uncaptured_error(handler.into());

    device.set_device_lost_callback(move |reason, message| match reason {
        wgpu::DeviceLostReason::Destroyed => log::debug!("device destroyed: {message}"),
        _ => {
            latch.raise(GpuError::new(GpuErrorKind::DeviceLost, message));
        }
    });
}

impl GpuBackend for GpuContext {
    type Buffer = wgpu::Buffer;
    type Texture = wgpu::Texture;
    type TextureView = wgpu::TextureView;
    type ShaderModule = wgpu::ShaderModule;
    type Pipeline = wgpu::RenderPipeline;
    type BindGroup = wgpu::BindGroup;
    type SurfaceTexture = wgpu::SurfaceTexture;
    type Encoder = wgpu::CommandEncoder;
    type Pass = wgpu::RenderPass<'static>;
    type CommandBuffer = wgpu::CommandBuffer;

    fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.resize(width, height);
    }

    fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> Result<wgpu::Buffer, GpuError> {
        self.scoped(|device| device.create_buffer(desc))
    }

    fn create_buffer_init(
        &self,
        desc: &wgpu::util::BufferInitDescriptor<'_>,
    ) -> Result<wgpu::Buffer, GpuError> {
        self.scoped(|device| device.create_buffer_init(desc))
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn create_texture(
        &self,
        desc: &wgpu::TextureDescriptor<'_>,
    ) -> Result<wgpu::Texture, GpuError> {
        self.scoped(|device| device.create_texture(desc))
    }

    fn create_texture_view(
        &self,
        texture: &wgpu::Texture,
        desc: &wgpu::TextureViewDescriptor<'_>,
    ) -> wgpu::TextureView {
        texture.create_view(desc)
    }

    fn create_shader_module(&self, label: &str, wgsl: &str) -> Result<wgpu::ShaderModule, GpuError> {
        self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            })
        })
    }

    fn create_render_pipeline(
        &self,
        desc: &PipelineDescriptor<'_, wgpu::ShaderModule>,
    ) -> Result<wgpu::RenderPipeline, GpuError> {
        self.scoped(|device| {
            let group_layouts: Vec<wgpu::BindGroupLayout> = desc
                .bind_group_layouts
                .iter()
                .enumerate()
                .map(|(group, entries)| {
                    let label = format!("{} Group {group}", desc.label);
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(&label),
                        entries,
                    })
                })
                .collect();
            let group_layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &group_layout_refs,
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: desc.vertex_module,
                    entry_point: Some(desc.vertex_entry),
                    buffers: desc.vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: desc.fragment_module,
                    entry_point: Some(desc.fragment_entry),
                    targets: &[Some(desc.color_target.clone())],
                    compilation_options: Default::default(),
                }),
                primitive: desc.primitive,
                depth_stencil: desc.depth_stencil.clone(),
                multisample: desc.multisample,
                multiview: None,
                cache: None,
            })
        })
    }

    fn create_uniform_bind_group(
        &self,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        group: u32,
        buffer: &wgpu::Buffer,
    ) -> Result<wgpu::BindGroup, GpuError> {
        self.scoped(|device| {
            let layout = pipeline.get_bind_group_layout(group);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        })
    }

    fn acquire_surface_texture(&self) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(error @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                // Reconfigure so the next frame gets a fresh texture.
                self.surface.configure(&self.device, &self.config);
                Err(error.into())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn surface_texture_view(&self, texture: &wgpu::SurfaceTexture) -> wgpu::TextureView {
        texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_command_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn begin_render_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &PassTargets<'_, wgpu::TextureView>,
    ) -> wgpu::RenderPass<'static> {
        encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Geometry Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: targets.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(targets.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(targets.clear_depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime()
    }

    fn set_pipeline(&self, pass: &mut wgpu::RenderPass<'static>, pipeline: &wgpu::RenderPipeline) {
        pass.set_pipeline(pipeline);
    }

    fn set_bind_group(
        &self,
        pass: &mut wgpu::RenderPass<'static>,
        index: u32,
        group: &wgpu::BindGroup,
    ) {
        pass.set_bind_group(index, group, &[]);
    }

    fn set_vertex_buffer(&self, pass: &mut wgpu::RenderPass<'static>, slot: u32, buffer: &wgpu::Buffer) {
        pass.set_vertex_buffer(slot, buffer.slice(..));
    }

    fn set_index_buffer(&self, pass: &mut wgpu::RenderPass<'static>, buffer: &wgpu::Buffer) {
        pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint16);
    }

    fn draw_indexed(
        &self,
        pass: &mut wgpu::RenderPass<'static>,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) {
        pass.draw_indexed(indices, base_vertex, instances);
    }

    fn end_render_pass(&self, pass: wgpu::RenderPass<'static>) {
        drop(pass);
    }

    fn finish(&self, encoder: wgpu::CommandEncoder) -> wgpu::CommandBuffer {
        encoder.finish()
    }

    fn submit(&self, commands: wgpu::CommandBuffer) {
        self.queue.submit(std::iter::once(commands));
    }

    fn present(&self, texture: wgpu::SurfaceTexture) {
        texture.present();
    }
}
