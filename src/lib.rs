//! # Phalanx
//!
//! **An instanced wgpu renderer driven by a `hecs` world.**
//!
//! Tag entities with a geometry component and a transform, optionally give
//! them a color, and the renderer draws every entity of the same kind in a
//! single instanced draw call.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use phalanx::*;
//!
//! # fn demo(window: Arc<winit::window::Window>) -> Result<(), RenderError> {
//! init_logging(LoggingConfig::default());
//!
//! let mut world = World::new();
//! let canvas = world.spawn((Canvas::new(800, 600),));
//! for i in 0..5 {
//!     world.spawn((
//!         Transform3::from_translation(Vec3::new(i as f32 * 2.0 - 4.0, 0.0, -5.0)),
//!         Rgb::new(i as f32 / 5.0, 0.5, 1.0 - i as f32 / 5.0),
//!         Cuboid::cube(1.0),
//!     ));
//! }
//!
//! let config = RendererConfig::default();
//! let request = GpuContext::request(window, &config);
//! let mut renderer = Renderer::attach(&mut world, canvas, request, config)?;
//!
//! // In the window's redraw handler:
//! renderer.render_frame(&world);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`ecs`]: components the renderer reads
//! - [`geometry`]: built-in meshes
//! - [`batch`]: per-kind instance gathering and GPU batches
//! - [`renderer`]: the per-frame executor
//! - [`backend`]: the GPU operations the renderer needs, implemented by
//!   [`GpuContext`] on wgpu

pub mod backend;
pub mod batch;
mod camera;
mod config;
mod device;
pub mod ecs;
mod error;
pub mod geometry;
mod gpu;
pub mod instance;
mod light;
mod logging;
mod pipeline;
pub mod renderer;
pub mod resources;

#[cfg(test)]
mod testing;

pub use backend::{GpuBackend, PassTargets, PipelineDescriptor};
pub use batch::{HostBatch, RenderBatch, collect_instances, collect_kind};
pub use camera::{CAMERA_UNIFORM_SIZE, Camera, CameraUniform};
pub use config::RendererConfig;
pub use device::DeviceRequest;
pub use ecs::{ActiveRenderer, Canvas, Cuboid, GeometryTag, Rectangle, Rgb, Transform3};
pub use error::{
    DeviceRequestError, ErrorLatch, GpuError, GpuErrorKind, RenderError, ResourceError,
};
pub use geometry::{GeometryDescriptor, GeometryKind, Vertex3d};
pub use gpu::GpuContext;
pub use instance::{FLOATS_PER_INSTANCE, INSTANCE_STRIDE, InstanceRaw, pack_instances};
pub use light::{DirectionalLight, LIGHT_UNIFORM_SIZE, LightUniform};
pub use logging::{LoggingConfig, init_logging};
pub use pipeline::{GeometryPipeline, PipelineCache};
pub use renderer::{FrameOutcome, Renderer};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec3};

pub use hecs::{Entity, World};
