//! Lazily created default pipeline and its uniform bindings.
//!
//! Every geometry kind draws with the same pipeline. It is built the first
//! time any batch needs it, together with the camera and light uniform
//! buffers and their bind groups, and then lives as long as the renderer.

use std::rc::Rc;

use crate::backend::GpuBackend;
use crate::camera::CameraUniform;
use crate::error::ResourceError;
use crate::light::LightUniform;
use crate::resources;

/// The default pipeline plus the uniform state bound alongside it.
pub struct GeometryPipeline<B: GpuBackend> {
    pub pipeline: B::Pipeline,
    pub camera_buffer: B::Buffer,
    pub light_buffer: B::Buffer,
    pub camera_bind_group: B::BindGroup,
    pub light_bind_group: B::BindGroup,
}

impl<B: GpuBackend> GeometryPipeline<B> {
    fn create(gpu: &B) -> Result<Self, ResourceError> {
        let vertex = resources::create_shader_module(
            gpu,
            "Geometry Vertex Shader",
            resources::GEOMETRY_VERTEX_SHADER,
        )?;
        let fragment = resources::create_shader_module(
            gpu,
            "Geometry Fragment Shader",
            resources::GEOMETRY_FRAGMENT_SHADER,
        )?;
        let pipeline = resources::create_geometry_pipeline(gpu, &vertex, &fragment)?;

        let camera_buffer = resources::create_camera_uniform_buffer(gpu)?;
        let light_buffer = resources::create_light_uniform_buffer(gpu)?;
        let camera_bind_group = resources::create_camera_bind_group(gpu, &pipeline, &camera_buffer)?;
        let light_bind_group = resources::create_light_bind_group(gpu, &pipeline, &light_buffer)?;

        Ok(Self {
            pipeline,
            camera_buffer,
            light_buffer,
            camera_bind_group,
            light_bind_group,
        })
    }

    /// Uploads this frame's camera and light.
    pub fn write_uniforms(
        &self,
        gpu: &B,
        camera: &CameraUniform,
        light: &LightUniform,
    ) -> Result<(), ResourceError> {
        resources::update_buffer(
            gpu,
            "Camera Uniforms",
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(camera),
        )?;
        resources::update_buffer(
            gpu,
            "Light Uniforms",
            &self.light_buffer,
            0,
            bytemuck::bytes_of(light),
        )
    }
}

/// Holds the default pipeline once it exists.
pub struct PipelineCache<B: GpuBackend> {
    default: Option<Rc<GeometryPipeline<B>>>,
}

impl<B: GpuBackend> Default for PipelineCache<B> {
    fn default() -> Self {
        Self { default: None }
    }
}

impl<B: GpuBackend> PipelineCache<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default pipeline, creating it on first use.
    ///
    /// A failed creation is not cached; the next call tries again.
    pub fn get_or_create(&mut self, gpu: &B) -> Result<Rc<GeometryPipeline<B>>, ResourceError> {
        if let Some(existing) = &self.default {
            return Ok(Rc::clone(existing));
        }
        let created = Rc::new(GeometryPipeline::create(gpu)?);
        log::debug!("default geometry pipeline created");
        self.default = Some(Rc::clone(&created));
        Ok(created)
    }

    /// The default pipeline, if it has been created.
    pub fn current(&self) -> Option<&Rc<GeometryPipeline<B>>> {
        self.default.as_ref()
    }
}
