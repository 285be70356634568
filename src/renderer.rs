//! The per-frame render executor.
//!
//! A [`Renderer`] is attached to one canvas entity in a [`hecs::World`] and
//! driven by calling [`Renderer::render_frame`] once per display frame.
//!
//! # States
//!
//! - **Pending**: the device handshake has not finished. Frames return
//!   [`FrameOutcome::NotReady`] and issue no GPU calls.
//! - **Ready**: each frame acquires the surface texture, gathers batches,
//!   records one render pass, submits, and presents.
//! - **Halted**: the device reported an uncaptured error or was lost. The
//!   latch is sticky; every later frame returns [`FrameOutcome::Halted`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use phalanx::{Canvas, Cuboid, GpuContext, Renderer, RendererConfig, Transform3};
//!
//! # fn demo(window: Arc<winit::window::Window>) -> Result<(), phalanx::RenderError> {
//! let mut world = hecs::World::new();
//! let canvas = world.spawn((Canvas::new(800, 600),));
//! world.spawn((Transform3::default(), Cuboid::cube(1.0)));
//!
//! let config = RendererConfig::default();
//! let request = GpuContext::request(window, &config);
//! let mut renderer = Renderer::attach(&mut world, canvas, request, config)?;
//!
//! // once per frame
//! renderer.render_frame(&world);
//! # Ok(())
//! # }
//! ```

use std::rc::Rc;
use std::task::Poll;

use hecs::{Entity, World};

use crate::backend::{GpuBackend, PassTargets};
use crate::batch::{BatchResources, RenderBatch, gather_batches};
use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::device::DeviceRequest;
use crate::ecs::{ActiveRenderer, Canvas};
use crate::error::{ErrorLatch, RenderError, ResourceError};
use crate::light::DirectionalLight;
use crate::pipeline::GeometryPipeline;
use crate::resources;

/// What a call to [`Renderer::render_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The device is not available yet (or could not be acquired).
    NotReady,
    /// A GPU error was latched earlier; nothing was done.
    Halted,
    /// More than one renderer is attached to the world.
    Aborted,
    /// The frame was dropped (no canvas, zero size, no surface texture).
    Skipped,
    Rendered { batches: usize, instances: u32 },
}

struct DepthTarget<B: GpuBackend> {
    _texture: B::Texture,
    view: B::TextureView,
    size: (u32, u32),
}

struct ReadyState<B: GpuBackend> {
    backend: B,
    caches: BatchResources<B>,
    depth: Option<DepthTarget<B>>,
}

impl<B: GpuBackend> ReadyState<B> {
    fn new(backend: B) -> Self {
        Self {
            backend,
            caches: BatchResources::new(),
            depth: None,
        }
    }

    fn ensure_depth(&mut self, size: (u32, u32)) -> Result<(), ResourceError> {
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return Ok(());
        }
        let texture = resources::create_depth_texture(&self.backend, size.0, size.1)?;
        let view = resources::create_depth_view(&self.backend, &texture);
        self.depth = Some(DepthTarget {
            _texture: texture,
            view,
            size,
        });
        Ok(())
    }
}

enum DeviceState<B: GpuBackend> {
    Pending(DeviceRequest<B>),
    Unavailable,
    Ready(ReadyState<B>),
}

/// Draws every tagged entity of a world onto its canvas.
pub struct Renderer<B: GpuBackend> {
    canvas: Entity,
    config: RendererConfig,
    latch: ErrorLatch,
    state: DeviceState<B>,
    camera: Camera,
    light: DirectionalLight,
    canvas_size: Option<(u32, u32)>,
    frame_index: u64,
    halt_reported: bool,
}

impl<B: GpuBackend> Renderer<B> {
    /// Attaches a renderer to `canvas`, which must carry a [`Canvas`].
    ///
    /// Fails if another renderer is already attached to `world`. The device
    /// request is not polled here; the first frames report
    /// [`FrameOutcome::NotReady`] until it completes.
    pub fn attach(
        world: &mut World,
        canvas: Entity,
        request: DeviceRequest<B>,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        if world.query::<&ActiveRenderer>().iter().next().is_some() {
            let error = RenderError::AlreadyAttached;
            log::error!("{error}");
            return Err(error);
        }
        if world.get::<&Canvas>(canvas).is_err() {
            let error = RenderError::MissingCanvas(canvas);
            log::error!("{error}");
            return Err(error);
        }
        world
            .insert_one(canvas, ActiveRenderer)
            .map_err(|_| RenderError::MissingCanvas(canvas))?;

        log::info!("renderer attached to {canvas:?}");

        Ok(Self {
            canvas,
            config,
            latch: request.latch().clone(),
            state: DeviceState::Pending(request),
            camera: Camera::default(),
            light: DirectionalLight::default(),
            canvas_size: None,
            frame_index: 0,
            halt_reported: false,
        })
    }

    /// Removes the renderer from `world`, releasing all GPU resources.
    pub fn detach(self, world: &mut World) {
        if world.remove_one::<ActiveRenderer>(self.canvas).is_err() {
            log::warn!("renderer marker already gone from {:?}", self.canvas);
        }
        log::info!("renderer detached after {} frames", self.frame_index);
    }

    pub fn canvas(&self) -> Entity {
        self.canvas
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn light(&self) -> &DirectionalLight {
        &self.light
    }

    pub fn set_light(&mut self, light: DirectionalLight) {
        self.light = light;
    }

    /// Number of frames rendered and submitted so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, DeviceState::Ready(_))
    }

    /// The error latch shared with the device callbacks.
    pub fn latch(&self) -> &ErrorLatch {
        &self.latch
    }

    pub fn backend(&self) -> Option<&B> {
        match &self.state {
            DeviceState::Ready(ready) => Some(&ready.backend),
            _ => None,
        }
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        match &mut self.state {
            DeviceState::Ready(ready) => Some(&mut ready.backend),
            _ => None,
        }
    }

    /// Advances the device handshake. Returns whether the device is ready.
    fn poll_device(&mut self) -> bool {
        let polled = match &mut self.state {
            DeviceState::Ready(_) => return true,
            DeviceState::Unavailable => return false,
            DeviceState::Pending(request) => request.poll(),
        };

        match polled {
            Poll::Pending => false,
            Poll::Ready(Ok(backend)) => {
                log::info!("renderer device ready");
                self.state = DeviceState::Ready(ReadyState::new(backend));
                true
            }
            Poll::Ready(Err(error)) => {
                log::error!("device request failed: {error}");
                self.state = DeviceState::Unavailable;
                false
            }
        }
    }

    /// Renders one frame of `world`.
    pub fn render_frame(&mut self, world: &World) -> FrameOutcome {
        let attached = world.query::<&ActiveRenderer>().iter().count();
        if attached > 1 {
            log::error!("{attached} renderers attached to one world, frame aborted");
            return FrameOutcome::Aborted;
        }

        if !self.poll_device() {
            return FrameOutcome::NotReady;
        }

        if let Some(error) = self.latch.error() {
            if self.halt_reported {
                log::trace!("frame skipped, rendering halted: {}", error.kind);
            } else {
                log::error!("rendering halted: {error}");
                self.halt_reported = true;
            }
            return FrameOutcome::Halted;
        }

        let size = match world.get::<&Canvas>(self.canvas) {
            Ok(canvas) => (canvas.width, canvas.height),
            Err(error) => {
                log::warn!("canvas {:?} unreadable: {error}", self.canvas);
                return FrameOutcome::Skipped;
            }
        };
        if size.0 == 0 || size.1 == 0 {
            return FrameOutcome::Skipped;
        }

        let DeviceState::Ready(ready) = &mut self.state else {
            return FrameOutcome::NotReady;
        };

        if self.canvas_size != Some(size) {
            log::debug!("canvas resized to {}x{}", size.0, size.1);
            ready.backend.resize_surface(size.0, size.1);
            self.canvas_size = Some(size);
        }

        if let Err(error) = ready.ensure_depth(size) {
            log::warn!("skipping frame: {error}");
            return FrameOutcome::Skipped;
        }

        let ReadyState {
            backend,
            caches,
            depth,
        } = ready;
        let Some(depth) = depth.as_ref() else {
            return FrameOutcome::Skipped;
        };

        let surface_texture = match backend.acquire_surface_texture() {
            Ok(texture) => texture,
            Err(error) => {
                log::warn!("skipping frame: {error}");
                return FrameOutcome::Skipped;
            }
        };
        let view = backend.surface_texture_view(&surface_texture);

        let batches = gather_batches(world, backend, caches);

        if let Some(pipeline) = caches.pipelines.current() {
            let aspect = size.0 as f32 / size.1 as f32;
            if let Err(error) =
                pipeline.write_uniforms(backend, &self.camera.uniform(aspect), &self.light.uniform())
            {
                log::warn!("uniform upload failed: {error}");
            }
        }

        let mut encoder = backend.create_command_encoder("Frame Encoder");
        let mut pass = backend.begin_render_pass(
            &mut encoder,
            &PassTargets {
                color: &view,
                depth: &depth.view,
                clear_color: self.config.clear_color,
                clear_depth: 1.0,
            },
        );
        let instances = record_batches(backend, &mut pass, &batches);
        backend.end_render_pass(pass);

        let commands = backend.finish(encoder);
        backend.submit(commands);
        if !self.config.implicit_present {
            backend.present(surface_texture);
        }

        self.frame_index += 1;
        log::trace!(
            "frame {}: {} batches, {instances} instances",
            self.frame_index,
            batches.len()
        );

        FrameOutcome::Rendered {
            batches: batches.len(),
            instances,
        }
    }
}

/// Records draw calls for `batches`. Returns the number of instances drawn.
fn record_batches<B: GpuBackend>(
    backend: &B,
    pass: &mut B::Pass,
    batches: &[RenderBatch<B>],
) -> u32 {
    let mut bound: Option<&Rc<GeometryPipeline<B>>> = None;
    let mut instances = 0;

    for batch in batches {
        if !bound.is_some_and(|p| Rc::ptr_eq(p, &batch.pipeline)) {
            backend.set_pipeline(pass, &batch.pipeline.pipeline);
            backend.set_bind_group(pass, 0, &batch.pipeline.camera_bind_group);
            backend.set_bind_group(pass, 1, &batch.pipeline.light_bind_group);
            bound = Some(&batch.pipeline);
        }

        backend.set_vertex_buffer(pass, 0, &batch.geometry.vertex);
        backend.set_vertex_buffer(pass, 1, &batch.instance_buffer);
        backend.set_index_buffer(pass, &batch.geometry.index);
        backend.draw_indexed(
            pass,
            0..batch.geometry.index_count,
            0,
            0..batch.instance_count,
        );
        instances += batch.instance_count;
    }

    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::Context;

    use glam::Vec3;

    use crate::ecs::{Cuboid, Rectangle, Rgb, Transform3};
    use crate::error::{DeviceRequestError, GpuError, GpuErrorKind};
    use crate::testing::{Call, RecordingBackend};

    /// Resolves to the backend after `polls` pending polls.
    struct ReadyAfter {
        polls: usize,
        backend: Option<RecordingBackend>,
    }

    impl Future for ReadyAfter {
        type Output = Result<RecordingBackend, DeviceRequestError>;

        fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
            if self.polls > 0 {
                self.polls -= 1;
                return Poll::Pending;
            }
            match self.backend.take() {
                Some(backend) => Poll::Ready(Ok(backend)),
                None => Poll::Pending,
            }
        }
    }

    fn scene() -> (World, Entity) {
        let mut world = World::new();
        let canvas = world.spawn((Canvas::new(800, 600),));
        for i in 0..5 {
            let x = i as f32 * 2.0 - 4.0;
            world.spawn((
                Transform3::from_translation(Vec3::new(x, 0.0, -5.0)),
                Rgb::new(i as f32 / 5.0, 0.5, 1.0 - i as f32 / 5.0),
                Cuboid::default(),
            ));
        }
        (world, canvas)
    }

    fn attach_ready(world: &mut World, canvas: Entity) -> Renderer<RecordingBackend> {
        Renderer::attach(
            world,
            canvas,
            DeviceRequest::ready(RecordingBackend::new()),
            RendererConfig::default().implicit_present(false),
        )
        .unwrap()
    }

    fn gpu(renderer: &Renderer<RecordingBackend>) -> &RecordingBackend {
        renderer.backend().unwrap()
    }

    #[test]
    fn frames_before_device_do_nothing() {
        let (mut world, canvas) = scene();
        let request = DeviceRequest::new(
            ErrorLatch::new(),
            ReadyAfter {
                polls: 3,
                backend: Some(RecordingBackend::new()),
            },
        );
        let mut renderer =
            Renderer::attach(&mut world, canvas, request, RendererConfig::default()).unwrap();

        for _ in 0..3 {
            assert_eq!(renderer.render_frame(&world), FrameOutcome::NotReady);
            assert!(renderer.backend().is_none());
        }

        assert!(matches!(
            renderer.render_frame(&world),
            FrameOutcome::Rendered { .. }
        ));
        // every recorded call belongs to the one rendered frame
        assert_eq!(gpu(&renderer).submits(), 1);
        assert_eq!(gpu(&renderer).count(|c| matches!(c, Call::AcquireSurfaceTexture)), 1);
    }

    #[test]
    fn failed_device_request_stays_not_ready() {
        let (mut world, canvas) = scene();
        let request: DeviceRequest<RecordingBackend> = DeviceRequest::new(
            ErrorLatch::new(),
            std::future::ready(Err(DeviceRequestError::UnsupportedSurface)),
        );
        let mut renderer =
            Renderer::attach(&mut world, canvas, request, RendererConfig::default()).unwrap();

        assert_eq!(renderer.render_frame(&world), FrameOutcome::NotReady);
        assert_eq!(renderer.render_frame(&world), FrameOutcome::NotReady);
        assert!(!renderer.is_ready());
    }

    #[test]
    fn frame_draws_one_instanced_call_per_kind() {
        let (mut world, canvas) = scene();
        world.spawn((Transform3::default(), Rectangle::new(2.0, 1.0)));
        let mut renderer = attach_ready(&mut world, canvas);

        let outcome = renderer.render_frame(&world);

        assert_eq!(
            outcome,
            FrameOutcome::Rendered {
                batches: 2,
                instances: 6
            }
        );
        let gpu = gpu(&renderer);
        assert_eq!(gpu.draws(), vec![(0..36, 0..5), (0..6, 0..1)]);
        assert_eq!(gpu.count(|c| matches!(c, Call::SetPipeline { .. })), 1);
        assert!(gpu.calls().contains(&Call::SetVertexBuffer {
            slot: 1,
            label: "Rectangle Instance Buffer".to_string(),
        }));
        assert!(gpu.calls().contains(&Call::BeginRenderPass {
            clear: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0
            }
        }));
    }

    #[test]
    fn frame_calls_happen_in_order() {
        let (mut world, canvas) = scene();
        let mut renderer = attach_ready(&mut world, canvas);
        renderer.render_frame(&world);

        let calls = gpu(&renderer).calls();
        let position = |wanted: &Call| calls.iter().position(|c| c == wanted).unwrap();
        let acquire = position(&Call::AcquireSurfaceTexture);
        let end = position(&Call::EndRenderPass);
        let submit = position(&Call::Submit);
        let present = position(&Call::Present);
        let draw = calls
            .iter()
            .position(|c| matches!(c, Call::DrawIndexed { .. }))
            .unwrap();

        assert!(acquire < draw && draw < end && end < submit && submit < present);
    }

    #[test]
    fn empty_world_still_clears_and_presents() {
        let mut world = World::new();
        let canvas = world.spawn((Canvas::new(320, 240),));
        let mut renderer = attach_ready(&mut world, canvas);

        assert_eq!(
            renderer.render_frame(&world),
            FrameOutcome::Rendered {
                batches: 0,
                instances: 0
            }
        );
        assert!(gpu(&renderer).draws().is_empty());
        assert_eq!(gpu(&renderer).submits(), 1);
    }

    #[test]
    fn latched_error_halts_every_later_frame() {
        let (mut world, canvas) = scene();
        let mut renderer = attach_ready(&mut world, canvas);
        renderer.render_frame(&world);
        gpu(&renderer).clear_calls();

        renderer
            .latch()
            .raise(GpuError::new(GpuErrorKind::Validation, "bind group mismatch"));

        assert!(!renderer.halt_reported);
        for _ in 0..5 {
            assert_eq!(renderer.render_frame(&world), FrameOutcome::Halted);
            assert!(renderer.halt_reported);
        }
        assert_eq!(gpu(&renderer).submits(), 0);
        assert_eq!(gpu(&renderer).call_count(), 0);
        assert_eq!(renderer.frame_index(), 1);
    }

    #[test]
    fn failed_box_geometry_still_draws_rectangles() {
        let (mut world, canvas) = scene();
        world.spawn((
            Transform3::default(),
            Rgb::new(0.0, 1.0, 0.0),
            Rectangle::default(),
        ));
        let mut renderer = attach_ready(&mut world, canvas);
        gpu(&renderer).fail_label("Box Vertex Buffer");

        let outcome = renderer.render_frame(&world);

        assert_eq!(
            outcome,
            FrameOutcome::Rendered {
                batches: 1,
                instances: 1
            }
        );
        assert_eq!(gpu(&renderer).draws(), vec![(0..6, 0..1)]);
        assert_eq!(gpu(&renderer).submits(), 1);
    }

    #[test]
    fn second_renderer_is_refused() {
        let (mut world, canvas) = scene();
        let _first = attach_ready(&mut world, canvas);

        let second = Renderer::attach(
            &mut world,
            canvas,
            DeviceRequest::ready(RecordingBackend::new()),
            RendererConfig::default(),
        );
        assert!(matches!(second, Err(RenderError::AlreadyAttached)));
    }

    #[test]
    fn two_markers_abort_the_frame() {
        let (mut world, canvas) = scene();
        let mut renderer = attach_ready(&mut world, canvas);
        world.spawn((Canvas::new(10, 10), ActiveRenderer));

        assert_eq!(renderer.render_frame(&world), FrameOutcome::Aborted);
    }

    #[test]
    fn attach_requires_canvas() {
        let mut world = World::new();
        let not_canvas = world.spawn((Cuboid::default(),));
        let result = Renderer::attach(
            &mut world,
            not_canvas,
            DeviceRequest::ready(RecordingBackend::new()),
            RendererConfig::default(),
        );
        assert!(matches!(result, Err(RenderError::MissingCanvas(e)) if e == not_canvas));
        assert!(world.get::<&ActiveRenderer>(not_canvas).is_err());
    }

    #[test]
    fn detach_allows_reattach() {
        let (mut world, canvas) = scene();
        let renderer = attach_ready(&mut world, canvas);
        renderer.detach(&mut world);
        assert!(world.get::<&ActiveRenderer>(canvas).is_err());

        let _again = attach_ready(&mut world, canvas);
    }

    #[test]
    fn surface_failure_skips_without_submit() {
        let (mut world, canvas) = scene();
        let mut renderer = attach_ready(&mut world, canvas);
        renderer.render_frame(&world);
        gpu(&renderer).fail_surface(true);

        assert_eq!(renderer.render_frame(&world), FrameOutcome::Skipped);
        assert_eq!(gpu(&renderer).submits(), 1);

        gpu(&renderer).fail_surface(false);
        assert!(matches!(
            renderer.render_frame(&world),
            FrameOutcome::Rendered { .. }
        ));
        assert_eq!(renderer.frame_index(), 2);
    }

    #[test]
    fn resize_recreates_depth_target() {
        let (mut world, canvas) = scene();
        let mut renderer = attach_ready(&mut world, canvas);
        renderer.render_frame(&world);
        renderer.render_frame(&world);

        if let Ok(mut size) = world.get::<&mut Canvas>(canvas) {
            *size = Canvas::new(1024, 768);
        }
        renderer.render_frame(&world);

        let gpu = gpu(&renderer);
        let depth_textures: Vec<Call> = gpu
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::CreateTexture { .. }))
            .collect();
        assert_eq!(
            depth_textures,
            vec![
                Call::CreateTexture {
                    label: "Depth Texture".to_string(),
                    width: 800,
                    height: 600
                },
                Call::CreateTexture {
                    label: "Depth Texture".to_string(),
                    width: 1024,
                    height: 768
                },
            ]
        );
        assert_eq!(gpu.surface_size(), (1024, 768));
    }

    #[test]
    fn zero_sized_canvas_skips() {
        let mut world = World::new();
        let canvas = world.spawn((Canvas::new(0, 600),));
        let mut renderer = attach_ready(&mut world, canvas);
        assert_eq!(renderer.render_frame(&world), FrameOutcome::Skipped);
    }

    #[test]
    fn implicit_present_skips_present_call() {
        let (mut world, canvas) = scene();
        let mut renderer = Renderer::attach(
            &mut world,
            canvas,
            DeviceRequest::ready(RecordingBackend::new()),
            RendererConfig::default().implicit_present(true),
        )
        .unwrap();

        renderer.render_frame(&world);
        assert_eq!(gpu(&renderer).submits(), 1);
        assert_eq!(gpu(&renderer).count(|c| matches!(c, Call::Present)), 0);
    }

    #[test]
    fn uniforms_follow_camera_and_light() {
        let (mut world, canvas) = scene();
        let mut renderer = attach_ready(&mut world, canvas);
        renderer.set_light(DirectionalLight::default().with_intensity(2.5));
        renderer.render_frame(&world);

        let writes = gpu(&renderer).count(|c| {
            matches!(c, Call::WriteBuffer { label, len, .. }
                if (label == "Camera Uniforms" && *len == 192)
                    || (label == "Light Uniforms" && *len == 40))
        });
        assert_eq!(writes, 2);
        assert_eq!(renderer.light().intensity, 2.5);
    }
}
