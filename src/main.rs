use std::sync::Arc;

use glam::Vec3;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use phalanx::{
    Camera, Canvas, Cuboid, Entity, FrameOutcome, GpuContext, LoggingConfig, Rectangle, Renderer,
    RendererConfig, Rgb, Transform3, World, init_logging,
};

/// Window settings for the demo.
struct DemoConfig {
    title: String,
    width: u32,
    height: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Phalanx".to_string(),
            width: 800,
            height: 600,
        }
    }
}

enum DemoApp {
    Pending {
        config: DemoConfig,
    },
    Running {
        window: Arc<Window>,
        world: World,
        canvas: Entity,
        renderer: Renderer<GpuContext>,
    },
    Failed,
}

/// A row of five cubes shaded from blue to red, with a panel behind them.
fn populate(world: &mut World) {
    for i in 0..5 {
        let t = i as f32 / 5.0;
        world.spawn((
            Transform3::from_translation(Vec3::new(i as f32 * 2.0 - 4.0, 0.0, -5.0)),
            Rgb::new(t, 0.5, 1.0 - t),
            Cuboid::cube(1.0),
        ));
    }
    world.spawn((
        Transform3::from_translation(Vec3::new(0.0, 0.0, -8.0)),
        Rgb::new(0.8, 0.8, 0.8),
        Rectangle::new(12.0, 4.0),
    ));
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let DemoApp::Pending { config } = self else {
            return;
        };

        let attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                log::error!("could not create window: {error}");
                *self = DemoApp::Failed;
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let mut world = World::new();
        let canvas = world.spawn((Canvas::new(size.width, size.height),));
        populate(&mut world);

        let renderer_config = RendererConfig::default();
        let request = GpuContext::request(Arc::clone(&window), &renderer_config);
        match Renderer::attach(&mut world, canvas, request, renderer_config) {
            Ok(mut renderer) => {
                renderer.set_camera(Camera::new().at(0.0, 2.0, 4.0).looking_at(0.0, 0.0, -5.0));
                window.request_redraw();
                *self = DemoApp::Running {
                    window,
                    world,
                    canvas,
                    renderer,
                };
            }
            Err(error) => {
                log::error!("could not attach renderer: {error}");
                *self = DemoApp::Failed;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let DemoApp::Running {
            window,
            world,
            canvas,
            renderer,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Ok(mut current) = world.get::<&mut Canvas>(*canvas) {
                    *current = Canvas::new(size.width, size.height);
                }
                window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                if renderer.render_frame(world) == FrameOutcome::Halted {
                    event_loop.exit();
                    return;
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    init_logging(LoggingConfig::default());

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(error) => {
            log::error!("could not create event loop: {error}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp::Pending {
        config: DemoConfig::default(),
    };
    if let Err(error) = event_loop.run_app(&mut app) {
        log::error!("event loop stopped: {error}");
    }
}
