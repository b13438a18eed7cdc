// app.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::demo_scene::DemoScene;
use crate::error::PipelineError;
use crate::pipeline::ShadowPipeline;
use crate::renderer::{FrameTarget, GpuContext, WgpuDevice};
use crate::scene::{Camera, InputState, OrbitController};
use crate::settings::RenderSettings;

struct Viewer {
    window: Arc<Window>,
    context: GpuContext,
    device: WgpuDevice,
    pipeline: ShadowPipeline<WgpuDevice>,
    scene: DemoScene<WgpuDevice>,
    camera: Camera,
    orbit: OrbitController,
    started: Instant,
}

impl Viewer {
    fn new(
        window: Arc<Window>,
        settings: &RenderSettings,
        texture: Option<&Path>,
    ) -> Result<Self, PipelineError> {
        let context = pollster::block_on(GpuContext::new(window.clone(), settings))?;
        let mut device = WgpuDevice::new(&context);
        let mut pipeline = ShadowPipeline::new(&mut device, settings.pipeline_config())?;
        let scene = DemoScene::build(&mut device, &mut pipeline, texture)?;
        Ok(Self {
            window,
            context,
            device,
            pipeline,
            scene,
            camera: Camera::default(),
            orbit: OrbitController::new(),
            started: Instant::now(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
        self.device.resize(self.context.config.width, self.context.config.height);
    }

    /// Returns false when rendering cannot continue.
    fn redraw(&mut self) -> bool {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                return true;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
                return false;
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                return true;
            }
        };
        let color = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (width, height) = (self.context.config.width, self.context.config.height);

        self.scene
            .animate(&mut self.pipeline, self.started.elapsed().as_secs_f32());
        self.device.begin_frame(FrameTarget {
            color,
            depth: self.context.depth.view.clone(),
            width,
            height,
        });
        self.pipeline.render(&mut self.device, &self.camera);
        self.device.end_frame();
        frame.present();
        true
    }
}

pub struct App {
    settings: RenderSettings,
    texture: Option<PathBuf>,
    viewer: Option<Viewer>,
    input: InputState,
}

impl App {
    pub fn new(settings: RenderSettings, texture: Option<PathBuf>) -> Self {
        Self {
            settings,
            texture,
            viewer: None,
            input: InputState::new(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("wgpu shadow maps")
            .with_inner_size(PhysicalSize::new(
                self.settings.resolution.width,
                self.settings.resolution.height,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        match Viewer::new(window, &self.settings, self.texture.as_deref()) {
            Ok(viewer) => {
                viewer.window.request_redraw();
                self.viewer = Some(viewer);
            }
            Err(err) => {
                log::error!("Failed to initialise renderer: {}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        if viewer.window.id() != id {
            return;
        }
        if self.input.handle_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                viewer.resize(size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = viewer.window.inner_size();
                viewer.resize(size);
            }
            WindowEvent::RedrawRequested => {
                let snapshot = self.input.snapshot();
                viewer
                    .orbit
                    .update(&mut viewer.camera, &snapshot, viewer.context.config.height);
                if !viewer.redraw() {
                    event_loop.exit();
                    return;
                }
                viewer.window.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.take() {
            let Viewer {
                pipeline, scene, ..
            } = viewer;
            pipeline.terminate();
            drop(scene);
        }
    }
}
