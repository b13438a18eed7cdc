pub mod app;
pub mod demo_scene;
pub mod error;
mod io;
pub mod pipeline;
pub mod renderer;
pub mod scene;
pub mod settings;

use std::path::PathBuf;

use app::App;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

pub use error::{PipelineError, Result};
pub use pipeline::{PipelineConfig, ShadowPipeline};

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Opens the viewer window and blocks until it closes. `texture` optionally
/// replaces the generated checker on the demo cubes.
pub fn run(texture: Option<PathBuf>) -> std::result::Result<(), winit::error::EventLoopError> {
    init_logging();

    log::info!("Starting wgpu shadow map viewer");

    let settings = RenderSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings, texture);

    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }

    log::info!("Application shutdown complete");

    result
}
