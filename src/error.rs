use thiserror::Error;

use crate::renderer::shader::ShaderError;

/// Failures raised while building the renderer or the shadow pipeline.
///
/// Everything here is fatal for the component being constructed; per-frame
/// rendering never returns one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("shadow framebuffer is incomplete: {0}")]
    IncompleteFramebuffer(String),

    #[error(
        "{max_lights} lights need {} texture units but the device exposes {available}",
        units_needed(.max_lights)
    )]
    TextureUnitBudget { max_lights: u32, available: u32 },

    #[error("light limit of {max} reached")]
    LightLimit { max: u32 },

    #[error("shader `{shader}` declares `{uniform}` with {len} elements, {required} lights are configured")]
    ShaderArrayTooShort {
        shader: String,
        uniform: String,
        len: u32,
        required: u32,
    },

    #[error("adapter is missing required features {0:?}")]
    MissingFeatures(wgpu::Features),

    #[error(transparent)]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error(transparent)]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn units_needed(max_lights: &u32) -> u64 {
    u64::from(*max_lights) + 1
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
