//! Names and texture units shared between the pipeline and its shaders.
//!
//! Texture unit 0 carries the object's diffuse map and unit `slot + 1` the
//! shadow map of the light in `slot`. Shaders written against this contract
//! must declare their per-light arrays with at least as many elements as the
//! pipeline's configured light limit.

use crate::renderer::shader::{ShaderError, ShaderProgram};

/// Bumped whenever a name, unit or array layout below changes.
pub const INTERFACE_VERSION: u32 = 1;

pub const DIFFUSE_TEXTURE_UNIT: u32 = 0;
pub const SHADOW_TEXTURE_UNIT_BASE: u32 = 1;

/// Per-light array length of the bundled lit shader.
pub const MAX_SUPPORTED_LIGHTS: u32 = 8;

pub const MVP: &str = "mvp";
pub const MODEL: &str = "model";
pub const LIGHT_COUNT: &str = "light_count";
pub const EYE_POS: &str = "eye_pos";
pub const KA: &str = "ka";
pub const KD: &str = "kd";
pub const KS: &str = "ks";
pub const SHININESS: &str = "shininess";
pub const DIFFUSE_TEX: &str = "diffuse_tex";
pub const LIGHT_MVP: &str = "light_mvp";
pub const LIGHTS_POSITION: &str = "lights.position";
pub const LIGHTS_INTENSITY: &str = "lights.intensity";
pub const LIGHTS_COLOR: &str = "lights.color";
pub const LIGHTS_CASTS_SHADOW: &str = "lights.casts_shadow";
pub const SHADOW_MAPS: &str = "shadow_maps";
pub const COLOR: &str = "color";

/// Uniforms indexed by light slot.
pub const PER_LIGHT_UNIFORMS: [&str; 6] = [
    LIGHT_MVP,
    LIGHTS_POSITION,
    LIGHTS_INTENSITY,
    LIGHTS_COLOR,
    LIGHTS_CASTS_SHADOW,
    SHADOW_MAPS,
];

pub const BLINN_PHONG_WGSL: &str = include_str!("../shader/blinn_phong.wgsl");
pub const SHADOW_WGSL: &str = include_str!("../shader/shadow.wgsl");
pub const LIGHT_CUBE_WGSL: &str = include_str!("../shader/light_cube.wgsl");

pub const fn shadow_texture_unit(slot: usize) -> u32 {
    SHADOW_TEXTURE_UNIT_BASE + slot as u32
}

pub fn blinn_phong_program() -> Result<ShaderProgram, ShaderError> {
    ShaderProgram::from_wgsl("blinn_phong.wgsl", BLINN_PHONG_WGSL)
}

pub fn shadow_program() -> Result<ShaderProgram, ShaderError> {
    ShaderProgram::from_wgsl("shadow.wgsl", SHADOW_WGSL)
}

pub fn light_cube_program() -> Result<ShaderProgram, ShaderError> {
    ShaderProgram::from_wgsl("light_cube.wgsl", LIGHT_CUBE_WGSL)
}
