/// Orthographic box every shadow caster renders through.
///
/// The box is centred on the light's look-at towards the world origin and is
/// not fitted to the scene, so geometry outside it casts no shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowProjection {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowProjection {
    fn default() -> Self {
        Self {
            half_extent: 15.0,
            near: 0.1,
            far: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub shadow_width: u32,
    pub shadow_height: u32,
    /// Upper bound on lights; each one reserves a texture unit.
    pub max_lights: u32,
    pub shadow_projection: ShadowProjection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shadow_width: 2048,
            shadow_height: 2048,
            max_lights: 8,
            shadow_projection: ShadowProjection::default(),
        }
    }
}
