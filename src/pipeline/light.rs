use glam::{Mat4, Vec3};

use super::config::{PipelineConfig, ShadowProjection};
use super::interface as iface;
use super::shadow_target::ShadowTarget;
use crate::error::PipelineError;
use crate::renderer::device::RenderDevice;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::uniforms::{UniformStore, UniformValue};

/// Edge length of the marker cube drawn at each light.
pub const LIGHT_MARKER_SCALE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub intensity: f32,
    pub position: Vec3,
    pub color: Vec3,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            intensity: 5.0,
            position: Vec3::new(-2.9, 2.9, 3.2),
            color: Vec3::ONE,
        }
    }
}

/// View-projection a light renders its shadow map with: a look-at towards the
/// world origin followed by a fixed orthographic box.
pub fn light_space_view_projection(position: Vec3, projection: &ShadowProjection) -> Mat4 {
    let forward = (-position).normalize_or_zero();
    let view = if forward == Vec3::ZERO {
        // a light at the origin looks straight down
        Mat4::look_to_rh(position, Vec3::NEG_Y, Vec3::Z)
    } else {
        // +Y is degenerate when the light sits on the Y axis
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(position, Vec3::ZERO, up)
    };
    let e = projection.half_extent;
    let proj = Mat4::orthographic_rh(-e, e, -e, e, projection.near, projection.far);
    proj * view
}

/// A point light plus everything the pipeline keeps for it.
pub struct Light<D: RenderDevice> {
    pub light: PointLight,
    has_shadow: bool,
    shadow_map: Option<ShadowTarget<D>>,
    light_space_vp: Option<Mat4>,
    material: UniformStore,
}

impl<D: RenderDevice> Light<D> {
    pub(super) fn new(
        device: &mut D,
        light: PointLight,
        has_shadow: bool,
        marker_shader: &ShaderProgram,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let shadow_map = if has_shadow {
            Some(ShadowTarget::new(
                device,
                config.shadow_width,
                config.shadow_height,
            )?)
        } else {
            None
        };
        Ok(Self {
            light,
            has_shadow,
            shadow_map,
            light_space_vp: None,
            material: UniformStore::new(marker_shader.schema()),
        })
    }

    pub fn has_shadow(&self) -> bool {
        self.has_shadow
    }

    pub fn shadow_map(&self) -> Option<&ShadowTarget<D>> {
        self.shadow_map.as_ref()
    }

    /// Set once this frame's shadow pass has rendered the light. Always `None`
    /// for lights without a shadow.
    pub fn light_space_vp(&self) -> Option<Mat4> {
        self.light_space_vp
    }

    /// Uniforms of the marker cube.
    pub fn material(&self) -> &UniformStore {
        &self.material
    }

    pub(super) fn reset_frame(&mut self) {
        self.light_space_vp = None;
    }

    pub(super) fn set_light_space_vp(&mut self, vp: Mat4) {
        self.light_space_vp = Some(vp);
    }

    pub(super) fn draw_marker(
        &mut self,
        device: &mut D,
        view_proj: Mat4,
        shader: &ShaderProgram,
        mesh: &D::Mesh,
    ) {
        let model = Mat4::from_translation(self.light.position)
            * Mat4::from_scale(Vec3::splat(LIGHT_MARKER_SCALE));
        self.material.set(iface::MVP, view_proj * model);
        self.material.set(iface::COLOR, self.light.color);
        device.draw(shader, &self.material, mesh);
    }

    /// Writes this light's slot of an object's per-light uniforms and binds
    /// (or clears) its shadow texture unit.
    pub(super) fn apply(
        &self,
        device: &mut D,
        slot: usize,
        model: Mat4,
        uniforms: &mut UniformStore,
    ) {
        let light_mvp = self.light_space_vp.unwrap_or(Mat4::ZERO) * model;
        uniforms.set_indexed(iface::LIGHT_MVP, slot, light_mvp);
        uniforms.set_indexed(iface::LIGHTS_POSITION, slot, self.light.position);
        uniforms.set_indexed(iface::LIGHTS_INTENSITY, slot, self.light.intensity);
        uniforms.set_indexed(iface::LIGHTS_COLOR, slot, self.light.color);
        uniforms.set_indexed(iface::LIGHTS_CASTS_SHADOW, slot, self.has_shadow as i32);

        let unit = iface::shadow_texture_unit(slot);
        match &self.shadow_map {
            Some(target) => {
                device.bind_texture(unit, Some(target.depth_texture()));
                uniforms.set_indexed(iface::SHADOW_MAPS, slot, UniformValue::TextureUnit(unit));
            }
            None => device.bind_texture(unit, None),
        }
    }
}
