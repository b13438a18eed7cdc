use std::rc::Weak;

use glam::Vec3;

use super::interface as iface;
use crate::renderer::device::RenderDevice;
use crate::renderer::uniforms::{UniformStore, UniformValue};

/// Blinn-Phong coefficients plus an optional, non-owning diffuse map.
pub struct BlinnPhongMaterial<D: RenderDevice> {
    pub ka: Vec3,
    pub kd: Vec3,
    pub ks: Vec3,
    pub shininess: f32,
    pub diffuse_texture: Option<Weak<D::Texture>>,
}

impl<D: RenderDevice> BlinnPhongMaterial<D> {
    pub fn with_texture(mut self, texture: Weak<D::Texture>) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    /// Writes the coefficients and binds the diffuse map to its unit.
    ///
    /// The unit is cleared when there is no live texture, and the sampler
    /// uniform points at it either way.
    pub fn apply(&self, device: &mut D, uniforms: &mut UniformStore) {
        uniforms.set(iface::KA, self.ka);
        uniforms.set(iface::KD, self.kd);
        uniforms.set(iface::KS, self.ks);
        uniforms.set(iface::SHININESS, self.shininess);

        let texture = self.diffuse_texture.as_ref().and_then(Weak::upgrade);
        device.bind_texture(iface::DIFFUSE_TEXTURE_UNIT, texture.as_deref());
        uniforms.set(
            iface::DIFFUSE_TEX,
            UniformValue::TextureUnit(iface::DIFFUSE_TEXTURE_UNIT),
        );
    }
}

impl<D: RenderDevice> Default for BlinnPhongMaterial<D> {
    fn default() -> Self {
        Self {
            ka: Vec3::splat(0.05),
            kd: Vec3::ONE,
            ks: Vec3::ONE,
            shininess: 64.0,
            diffuse_texture: None,
        }
    }
}

impl<D: RenderDevice> Clone for BlinnPhongMaterial<D> {
    fn clone(&self) -> Self {
        Self {
            ka: self.ka,
            kd: self.kd,
            ks: self.ks,
            shininess: self.shininess,
            diffuse_texture: self.diffuse_texture.clone(),
        }
    }
}

impl<D: RenderDevice> std::fmt::Debug for BlinnPhongMaterial<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlinnPhongMaterial")
            .field("ka", &self.ka)
            .field("kd", &self.kd)
            .field("ks", &self.ks)
            .field("shininess", &self.shininess)
            .field("textured", &self.diffuse_texture.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::pipeline::interface::blinn_phong_program;
    use crate::renderer::headless::HeadlessDevice;

    #[test]
    fn live_texture_is_bound_to_the_diffuse_unit() {
        let mut device = HeadlessDevice::new(8, 8);
        let texture = Rc::new(device.create_texture_rgba8(1, 1, &[255; 4]));
        let program = blinn_phong_program().unwrap();
        let mut uniforms = UniformStore::new(program.schema());

        let material = BlinnPhongMaterial::<HeadlessDevice> {
            kd: Vec3::new(0.5, 0.25, 1.0),
            ..Default::default()
        }
        .with_texture(Rc::downgrade(&texture));
        material.apply(&mut device, &mut uniforms);

        assert_eq!(device.texture_unit(0), Some(texture.id));
        assert_eq!(uniforms.get(iface::KD), Some(&UniformValue::Vec3(Vec3::new(0.5, 0.25, 1.0))));
        assert_eq!(uniforms.texture_unit(iface::DIFFUSE_TEX, 0), Some(0));
    }

    #[test]
    fn dropped_texture_clears_the_unit() {
        let mut device = HeadlessDevice::new(8, 8);
        let texture = Rc::new(device.create_texture_rgba8(1, 1, &[255; 4]));
        let program = blinn_phong_program().unwrap();
        let mut uniforms = UniformStore::new(program.schema());
        let material = BlinnPhongMaterial::<HeadlessDevice>::default()
            .with_texture(Rc::downgrade(&texture));

        material.apply(&mut device, &mut uniforms);
        assert!(device.texture_unit(0).is_some());

        drop(texture);
        material.apply(&mut device, &mut uniforms);
        assert_eq!(device.texture_unit(0), None);
        assert_eq!(uniforms.texture_unit(iface::DIFFUSE_TEX, 0), Some(0));
    }
}
