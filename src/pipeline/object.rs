use std::rc::{Rc, Weak};

use glam::{Mat4, Vec3};

use super::interface as iface;
use super::light::Light;
use super::material::BlinnPhongMaterial;
use crate::renderer::device::RenderDevice;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::uniforms::UniformStore;

/// A mesh drawn with a shader, both borrowed from their owners through weak
/// references. Rotation is not modelled.
pub struct SceneObject<D: RenderDevice> {
    mesh: Weak<D::Mesh>,
    shader: Weak<ShaderProgram>,
    uniforms: UniformStore,
    pub material: BlinnPhongMaterial<D>,
    pub position: Vec3,
    pub scale: Vec3,
}

impl<D: RenderDevice> SceneObject<D> {
    pub(super) fn new(
        mesh: &Rc<D::Mesh>,
        shader: &Rc<ShaderProgram>,
        material: BlinnPhongMaterial<D>,
        position: Vec3,
        scale: Vec3,
    ) -> Self {
        Self {
            mesh: Rc::downgrade(mesh),
            uniforms: UniformStore::new(shader.schema()),
            shader: Rc::downgrade(shader),
            material,
            position,
            scale,
        }
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(self.scale)
    }

    /// `None` once the owner has dropped the mesh.
    pub fn mesh(&self) -> Option<Rc<D::Mesh>> {
        self.mesh.upgrade()
    }

    pub fn shader(&self) -> Option<Rc<ShaderProgram>> {
        self.shader.upgrade()
    }

    pub fn uniforms(&self) -> &UniformStore {
        &self.uniforms
    }

    /// Fills every main-pass uniform and binds the texture units this object
    /// samples from.
    pub(super) fn prepare_main_pass(
        &mut self,
        device: &mut D,
        view_proj: Mat4,
        eye: Vec3,
        lights: &[Light<D>],
    ) -> &UniformStore {
        let model = self.model();
        let uniforms = &mut self.uniforms;
        uniforms.set(iface::MVP, view_proj * model);
        uniforms.set(iface::MODEL, model);
        uniforms.set(iface::LIGHT_COUNT, lights.len() as i32);
        uniforms.set(iface::EYE_POS, eye);
        self.material.apply(device, uniforms);

        for (slot, light) in lights.iter().enumerate() {
            light.apply(device, slot, model, uniforms);
        }
        &self.uniforms
    }
}
