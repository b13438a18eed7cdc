//! The shadow-mapped forward pipeline.
//!
//! Each frame renders depth from every shadow-casting light into its own
//! [`ShadowTarget`], then draws the camera view once, sampling every light's
//! depth texture while shading.

pub mod config;
pub mod interface;
pub mod light;
pub mod material;
pub mod object;
pub mod shadow_target;

use std::rc::Rc;

use glam::Vec3;

pub use config::{PipelineConfig, ShadowProjection};
pub use light::{light_space_view_projection, Light, PointLight};
pub use material::BlinnPhongMaterial;
pub use object::SceneObject;
pub use shadow_target::ShadowTarget;

use crate::error::{PipelineError, Result};
use crate::renderer::device::{ClearFlags, RasterState, RenderDevice};
use crate::renderer::primitives::cube_mesh;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::uniforms::UniformStore;
use crate::scene::camera::Camera;

pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.12, 1.0];

pub struct ShadowPipeline<D: RenderDevice> {
    // lights hold the shadow targets and are released first
    lights: Vec<Light<D>>,
    objects: Vec<SceneObject<D>>,
    shadow_shader: ShaderProgram,
    shadow_uniforms: UniformStore,
    light_cube_shader: ShaderProgram,
    light_cube_mesh: D::Mesh,
    config: PipelineConfig,
}

impl<D: RenderDevice> ShadowPipeline<D> {
    /// Compiles the bundled shadow and light-marker shaders and uploads the
    /// marker cube.
    pub fn new(device: &mut D, config: PipelineConfig) -> Result<Self> {
        if config.shadow_width == 0 || config.shadow_height == 0 {
            return Err(PipelineError::IncompleteFramebuffer(format!(
                "shadow maps would be {}x{}",
                config.shadow_width, config.shadow_height
            )));
        }
        let available = device.max_texture_units();
        let required = config
            .max_lights
            .checked_add(interface::SHADOW_TEXTURE_UNIT_BASE);
        if required.map_or(true, |units| units > available) {
            return Err(PipelineError::TextureUnitBudget {
                max_lights: config.max_lights,
                available,
            });
        }

        let shadow_shader = interface::shadow_program()?;
        let light_cube_shader = interface::light_cube_program()?;
        let (vertices, indices) = cube_mesh();
        let light_cube_mesh = device.create_mesh(&vertices, &indices);

        log::info!(
            "Shadow pipeline ready: {}x{} shadow maps, up to {} lights (interface v{})",
            config.shadow_width,
            config.shadow_height,
            config.max_lights,
            interface::INTERFACE_VERSION
        );

        Ok(Self {
            lights: Vec::new(),
            objects: Vec::new(),
            shadow_uniforms: UniformStore::new(shadow_shader.schema()),
            shadow_shader,
            light_cube_shader,
            light_cube_mesh,
            config,
        })
    }

    /// Appends a light and returns its slot in the per-light uniform arrays.
    pub fn add_light(&mut self, device: &mut D, light: PointLight, has_shadow: bool) -> Result<usize> {
        if self.lights.len() >= self.config.max_lights as usize {
            return Err(PipelineError::LightLimit {
                max: self.config.max_lights,
            });
        }
        let record = Light::new(
            device,
            light,
            has_shadow,
            &self.light_cube_shader,
            &self.config,
        )?;
        self.lights.push(record);
        let slot = self.lights.len() - 1;
        log::info!(
            "Added light {} at {:?} (shadow: {})",
            slot,
            light.position,
            has_shadow
        );
        Ok(slot)
    }

    /// Appends an object drawn with `shader`. The pipeline keeps only weak
    /// references to `mesh` and `shader`.
    pub fn add_object(
        &mut self,
        mesh: &Rc<D::Mesh>,
        shader: &Rc<ShaderProgram>,
        material: BlinnPhongMaterial<D>,
        position: Vec3,
        scale: Vec3,
    ) -> Result<usize> {
        for name in interface::PER_LIGHT_UNIFORMS {
            if let Some(desc) = shader.schema().get(name) {
                if desc.array_len < self.config.max_lights {
                    return Err(PipelineError::ShaderArrayTooShort {
                        shader: shader.label().to_string(),
                        uniform: name.to_string(),
                        len: desc.array_len,
                        required: self.config.max_lights,
                    });
                }
            }
        }
        self.objects
            .push(SceneObject::new(mesh, shader, material, position, scale));
        Ok(self.objects.len() - 1)
    }

    /// Renders one frame: every shadow map first, then the camera view.
    pub fn render(&mut self, device: &mut D, camera: &Camera) {
        self.shadow_pass(device);
        self.main_pass(device, camera);
    }

    fn shadow_pass(&mut self, device: &mut D) {
        for light in &mut self.lights {
            light.reset_frame();
            if !light.has_shadow() {
                continue;
            }
            let vp = light_space_view_projection(light.light.position, &self.config.shadow_projection);
            light.set_light_space_vp(vp);
            let Some(target) = light.shadow_map() else {
                continue;
            };

            target.bind(device);
            device.clear(ClearFlags::DEPTH, CLEAR_COLOR);
            let (width, height) = target.size();
            device.set_viewport(width, height);
            device.set_raster_state(RasterState::SHADOW);

            for object in &self.objects {
                let (Some(mesh), Some(_)) = (object.mesh(), object.shader()) else {
                    continue;
                };
                self.shadow_uniforms
                    .set(interface::LIGHT_MVP, vp * object.model());
                device.draw(&self.shadow_shader, &self.shadow_uniforms, &mesh);
            }
            target.unbind(device);
        }
    }

    fn main_pass(&mut self, device: &mut D, camera: &Camera) {
        device.bind_framebuffer(None);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, CLEAR_COLOR);
        let (width, height) = device.framebuffer_size();
        device.set_viewport(width, height);
        device.set_raster_state(RasterState::MAIN);

        let view_proj = camera.view_projection((width, height));

        for light in &mut self.lights {
            light.draw_marker(
                device,
                view_proj,
                &self.light_cube_shader,
                &self.light_cube_mesh,
            );
        }

        for (index, object) in self.objects.iter_mut().enumerate() {
            let (Some(mesh), Some(shader)) = (object.mesh(), object.shader()) else {
                log::trace!("Object {} references a dropped resource, skipping", index);
                continue;
            };
            let uniforms = object.prepare_main_pass(device, view_proj, camera.position(), &self.lights);
            device.draw(&shader, uniforms, &mesh);
        }
    }

    /// Releases shadow targets first, then the fixed marker and shadow
    /// resources.
    pub fn terminate(self) {
        let Self {
            lights,
            objects,
            shadow_shader,
            shadow_uniforms,
            light_cube_shader,
            light_cube_mesh,
            config: _,
        } = self;
        let light_count = lights.len();
        drop(lights);
        drop(objects);
        drop(light_cube_shader);
        drop(light_cube_mesh);
        drop(shadow_uniforms);
        drop(shadow_shader);
        log::info!("Shadow pipeline terminated ({} lights released)", light_count);
    }

    pub fn lights(&self) -> &[Light<D>] {
        &self.lights
    }

    /// Lights can be moved or recoloured; their slots stay fixed.
    pub fn lights_mut(&mut self) -> &mut [Light<D>] {
        &mut self.lights
    }

    pub fn objects(&self) -> &[SceneObject<D>] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject<D>] {
        &mut self.objects
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
