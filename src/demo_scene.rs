//! The scene the viewer shows: a floor, a few cubes and four point lights
//! circling above them.

use std::path::Path;
use std::rc::Rc;

use glam::Vec3;
use image::{Rgba, RgbaImage};

use crate::error::Result;
use crate::pipeline::interface::blinn_phong_program;
use crate::pipeline::{BlinnPhongMaterial, PointLight, ShadowPipeline};
use crate::renderer::device::RenderDevice;
use crate::renderer::primitives::{cube_mesh, plane_mesh};
use crate::renderer::shader::ShaderProgram;

const CHECKER_SIZE: u32 = 256;
const CHECKER_CELL: u32 = 32;

#[derive(Debug, Clone, Copy)]
struct LightOrbit {
    radius: f32,
    height: f32,
    speed: f32,
    phase: f32,
}

impl LightOrbit {
    fn position(&self, time: f32) -> Vec3 {
        let angle = time * self.speed + self.phase;
        Vec3::new(
            angle.cos() * self.radius,
            self.height,
            angle.sin() * self.radius,
        )
    }
}

/// Owns the meshes, shader and texture the pipeline's objects point at.
pub struct DemoScene<D: RenderDevice> {
    _shader: Rc<ShaderProgram>,
    _cube: Rc<D::Mesh>,
    _floor: Rc<D::Mesh>,
    _checker: Rc<D::Texture>,
    _diffuse: Rc<D::Texture>,
    orbits: Vec<(usize, LightOrbit)>,
}

impl<D: RenderDevice> DemoScene<D> {
    /// `texture` replaces the generated checker on the cubes when it loads.
    pub fn build(
        device: &mut D,
        pipeline: &mut ShadowPipeline<D>,
        texture: Option<&Path>,
    ) -> Result<Self> {
        let shader = Rc::new(blinn_phong_program()?);
        let (vertices, indices) = cube_mesh();
        let cube = Rc::new(device.create_mesh(&vertices, &indices));
        let (vertices, indices) = plane_mesh(20.0, 8.0);
        let floor = Rc::new(device.create_mesh(&vertices, &indices));

        let checker = checker_image();
        let checker = Rc::new(device.create_texture_rgba8(
            checker.width(),
            checker.height(),
            checker.as_raw(),
        ));
        let diffuse = match texture.map(|path| device.load_texture(path)) {
            Some(Ok(loaded)) => Rc::new(loaded),
            Some(Err(err)) => {
                log::warn!("Using generated checker texture: {}", err);
                Rc::clone(&checker)
            }
            None => Rc::clone(&checker),
        };

        pipeline.add_object(
            &floor,
            &shader,
            BlinnPhongMaterial {
                ks: Vec3::splat(0.3),
                shininess: 16.0,
                ..Default::default()
            }
            .with_texture(Rc::downgrade(&checker)),
            Vec3::ZERO,
            Vec3::ONE,
        )?;

        let cubes = [
            (Vec3::new(0.0, 0.5, 0.0), Vec3::ONE, None),
            (Vec3::new(-2.5, 0.75, 1.5), Vec3::splat(1.5), Some(Vec3::new(0.9, 0.4, 0.3))),
            (Vec3::new(2.0, 0.25, -1.5), Vec3::new(2.0, 0.5, 1.0), Some(Vec3::new(0.3, 0.6, 0.9))),
            (Vec3::new(1.5, 1.5, 2.5), Vec3::new(0.5, 3.0, 0.5), None),
        ];
        for (position, scale, tint) in cubes {
            let material = match tint {
                Some(kd) => BlinnPhongMaterial {
                    kd,
                    ..Default::default()
                },
                None => BlinnPhongMaterial::default().with_texture(Rc::downgrade(&diffuse)),
            };
            pipeline.add_object(&cube, &shader, material, position, scale)?;
        }

        let lights = [
            (Vec3::new(1.0, 0.9, 0.8), 6.0, true, LightOrbit { radius: 4.0, height: 4.5, speed: 0.4, phase: 0.0 }),
            (Vec3::new(0.4, 0.6, 1.0), 4.0, true, LightOrbit { radius: 5.0, height: 3.5, speed: -0.3, phase: 2.1 }),
            (Vec3::new(1.0, 0.5, 0.4), 4.0, true, LightOrbit { radius: 3.0, height: 5.0, speed: 0.25, phase: 4.2 }),
            (Vec3::new(0.6, 1.0, 0.6), 2.0, false, LightOrbit { radius: 1.5, height: 2.5, speed: 0.8, phase: 1.0 }),
        ];
        let mut orbits = Vec::with_capacity(lights.len());
        for (color, intensity, has_shadow, orbit) in lights {
            let slot = pipeline.add_light(
                device,
                PointLight {
                    intensity,
                    position: orbit.position(0.0),
                    color,
                },
                has_shadow,
            )?;
            orbits.push((slot, orbit));
        }

        log::info!(
            "Demo scene: {} objects, {} lights",
            pipeline.objects().len(),
            pipeline.lights().len()
        );

        Ok(Self {
            _shader: shader,
            _cube: cube,
            _floor: floor,
            _checker: checker,
            _diffuse: diffuse,
            orbits,
        })
    }

    /// Moves every light along its orbit; `time` is in seconds.
    pub fn animate(&self, pipeline: &mut ShadowPipeline<D>, time: f32) {
        let lights = pipeline.lights_mut();
        for (slot, orbit) in &self.orbits {
            if let Some(light) = lights.get_mut(*slot) {
                light.light.position = orbit.position(time);
            }
        }
    }
}

fn checker_image() -> RgbaImage {
    RgbaImage::from_fn(CHECKER_SIZE, CHECKER_SIZE, |x, y| {
        if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
            Rgba([220, 220, 220, 255])
        } else {
            Rgba([90, 90, 100, 255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use crate::renderer::headless::HeadlessDevice;

    #[test]
    fn builds_within_the_default_limits() {
        let mut device = HeadlessDevice::new(320, 240);
        let mut pipeline = ShadowPipeline::new(&mut device, PipelineConfig::default()).unwrap();
        let scene = DemoScene::build(&mut device, &mut pipeline, None).unwrap();

        assert_eq!(pipeline.objects().len(), 5);
        assert_eq!(pipeline.lights().len(), 4);
        assert_eq!(pipeline.lights().iter().filter(|l| l.has_shadow()).count(), 3);
        assert!(pipeline.objects().iter().all(|o| o.mesh().is_some()));

        let before = pipeline.lights()[0].light.position;
        scene.animate(&mut pipeline, 1.0);
        assert_ne!(pipeline.lights()[0].light.position, before);
    }

    #[test]
    fn unreadable_texture_falls_back_to_the_checker() {
        let mut device = HeadlessDevice::new(64, 64);
        let mut pipeline = ShadowPipeline::new(&mut device, PipelineConfig::default()).unwrap();
        let scene = DemoScene::build(&mut device, &mut pipeline, Some(Path::new("no/such/texture.png")));
        assert!(scene.is_ok());
    }

    #[test]
    fn checker_alternates_cells() {
        let image = checker_image();
        assert_ne!(image.get_pixel(0, 0), image.get_pixel(CHECKER_CELL, 0));
        assert_eq!(image.get_pixel(0, 0), image.get_pixel(CHECKER_CELL, CHECKER_CELL));
    }
}
