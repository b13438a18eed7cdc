use std::rc::Rc;

use glam::{Mat4, Vec3};
use wgpu_shadowmap::pipeline::interface::{self, blinn_phong_program};
use wgpu_shadowmap::pipeline::{
    light_space_view_projection, BlinnPhongMaterial, PipelineConfig, PointLight, ShadowPipeline,
    ShadowProjection,
};
use wgpu_shadowmap::renderer::device::{RasterState, RenderDevice};
use wgpu_shadowmap::renderer::headless::{DrawCall, HeadlessDevice, HeadlessMesh, Target};
use wgpu_shadowmap::renderer::primitives::cube_mesh;
use wgpu_shadowmap::renderer::shader::ShaderProgram;
use wgpu_shadowmap::renderer::uniforms::UniformValue;
use wgpu_shadowmap::scene::Camera;
use wgpu_shadowmap::PipelineError;

const EPSILON: f32 = 1e-5;
const SHADOW_SIZE: u32 = 256;

type Pipeline = ShadowPipeline<HeadlessDevice>;

struct Fixture {
    device: HeadlessDevice,
    pipeline: Pipeline,
    mesh: Rc<HeadlessMesh>,
    shader: Rc<ShaderProgram>,
}

fn config() -> PipelineConfig {
    PipelineConfig {
        shadow_width: SHADOW_SIZE,
        shadow_height: SHADOW_SIZE,
        ..PipelineConfig::default()
    }
}

fn fixture(lights: &[(Vec3, bool)]) -> Fixture {
    let mut device = HeadlessDevice::new(640, 480);
    let mut pipeline = ShadowPipeline::new(&mut device, config()).unwrap();
    for &(position, has_shadow) in lights {
        pipeline
            .add_light(
                &mut device,
                PointLight {
                    position,
                    ..PointLight::default()
                },
                has_shadow,
            )
            .unwrap();
    }
    let (vertices, indices) = cube_mesh();
    let mesh = Rc::new(device.create_mesh(&vertices, &indices));
    let shader = Rc::new(blinn_phong_program().unwrap());
    Fixture {
        device,
        pipeline,
        mesh,
        shader,
    }
}

impl Fixture {
    fn add_cube(&mut self, position: Vec3, scale: Vec3) -> usize {
        self.pipeline
            .add_object(
                &self.mesh,
                &self.shader,
                BlinnPhongMaterial::default(),
                position,
                scale,
            )
            .unwrap()
    }

    fn render(&mut self) {
        self.device.take_commands();
        self.pipeline.render(&mut self.device, &Camera::default());
    }

    fn object_draws(&self) -> Vec<&DrawCall> {
        self.device
            .draws()
            .filter(|draw| draw.target == Target::Default && draw.program == self.shader.id())
            .collect()
    }

    fn shadow_draws(&self) -> Vec<&DrawCall> {
        self.device
            .draws()
            .filter(|draw| matches!(draw.target, Target::Framebuffer(_)))
            .collect()
    }
}

fn matrix(draw: &DrawCall, name: &str, index: usize) -> Mat4 {
    match draw.uniforms.get_indexed(name, index) {
        Some(UniformValue::Mat4(m)) => *m,
        other => panic!("`{name}[{index}]` is {other:?}"),
    }
}

fn model(position: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_scale(scale)
}

#[test]
fn single_caster_renders_and_feeds_its_matrix_to_the_object() {
    let light = Vec3::new(3.0, 3.0, 0.0);
    let mut fx = fixture(&[(light, true)]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);
    fx.render();

    let record = &fx.pipeline.lights()[0];
    let target = record.shadow_map().expect("caster owns a shadow target");
    assert!(fx.device.was_written(target.depth_texture()));
    assert_eq!(target.size(), (SHADOW_SIZE, SHADOW_SIZE));

    let vp = record.light_space_vp().expect("set by the shadow pass");
    let expected = light_space_view_projection(light, &ShadowProjection::default());
    assert!(vp.abs_diff_eq(expected, EPSILON));

    let draws = fx.object_draws();
    assert_eq!(draws.len(), 1);
    let light_mvp = matrix(draws[0], interface::LIGHT_MVP, 0);
    assert!(light_mvp.abs_diff_eq(vp * model(Vec3::ZERO, Vec3::ONE), EPSILON));

    let shadow = fx.shadow_draws();
    assert_eq!(shadow.len(), 1);
    let depth_mvp = match shadow[0].uniforms.get(interface::LIGHT_MVP) {
        Some(UniformValue::Mat4(m)) => *m,
        other => panic!("shadow light_mvp is {other:?}"),
    };
    assert!(depth_mvp.abs_diff_eq(light_mvp, EPSILON));
}

#[test]
fn mixed_lights_allocate_targets_only_for_casters() {
    let mut fx = fixture(&[
        (Vec3::new(3.0, 3.0, 0.0), true),
        (Vec3::new(-3.0, 3.0, 0.0), true),
        (Vec3::new(0.0, 3.0, 3.0), true),
        (Vec3::new(0.0, 3.0, -3.0), false),
    ]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);
    fx.render();

    let targets = fx
        .pipeline
        .lights()
        .iter()
        .filter(|light| light.shadow_map().is_some())
        .count();
    assert_eq!(targets, 3);

    let draw = fx.object_draws()[0];
    assert_eq!(
        draw.uniforms.get(interface::LIGHT_COUNT),
        Some(&UniformValue::Int(4))
    );
    assert_eq!(draw.texture_units[4], None);
    for slot in 0..3 {
        let depth = fx.pipeline.lights()[slot]
            .shadow_map()
            .unwrap()
            .depth_texture()
            .id;
        assert_eq!(draw.texture_units[slot + 1], Some(depth));
        assert_eq!(
            draw.uniforms.texture_unit(interface::SHADOW_MAPS, slot),
            Some(slot as u32 + 1)
        );
    }
    assert_eq!(
        draw.uniforms.get_indexed(interface::LIGHTS_CASTS_SHADOW, 3),
        Some(&UniformValue::Int(0))
    );
}

#[test]
fn lights_without_objects_draw_only_their_markers() {
    let mut fx = fixture(&[(Vec3::new(1.0, 2.0, 3.0), true), (Vec3::new(-1.0, 2.0, 3.0), false)]);
    fx.render();

    let draws: Vec<_> = fx.device.draws().collect();
    assert_eq!(draws.len(), 2);
    assert!(draws.iter().all(|d| d.target == Target::Default));
    assert!(draws.iter().all(|d| d.program_label == "light_cube.wgsl"));
    assert!(fx.pipeline.lights()[0].light_space_vp().is_some());
}

#[test]
fn light_slot_follows_insertion_order() {
    let positions = [
        (Vec3::new(1.0, 4.0, 0.0), false),
        (Vec3::new(2.0, 4.0, 0.0), true),
        (Vec3::new(3.0, 4.0, 0.0), false),
        (Vec3::new(4.0, 4.0, 0.0), true),
    ];
    let mut fx = fixture(&positions);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);

    for frame in 0..3 {
        fx.render();
        let draw = fx.object_draws()[0];
        for (slot, &(position, has_shadow)) in positions.iter().enumerate() {
            assert_eq!(
                draw.uniforms.get_indexed(interface::LIGHTS_POSITION, slot),
                Some(&UniformValue::Vec3(position)),
                "frame {frame} slot {slot}"
            );
            assert_eq!(
                draw.uniforms.get_indexed(interface::LIGHTS_CASTS_SHADOW, slot),
                Some(&UniformValue::Int(has_shadow as i32))
            );
        }
    }
}

#[test]
fn non_caster_unit_is_cleared_even_when_stale() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true), (Vec3::new(0.0, 3.0, 3.0), false)]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);
    fx.add_cube(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);

    let stale = fx.device.create_depth_texture(4, 4);
    fx.device.bind_texture(2, Some(&stale));
    fx.render();

    let non_caster = &fx.pipeline.lights()[1];
    assert!(non_caster.shadow_map().is_none());
    assert!(non_caster.light_space_vp().is_none());
    for draw in fx.object_draws() {
        assert_eq!(draw.texture_units[2], None);
        assert_eq!(matrix(draw, interface::LIGHT_MVP, 1), Mat4::ZERO);
    }
    // only the caster renders depth
    assert!(fx.shadow_draws().iter().all(|d| d.program_label == "shadow.wgsl"));
    assert_eq!(fx.shadow_draws().len(), 2);
}

#[test]
fn main_pass_uses_the_matrix_from_the_same_frame() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true)]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);
    fx.render();
    let first = matrix(fx.object_draws()[0], interface::LIGHT_MVP, 0);

    let moved = Vec3::new(-2.0, 5.0, 1.0);
    fx.pipeline.lights_mut()[0].light.position = moved;
    fx.render();
    let second = matrix(fx.object_draws()[0], interface::LIGHT_MVP, 0);

    let expected = light_space_view_projection(moved, &ShadowProjection::default());
    assert!(second.abs_diff_eq(expected, EPSILON));
    assert!(!second.abs_diff_eq(first, EPSILON));
    assert_eq!(
        fx.object_draws()[0]
            .uniforms
            .get_indexed(interface::LIGHTS_POSITION, 0),
        Some(&UniformValue::Vec3(moved))
    );
}

#[test]
fn dropped_mesh_or_shader_draws_nothing() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true)]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);

    let (vertices, indices) = cube_mesh();
    let doomed_mesh = Rc::new(fx.device.create_mesh(&vertices, &indices));
    fx.pipeline
        .add_object(
            &doomed_mesh,
            &fx.shader,
            BlinnPhongMaterial::default(),
            Vec3::X,
            Vec3::ONE,
        )
        .unwrap();
    let doomed_shader = Rc::new(blinn_phong_program().unwrap());
    fx.pipeline
        .add_object(
            &fx.mesh,
            &doomed_shader,
            BlinnPhongMaterial::default(),
            Vec3::Z,
            Vec3::ONE,
        )
        .unwrap();
    let doomed_mesh_id = doomed_mesh.id;
    let doomed_shader_id = doomed_shader.id();
    drop(doomed_mesh);
    drop(doomed_shader);

    fx.render();
    assert_eq!(fx.shadow_draws().len(), 1);
    assert_eq!(fx.object_draws().len(), 1);
    assert!(fx.device.draws().all(|d| d.mesh != doomed_mesh_id));
    assert!(fx.device.draws().all(|d| d.program != doomed_shader_id));
}

#[test]
fn untextured_object_never_sees_the_previous_texture() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true)]);
    let texture = Rc::new(fx.device.create_texture_rgba8(2, 2, &[200; 16]));
    fx.pipeline
        .add_object(
            &fx.mesh,
            &fx.shader,
            BlinnPhongMaterial::default().with_texture(Rc::downgrade(&texture)),
            Vec3::ZERO,
            Vec3::ONE,
        )
        .unwrap();
    fx.add_cube(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
    fx.render();

    let draws = fx.object_draws();
    assert_eq!(draws[0].texture_units[0], Some(texture.id));
    assert_eq!(draws[1].texture_units[0], None);
    for draw in draws {
        assert_eq!(draw.uniforms.texture_unit(interface::DIFFUSE_TEX, 0), Some(0));
    }
}

#[test]
fn passes_use_their_own_raster_state_and_viewport() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true), (Vec3::new(-3.0, 3.0, 0.0), true)]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);
    fx.render();

    let draws: Vec<_> = fx.device.draws().collect();
    let first_main = draws
        .iter()
        .position(|d| d.target == Target::Default)
        .unwrap();
    assert_eq!(first_main, 2);
    for draw in &draws[..first_main] {
        assert_eq!(draw.raster, RasterState::SHADOW);
        assert_eq!(draw.viewport, (SHADOW_SIZE, SHADOW_SIZE));
    }
    for draw in &draws[first_main..] {
        assert_eq!(draw.target, Target::Default);
        assert_eq!(draw.raster, RasterState::MAIN);
        assert_eq!(draw.viewport, (640, 480));
    }
}

#[test]
fn object_transform_reaches_the_main_pass() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true)]);
    let position = Vec3::new(1.0, 0.5, -2.0);
    let scale = Vec3::new(2.0, 1.0, 0.5);
    fx.add_cube(position, scale);
    let camera = Camera::default();
    fx.device.take_commands();
    fx.pipeline.render(&mut fx.device, &camera);

    let draw = fx.object_draws()[0];
    let expected = camera.view_projection((640, 480)) * model(position, scale);
    assert!(matrix(draw, interface::MVP, 0).abs_diff_eq(expected, 1e-4));
    assert!(matrix(draw, interface::MODEL, 0).abs_diff_eq(model(position, scale), EPSILON));
    assert_eq!(
        draw.uniforms.get(interface::EYE_POS),
        Some(&UniformValue::Vec3(camera.position()))
    );
}

#[test]
fn zero_sized_shadow_maps_are_rejected() {
    let mut device = HeadlessDevice::new(64, 64);
    let err = ShadowPipeline::new(
        &mut device,
        PipelineConfig {
            shadow_width: 0,
            ..PipelineConfig::default()
        },
    )
    .err()
    .unwrap();
    assert!(matches!(err, PipelineError::IncompleteFramebuffer(_)));
}

#[test]
fn light_limit_must_fit_the_texture_units() {
    let mut device = HeadlessDevice::with_texture_units(64, 64, 4);
    let err = ShadowPipeline::new(&mut device, PipelineConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PipelineError::TextureUnitBudget {
            max_lights: 8,
            available: 4
        }
    ));

    let pipeline = ShadowPipeline::new(
        &mut device,
        PipelineConfig {
            max_lights: 3,
            ..PipelineConfig::default()
        },
    );
    assert!(pipeline.is_ok());
}

#[test]
fn oversized_light_limit_is_rejected_without_overflow() {
    let mut device = HeadlessDevice::new(64, 64);
    let err = ShadowPipeline::new(
        &mut device,
        PipelineConfig {
            max_lights: u32::MAX,
            ..PipelineConfig::default()
        },
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        PipelineError::TextureUnitBudget {
            max_lights: u32::MAX,
            ..
        }
    ));
    assert!(err.to_string().contains("4294967296 texture units"));
}

#[test]
fn adding_past_the_light_limit_fails() {
    let mut device = HeadlessDevice::new(64, 64);
    let mut pipeline: Pipeline = ShadowPipeline::new(
        &mut device,
        PipelineConfig {
            max_lights: 2,
            ..config()
        },
    )
    .unwrap();
    assert_eq!(pipeline.add_light(&mut device, PointLight::default(), true).unwrap(), 0);
    assert_eq!(pipeline.add_light(&mut device, PointLight::default(), false).unwrap(), 1);
    let err = pipeline
        .add_light(&mut device, PointLight::default(), true)
        .unwrap_err();
    assert!(matches!(err, PipelineError::LightLimit { max: 2 }));
    assert_eq!(pipeline.lights().len(), 2);
}

#[test]
fn shader_with_short_light_arrays_is_rejected() {
    const TWO_LIGHTS: &str = r#"
struct Uniforms {
    mvp: mat4x4<f32>,
    light_mvp: array<mat4x4<f32>, 2>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.mvp * u.light_mvp[1] * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
    let mut fx = fixture(&[]);
    let shader = Rc::new(ShaderProgram::from_wgsl("two_lights", TWO_LIGHTS).unwrap());
    let err = fx
        .pipeline
        .add_object(&fx.mesh, &shader, BlinnPhongMaterial::default(), Vec3::ZERO, Vec3::ONE)
        .unwrap_err();
    match err {
        PipelineError::ShaderArrayTooShort {
            uniform,
            len,
            required,
            ..
        } => {
            assert_eq!(uniform, interface::LIGHT_MVP);
            assert_eq!((len, required), (2, 8));
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(fx.pipeline.objects().is_empty());
}

#[test]
fn terminate_releases_everything() {
    let mut fx = fixture(&[(Vec3::new(3.0, 3.0, 0.0), true)]);
    fx.add_cube(Vec3::ZERO, Vec3::ONE);
    fx.render();
    fx.pipeline.terminate();
    // the pipeline held only weak references to shared resources
    assert_eq!(Rc::strong_count(&fx.mesh), 1);
    assert_eq!(Rc::strong_count(&fx.shader), 1);
}
