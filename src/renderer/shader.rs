// renderer/shader.rs
//! WGSL shader programs and their reflected interface.
//!
//! A program is parsed and validated with naga when it is created; that is
//! the point at which a broken shader is rejected. Reflection turns the
//! module's `var<uniform>` block into a [`UniformSchema`] and records every
//! texture and sampler binding so a backend can build matching layouts.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use naga::{AddressSpace, ArraySize, ImageClass, ImageDimension, Scalar, TypeInner, VectorSize};
use thiserror::Error;

use crate::io;
use crate::renderer::uniforms::{UniformDesc, UniformLocation, UniformSchema, UniformType};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("shader `{label}` failed to parse:\n{message}")]
    Parse { label: String, message: String },
    #[error("shader `{label}` failed validation:\n{message}")]
    Validation { label: String, message: String },
    #[error("shader `{label}` has no vertex entry point")]
    MissingVertexStage { label: String },
    #[error("shader `{label}` declares more than one uniform block")]
    MultipleUniformBlocks { label: String },
    #[error("uniform `{name}` in shader `{label}` has unsupported type {ty}")]
    UnsupportedUniform {
        label: String,
        name: String,
        ty: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ProgramId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSample {
    Color,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    UniformBlock { size: u32 },
    /// `count` is `Some(n)` for `binding_array<_, n>`.
    Texture {
        sample: TextureSample,
        count: Option<u32>,
    },
    Sampler { comparison: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

/// A validated WGSL program plus its reflected interface.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    label: String,
    source: String,
    schema: UniformSchema,
    bindings: Vec<ResourceBinding>,
    vertex_entry: String,
    fragment_entry: Option<String>,
}

impl ShaderProgram {
    pub fn from_wgsl(label: &str, source: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|err| ShaderError::Parse {
            label: label.to_string(),
            message: err.emit_to_string(source),
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|err| ShaderError::Validation {
            label: label.to_string(),
            message: err.emit_to_string(source),
        })?;

        let vertex_entry = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == naga::ShaderStage::Vertex)
            .map(|ep| ep.name.clone())
            .ok_or_else(|| ShaderError::MissingVertexStage {
                label: label.to_string(),
            })?;
        let fragment_entry = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == naga::ShaderStage::Fragment)
            .map(|ep| ep.name.clone());

        let (schema, bindings) = Reflector::new(label, &module).run()?;

        log::info!(
            "Shader `{}`: {} uniforms, {} bindings, block {} bytes{}",
            label,
            schema.len(),
            bindings.len(),
            schema.block_size(),
            if fragment_entry.is_none() {
                " (vertex only)"
            } else {
                ""
            }
        );

        Ok(Self {
            id: ProgramId::next(),
            label: label.to_string(),
            source: source.to_string(),
            schema,
            bindings,
            vertex_entry,
            fragment_entry,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let source = io::load_text(path).map_err(|source| ShaderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_wgsl(&path.display().to_string(), &source)
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn schema(&self) -> &UniformSchema {
        &self.schema
    }

    /// Resource bindings sorted by (group, binding).
    pub fn bindings(&self) -> &[ResourceBinding] {
        &self.bindings
    }

    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    pub fn fragment_entry(&self) -> Option<&str> {
        self.fragment_entry.as_deref()
    }
}

struct Reflector<'a> {
    label: &'a str,
    module: &'a naga::Module,
    schema: UniformSchema,
    bindings: Vec<ResourceBinding>,
}

impl<'a> Reflector<'a> {
    fn new(label: &'a str, module: &'a naga::Module) -> Self {
        Self {
            label,
            module,
            schema: UniformSchema::new(),
            bindings: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(UniformSchema, Vec<ResourceBinding>), ShaderError> {
        let module = self.module;
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = var.binding.as_ref() else {
                continue;
            };
            let name = var.name.clone().unwrap_or_default();
            match var.space {
                AddressSpace::Uniform => self.uniform_block(&name, var.ty, binding)?,
                AddressSpace::Handle => self.handle(&name, var.ty, binding)?,
                _ => {}
            }
        }
        self.bindings.sort_by_key(|b| (b.group, b.binding));
        Ok((self.schema, self.bindings))
    }

    fn uniform_block(
        &mut self,
        name: &str,
        ty: naga::Handle<naga::Type>,
        binding: &naga::ResourceBinding,
    ) -> Result<(), ShaderError> {
        if self.schema.block_size() != 0 {
            return Err(ShaderError::MultipleUniformBlocks {
                label: self.label.to_string(),
            });
        }
        let module = self.module;
        match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    self.value(&member_name, member.ty, member.offset)?;
                }
            }
            _ => self.value(name, ty, 0)?,
        }
        let size = module.types[ty].inner.size(module.to_ctx());
        self.schema.set_block_size(size);
        self.bindings.push(ResourceBinding {
            name: name.to_string(),
            group: binding.group,
            binding: binding.binding,
            kind: BindingKind::UniformBlock { size },
        });
        Ok(())
    }

    fn value(
        &mut self,
        name: &str,
        ty: naga::Handle<naga::Type>,
        offset: u32,
    ) -> Result<(), ShaderError> {
        let module = self.module;
        match &module.types[ty].inner {
            TypeInner::Array { base, size, stride } => {
                let len = self.array_len(name, size)?;
                match &module.types[*base].inner {
                    // arrays of structs flatten to one array entry per member
                    TypeInner::Struct { members, .. } => {
                        for member in members {
                            let member_name =
                                format!("{name}.{}", member.name.as_deref().unwrap_or_default());
                            let leaf = self.leaf(&member_name, &module.types[member.ty].inner)?;
                            self.schema.insert(
                                &member_name,
                                UniformDesc {
                                    ty: leaf,
                                    array_len: len,
                                    location: UniformLocation::Block {
                                        offset: offset + member.offset,
                                        stride: *stride,
                                    },
                                },
                            );
                        }
                    }
                    inner => {
                        let leaf = self.leaf(name, inner)?;
                        self.schema.insert(
                            name,
                            UniformDesc {
                                ty: leaf,
                                array_len: len,
                                location: UniformLocation::Block {
                                    offset,
                                    stride: *stride,
                                },
                            },
                        );
                    }
                }
            }
            TypeInner::Struct { members, .. } => {
                for member in members {
                    let member_name =
                        format!("{name}.{}", member.name.as_deref().unwrap_or_default());
                    self.value(&member_name, member.ty, offset + member.offset)?;
                }
            }
            inner => {
                let leaf = self.leaf(name, inner)?;
                self.schema.insert(
                    name,
                    UniformDesc {
                        ty: leaf,
                        array_len: 1,
                        location: UniformLocation::Block { offset, stride: 0 },
                    },
                );
            }
        }
        Ok(())
    }

    fn leaf(&self, name: &str, inner: &TypeInner) -> Result<UniformType, ShaderError> {
        match *inner {
            TypeInner::Scalar(scalar) if scalar == Scalar::F32 => Ok(UniformType::Float),
            TypeInner::Scalar(scalar) if scalar == Scalar::I32 => Ok(UniformType::Int),
            TypeInner::Vector {
                size: VectorSize::Tri,
                scalar,
            } if scalar == Scalar::F32 => Ok(UniformType::Vec3),
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar == Scalar::F32 => Ok(UniformType::Mat4),
            _ => Err(self.unsupported(name, inner)),
        }
    }

    fn handle(
        &mut self,
        name: &str,
        ty: naga::Handle<naga::Type>,
        binding: &naga::ResourceBinding,
    ) -> Result<(), ShaderError> {
        let module = self.module;
        match &module.types[ty].inner {
            TypeInner::Sampler { comparison } => {
                self.bindings.push(ResourceBinding {
                    name: name.to_string(),
                    group: binding.group,
                    binding: binding.binding,
                    kind: BindingKind::Sampler {
                        comparison: *comparison,
                    },
                });
            }
            inner @ TypeInner::Image { .. } => self.texture(name, inner, None, binding)?,
            TypeInner::BindingArray { base, size } => {
                let len = self.array_len(name, size)?;
                self.texture(name, &module.types[*base].inner, Some(len), binding)?;
            }
            inner => return Err(self.unsupported(name, inner)),
        }
        Ok(())
    }

    fn texture(
        &mut self,
        name: &str,
        inner: &TypeInner,
        count: Option<u32>,
        binding: &naga::ResourceBinding,
    ) -> Result<(), ShaderError> {
        let sample = match *inner {
            TypeInner::Image {
                dim: ImageDimension::D2,
                arrayed: false,
                class: ImageClass::Depth { multi: false },
            } => TextureSample::Depth,
            TypeInner::Image {
                dim: ImageDimension::D2,
                arrayed: false,
                class: ImageClass::Sampled { multi: false, .. },
            } => TextureSample::Color,
            _ => return Err(self.unsupported(name, inner)),
        };
        self.schema.insert(
            name,
            UniformDesc {
                ty: UniformType::Sampler,
                array_len: count.unwrap_or(1),
                location: UniformLocation::Texture {
                    group: binding.group,
                    binding: binding.binding,
                },
            },
        );
        self.bindings.push(ResourceBinding {
            name: name.to_string(),
            group: binding.group,
            binding: binding.binding,
            kind: BindingKind::Texture { sample, count },
        });
        Ok(())
    }

    fn array_len(&self, name: &str, size: &ArraySize) -> Result<u32, ShaderError> {
        match size {
            ArraySize::Constant(len) => Ok(len.get()),
            _ => Err(ShaderError::UnsupportedUniform {
                label: self.label.to_string(),
                name: name.to_string(),
                ty: "runtime-sized array".to_string(),
            }),
        }
    }

    fn unsupported(&self, name: &str, inner: &TypeInner) -> ShaderError {
        ShaderError::UnsupportedUniform {
            label: self.label.to_string(),
            name: name.to_string(),
            ty: format!("{inner:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIT: &str = r#"
struct PointLight {
    position: vec3<f32>,
    intensity: f32,
    color: vec3<f32>,
    casts_shadow: i32,
}

struct Uniforms {
    mvp: mat4x4<f32>,
    light_mvp: array<mat4x4<f32>, 4>,
    lights: array<PointLight, 4>,
    eye_pos: vec3<f32>,
    light_count: i32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var diffuse_tex: texture_2d<f32>;
@group(1) @binding(1) var diffuse_sampler: sampler;
@group(1) @binding(2) var shadow_maps: binding_array<texture_depth_2d, 4>;
@group(1) @binding(3) var shadow_sampler: sampler_comparison;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.mvp * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    var c = textureSample(diffuse_tex, diffuse_sampler, vec2<f32>(0.5));
    for (var i = 0; i < u.light_count; i++) {
        let d = textureSampleCompareLevel(shadow_maps[i], shadow_sampler, vec2<f32>(0.5), 0.5);
        c += vec4<f32>(u.lights[i].color * u.lights[i].intensity * d, 0.0);
    }
    return c;
}
"#;

    const DEPTH_ONLY: &str = r#"
@group(0) @binding(0) var<uniform> light_mvp: mat4x4<f32>;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return light_mvp * vec4<f32>(position, 1.0);
}
"#;

    fn block_of(program: &ShaderProgram, name: &str) -> (u32, u32) {
        match program.schema().get(name).map(|d| d.location) {
            Some(UniformLocation::Block { offset, stride }) => (offset, stride),
            other => panic!("`{name}` not in block: {other:?}"),
        }
    }

    #[test]
    fn reflects_scalars_and_arrays() {
        let program = ShaderProgram::from_wgsl("lit", LIT).expect("valid shader");
        let schema = program.schema();

        let mvp = schema.get("mvp").expect("mvp");
        assert_eq!(mvp.ty, UniformType::Mat4);
        assert_eq!(mvp.array_len, 1);
        assert_eq!(block_of(&program, "mvp"), (0, 0));

        let light_mvp = schema.get("light_mvp").expect("light_mvp");
        assert_eq!(light_mvp.ty, UniformType::Mat4);
        assert_eq!(light_mvp.array_len, 4);
        assert_eq!(block_of(&program, "light_mvp"), (64, 64));

        assert_eq!(schema.get("light_count").map(|d| d.ty), Some(UniformType::Int));
        assert_eq!(schema.get("eye_pos").map(|d| d.ty), Some(UniformType::Vec3));
    }

    #[test]
    fn flattens_struct_arrays_per_member() {
        let program = ShaderProgram::from_wgsl("lit", LIT).expect("valid shader");
        let schema = program.schema();

        for (name, ty) in [
            ("lights.position", UniformType::Vec3),
            ("lights.intensity", UniformType::Float),
            ("lights.color", UniformType::Vec3),
            ("lights.casts_shadow", UniformType::Int),
        ] {
            let desc = schema.get(name).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(desc.ty, ty, "{name}");
            assert_eq!(desc.array_len, 4, "{name}");
        }

        // PointLight is 32 bytes and starts right after the 5 matrices
        assert_eq!(block_of(&program, "lights.position"), (320, 32));
        assert_eq!(block_of(&program, "lights.intensity"), (332, 32));
        assert_eq!(block_of(&program, "lights.color"), (336, 32));
    }

    #[test]
    fn reflects_textures_as_samplers() {
        let program = ShaderProgram::from_wgsl("lit", LIT).expect("valid shader");
        let schema = program.schema();

        let diffuse = schema.get("diffuse_tex").expect("diffuse_tex");
        assert_eq!(diffuse.ty, UniformType::Sampler);
        assert_eq!(diffuse.array_len, 1);

        let shadows = schema.get("shadow_maps").expect("shadow_maps");
        assert_eq!(shadows.ty, UniformType::Sampler);
        assert_eq!(shadows.array_len, 4);

        let kinds: Vec<_> = program.bindings().iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BindingKind::UniformBlock {
                    size: program.schema().block_size()
                },
                BindingKind::Texture {
                    sample: TextureSample::Color,
                    count: None
                },
                BindingKind::Sampler { comparison: false },
                BindingKind::Texture {
                    sample: TextureSample::Depth,
                    count: Some(4)
                },
                BindingKind::Sampler { comparison: true },
            ]
        );
    }

    #[test]
    fn bare_uniform_variable_is_reflected_by_name() {
        let program = ShaderProgram::from_wgsl("depth", DEPTH_ONLY).expect("valid shader");
        assert_eq!(program.schema().len(), 1);
        assert_eq!(
            program.schema().get("light_mvp").map(|d| d.ty),
            Some(UniformType::Mat4)
        );
        assert_eq!(program.schema().block_size(), 64);
        assert_eq!(program.fragment_entry(), None);
        assert_eq!(program.vertex_entry(), "vs_main");
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = ShaderProgram::from_wgsl("broken", "fn nope( {").unwrap_err();
        assert!(matches!(err, ShaderError::Parse { .. }), "{err}");
    }

    #[test]
    fn validation_errors_are_reported() {
        let source = r#"
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return 1.0;
}
"#;
        let err = ShaderProgram::from_wgsl("invalid", source).unwrap_err();
        assert!(
            matches!(err, ShaderError::Parse { .. } | ShaderError::Validation { .. }),
            "{err}"
        );
    }

    #[test]
    fn unsupported_uniform_types_are_rejected() {
        let source = r#"
struct Block { tint: vec4<f32> }
@group(0) @binding(0) var<uniform> u: Block;

@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return u.tint;
}
"#;
        let err = ShaderProgram::from_wgsl("vec4", source).unwrap_err();
        assert!(
            matches!(err, ShaderError::UnsupportedUniform { ref name, .. } if name == "tint"),
            "{err}"
        );
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("wgpu-shadowmap-shader-{}.wgsl", std::process::id()));
        std::fs::write(&path, DEPTH_ONLY).unwrap();
        let program = ShaderProgram::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(program.label().ends_with(".wgsl"));
        assert!(program.schema().contains("light_mvp"));

        let err = ShaderProgram::from_path("missing/shader.wgsl").unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
    }

    #[test]
    fn programs_get_distinct_ids() {
        let a = ShaderProgram::from_wgsl("a", DEPTH_ONLY).unwrap();
        let b = ShaderProgram::from_wgsl("b", DEPTH_ONLY).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
