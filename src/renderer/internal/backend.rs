// renderer/internal/backend.rs
//! wgpu implementation of [`RenderDevice`].
//!
//! Immediate-mode calls are recorded between [`WgpuDevice::begin_frame`] and
//! [`WgpuDevice::end_frame`]. Every framebuffer bind opens a render pass,
//! clears become load ops, and each draw packs its uniform store into a
//! per-frame arena addressed with a dynamic offset. The arena is uploaded and
//! all passes are encoded in submission order when the frame ends.

use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroU64};

use crate::error::PipelineError;
use crate::renderer::device::{ClearFlags, RasterState, RenderDevice};
use crate::renderer::internal::GpuContext;
use crate::renderer::mesh::GpuMesh;
use crate::renderer::pipeline_builder::{PassPipeline, PassShape};
use crate::renderer::shader::{BindingKind, ProgramId, ResourceBinding, ShaderProgram, TextureSample};
use crate::renderer::texture::{GpuTexture, GpuTextureKind};
use crate::renderer::uniforms::UniformStore;
use crate::renderer::vertex::Vertex;

const INITIAL_UNIFORM_CAPACITY: u64 = 64 * 1024;

/// A depth-only render destination backed by a [`GpuTexture`].
#[derive(Debug, Clone)]
pub struct GpuFramebuffer {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Color and depth views of the surface image rendered this frame.
pub struct FrameTarget {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TargetKind {
    Surface,
    Depth,
}

#[derive(Clone)]
enum PassTarget {
    Surface,
    Depth(GpuFramebuffer),
}

impl PassTarget {
    fn kind(&self) -> TargetKind {
        match self {
            PassTarget::Surface => TargetKind::Surface,
            PassTarget::Depth(_) => TargetKind::Depth,
        }
    }
}

struct RecordedDraw {
    pipeline: wgpu::RenderPipeline,
    program: ProgramId,
    /// (group, dynamic offset) of the program's uniform block.
    uniform_offset: Option<(u32, u32)>,
    texture_groups: Vec<(u32, wgpu::BindGroup)>,
    mesh: GpuMesh,
    viewport: (u32, u32),
}

struct RecordedPass {
    target: PassTarget,
    clear_color: Option<wgpu::Color>,
    clear_depth: bool,
    draws: Vec<RecordedDraw>,
}

impl RecordedPass {
    fn new(target: PassTarget) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: false,
            draws: Vec::new(),
        }
    }

    fn is_noop(&self) -> bool {
        self.draws.is_empty() && self.clear_color.is_none() && !self.clear_depth
    }
}

#[derive(Debug, Clone, Copy)]
struct UniformBinding {
    group: u32,
    binding: u32,
    size: u32,
}

/// Shader module and bind group layouts derived from a program's reflection.
struct ProgramLayout {
    module: wgpu::ShaderModule,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    uniform: Option<UniformBinding>,
}

impl ProgramLayout {
    fn new(device: &wgpu::Device, program: &ShaderProgram) -> Result<Self, String> {
        let bindings = program.bindings();
        let uniform = bindings.iter().find_map(|b| match b.kind {
            BindingKind::UniformBlock { size } => Some(UniformBinding {
                group: b.group,
                binding: b.binding,
                size,
            }),
            _ => None,
        });
        if let Some(uniform) = uniform {
            if bindings.iter().filter(|b| b.group == uniform.group).count() > 1 {
                return Err(format!(
                    "uniform block must be alone in group {}",
                    uniform.group
                ));
            }
        }

        let group_count = bindings.iter().map(|b| b.group + 1).max().unwrap_or(0);
        let group_layouts: Vec<_> = (0..group_count)
            .map(|group| {
                let entries: Vec<_> = bindings
                    .iter()
                    .filter(|b| b.group == group)
                    .map(layout_entry)
                    .collect();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}.Group{}", program.label(), group)),
                    entries: &entries,
                })
            })
            .collect();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(program.label()),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &[],
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.label()),
            source: wgpu::ShaderSource::Wgsl(program.source().into()),
        });

        Ok(Self {
            module,
            group_layouts,
            pipeline_layout,
            uniform,
        })
    }
}

fn layout_entry(binding: &ResourceBinding) -> wgpu::BindGroupLayoutEntry {
    let (ty, count) = match binding.kind {
        BindingKind::UniformBlock { size } => (
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(size as u64),
            },
            None,
        ),
        BindingKind::Texture { sample, count } => (
            wgpu::BindingType::Texture {
                sample_type: match sample {
                    TextureSample::Color => wgpu::TextureSampleType::Float { filterable: true },
                    TextureSample::Depth => wgpu::TextureSampleType::Depth,
                },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count.and_then(NonZeroU32::new),
        ),
        BindingKind::Sampler { comparison } => (
            wgpu::BindingType::Sampler(if comparison {
                wgpu::SamplerBindingType::Comparison
            } else {
                wgpu::SamplerBindingType::Filtering
            }),
            None,
        ),
    };
    wgpu::BindGroupLayoutEntry {
        binding: binding.binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty,
        count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    target: TargetKind,
    raster: RasterState,
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    size: (u32, u32),
    uniform_alignment: usize,
    linear_sampler: wgpu::Sampler,
    comparison_sampler: wgpu::Sampler,
    fallback_color: GpuTexture,
    fallback_depth: GpuTexture,
    layouts: HashMap<ProgramId, Option<ProgramLayout>>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,

    frame: Option<FrameTarget>,
    target: PassTarget,
    raster: RasterState,
    viewport: (u32, u32),
    units: Vec<Option<GpuTexture>>,
    passes: Vec<RecordedPass>,
    arena: Vec<u8>,
}

impl WgpuDevice {
    pub fn new(context: &GpuContext) -> Self {
        let device = context.device.clone();
        let queue = context.queue.clone();

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("DiffuseSampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ShadowSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let fallback_color = GpuTexture::fallback(&device, &queue, GpuTextureKind::Color);
        let fallback_depth = GpuTexture::fallback(&device, &queue, GpuTextureKind::Depth);
        let uniform_buffer = Self::create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        let size = (context.config.width, context.config.height);

        Self {
            device,
            queue,
            surface_format: context.config.format,
            size,
            uniform_alignment,
            linear_sampler,
            comparison_sampler,
            fallback_color,
            fallback_depth,
            layouts: HashMap::new(),
            pipelines: HashMap::new(),
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            frame: None,
            target: PassTarget::Surface,
            raster: RasterState::default(),
            viewport: size,
            units: vec![None; context.max_texture_units as usize],
            passes: Vec::new(),
            arena: Vec::new(),
        }
    }

    fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("UniformArena"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Starts recording a frame that ends up in `frame`.
    pub fn begin_frame(&mut self, frame: FrameTarget) {
        self.size = (frame.width, frame.height);
        self.viewport = self.size;
        self.target = PassTarget::Surface;
        self.passes.clear();
        self.arena.clear();
        self.frame = Some(frame);
    }

    /// Uploads uniforms, encodes every recorded pass and submits.
    pub fn end_frame(&mut self) {
        let Some(frame) = self.frame.take() else {
            log::warn!("end_frame called without begin_frame; dropping recorded work");
            self.passes.clear();
            return;
        };
        let passes = std::mem::take(&mut self.passes);
        self.flush_uniforms();
        let uniform_groups = self.uniform_bind_groups(&passes);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FrameEncoder"),
            });

        for pass in passes.iter().filter(|pass| !pass.is_noop()) {
            let (color_view, depth_view, size, label) = match &pass.target {
                PassTarget::Surface => (
                    Some(&frame.color),
                    &frame.depth,
                    (frame.width, frame.height),
                    "MainPass",
                ),
                PassTarget::Depth(fb) => (None, &fb.view, (fb.width, fb.height), "ShadowPass"),
            };
            let color_attachments: Vec<_> = color_view
                .map(|view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: pass
                                .clear_color
                                .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .into_iter()
                .collect();

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if pass.clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let width = draw.viewport.0.clamp(1, size.0.max(1));
                let height = draw.viewport.1.clamp(1, size.1.max(1));
                rpass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
                rpass.set_pipeline(&draw.pipeline);
                if let Some((group, offset)) = draw.uniform_offset {
                    let Some(bind_group) = uniform_groups.get(&draw.program) else {
                        continue;
                    };
                    rpass.set_bind_group(group, bind_group, &[offset]);
                }
                for (group, bind_group) in &draw.texture_groups {
                    rpass.set_bind_group(*group, bind_group, &[]);
                }
                rpass.set_vertex_buffer(0, draw.mesh.vbuf.slice(..));
                rpass.set_index_buffer(draw.mesh.ibuf.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        self.arena.clear();
    }

    /// Updates the size reported outside of a frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn flush_uniforms(&mut self) {
        if self.arena.is_empty() {
            return;
        }
        let padded = align_to(self.arena.len(), wgpu::COPY_BUFFER_ALIGNMENT as usize);
        self.arena.resize(padded, 0);

        let required = self.arena.len() as u64;
        if required > self.uniform_capacity {
            let new_capacity = required.max(self.uniform_capacity * 2).next_power_of_two();
            log::info!(
                "Growing uniform arena: {} -> {} bytes",
                self.uniform_capacity,
                new_capacity
            );
            self.uniform_buffer = Self::create_uniform_buffer(&self.device, new_capacity);
            self.uniform_capacity = new_capacity;
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &self.arena);
    }

    fn uniform_bind_groups(&self, passes: &[RecordedPass]) -> HashMap<ProgramId, wgpu::BindGroup> {
        let mut groups = HashMap::new();
        for draw in passes.iter().flat_map(|pass| &pass.draws) {
            if draw.uniform_offset.is_none() || groups.contains_key(&draw.program) {
                continue;
            }
            let Some(Some(layout)) = self.layouts.get(&draw.program) else {
                continue;
            };
            let Some(uniform) = layout.uniform else {
                continue;
            };
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("UniformArenaBindGroup"),
                layout: &layout.group_layouts[uniform.group as usize],
                entries: &[wgpu::BindGroupEntry {
                    binding: uniform.binding,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniform_buffer,
                        offset: 0,
                        size: NonZeroU64::new(uniform.size as u64),
                    }),
                }],
            });
            groups.insert(draw.program, bind_group);
        }
        groups
    }

    /// Builds the layout on first use; `false` if the program cannot be drawn.
    fn ensure_layout(&mut self, program: &ShaderProgram) -> bool {
        let device = &self.device;
        self.layouts
            .entry(program.id())
            .or_insert_with(|| match ProgramLayout::new(device, program) {
                Ok(layout) => Some(layout),
                Err(err) => {
                    log::error!("Shader `{}` cannot be drawn: {}", program.label(), err);
                    None
                }
            })
            .is_some()
    }

    fn pipeline(&mut self, program: &ShaderProgram, key: PipelineKey) -> Option<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Some(pipeline.clone());
        }
        let layout = self.layouts.get(&program.id())?.as_ref()?;
        let label = format!("{}.{:?}", program.label(), key.target);
        let shape = match key.target {
            TargetKind::Surface => PassShape::Surface(self.surface_format),
            TargetKind::Depth => PassShape::ShadowDepth,
        };
        let pipeline = PassPipeline {
            program,
            module: &layout.module,
            layout: &layout.pipeline_layout,
            shape,
            raster: key.raster,
        }
        .build(&self.device, &label)?;
        log::info!("Built pipeline {} ({:?})", label, key.raster);
        self.pipelines.insert(key, pipeline.clone());
        Some(pipeline)
    }

    fn fallback(&self, kind: GpuTextureKind) -> &wgpu::TextureView {
        match kind {
            GpuTextureKind::Color => &self.fallback_color.view,
            GpuTextureKind::Depth => &self.fallback_depth.view,
        }
    }

    /// View sampled by element `index` of the texture uniform `name`.
    fn unit_view(
        &self,
        uniforms: &UniformStore,
        name: &str,
        index: u32,
        sample: TextureSample,
        is_array: bool,
    ) -> &wgpu::TextureView {
        let wanted = match sample {
            TextureSample::Color => GpuTextureKind::Color,
            TextureSample::Depth => GpuTextureKind::Depth,
        };
        let unit = uniforms.texture_unit(name, index as usize);
        let bound = unit
            .and_then(|unit| self.units.get(unit as usize))
            .and_then(Option::as_ref);
        match bound {
            Some(texture) if texture.kind == wanted => &texture.view,
            Some(texture) => {
                // unused array slots keep their default unit, so only scalars warn
                if is_array {
                    log::trace!("`{}[{}]` points at a {:?} texture", name, index, texture.kind);
                } else {
                    log::warn!(
                        "`{}` samples a {:?} texture but unit {:?} holds {:?}; using fallback",
                        name,
                        wanted,
                        unit,
                        texture.kind
                    );
                }
                self.fallback(wanted)
            }
            None => self.fallback(wanted),
        }
    }

    fn texture_bind_groups(
        &self,
        program: &ShaderProgram,
        uniforms: &UniformStore,
    ) -> Vec<(u32, wgpu::BindGroup)> {
        let Some(Some(layout)) = self.layouts.get(&program.id()) else {
            return Vec::new();
        };
        let uniform_group = layout.uniform.map(|u| u.group);
        let mut groups = Vec::new();

        for (group, group_layout) in (0u32..).zip(&layout.group_layouts) {
            if Some(group) == uniform_group {
                continue;
            }
            let bindings: Vec<&ResourceBinding> = program
                .bindings()
                .iter()
                .filter(|b| b.group == group)
                .collect();
            // views are gathered first so the entries below can borrow them
            let views: Vec<Vec<&wgpu::TextureView>> = bindings
                .iter()
                .map(|b| match b.kind {
                    BindingKind::Texture { sample, count } => (0..count.unwrap_or(1))
                        .map(|i| self.unit_view(uniforms, &b.name, i, sample, count.is_some()))
                        .collect(),
                    _ => Vec::new(),
                })
                .collect();
            let entries: Vec<wgpu::BindGroupEntry> = bindings
                .iter()
                .zip(&views)
                .filter_map(|(b, views)| {
                    let resource = match b.kind {
                        BindingKind::Texture { count: None, .. } => {
                            wgpu::BindingResource::TextureView(views[0])
                        }
                        BindingKind::Texture { count: Some(_), .. } => {
                            wgpu::BindingResource::TextureViewArray(views)
                        }
                        BindingKind::Sampler { comparison: true } => {
                            wgpu::BindingResource::Sampler(&self.comparison_sampler)
                        }
                        BindingKind::Sampler { comparison: false } => {
                            wgpu::BindingResource::Sampler(&self.linear_sampler)
                        }
                        BindingKind::UniformBlock { .. } => return None,
                    };
                    Some(wgpu::BindGroupEntry {
                        binding: b.binding,
                        resource,
                    })
                })
                .collect();

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("TextureUnitsBindGroup"),
                layout: group_layout,
                entries: &entries,
            });
            groups.push((group, bind_group));
        }
        groups
    }

    fn current_pass(&mut self) -> &mut RecordedPass {
        if self.passes.is_empty() {
            self.passes.push(RecordedPass::new(self.target.clone()));
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }
}

impl RenderDevice for WgpuDevice {
    type Mesh = GpuMesh;
    type Texture = GpuTexture;
    type Framebuffer = GpuFramebuffer;

    fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> GpuMesh {
        GpuMesh::from_vertices(&self.device, vertices, indices)
    }

    fn create_texture_rgba8(&mut self, width: u32, height: u32, texels: &[u8]) -> GpuTexture {
        GpuTexture::from_rgba8(&self.device, &self.queue, "DiffuseTexture", width, height, texels)
    }

    fn create_depth_texture(&mut self, width: u32, height: u32) -> GpuTexture {
        GpuTexture::depth(&self.device, "ShadowMap", width, height)
    }

    fn create_depth_framebuffer(&mut self, depth: &GpuTexture) -> Result<GpuFramebuffer, PipelineError> {
        if depth.kind != GpuTextureKind::Depth {
            return Err(PipelineError::IncompleteFramebuffer(
                "attachment is not a depth texture".into(),
            ));
        }
        if depth.width == 0 || depth.height == 0 {
            return Err(PipelineError::IncompleteFramebuffer(format!(
                "attachment is {}x{}",
                depth.width, depth.height
            )));
        }
        Ok(GpuFramebuffer {
            view: depth.view.clone(),
            width: depth.width,
            height: depth.height,
        })
    }

    fn bind_framebuffer(&mut self, target: Option<&GpuFramebuffer>) {
        self.target = target.map_or(PassTarget::Surface, |fb| PassTarget::Depth(fb.clone()));
        self.passes.push(RecordedPass::new(self.target.clone()));
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        if self.passes.last().is_some_and(|pass| !pass.draws.is_empty()) {
            self.passes.push(RecordedPass::new(self.target.clone()));
        }
        let pass = self.current_pass();
        if flags.contains(ClearFlags::COLOR) && pass.target.kind() == TargetKind::Surface {
            pass.clear_color = Some(wgpu::Color {
                r: color[0] as f64,
                g: color[1] as f64,
                b: color[2] as f64,
                a: color[3] as f64,
            });
        }
        if flags.contains(ClearFlags::DEPTH) {
            pass.clear_depth = true;
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_raster_state(&mut self, state: RasterState) {
        self.raster = state;
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&GpuTexture>) {
        let available = self.units.len();
        let slot = self
            .units
            .get_mut(unit as usize)
            .unwrap_or_else(|| panic!("texture unit {unit} out of range ({available} available)"));
        *slot = texture.cloned();
    }

    fn draw(&mut self, program: &ShaderProgram, uniforms: &UniformStore, mesh: &GpuMesh) {
        let key = PipelineKey {
            program: program.id(),
            target: self.target.kind(),
            raster: self.raster,
        };
        if key.target == TargetKind::Surface && program.fragment_entry().is_none() {
            log::debug!("Skipping vertex-only `{}` on the surface", program.label());
            return;
        }
        if !self.ensure_layout(program) {
            return;
        }
        let Some(pipeline) = self.pipeline(program, key) else {
            return;
        };

        let uniform_group = self
            .layouts
            .get(&program.id())
            .and_then(Option::as_ref)
            .and_then(|layout| layout.uniform)
            .map(|u| u.group);
        let uniform_offset = uniform_group.map(|group| {
            let size = program.schema().block_size() as usize;
            let offset = align_to(self.arena.len(), self.uniform_alignment);
            self.arena.resize(offset + size, 0);
            uniforms.write_block(program.schema(), &mut self.arena[offset..offset + size]);
            (group, offset as u32)
        });
        let texture_groups = self.texture_bind_groups(program, uniforms);
        let viewport = self.viewport;

        self.current_pass().draws.push(RecordedDraw {
            pipeline,
            program: program.id(),
            uniform_offset,
            texture_groups,
            mesh: mesh.clone(),
            viewport,
        });
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn max_texture_units(&self) -> u32 {
        self.units.len() as u32
    }
}
