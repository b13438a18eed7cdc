// renderer/headless.rs
//! A [`RenderDevice`] that records commands instead of talking to a GPU.
//!
//! Every call is appended to an inspectable log, and draws capture the full
//! uniform store plus the texture-unit table at the moment they were issued.

use std::collections::{HashMap, HashSet};

use crate::error::PipelineError;
use crate::renderer::device::{ClearFlags, RasterState, RenderDevice};
use crate::renderer::shader::{ProgramId, ShaderProgram};
use crate::renderer::uniforms::UniformStore;
use crate::renderer::vertex::Vertex;

/// Texture units exposed unless configured otherwise.
pub const DEFAULT_TEXTURE_UNITS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Color,
    Depth,
}

#[derive(Debug)]
pub struct HeadlessMesh {
    pub id: ResourceId,
    pub vertex_count: u32,
    pub index_count: u32,
}

#[derive(Debug)]
pub struct HeadlessTexture {
    pub id: ResourceId,
    pub width: u32,
    pub height: u32,
    pub kind: TextureKind,
}

#[derive(Debug)]
pub struct HeadlessFramebuffer {
    pub id: ResourceId,
    pub depth: ResourceId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Default,
    Framebuffer(ResourceId),
}

#[derive(Debug, Clone)]
pub struct DrawCall {
    pub target: Target,
    pub program: ProgramId,
    pub program_label: String,
    pub mesh: ResourceId,
    pub uniforms: UniformStore,
    /// Binding of every texture unit when the draw was issued.
    pub texture_units: Vec<Option<ResourceId>>,
    pub raster: RasterState,
    pub viewport: (u32, u32),
}

#[derive(Debug, Clone)]
pub enum Command {
    BindTarget(Target),
    Clear(ClearFlags),
    Viewport { width: u32, height: u32 },
    Raster(RasterState),
    BindTexture { unit: u32, texture: Option<ResourceId> },
    Draw(DrawCall),
}

#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: u32,
    size: (u32, u32),
    units: Vec<Option<ResourceId>>,
    target: Target,
    raster: RasterState,
    viewport: (u32, u32),
    framebuffer_depth: HashMap<ResourceId, ResourceId>,
    written: HashSet<ResourceId>,
    commands: Vec<Command>,
}

impl HeadlessDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_texture_units(width, height, DEFAULT_TEXTURE_UNITS)
    }

    pub fn with_texture_units(width: u32, height: u32, units: u32) -> Self {
        Self {
            next_id: 1,
            size: (width, height),
            units: vec![None; units as usize],
            target: Target::Default,
            raster: RasterState::default(),
            viewport: (width, height),
            framebuffer_depth: HashMap::new(),
            written: HashSet::new(),
            commands: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// Empties the command log, keeping bound state and the written set.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Current binding of `unit`.
    pub fn texture_unit(&self, unit: u32) -> Option<ResourceId> {
        self.units.get(unit as usize).copied().flatten()
    }

    /// Whether any draw has rendered into `texture` through a framebuffer.
    pub fn was_written(&self, texture: &HeadlessTexture) -> bool {
        self.written.contains(&texture.id)
    }

    fn allocate(&mut self) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl RenderDevice for HeadlessDevice {
    type Mesh = HeadlessMesh;
    type Texture = HeadlessTexture;
    type Framebuffer = HeadlessFramebuffer;

    fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> HeadlessMesh {
        HeadlessMesh {
            id: self.allocate(),
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
        }
    }

    fn create_texture_rgba8(&mut self, width: u32, height: u32, texels: &[u8]) -> HeadlessTexture {
        debug_assert_eq!(texels.len(), (width * height * 4) as usize);
        HeadlessTexture {
            id: self.allocate(),
            width,
            height,
            kind: TextureKind::Color,
        }
    }

    fn create_depth_texture(&mut self, width: u32, height: u32) -> HeadlessTexture {
        HeadlessTexture {
            id: self.allocate(),
            width,
            height,
            kind: TextureKind::Depth,
        }
    }

    fn create_depth_framebuffer(
        &mut self,
        depth: &HeadlessTexture,
    ) -> Result<HeadlessFramebuffer, PipelineError> {
        if depth.kind != TextureKind::Depth {
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
        let id = self.allocate();
        self.framebuffer_depth.insert(id, depth.id);
        Ok(HeadlessFramebuffer {
            id,
            depth: depth.id,
            width: depth.width,
            height: depth.height,
        })
    }

    fn bind_framebuffer(&mut self, target: Option<&HeadlessFramebuffer>) {
        self.target = target.map_or(Target::Default, |fb| Target::Framebuffer(fb.id));
        self.commands.push(Command::BindTarget(self.target));
    }

    fn clear(&mut self, flags: ClearFlags, _color: [f32; 4]) {
        self.commands.push(Command::Clear(flags));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.commands.push(Command::Viewport { width, height });
    }

    fn set_raster_state(&mut self, state: RasterState) {
        self.raster = state;
        self.commands.push(Command::Raster(state));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&HeadlessTexture>) {
        let available = self.units.len();
        let slot = self
            .units
            .get_mut(unit as usize)
            .unwrap_or_else(|| panic!("texture unit {unit} out of range ({available} available)"));
        *slot = texture.map(|t| t.id);
        self.commands.push(Command::BindTexture {
            unit,
            texture: *slot,
        });
    }

    fn draw(&mut self, program: &ShaderProgram, uniforms: &UniformStore, mesh: &HeadlessMesh) {
        if let Target::Framebuffer(fb) = self.target {
            if let Some(depth) = self.framebuffer_depth.get(&fb) {
                self.written.insert(*depth);
            }
        }
        self.commands.push(Command::Draw(DrawCall {
            target: self.target,
            program: program.id(),
            program_label: program.label().to_string(),
            mesh: mesh.id,
            uniforms: uniforms.clone(),
            texture_units: self.units.clone(),
            raster: self.raster,
            viewport: self.viewport,
        }));
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn max_texture_units(&self) -> u32 {
        self.units.len() as u32
    }
}
