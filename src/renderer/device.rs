// renderer/device.rs
//! The immediate-mode graphics seam the shadow pipeline is written against.
//!
//! State set through a [`RenderDevice`] (bound target, raster state, texture
//! units) persists until changed, the same way a single graphics context
//! would behave. Commands execute in submission order.

use std::path::Path;

use bitflags::bitflags;

use crate::error::PipelineError;
use crate::io;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::uniforms::UniformStore;
use crate::renderer::vertex::Vertex;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub depth_test: bool,
    pub cull_back_faces: bool,
}

impl RasterState {
    /// Depth-only shadow rendering keeps back faces of thin casters.
    pub const SHADOW: Self = Self {
        depth_test: true,
        cull_back_faces: false,
    };

    pub const MAIN: Self = Self {
        depth_test: true,
        cull_back_faces: true,
    };
}

impl Default for RasterState {
    fn default() -> Self {
        Self::MAIN
    }
}

pub trait RenderDevice {
    /// Vertex + index buffers and an index count.
    type Mesh;
    /// A 2D texture that can be bound to a sampling unit.
    type Texture;
    /// A depth-only render destination.
    type Framebuffer;

    fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> Self::Mesh;

    /// Creates an sRGB color texture from tightly packed RGBA8 texels.
    fn create_texture_rgba8(&mut self, width: u32, height: u32, texels: &[u8]) -> Self::Texture;

    fn create_depth_texture(&mut self, width: u32, height: u32) -> Self::Texture;

    /// Wraps `depth` as a depth-only framebuffer. Fails when the attachment
    /// could never be complete (zero size, not a depth texture).
    fn create_depth_framebuffer(
        &mut self,
        depth: &Self::Texture,
    ) -> Result<Self::Framebuffer, PipelineError>;

    /// `None` selects the default output surface.
    fn bind_framebuffer(&mut self, target: Option<&Self::Framebuffer>);

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);

    fn set_viewport(&mut self, width: u32, height: u32);

    fn set_raster_state(&mut self, state: RasterState);

    /// `None` binds "no texture"; sampling it yields zero.
    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>);

    /// Draws `mesh` with `program`, using `uniforms` and the currently bound
    /// texture units for every sampler the program declares.
    fn draw(&mut self, program: &ShaderProgram, uniforms: &UniformStore, mesh: &Self::Mesh);

    /// Size of the default output surface.
    fn framebuffer_size(&self) -> (u32, u32);

    fn max_texture_units(&self) -> u32;

    /// Decodes an image file into a color texture.
    fn load_texture(&mut self, path: &Path) -> Result<Self::Texture, PipelineError> {
        let bytes = io::load_binary(path)?;
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Loaded texture {:?} ({}x{})", path, width, height);
        Ok(self.create_texture_rgba8(width, height, rgba.as_raw()))
    }
}
