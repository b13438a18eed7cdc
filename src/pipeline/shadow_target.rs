use crate::error::PipelineError;
use crate::renderer::device::RenderDevice;

/// Depth-only framebuffer and the depth texture it renders into, owned by one
/// shadow-casting light.
pub struct ShadowTarget<D: RenderDevice> {
    framebuffer: D::Framebuffer,
    depth: D::Texture,
    width: u32,
    height: u32,
}

impl<D: RenderDevice> ShadowTarget<D> {
    /// Fails if the framebuffer cannot be complete, e.g. for a zero size.
    pub fn new(device: &mut D, width: u32, height: u32) -> Result<Self, PipelineError> {
        let depth = device.create_depth_texture(width, height);
        let framebuffer = device.create_depth_framebuffer(&depth)?;
        log::info!("Created {}x{} shadow target", width, height);
        Ok(Self {
            framebuffer,
            depth,
            width,
            height,
        })
    }

    /// Makes this target the render destination until [`Self::unbind`].
    pub fn bind(&self, device: &mut D) {
        device.bind_framebuffer(Some(&self.framebuffer));
    }

    pub fn unbind(&self, device: &mut D) {
        device.bind_framebuffer(None);
    }

    pub fn depth_texture(&self) -> &D::Texture {
        &self.depth
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
