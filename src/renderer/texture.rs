// renderer/texture.rs (mip chain built on the CPU)

use image::{imageops, RgbaImage};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Shadow maps and the surface depth buffer share this format, since
/// pipelines are keyed by target kind rather than format.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuTextureKind {
    Color,
    Depth,
}

/// A sampled 2D texture. wgpu handles are reference counted, so clones share
/// the same GPU resource.
#[derive(Debug, Clone)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub kind: GpuTextureKind,
    /// Requested size; the allocation is never smaller than 1x1.
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    /// Calculate the number of mip levels for a given texture size
    fn calculate_mip_levels(width: u32, height: u32) -> u32 {
        let max_dimension = width.max(height).max(1);
        u32::BITS - max_dimension.leading_zeros()
    }

    /// Uploads RGBA8 texels and a full mip chain.
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> Self {
        let base = match RgbaImage::from_raw(width.max(1), height.max(1), texels.to_vec()) {
            Some(image) => image,
            None => {
                log::warn!(
                    "Texture {}: {} bytes do not fill {}x{} RGBA8, uploading black",
                    label,
                    texels.len(),
                    width,
                    height
                );
                RgbaImage::new(width.max(1), height.max(1))
            }
        };

        let mip_level_count = Self::calculate_mip_levels(base.width(), base.height());
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: base.width(),
                height: base.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut level = base;
        for mip in 0..mip_level_count {
            if mip > 0 {
                let (w, h) = ((level.width() / 2).max(1), (level.height() / 2).max(1));
                level = imageops::resize(&level, w, h, imageops::FilterType::Triangle);
            }
            Self::write_level(queue, &texture, mip, &level);
        }

        log::info!(
            "Created texture {} ({}x{}, {} mips)",
            label,
            width,
            height,
            mip_level_count
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            kind: GpuTextureKind::Color,
            width,
            height,
        }
    }

    fn write_level(queue: &wgpu::Queue, texture: &wgpu::Texture, mip: u32, image: &RgbaImage) {
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );
    }

    /// Depth texture usable both as a render attachment and a comparison
    /// sampling input.
    pub fn depth(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            format: Some(DEPTH_FORMAT),
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        Self {
            texture,
            view,
            kind: GpuTextureKind::Depth,
            width,
            height,
        }
    }

    /// 1x1 all-zero texture bound wherever a unit holds no texture.
    pub fn fallback(device: &wgpu::Device, queue: &wgpu::Queue, kind: GpuTextureKind) -> Self {
        match kind {
            GpuTextureKind::Color => Self::from_rgba8(device, queue, "FallbackColor", 1, 1, &[0; 4]),
            // new textures are zero-initialised
            GpuTextureKind::Depth => Self::depth(device, "FallbackDepth", 1, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_cover_the_largest_side() {
        assert_eq!(GpuTexture::calculate_mip_levels(1, 1), 1);
        assert_eq!(GpuTexture::calculate_mip_levels(256, 256), 9);
        assert_eq!(GpuTexture::calculate_mip_levels(512, 3), 10);
        assert_eq!(GpuTexture::calculate_mip_levels(0, 0), 1);
    }

    #[test]
    fn depth_format_is_sampleable_with_comparison() {
        assert!(DEPTH_FORMAT.is_depth_stencil_format());
        assert!(DEPTH_FORMAT.has_depth_aspect());
        assert!(!COLOR_FORMAT.is_depth_stencil_format());
    }
}
