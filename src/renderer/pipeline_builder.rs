// src/renderer/pipeline_builder.rs

//! Translation from a program plus [`RasterState`] into a wgpu render
//! pipeline for one of the two pass shapes the renderer draws.

use crate::renderer::device::RasterState;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::texture::DEPTH_FORMAT;
use crate::renderer::vertex::Vertex;

/// Slope-scaled bias applied while rendering shadow maps.
pub const SHADOW_DEPTH_BIAS: wgpu::DepthBiasState = wgpu::DepthBiasState {
    constant: 2,
    slope_scale: 2.0,
    clamp: 0.0,
};

/// The destination a pipeline is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassShape {
    /// Color plus depth, shaded by the program's fragment stage.
    Surface(wgpu::TextureFormat),
    /// Depth only with [`SHADOW_DEPTH_BIAS`]; the fragment stage is dropped.
    ShadowDepth,
}

pub fn primitive_state(raster: RasterState) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: raster.cull_back_faces.then_some(wgpu::Face::Back),
        polygon_mode: wgpu::PolygonMode::Fill,
        ..Default::default()
    }
}

pub fn depth_state(raster: RasterState, shape: PassShape) -> wgpu::DepthStencilState {
    let (depth_write_enabled, depth_compare) = if raster.depth_test {
        (true, wgpu::CompareFunction::Less)
    } else {
        (false, wgpu::CompareFunction::Always)
    };
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare,
        stencil: wgpu::StencilState::default(),
        bias: match shape {
            PassShape::Surface(_) => wgpu::DepthBiasState::default(),
            PassShape::ShadowDepth => SHADOW_DEPTH_BIAS,
        },
    }
}

/// Everything needed to compile one program for one pass shape.
pub struct PassPipeline<'a> {
    pub program: &'a ShaderProgram,
    pub module: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
    pub shape: PassShape,
    pub raster: RasterState,
}

impl PassPipeline<'_> {
    /// Returns `None` when a surface pass is requested for a program without
    /// a fragment stage.
    pub fn build(&self, device: &wgpu::Device, label: &str) -> Option<wgpu::RenderPipeline> {
        let color_targets = match self.shape {
            PassShape::Surface(format) => vec![Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            PassShape::ShadowDepth => Vec::new(),
        };
        let fragment_entry = match self.shape {
            PassShape::Surface(_) => Some(self.program.fragment_entry()?),
            PassShape::ShadowDepth => None,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.module,
                entry_point: Some(self.program.vertex_entry()),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: fragment_entry.map(|entry| wgpu::FragmentState {
                module: self.module,
                entry_point: Some(entry),
                targets: &color_targets,
                compilation_options: Default::default(),
            }),
            primitive: primitive_state(self.raster),
            depth_stencil: Some(depth_state(self.raster, self.shape)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        Some(pipeline)
    }
}
