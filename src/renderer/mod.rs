pub mod device;
pub mod headless;
pub mod internal;
pub mod mesh;
pub mod pipeline_builder;
pub mod primitives;
pub mod shader;
pub mod texture;
pub mod uniforms;
pub mod vertex;

pub use device::{ClearFlags, RasterState, RenderDevice};
pub use headless::HeadlessDevice;
pub use internal::{FrameTarget, GpuContext, WgpuDevice};
pub use primitives::{cube_mesh, plane_mesh};
pub use shader::{ShaderError, ShaderProgram};
pub use uniforms::{UniformSchema, UniformStore, UniformValue};
pub use vertex::Vertex;
