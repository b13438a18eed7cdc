mod backend;
mod context;

pub use backend::{FrameTarget, GpuFramebuffer, WgpuDevice};
pub use context::GpuContext;
