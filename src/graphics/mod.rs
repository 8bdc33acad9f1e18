mod image;
mod framebuffer;
mod scissor;

mod shader;
mod rasterizer;

pub use image::*;
pub use framebuffer::*;
pub use scissor::*;

pub use shader::*;
pub use rasterizer::*;
