//! The rendering core: contexts, GPU buffers and their slices, shaders, and
//! drawables.

pub mod buffer;
pub mod buffer_slice;
pub mod context;
pub mod drawable;
pub mod index_buffer;
pub mod kinds;
pub mod shader;
pub mod vertex;

pub use buffer::Buffer;
pub use buffer_slice::BufferSlice;
pub use context::Context;
pub use drawable::{Drawable, DrawableSource, RenderArgs};
pub use index_buffer::{IndexBuffer, IndexBufferSlice};
pub use shader::{Shader, UniformId};
pub use vertex::{Color, Vertex, VertexLayout, VertexLayoutId};
