//! Vitrail, a 2D rendering runtime layered atop OpenGL.
//!
//! The crate manages three things for drawable graphical entities:
//!
//! - **GPU buffer allocation**: many small drawables are packed as relocatable
//!   slices inside a few shared, growable vertex/index buffers
//!   ([`render::BufferSlice`], [`render::IndexBufferSlice`]).
//! - **Shader program lifecycle**: compile/link with captured native logs,
//!   cached uniform locations for the hot path, and deduplicated `use program`
//!   calls ([`render::Shader`]).
//! - **Per-object render state**: transform and geometry dirtiness are tracked
//!   independently so a [`render::Drawable`] only recomputes its matrix or
//!   re-uploads its vertices when something actually changed.
//!
//! Window and surface creation are external collaborators: the embedder
//! installs a [`render::ContextProvider`] (or wraps an existing native context
//! with [`render::Context::from_parts`]) and the runtime calls
//! [`render::Context::ensure`] defensively before any GPU operation. All raw
//! GL calls go through the [`gl::Device`] seam; [`gl::GlowDevice`] forwards to
//! a real [`glow::Context`], while [`gl::trace::TraceDevice`] records the call
//! stream for headless tests and diagnostics.

pub mod errors;
pub mod gl;
pub mod math;
pub mod render;

pub use errors::{Result, VitrailError, last_error};
pub use math::Matrix;
pub use render::context::{
    Context, ContextBackend, ContextId, ContextProvider, HeadlessBackend, clear_context_provider,
    set_context_provider,
};
pub use render::drawable::{Drawable, DrawableSource, RenderArgs};
pub use render::kinds::Polygon;
pub use render::shader::{Shader, UniformId, enable_modern_glsl, force_legacy_glsl};
pub use render::vertex::{
    AttributeKind, Color, Vertex, VertexLayout, VertexLayoutId, default_vertex_layout,
};
pub use render::{Buffer, BufferSlice, IndexBuffer, IndexBufferSlice};
