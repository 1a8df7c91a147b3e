//! The GPU boundary.
//!
//! Everything below this module is a synchronous native graphics call. The
//! runtime only ever talks to the driver through the narrow [`Device`] trait,
//! which keeps the buffer/shader/drawable core independent of how the GL
//! function pointers were loaded, and makes it testable without a GPU.
//!
//! [`GlowDevice`] is the production implementation over a [`glow::Context`];
//! [`trace::TraceDevice`] is a headless implementation that records the call
//! stream.

mod glow_device;
pub mod trace;

use std::num::NonZeroU32;

use crate::errors::Result;

pub use glow_device::GlowDevice;

/// Native vertex buffer object name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferId(pub NonZeroU32);

/// Native vertex array object name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VertexArrayId(pub NonZeroU32);

/// Native shader object name (one compilation stage).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ShaderObjectId(pub NonZeroU32);

/// Native linked program name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramId(pub NonZeroU32);

/// Resolved uniform location within a linked program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UniformLocation(pub u32);

/// Shader compilation stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

/// Buffer binding target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferTarget {
    /// Vertex data (`GL_ARRAY_BUFFER`).
    Array,
    /// Index data (`GL_ELEMENT_ARRAY_BUFFER`).
    ElementArray,
}

/// Expected buffer update frequency, passed to the driver as an allocation
/// hint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

/// Primitive topology for draw calls. The runtime never picks one itself;
/// the choice belongs to each drawable's render hook.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Component type of a vertex attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AttribType {
    F32,
    U8,
}

/// The set of GL entry points the runtime uses.
///
/// All methods assume the device's context is current on the calling thread;
/// uniform setters additionally assume the owning program is in use. Both are
/// maintained by the layers above ([`crate::render::Context`],
/// [`crate::render::Shader`]).
pub trait Device {
    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    /// Whether vertex array objects are available.
    fn has_vertex_arrays(&self) -> bool;

    /// Whether the geometry shader stage is available.
    fn has_geometry_shaders(&self) -> bool;

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    fn create_buffer(&self) -> Result<BufferId>;
    fn delete_buffer(&self, buffer: BufferId);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>);
    /// Allocates (or reallocates) the bound buffer's data store.
    fn buffer_data(&self, target: BufferTarget, size: usize, usage: BufferUsage);
    /// Uploads `data` into the bound buffer at byte `offset`.
    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]);

    // ------------------------------------------------------------------
    // Vertex arrays / attribute pointers
    // ------------------------------------------------------------------

    fn create_vertex_array(&self) -> Result<VertexArrayId>;
    fn delete_vertex_array(&self, array: VertexArrayId);
    fn bind_vertex_array(&self, array: Option<VertexArrayId>);
    fn enable_vertex_attrib(&self, index: u32);
    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        kind: AttribType,
        normalized: bool,
        stride: i32,
        offset: i32,
    );

    // ------------------------------------------------------------------
    // Shaders and programs
    // ------------------------------------------------------------------

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderObjectId>;
    fn delete_shader(&self, shader: ShaderObjectId);
    /// Compiles `source` into `shader`. On failure the error is the native
    /// compiler log.
    fn compile_shader(&self, shader: ShaderObjectId, source: &str) -> Result<(), String>;

    fn create_program(&self) -> Result<ProgramId>;
    fn delete_program(&self, program: ProgramId);
    fn attach_shader(&self, program: ProgramId, shader: ShaderObjectId);
    fn detach_shader(&self, program: ProgramId, shader: ShaderObjectId);
    fn bind_attrib_location(&self, program: ProgramId, index: u32, name: &str);
    fn bind_frag_data_location(&self, program: ProgramId, color: u32, name: &str);
    /// Links `program`. On failure the error is the native linker log.
    fn link_program(&self, program: ProgramId) -> Result<(), String>;
    fn use_program(&self, program: Option<ProgramId>);
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    // ------------------------------------------------------------------
    // Uniforms (the owning program must be in use)
    // ------------------------------------------------------------------

    fn set_uniform_matrix4(&self, location: UniformLocation, values: &[f32; 16]);
    fn set_uniform_i32(&self, location: UniformLocation, value: i32);
    fn set_uniform_f32(&self, location: UniformLocation, value: f32);
    fn set_uniform_vec2(&self, location: UniformLocation, value: [f32; 2]);
    fn set_uniform_vec3(&self, location: UniformLocation, value: [f32; 3]);
    fn set_uniform_vec4(&self, location: UniformLocation, value: [f32; 4]);

    // ------------------------------------------------------------------
    // Draw commands
    // ------------------------------------------------------------------

    fn draw_arrays(&self, mode: Primitive, first: usize, count: usize);
    /// Draws `count` `u32` indices of the bound element buffer, starting at
    /// the `first_index`-th element.
    fn draw_elements(&self, mode: Primitive, count: usize, first_index: usize);
}
