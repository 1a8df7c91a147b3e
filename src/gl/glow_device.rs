use glow::HasContext;

use crate::errors::{Result, VitrailError};

use super::{
    AttribType, BufferId, BufferTarget, BufferUsage, Device, Primitive, ProgramId, ShaderObjectId,
    ShaderStage, UniformLocation, VertexArrayId,
};

/// [`Device`] implementation forwarding to a loaded [`glow::Context`].
///
/// The embedder is responsible for loading the context (e.g. with
/// `glow::Context::from_loader_function`) against a native GL context that is
/// current on the rendering thread, and for keeping that context current
/// whenever the runtime is used. Only desktop GL targets are supported; the
/// capability probe assumes a non-embedded profile.
pub struct GlowDevice {
    gl: glow::Context,
    vertex_arrays: bool,
    geometry_shaders: bool,
}

impl GlowDevice {
    /// Wraps a loaded context, probing capabilities once.
    #[must_use]
    pub fn new(gl: glow::Context) -> Self {
        let version = gl.version();
        let vertex_arrays = version.major >= 3
            || gl
                .supported_extensions()
                .contains("GL_ARB_vertex_array_object");
        let geometry_shaders = version.major > 3
            || (version.major == 3 && version.minor >= 2)
            || gl
                .supported_extensions()
                .contains("GL_ARB_geometry_shader4");
        log::debug!(
            "GL device: version {}.{}, vaos: {vertex_arrays}, geometry shaders: {geometry_shaders}",
            version.major,
            version.minor
        );
        Self {
            gl,
            vertex_arrays,
            geometry_shaders,
        }
    }

    /// The underlying glow context, for embedder-side rendering (clears,
    /// viewport, texture work) outside this runtime's scope.
    #[must_use]
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn target_of(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn usage_of(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        BufferUsage::Stream => glow::STREAM_DRAW,
    }
}

fn mode_of(mode: Primitive) -> u32 {
    match mode {
        Primitive::Points => glow::POINTS,
        Primitive::Lines => glow::LINES,
        Primitive::LineStrip => glow::LINE_STRIP,
        Primitive::LineLoop => glow::LINE_LOOP,
        Primitive::Triangles => glow::TRIANGLES,
        Primitive::TriangleStrip => glow::TRIANGLE_STRIP,
        Primitive::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn backend(err: String) -> VitrailError {
    VitrailError::Backend(err)
}

impl Device for GlowDevice {
    fn has_vertex_arrays(&self) -> bool {
        self.vertex_arrays
    }

    fn has_geometry_shaders(&self) -> bool {
        self.geometry_shaders
    }

    fn create_buffer(&self) -> Result<BufferId> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(backend)?;
        Ok(BufferId(buffer.0))
    }

    fn delete_buffer(&self, buffer: BufferId) {
        unsafe { self.gl.delete_buffer(glow::NativeBuffer(buffer.0)) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>) {
        unsafe {
            self.gl
                .bind_buffer(target_of(target), buffer.map(|b| glow::NativeBuffer(b.0)));
        }
    }

    fn buffer_data(&self, target: BufferTarget, size: usize, usage: BufferUsage) {
        unsafe {
            self.gl
                .buffer_data_size(target_of(target), size as i32, usage_of(usage));
        }
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(target_of(target), offset as i32, data);
        }
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId> {
        let array = unsafe { self.gl.create_vertex_array() }.map_err(backend)?;
        Ok(VertexArrayId(array.0))
    }

    fn delete_vertex_array(&self, array: VertexArrayId) {
        unsafe { self.gl.delete_vertex_array(glow::NativeVertexArray(array.0)) }
    }

    fn bind_vertex_array(&self, array: Option<VertexArrayId>) {
        unsafe {
            self.gl
                .bind_vertex_array(array.map(|a| glow::NativeVertexArray(a.0)));
        }
    }

    fn enable_vertex_attrib(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        kind: AttribType,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        let data_type = match kind {
            AttribType::F32 => glow::FLOAT,
            AttribType::U8 => glow::UNSIGNED_BYTE,
        };
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, data_type, normalized, stride, offset);
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderObjectId> {
        let stage = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
            ShaderStage::Geometry => glow::GEOMETRY_SHADER,
        };
        let shader = unsafe { self.gl.create_shader(stage) }.map_err(backend)?;
        Ok(ShaderObjectId(shader.0))
    }

    fn delete_shader(&self, shader: ShaderObjectId) {
        unsafe { self.gl.delete_shader(glow::NativeShader(shader.0)) }
    }

    fn compile_shader(&self, shader: ShaderObjectId, source: &str) -> Result<(), String> {
        let shader = glow::NativeShader(shader.0);
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(shader))
            }
        }
    }

    fn create_program(&self) -> Result<ProgramId> {
        let program = unsafe { self.gl.create_program() }.map_err(backend)?;
        Ok(ProgramId(program.0))
    }

    fn delete_program(&self, program: ProgramId) {
        unsafe { self.gl.delete_program(glow::NativeProgram(program.0)) }
    }

    fn attach_shader(&self, program: ProgramId, shader: ShaderObjectId) {
        unsafe {
            self.gl
                .attach_shader(glow::NativeProgram(program.0), glow::NativeShader(shader.0));
        }
    }

    fn detach_shader(&self, program: ProgramId, shader: ShaderObjectId) {
        unsafe {
            self.gl
                .detach_shader(glow::NativeProgram(program.0), glow::NativeShader(shader.0));
        }
    }

    fn bind_attrib_location(&self, program: ProgramId, index: u32, name: &str) {
        unsafe {
            self.gl
                .bind_attrib_location(glow::NativeProgram(program.0), index, name);
        }
    }

    fn bind_frag_data_location(&self, program: ProgramId, color: u32, name: &str) {
        unsafe {
            self.gl
                .bind_frag_data_location(glow::NativeProgram(program.0), color, name);
        }
    }

    fn link_program(&self, program: ProgramId) -> Result<(), String> {
        let program = glow::NativeProgram(program.0);
        unsafe {
            self.gl.link_program(program);
            if self.gl.get_program_link_status(program) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(program))
            }
        }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        unsafe {
            self.gl
                .use_program(program.map(|p| glow::NativeProgram(p.0)));
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let location =
            unsafe { self.gl.get_uniform_location(glow::NativeProgram(program.0), name) };
        location.map(|l| UniformLocation(l.0))
    }

    fn set_uniform_matrix4(&self, location: UniformLocation, values: &[f32; 16]) {
        unsafe {
            self.gl.uniform_matrix_4_f32_slice(
                Some(&glow::NativeUniformLocation(location.0)),
                false,
                values,
            );
        }
    }

    fn set_uniform_i32(&self, location: UniformLocation, value: i32) {
        unsafe {
            self.gl
                .uniform_1_i32(Some(&glow::NativeUniformLocation(location.0)), value);
        }
    }

    fn set_uniform_f32(&self, location: UniformLocation, value: f32) {
        unsafe {
            self.gl
                .uniform_1_f32(Some(&glow::NativeUniformLocation(location.0)), value);
        }
    }

    fn set_uniform_vec2(&self, location: UniformLocation, value: [f32; 2]) {
        unsafe {
            self.gl.uniform_2_f32(
                Some(&glow::NativeUniformLocation(location.0)),
                value[0],
                value[1],
            );
        }
    }

    fn set_uniform_vec3(&self, location: UniformLocation, value: [f32; 3]) {
        unsafe {
            self.gl.uniform_3_f32(
                Some(&glow::NativeUniformLocation(location.0)),
                value[0],
                value[1],
                value[2],
            );
        }
    }

    fn set_uniform_vec4(&self, location: UniformLocation, value: [f32; 4]) {
        unsafe {
            self.gl.uniform_4_f32(
                Some(&glow::NativeUniformLocation(location.0)),
                value[0],
                value[1],
                value[2],
                value[3],
            );
        }
    }

    fn draw_arrays(&self, mode: Primitive, first: usize, count: usize) {
        unsafe {
            self.gl.draw_arrays(mode_of(mode), first as i32, count as i32);
        }
    }

    fn draw_elements(&self, mode: Primitive, count: usize, first_index: usize) {
        let offset = (first_index * std::mem::size_of::<u32>()) as i32;
        unsafe {
            self.gl
                .draw_elements(mode_of(mode), count as i32, glow::UNSIGNED_INT, offset);
        }
    }
}
