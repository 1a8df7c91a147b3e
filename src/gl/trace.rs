//! Headless recording device.
//!
//! [`TraceDevice`] implements [`Device`] without touching a GPU: it allocates
//! fake object names and appends every call to an inspectable log. Freed
//! names are reissued to later creations, the way a real driver recycles
//! them, so stale-handle caching bugs surface here too. The test suite runs
//! the whole pipeline against it; it is also handy for diagnosing redundant
//! state changes in an embedder (bind churn shows up directly in the call
//! stream).

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::errors::Result;

use super::{
    AttribType, BufferId, BufferTarget, BufferUsage, Device, Primitive, ProgramId, ShaderObjectId,
    ShaderStage, UniformLocation, VertexArrayId,
};

/// One recorded device call. Arguments are kept only where tests need to
/// assert on them.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateBuffer(u32),
    DeleteBuffer(u32),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<u32>,
    },
    BufferData {
        target: BufferTarget,
        size: usize,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    CreateVertexArray(u32),
    BindVertexArray(Option<u32>),
    VertexAttribPointer {
        index: u32,
    },
    CreateShader(u32),
    CompileShader {
        shader: u32,
        ok: bool,
    },
    CreateProgram(u32),
    BindFragDataLocation {
        color: u32,
    },
    LinkProgram {
        program: u32,
        ok: bool,
    },
    UseProgram(Option<u32>),
    UniformMatrix4 {
        location: u32,
    },
    UniformI32 {
        location: u32,
        value: i32,
    },
    UniformF32 {
        location: u32,
        value: f32,
    },
    UniformVec2 {
        location: u32,
    },
    UniformVec3 {
        location: u32,
    },
    UniformVec4 {
        location: u32,
    },
    DrawArrays {
        mode: Primitive,
        first: usize,
        count: usize,
    },
    DrawElements {
        mode: Primitive,
        count: usize,
        first_index: usize,
    },
}

/// A [`Device`] that records instead of rendering.
pub struct TraceDevice {
    calls: Mutex<Vec<Call>>,
    free_names: Mutex<VecDeque<u32>>,
    next_name: AtomicU32,
    next_location: AtomicU32,
    locations: Mutex<HashMap<(u32, String), u32>>,
    compile_failures: Mutex<VecDeque<String>>,
    link_failures: Mutex<VecDeque<String>>,
    vertex_arrays: AtomicBool,
    geometry_shaders: AtomicBool,
}

impl Default for TraceDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            free_names: Mutex::new(VecDeque::new()),
            next_name: AtomicU32::new(1),
            next_location: AtomicU32::new(0),
            locations: Mutex::new(HashMap::new()),
            compile_failures: Mutex::new(VecDeque::new()),
            link_failures: Mutex::new(VecDeque::new()),
            vertex_arrays: AtomicBool::new(true),
            geometry_shaders: AtomicBool::new(true),
        }
    }

    /// Makes capability checks report the geometry stage as missing.
    pub fn disable_geometry_shaders(&self) {
        self.geometry_shaders.store(false, Ordering::Relaxed);
    }

    /// Makes the device report vertex array objects as unavailable, forcing
    /// the attribute-pointer fallback path.
    pub fn disable_vertex_arrays(&self) {
        self.vertex_arrays.store(false, Ordering::Relaxed);
    }

    /// Queues a compile failure: the next [`Device::compile_shader`] call
    /// fails with `log` as its compiler log.
    pub fn fail_next_compile(&self, log: impl Into<String>) {
        self.compile_failures.lock().push_back(log.into());
    }

    /// Queues a link failure for the next [`Device::link_program`] call.
    pub fn fail_next_link(&self, log: impl Into<String>) {
        self.link_failures.lock().push_back(log.into());
    }

    /// A snapshot of the recorded call stream.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Discards the recorded call stream.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Counts recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn next_name(&self) -> NonZeroU32 {
        let raw = self
            .free_names
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.next_name.fetch_add(1, Ordering::Relaxed));
        NonZeroU32::new(raw).expect("fake GL name overflow")
    }

    fn release_name(&self, name: u32) {
        self.free_names.lock().push_back(name);
    }
}

impl Device for TraceDevice {
    fn has_vertex_arrays(&self) -> bool {
        self.vertex_arrays.load(Ordering::Relaxed)
    }

    fn has_geometry_shaders(&self) -> bool {
        self.geometry_shaders.load(Ordering::Relaxed)
    }

    fn create_buffer(&self) -> Result<BufferId> {
        let name = self.next_name();
        self.record(Call::CreateBuffer(name.get()));
        Ok(BufferId(name))
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.record(Call::DeleteBuffer(buffer.0.get()));
        self.release_name(buffer.0.get());
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>) {
        self.record(Call::BindBuffer {
            target,
            buffer: buffer.map(|b| b.0.get()),
        });
    }

    fn buffer_data(&self, target: BufferTarget, size: usize, _usage: BufferUsage) {
        self.record(Call::BufferData { target, size });
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record(Call::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId> {
        let name = self.next_name();
        self.record(Call::CreateVertexArray(name.get()));
        Ok(VertexArrayId(name))
    }

    fn delete_vertex_array(&self, array: VertexArrayId) {
        self.release_name(array.0.get());
    }

    fn bind_vertex_array(&self, array: Option<VertexArrayId>) {
        self.record(Call::BindVertexArray(array.map(|a| a.0.get())));
    }

    fn enable_vertex_attrib(&self, _index: u32) {}

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        _size: i32,
        _kind: AttribType,
        _normalized: bool,
        _stride: i32,
        _offset: i32,
    ) {
        self.record(Call::VertexAttribPointer { index });
    }

    fn create_shader(&self, _stage: ShaderStage) -> Result<ShaderObjectId> {
        let name = self.next_name();
        self.record(Call::CreateShader(name.get()));
        Ok(ShaderObjectId(name))
    }

    fn delete_shader(&self, shader: ShaderObjectId) {
        self.release_name(shader.0.get());
    }

    fn compile_shader(&self, shader: ShaderObjectId, _source: &str) -> Result<(), String> {
        let failure = self.compile_failures.lock().pop_front();
        self.record(Call::CompileShader {
            shader: shader.0.get(),
            ok: failure.is_none(),
        });
        match failure {
            None => Ok(()),
            Some(log) => Err(log),
        }
    }

    fn create_program(&self) -> Result<ProgramId> {
        let name = self.next_name();
        self.record(Call::CreateProgram(name.get()));
        Ok(ProgramId(name))
    }

    fn delete_program(&self, program: ProgramId) {
        self.release_name(program.0.get());
    }

    fn attach_shader(&self, _program: ProgramId, _shader: ShaderObjectId) {}

    fn detach_shader(&self, _program: ProgramId, _shader: ShaderObjectId) {}

    fn bind_attrib_location(&self, _program: ProgramId, _index: u32, _name: &str) {}

    fn bind_frag_data_location(&self, _program: ProgramId, color: u32, _name: &str) {
        self.record(Call::BindFragDataLocation { color });
    }

    fn link_program(&self, program: ProgramId) -> Result<(), String> {
        let failure = self.link_failures.lock().pop_front();
        self.record(Call::LinkProgram {
            program: program.0.get(),
            ok: failure.is_none(),
        });
        match failure {
            None => Ok(()),
            Some(log) => Err(log),
        }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        self.record(Call::UseProgram(program.map(|p| p.0.get())));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut locations = self.locations.lock();
        let raw = *locations
            .entry((program.0.get(), name.to_owned()))
            .or_insert_with(|| self.next_location.fetch_add(1, Ordering::Relaxed));
        Some(UniformLocation(raw))
    }

    fn set_uniform_matrix4(&self, location: UniformLocation, _values: &[f32; 16]) {
        self.record(Call::UniformMatrix4 {
            location: location.0,
        });
    }

    fn set_uniform_i32(&self, location: UniformLocation, value: i32) {
        self.record(Call::UniformI32 {
            location: location.0,
            value,
        });
    }

    fn set_uniform_f32(&self, location: UniformLocation, value: f32) {
        self.record(Call::UniformF32 {
            location: location.0,
            value,
        });
    }

    fn set_uniform_vec2(&self, location: UniformLocation, _value: [f32; 2]) {
        self.record(Call::UniformVec2 {
            location: location.0,
        });
    }

    fn set_uniform_vec3(&self, location: UniformLocation, _value: [f32; 3]) {
        self.record(Call::UniformVec3 {
            location: location.0,
        });
    }

    fn set_uniform_vec4(&self, location: UniformLocation, _value: [f32; 4]) {
        self.record(Call::UniformVec4 {
            location: location.0,
        });
    }

    fn draw_arrays(&self, mode: Primitive, first: usize, count: usize) {
        self.record(Call::DrawArrays { mode, first, count });
    }

    fn draw_elements(&self, mode: Primitive, count: usize, first_index: usize) {
        self.record(Call::DrawElements {
            mode,
            count,
            first_index,
        });
    }
}
