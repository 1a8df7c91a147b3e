//! GPU vertex buffers.
//!
//! A [`Buffer`] is a contiguous GPU allocation of vertices of one registered
//! layout, mirrored by a CPU-side staging copy. Mutations happen in the
//! mirror; [`Buffer::update`] / [`Buffer::update_range`] push it (or a part
//! of it) to the driver. Growth reallocates the data store and re-uploads the
//! whole mirror, so CPU contents survive a resize.

use std::sync::Arc;

use crate::errors::Result;
use crate::gl::{BufferId, BufferTarget, BufferUsage, Device, VertexArrayId};
use crate::render::vertex::{self, VertexLayoutId};

pub struct Buffer {
    device: Arc<dyn Device>,
    vbo: BufferId,
    vao: Option<VertexArrayId>,
    layout: VertexLayoutId,
    usage: BufferUsage,
    stride: usize,
    capacity: usize,
    data: Vec<u8>,
}

impl Buffer {
    /// Creates a buffer of `capacity` vertices. When the device supports
    /// vertex array objects the attribute setup is baked into one at creation
    /// time; otherwise [`Buffer::bind`] re-specifies the pointers each call.
    pub fn new(
        device: Arc<dyn Device>,
        layout: VertexLayoutId,
        usage: BufferUsage,
        capacity: usize,
    ) -> Result<Self> {
        let stride = vertex::stride(layout);
        let vbo = device.create_buffer()?;
        device.bind_buffer(BufferTarget::Array, Some(vbo));
        device.buffer_data(BufferTarget::Array, capacity * stride, usage);

        let vao = if device.has_vertex_arrays() {
            let vao = device.create_vertex_array()?;
            device.bind_vertex_array(Some(vao));
            device.bind_buffer(BufferTarget::Array, Some(vbo));
            setup_attributes(&*device, layout, stride);
            device.bind_vertex_array(None);
            Some(vao)
        } else {
            None
        };

        Ok(Self {
            device,
            vbo,
            vao,
            layout,
            usage,
            stride,
            capacity,
            data: vec![0; capacity * stride],
        })
    }

    /// Capacity in vertices.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn layout(&self) -> VertexLayoutId {
        self.layout
    }

    /// Binds the buffer for drawing: the vertex array object when available,
    /// attribute pointers otherwise.
    pub fn bind(&self) {
        if let Some(vao) = self.vao {
            self.device.bind_vertex_array(Some(vao));
        } else {
            self.device.bind_buffer(BufferTarget::Array, Some(self.vbo));
            setup_attributes(&*self.device, self.layout, self.stride);
        }
    }

    /// Restores the no-buffer-bound state.
    pub fn unbind(device: &dyn Device) {
        if device.has_vertex_arrays() {
            device.bind_vertex_array(None);
        }
        device.bind_buffer(BufferTarget::Array, None);
    }

    /// Uploads the whole mirror.
    pub fn update(&self) {
        self.update_range(0, self.capacity);
    }

    /// Uploads vertices `[begin, end)` of the mirror. `end` is clamped to the
    /// capacity; an empty or out-of-range interval (`begin >= end` after
    /// clamping) is silently ignored.
    pub fn update_range(&self, begin: usize, end: usize) {
        let end = end.min(self.capacity);
        if begin >= end {
            return;
        }
        self.device.bind_buffer(BufferTarget::Array, Some(self.vbo));
        self.device.buffer_sub_data(
            BufferTarget::Array,
            begin * self.stride,
            &self.data[begin * self.stride..end * self.stride],
        );
    }

    /// Grows or shrinks the buffer to `capacity` vertices, preserving mirror
    /// contents and re-uploading them. Resizing to the current capacity is a
    /// no-op.
    pub fn resize(&mut self, capacity: usize) {
        if capacity == self.capacity {
            return;
        }
        log::debug!(
            "resizing buffer from {} to {capacity} vertices (stride {})",
            self.capacity,
            self.stride
        );
        self.data.resize(capacity * self.stride, 0);
        self.capacity = capacity;
        self.device.bind_buffer(BufferTarget::Array, Some(self.vbo));
        self.device
            .buffer_data(BufferTarget::Array, capacity * self.stride, self.usage);
        if capacity > 0 {
            self.device
                .buffer_sub_data(BufferTarget::Array, 0, &self.data);
        }
    }

    /// Mutable staging bytes of vertices `[first, first + count)`.
    pub fn bytes_mut(&mut self, first: usize, count: usize) -> &mut [u8] {
        &mut self.data[first * self.stride..(first + count) * self.stride]
    }

    /// Staging bytes of vertices `[first, first + count)`.
    #[must_use]
    pub fn bytes(&self, first: usize, count: usize) -> &[u8] {
        &self.data[first * self.stride..(first + count) * self.stride]
    }

    /// Moves `count` vertices from `src` to `dst` within the mirror. Used by
    /// the slice pool when repacking; the caller re-uploads afterwards.
    pub(crate) fn copy_vertices(&mut self, src: usize, dst: usize, count: usize) {
        self.data
            .copy_within(src * self.stride..(src + count) * self.stride, dst * self.stride);
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(vao) = self.vao {
            self.device.delete_vertex_array(vao);
        }
        self.device.delete_buffer(self.vbo);
    }
}

fn setup_attributes(device: &dyn Device, layout: VertexLayoutId, stride: usize) {
    let layout = vertex::layout(layout);
    let mut offset = 0usize;
    for (index, attribute) in layout.attributes().iter().enumerate() {
        let index = index as u32;
        let (size, kind, normalized) = attribute.kind.gl_format();
        device.enable_vertex_attrib(index);
        device.vertex_attrib_pointer(index, size, kind, normalized, stride as i32, offset as i32);
        offset += attribute.kind.byte_size();
    }
}
