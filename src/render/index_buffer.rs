//! GPU index buffers and their shared-pool slices.
//!
//! Index storage follows the vertex-buffer design one module over: a CPU
//! mirror of `u32` elements, explicit range uploads with the same clamping
//! rules, and a per-thread pool handing out relocatable slices. Indices have
//! no layout, so there is exactly one pool per thread instead of one per
//! vertex layout.

use std::cell::RefCell;
use std::sync::Arc;

use slotmap::SlotMap;

use crate::errors::Result;
use crate::gl::{BufferId, BufferTarget, BufferUsage, Device};
use crate::render::buffer_slice::SliceKey;
use crate::render::context::Context;

/// Starting capacity (in indices) of the pool buffer.
const INITIAL_POOL_CAPACITY: usize = 256;

/// A contiguous GPU allocation of `u32` indices with a CPU staging mirror.
pub struct IndexBuffer {
    device: Arc<dyn Device>,
    ibo: BufferId,
    usage: BufferUsage,
    capacity: usize,
    data: Vec<u32>,
}

impl IndexBuffer {
    pub fn new(device: Arc<dyn Device>, usage: BufferUsage, capacity: usize) -> Result<Self> {
        let ibo = device.create_buffer()?;
        device.bind_buffer(BufferTarget::ElementArray, Some(ibo));
        device.buffer_data(BufferTarget::ElementArray, capacity * 4, usage);
        Ok(Self {
            device,
            ibo,
            usage,
            capacity,
            data: vec![0; capacity],
        })
    }

    /// Capacity in indices.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bind(&self) {
        self.device
            .bind_buffer(BufferTarget::ElementArray, Some(self.ibo));
    }

    pub fn unbind(device: &dyn Device) {
        device.bind_buffer(BufferTarget::ElementArray, None);
    }

    /// Uploads the whole mirror.
    pub fn update(&self) {
        self.update_range(0, self.capacity);
    }

    /// Uploads indices `[begin, end)` of the mirror. `end` is clamped to the
    /// capacity; an empty or out-of-range interval is silently ignored.
    pub fn update_range(&self, begin: usize, end: usize) {
        let end = end.min(self.capacity);
        if begin >= end {
            return;
        }
        self.bind();
        self.device.buffer_sub_data(
            BufferTarget::ElementArray,
            begin * 4,
            bytemuck::cast_slice(&self.data[begin..end]),
        );
    }

    /// Grows or shrinks the buffer to `capacity` indices, preserving mirror
    /// contents and re-uploading them. Resizing to the current capacity is a
    /// no-op.
    pub fn resize(&mut self, capacity: usize) {
        if capacity == self.capacity {
            return;
        }
        log::debug!(
            "resizing index buffer from {} to {capacity} indices",
            self.capacity
        );
        self.data.resize(capacity, 0);
        self.capacity = capacity;
        self.bind();
        self.device
            .buffer_data(BufferTarget::ElementArray, capacity * 4, self.usage);
        if capacity > 0 {
            self.device
                .buffer_sub_data(BufferTarget::ElementArray, 0, bytemuck::cast_slice(&self.data));
        }
    }

    /// Mutable staging indices `[first, first + count)`.
    pub fn indices_mut(&mut self, first: usize, count: usize) -> &mut [u32] {
        &mut self.data[first..first + count]
    }

    /// Staging indices `[first, first + count)`.
    #[must_use]
    pub fn indices(&self, first: usize, count: usize) -> &[u32] {
        &self.data[first..first + count]
    }

    fn copy_indices(&mut self, src: usize, dst: usize, count: usize) {
        self.data.copy_within(src..src + count, dst);
    }
}

impl Drop for IndexBuffer {
    fn drop(&mut self) {
        self.device.delete_buffer(self.ibo);
    }
}

struct SliceEntry {
    offset: usize,
    len: usize,
}

struct IndexSlicePool {
    buffer: IndexBuffer,
    slices: SlotMap<SliceKey, SliceEntry>,
}

impl IndexSlicePool {
    fn new() -> Result<Self> {
        let device = Context::ensure()?.device().clone();
        Ok(Self {
            buffer: IndexBuffer::new(device, BufferUsage::Dynamic, INITIAL_POOL_CAPACITY)?,
            slices: SlotMap::with_key(),
        })
    }

    fn allocate(&mut self, len: usize) -> SliceKey {
        if len == 0 {
            return self.slices.insert(SliceEntry { offset: 0, len: 0 });
        }
        if let Some(offset) = self.find_gap(len) {
            return self.slices.insert(SliceEntry { offset, len });
        }

        let used: usize = self.slices.values().map(|e| e.len).sum();
        let target = (self.buffer.capacity() * 2).max(used + len);
        self.repack(target);
        self.slices.insert(SliceEntry { offset: used, len })
    }

    fn free(&mut self, key: SliceKey) {
        self.slices.remove(key);
    }

    fn offset(&self, key: SliceKey) -> usize {
        self.slices[key].offset
    }

    fn find_gap(&self, len: usize) -> Option<usize> {
        let mut live: Vec<(usize, usize)> = self
            .slices
            .values()
            .filter(|e| e.len > 0)
            .map(|e| (e.offset, e.len))
            .collect();
        live.sort_unstable();

        let mut cursor = 0;
        for (offset, used) in live {
            if offset - cursor >= len {
                return Some(cursor);
            }
            cursor = offset + used;
        }
        (self.buffer.capacity() - cursor >= len).then_some(cursor)
    }

    fn repack(&mut self, capacity: usize) {
        let mut keys: Vec<(usize, SliceKey)> = self
            .slices
            .iter()
            .filter(|(_, e)| e.len > 0)
            .map(|(k, e)| (e.offset, k))
            .collect();
        keys.sort_unstable();

        let mut cursor = 0;
        for (offset, key) in keys {
            let len = self.slices[key].len;
            if offset != cursor {
                self.buffer.copy_indices(offset, cursor, len);
                self.slices[key].offset = cursor;
            }
            cursor += len;
        }
        log::debug!(
            "index slice pool grown to {capacity} indices ({} live slices repacked)",
            self.slices.len()
        );
        self.buffer.resize(capacity);
    }
}

thread_local! {
    static POOL: RefCell<Option<IndexSlicePool>> = const { RefCell::new(None) };
}

fn with_pool<R>(f: impl FnOnce(&mut IndexSlicePool) -> R) -> R {
    POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        let pool = pool
            .as_mut()
            .expect("index buffer slice used on a thread that never allocated it");
        f(pool)
    })
}

/// A relocatable sub-range of this thread's shared index buffer. The same
/// rules as vertex slices apply: [`IndexBufferSlice::loc`] is re-resolved on
/// every call and must not be cached across allocating operations.
pub struct IndexBufferSlice {
    key: SliceKey,
    len: usize,
}

impl IndexBufferSlice {
    /// Allocates `len` indices from the pool, creating the pool on first use.
    pub fn new(len: usize) -> Result<Self> {
        POOL.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_none() {
                *slot = Some(IndexSlicePool::new()?);
            }
            let pool = slot.as_mut().expect("pool initialized above");
            let key = pool.allocate(len);
            Ok(Self { key, len })
        })
    }

    /// Size in indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The slice's current base offset in its buffer, in indices.
    #[must_use]
    pub fn loc(&self) -> usize {
        with_pool(|pool| pool.offset(self.key))
    }

    /// Resizes the slice, relocating it within the pool. Resizing to the
    /// current size is a no-op and triggers no GPU traffic.
    pub fn recreate(&mut self, len: usize) {
        if len == self.len {
            return;
        }
        with_pool(|pool| {
            pool.free(self.key);
            self.key = pool.allocate(len);
        });
        self.len = len;
    }

    /// Gives `fill` mutable access to the slice's staging indices. The pool
    /// is borrowed for the duration, so `fill` must not allocate, resize or
    /// drop slices.
    pub fn write<R>(&mut self, fill: impl FnOnce(&mut [u32]) -> R) -> R {
        with_pool(|pool| {
            let offset = pool.offset(self.key);
            fill(pool.buffer.indices_mut(offset, self.len))
        })
    }

    /// Uploads the slice's staging indices to the GPU.
    pub fn update(&self) {
        self.update_range(0, self.len);
    }

    /// Uploads indices `[begin, end)` of the slice. `end` is clamped to the
    /// slice size; an empty or out-of-range interval is silently ignored.
    pub fn update_range(&self, begin: usize, end: usize) {
        let end = end.min(self.len);
        if begin >= end {
            return;
        }
        with_pool(|pool| {
            let offset = pool.offset(self.key);
            pool.buffer.update_range(offset + begin, offset + end);
        });
    }

    /// Binds the underlying pool buffer for indexed drawing.
    pub fn bind(&self) {
        with_pool(|pool| pool.buffer.bind());
    }
}

impl Drop for IndexBufferSlice {
    fn drop(&mut self) {
        let _ = POOL.try_with(|pool| {
            if let Some(pool) = pool.borrow_mut().as_mut() {
                pool.free(self.key);
            }
        });
    }
}
