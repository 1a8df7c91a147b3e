//! Relocatable slices of shared vertex buffers.
//!
//! Many small drawables sharing a handful of GPU allocations is the point of
//! this module: each registered vertex layout gets one growable pool buffer
//! per rendering thread, and a [`BufferSlice`] is a logical sub-range inside
//! it. Allocation is first-fit within the free gaps; when nothing fits, the
//! pool buffer grows to at least double (or exactly what is needed if that is
//! larger) and live slices are repacked, which relocates them.
//!
//! Because any allocation may relocate any slice, a slice's GPU-visible base
//! offset is only valid momentarily: [`BufferSlice::loc`] re-resolves it on
//! every call and callers must not cache it across operations that can
//! allocate.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use slotmap::{SlotMap, new_key_type};

use crate::errors::Result;
use crate::gl::BufferUsage;
use crate::render::buffer::Buffer;
use crate::render::context::Context;
use crate::render::vertex::VertexLayoutId;

new_key_type! {
    pub(crate) struct SliceKey;
}

/// Starting capacity (in vertices) of a pool buffer.
const INITIAL_POOL_CAPACITY: usize = 256;

struct SliceEntry {
    offset: usize,
    len: usize,
}

struct SlicePool {
    buffer: Buffer,
    slices: SlotMap<SliceKey, SliceEntry>,
}

impl SlicePool {
    fn new(layout: VertexLayoutId) -> Result<Self> {
        let device = Context::ensure()?.device().clone();
        Ok(Self {
            buffer: Buffer::new(device, layout, BufferUsage::Dynamic, INITIAL_POOL_CAPACITY)?,
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
        // After repacking, live slices occupy [0, used) contiguously.
        self.slices.insert(SliceEntry { offset: used, len })
    }

    fn free(&mut self, key: SliceKey) {
        self.slices.remove(key);
    }

    fn offset(&self, key: SliceKey) -> usize {
        self.slices[key].offset
    }

    /// First-fit scan over the gaps between live slices, tail included.
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

    /// Packs live slices down to offset 0 in their current order, grows the
    /// buffer to `capacity`, and re-uploads the relocated contents.
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
                self.buffer.copy_vertices(offset, cursor, len);
                self.slices[key].offset = cursor;
            }
            cursor += len;
        }
        log::debug!(
            "slice pool grown to {capacity} vertices ({} live slices repacked)",
            self.slices.len()
        );
        self.buffer.resize(capacity);
    }
}

thread_local! {
    static POOLS: RefCell<HashMap<VertexLayoutId, SlicePool>> = RefCell::new(HashMap::new());
}

fn with_pool<R>(layout: VertexLayoutId, f: impl FnOnce(&mut SlicePool) -> R) -> R {
    POOLS.with(|pools| {
        let mut pools = pools.borrow_mut();
        let pool = pools
            .get_mut(&layout)
            .expect("buffer slice used on a thread that never allocated it");
        f(pool)
    })
}

/// A logical, possibly relocating sub-range of this thread's shared vertex
/// buffer for one layout. Dropping the handle frees the range.
pub struct BufferSlice {
    layout: VertexLayoutId,
    key: SliceKey,
    len: usize,
}

impl BufferSlice {
    /// Allocates `len` vertices from the pool for `layout`, creating the pool
    /// (and a default context, if a provider is installed) on first use.
    pub fn new(layout: VertexLayoutId, len: usize) -> Result<Self> {
        POOLS.with(|pools| {
            let mut pools = pools.borrow_mut();
            let pool = match pools.entry(layout) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(SlicePool::new(layout)?),
            };
            let key = pool.allocate(len);
            Ok(Self { layout, key, len })
        })
    }

    /// Size in vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn layout(&self) -> VertexLayoutId {
        self.layout
    }

    /// The slice's current base offset in its buffer, in vertices. Re-resolve
    /// after any operation that can allocate; never cache across frames.
    #[must_use]
    pub fn loc(&self) -> usize {
        with_pool(self.layout, |pool| pool.offset(self.key))
    }

    /// Resizes the slice, relocating it within the pool. Resizing to the
    /// current size is a no-op and triggers no GPU traffic.
    pub fn recreate(&mut self, len: usize) {
        if len == self.len {
            return;
        }
        with_pool(self.layout, |pool| {
            pool.free(self.key);
            self.key = pool.allocate(len);
        });
        self.len = len;
    }

    /// Gives `fill` mutable access to the slice's CPU staging bytes
    /// (`len * stride` of them). The pool is borrowed for the duration, so
    /// `fill` must not allocate, resize or drop slices.
    pub fn write<R>(&mut self, fill: impl FnOnce(&mut [u8]) -> R) -> R {
        with_pool(self.layout, |pool| {
            let offset = pool.offset(self.key);
            fill(pool.buffer.bytes_mut(offset, self.len))
        })
    }

    /// Uploads the slice's staging bytes to the GPU.
    pub fn update(&self) {
        self.update_range(0, self.len);
    }

    /// Uploads vertices `[begin, end)` of the slice. `end` is clamped to the
    /// slice size; an empty or out-of-range interval is silently ignored.
    pub fn update_range(&self, begin: usize, end: usize) {
        let end = end.min(self.len);
        if begin >= end {
            return;
        }
        with_pool(self.layout, |pool| {
            let offset = pool.offset(self.key);
            pool.buffer.update_range(offset + begin, offset + end);
        });
    }

    /// Binds the underlying pool buffer for drawing.
    pub fn bind(&self) {
        with_pool(self.layout, |pool| pool.buffer.bind());
    }
}

impl Drop for BufferSlice {
    fn drop(&mut self) {
        // The thread-local pool map may already be gone during teardown.
        let _ = POOLS.try_with(|pools| {
            if let Some(pool) = pools.borrow_mut().get_mut(&self.layout) {
                pool.free(self.key);
            }
        });
    }
}
