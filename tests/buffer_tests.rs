//! Buffer and slice pool tests
//!
//! Tests for:
//! - Range upload clamping on raw buffers
//! - Vertex-array fallback when VAOs are unavailable
//! - First-fit slice allocation and reuse of freed ranges
//! - Pool growth, repacking and slice relocation
//! - Exact upload regions for slices
//! - Index slice pool behavior

use std::rc::Rc;
use std::sync::Arc;

use vitrail::gl::trace::{Call, TraceDevice};
use vitrail::gl::{BufferTarget, BufferUsage};
use vitrail::{
    Buffer, BufferSlice, Context, HeadlessBackend, IndexBufferSlice, default_vertex_layout,
};

// ============================================================================
// Helper
// ============================================================================

/// Stride of the default 2D vertex: vec2 position + rgba8 color + vec2 uv.
const STRIDE: usize = 20;

fn trace_context() -> (Arc<TraceDevice>, Rc<Context>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Arc::new(TraceDevice::new());
    let context = Context::from_parts(device.clone(), Box::new(HeadlessBackend));
    context.make_current().unwrap();
    (device, context)
}

fn sub_data_uploads(device: &TraceDevice, target: BufferTarget) -> Vec<(usize, usize)> {
    device
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::BufferSubData {
                target: t,
                offset,
                len,
            } if t == target => Some((offset, len)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Raw buffers
// ============================================================================

#[test]
fn update_range_clamps_the_end_to_capacity() {
    let (device, _context) = trace_context();
    let buffer = Buffer::new(
        device.clone(),
        default_vertex_layout(),
        BufferUsage::Dynamic,
        10,
    )
    .unwrap();

    device.clear_calls();
    buffer.update_range(2, 100);
    assert_eq!(
        sub_data_uploads(&device, BufferTarget::Array),
        vec![(2 * STRIDE, 8 * STRIDE)]
    );
}

#[test]
fn update_range_ignores_empty_and_out_of_range_intervals() {
    let (device, _context) = trace_context();
    let buffer = Buffer::new(
        device.clone(),
        default_vertex_layout(),
        BufferUsage::Dynamic,
        10,
    )
    .unwrap();

    device.clear_calls();
    buffer.update_range(5, 3);
    buffer.update_range(7, 7);
    buffer.update_range(20, 30);
    assert!(sub_data_uploads(&device, BufferTarget::Array).is_empty());
}

#[test]
fn resize_preserves_and_reuploads_the_mirror() {
    let (device, _context) = trace_context();
    let mut buffer = Buffer::new(
        device.clone(),
        default_vertex_layout(),
        BufferUsage::Dynamic,
        4,
    )
    .unwrap();
    buffer.bytes_mut(0, 4).fill(0xAB);

    device.clear_calls();
    buffer.resize(8);
    assert_eq!(
        sub_data_uploads(&device, BufferTarget::Array),
        vec![(0, 8 * STRIDE)]
    );
    assert!(buffer.bytes(0, 4).iter().all(|&b| b == 0xAB));
    assert!(buffer.bytes(4, 4).iter().all(|&b| b == 0));
}

#[test]
fn bind_falls_back_to_attribute_pointers_without_vaos() {
    let (device, _context) = trace_context();
    device.disable_vertex_arrays();
    let buffer = Buffer::new(
        device.clone(),
        default_vertex_layout(),
        BufferUsage::Dynamic,
        4,
    )
    .unwrap();
    assert_eq!(device.count_calls(|c| matches!(c, Call::CreateVertexArray(_))), 0);

    device.clear_calls();
    buffer.bind();
    // One pointer per attribute of the default layout.
    assert_eq!(
        device.count_calls(|c| matches!(c, Call::VertexAttribPointer { .. })),
        3
    );
    assert_eq!(device.count_calls(|c| matches!(c, Call::BindVertexArray(_))), 0);
}

// ============================================================================
// Slice allocation
// ============================================================================

#[test]
fn freed_ranges_are_reused_first_fit() {
    let (_device, _context) = trace_context();
    let layout = default_vertex_layout();

    let a = BufferSlice::new(layout, 10).unwrap();
    let b = BufferSlice::new(layout, 20).unwrap();
    assert_eq!(a.loc(), 0);
    assert_eq!(b.loc(), 10);

    drop(a);
    let c = BufferSlice::new(layout, 10).unwrap();
    assert_eq!(c.loc(), 0);
    assert_eq!(b.loc(), 10);
}

#[test]
fn smaller_slices_fit_into_earlier_gaps() {
    let (_device, _context) = trace_context();
    let layout = default_vertex_layout();

    let a = BufferSlice::new(layout, 10).unwrap();
    let b = BufferSlice::new(layout, 10).unwrap();
    let _c = BufferSlice::new(layout, 10).unwrap();
    drop(a);
    drop(b);

    // The 20-vertex hole at the front takes the 15-vertex slice.
    let d = BufferSlice::new(layout, 15).unwrap();
    assert_eq!(d.loc(), 0);
}

#[test]
fn pool_growth_doubles_and_relocates() {
    let (_device, _context) = trace_context();
    let layout = default_vertex_layout();

    // Starting capacity is 256 vertices.
    let a = BufferSlice::new(layout, 200).unwrap();
    let b = BufferSlice::new(layout, 100).unwrap();
    assert_eq!(a.loc(), 0);
    assert_eq!(b.loc(), 200);

    // 300 used; growth to max(2 * 512, 300 + 300) = 1024.
    let c = BufferSlice::new(layout, 300).unwrap();
    assert_eq!(c.loc(), 300);
}

#[test]
fn growth_repacks_around_freed_ranges() {
    let (_device, _context) = trace_context();
    let layout = default_vertex_layout();

    let a = BufferSlice::new(layout, 100).unwrap();
    let b = BufferSlice::new(layout, 100).unwrap();
    drop(a);

    // Neither the 100-vertex hole nor the 56-vertex tail fits 200, so the
    // pool grows and packs b down to the front.
    let c = BufferSlice::new(layout, 200).unwrap();
    assert_eq!(b.loc(), 0);
    assert_eq!(c.loc(), 100);
}

#[test]
fn zero_length_slices_allocate_nothing() {
    let (device, _context) = trace_context();
    let layout = default_vertex_layout();

    let a = BufferSlice::new(layout, 0).unwrap();
    assert!(a.is_empty());
    assert_eq!(a.loc(), 0);

    device.clear_calls();
    a.update();
    assert!(sub_data_uploads(&device, BufferTarget::Array).is_empty());

    // A zero-length slice occupies no range: the next allocation starts at 0.
    let b = BufferSlice::new(layout, 10).unwrap();
    assert_eq!(b.loc(), 0);
}

#[test]
fn same_size_recreate_is_free() {
    let (device, _context) = trace_context();
    let layout = default_vertex_layout();

    let mut a = BufferSlice::new(layout, 10).unwrap();
    let loc = a.loc();
    device.clear_calls();
    a.recreate(10);
    assert_eq!(a.loc(), loc);
    assert!(device.calls().is_empty());
}

#[test]
fn recreate_to_a_new_size_relocates() {
    let (_device, _context) = trace_context();
    let layout = default_vertex_layout();

    let mut a = BufferSlice::new(layout, 10).unwrap();
    let _b = BufferSlice::new(layout, 10).unwrap();
    a.recreate(20);
    // The old [0, 10) range no longer fits; the slice moves past b.
    assert_eq!(a.loc(), 20);
    assert_eq!(a.len(), 20);

    // Shrinking back fits the original hole again.
    a.recreate(5);
    assert_eq!(a.loc(), 0);
}

// ============================================================================
// Slice uploads
// ============================================================================

#[test]
fn slice_update_uploads_exactly_its_range() {
    let (device, _context) = trace_context();
    let layout = default_vertex_layout();

    let _a = BufferSlice::new(layout, 5).unwrap();
    let mut b = BufferSlice::new(layout, 20).unwrap();
    b.write(|bytes| bytes.fill(0xCD));

    device.clear_calls();
    b.update();
    assert_eq!(
        sub_data_uploads(&device, BufferTarget::Array),
        vec![(5 * STRIDE, 20 * STRIDE)]
    );
}

#[test]
fn slice_update_range_is_relative_and_clamped() {
    let (device, _context) = trace_context();
    let layout = default_vertex_layout();

    let _a = BufferSlice::new(layout, 5).unwrap();
    let b = BufferSlice::new(layout, 20).unwrap();

    device.clear_calls();
    b.update_range(2, 5);
    b.update_range(10, 50);
    b.update_range(8, 2);
    assert_eq!(
        sub_data_uploads(&device, BufferTarget::Array),
        vec![(7 * STRIDE, 3 * STRIDE), (15 * STRIDE, 10 * STRIDE)]
    );
}

// ============================================================================
// Index slices
// ============================================================================

#[test]
fn index_slices_share_one_pool_per_thread() {
    let (device, _context) = trace_context();

    let a = IndexBufferSlice::new(6).unwrap();
    let mut b = IndexBufferSlice::new(6).unwrap();
    assert_eq!(a.loc(), 0);
    assert_eq!(b.loc(), 6);

    b.write(|indices| {
        for (i, index) in indices.iter_mut().enumerate() {
            *index = i as u32;
        }
    });
    device.clear_calls();
    b.update();
    // u32 indices: byte offset and length are in 4-byte units.
    assert_eq!(
        sub_data_uploads(&device, BufferTarget::ElementArray),
        vec![(6 * 4, 6 * 4)]
    );
}

#[test]
fn freed_index_ranges_are_reused() {
    let (_device, _context) = trace_context();

    let a = IndexBufferSlice::new(12).unwrap();
    let b = IndexBufferSlice::new(6).unwrap();
    drop(a);
    let c = IndexBufferSlice::new(12).unwrap();
    assert_eq!(c.loc(), 0);
    assert_eq!(b.loc(), 12);
}
