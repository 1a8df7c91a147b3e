//! Drawable tests
//!
//! Tests for:
//! - Geometry dirty tracking: first draw fills and uploads, redraws do not
//! - Transform dirty tracking independent of geometry
//! - Matrix override pinning and release
//! - Source downcast access
//! - Index filling with the slice's base vertex
//! - draw_at with externally managed buffers
//! - The polygon kind end to end

use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use vitrail::gl::trace::{Call, TraceDevice};
use vitrail::gl::{BufferTarget, Primitive};
use vitrail::{
    Color, Context, Drawable, DrawableSource, HeadlessBackend, Matrix, Polygon, RenderArgs,
    Result, Shader,
};

// ============================================================================
// Helpers
// ============================================================================

fn trace_context() -> (Arc<TraceDevice>, Rc<Context>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Arc::new(TraceDevice::new());
    let context = Context::from_parts(device.clone(), Box::new(HeadlessBackend));
    context.make_current().unwrap();
    (device, context)
}

fn vertex_uploads(device: &TraceDevice) -> usize {
    device.count_calls(|c| {
        matches!(
            c,
            Call::BufferSubData {
                target: BufferTarget::Array,
                ..
            }
        )
    })
}

/// Source that counts its hooks and records what they were handed.
#[derive(Default)]
struct TestSource {
    fills: usize,
    index_fills: usize,
    renders: usize,
    last_fill_len: usize,
    last_base: u32,
    last_vertex_loc: usize,
    last_index_loc: usize,
}

impl DrawableSource for TestSource {
    fn fill(&mut self, vertices: &mut [u8]) {
        self.fills += 1;
        self.last_fill_len = vertices.len();
        vertices.fill(0x5A);
    }

    fn fill_indices(&mut self, indices: &mut [u32], base: u32) {
        self.index_fills += 1;
        self.last_base = base;
        for (i, index) in indices.iter_mut().enumerate() {
            *index = base + i as u32;
        }
    }

    fn render(&mut self, args: RenderArgs<'_>) -> Result<()> {
        self.renders += 1;
        self.last_vertex_loc = args.vertex_loc;
        self.last_index_loc = args.index_loc;
        args.device
            .draw_arrays(Primitive::TriangleStrip, args.vertex_loc, 4);
        Ok(())
    }
}

fn test_drawable(vertices: usize, indices: usize) -> Drawable {
    let mut drawable = Drawable::new(TestSource::default());
    drawable.set_vertex_count(vertices);
    drawable.set_index_count(indices);
    drawable
}

fn counters(drawable: &Drawable) -> &TestSource {
    drawable.source::<TestSource>().unwrap()
}

// ============================================================================
// Geometry dirtiness
// ============================================================================

#[test]
fn first_draw_fills_once_and_redraws_reuse_the_upload() {
    let (device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 0);

    drawable.draw(&shader).unwrap();
    assert_eq!(counters(&drawable).fills, 1);
    // 4 vertices at the default 20-byte stride.
    assert_eq!(counters(&drawable).last_fill_len, 80);
    assert!(!drawable.has_changed());

    device.clear_calls();
    drawable.draw(&shader).unwrap();
    drawable.draw(&shader).unwrap();
    assert_eq!(counters(&drawable).fills, 1);
    assert_eq!(counters(&drawable).renders, 3);
    assert_eq!(vertex_uploads(&device), 0);
}

#[test]
fn moving_a_drawable_does_not_reupload_geometry() {
    let (device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 0);
    drawable.draw(&shader).unwrap();

    device.clear_calls();
    drawable.set_position(Vec2::new(50.0, 20.0));
    drawable.draw(&shader).unwrap();

    assert_eq!(counters(&drawable).fills, 1);
    assert_eq!(vertex_uploads(&device), 0);
    // The fresh matrix still reaches the shader.
    assert_eq!(
        device.count_calls(|c| matches!(c, Call::UniformMatrix4 { .. })),
        1
    );
}

#[test]
fn mutable_source_access_marks_the_drawable_dirty() {
    let (_device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 0);
    drawable.draw(&shader).unwrap();
    assert!(!drawable.has_changed());

    drawable.source_mut::<TestSource>().unwrap();
    assert!(drawable.has_changed());
    drawable.draw(&shader).unwrap();
    assert_eq!(counters(&drawable).fills, 2);
}

#[test]
fn setting_the_same_count_keeps_the_drawable_clean() {
    let (_device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 0);
    drawable.draw(&shader).unwrap();

    drawable.set_vertex_count(4);
    assert!(!drawable.has_changed());
    drawable.set_vertex_count(6);
    assert!(drawable.has_changed());
}

#[test]
fn zero_vertex_drawables_still_render() {
    let (_device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = test_drawable(0, 0);

    drawable.draw(&shader).unwrap();
    assert_eq!(counters(&drawable).fills, 0);
    assert_eq!(counters(&drawable).renders, 1);
}

// ============================================================================
// Transform
// ============================================================================

#[test]
fn transform_composes_position_rotation_scale_and_origin() {
    let mut drawable = test_drawable(0, 0);
    drawable.set_position(Vec2::new(10.0, 5.0));
    drawable.set_origin(Vec2::new(1.0, 1.0));
    drawable.set_scale(Vec2::new(2.0, 2.0));
    drawable.set_angle(90.0);

    let p = drawable.transform(Vec2::new(1.0, 1.0));
    assert!((p - Vec2::new(10.0, 5.0)).length() < 1e-4);
}

#[test]
fn z_becomes_the_transformed_depth() {
    let mut drawable = test_drawable(0, 0);
    drawable.set_z(0.25);
    let m = drawable.matrix().clone();
    assert!((m.transform(glam::Vec3::ZERO).z - 0.25).abs() < 1e-6);
}

#[test]
fn matrix_override_ignores_parameters_until_cleared() {
    let mut drawable = test_drawable(0, 0);
    let mut pinned = Matrix::identity();
    pinned.translate(5.0, 0.0, 0.0);

    drawable.set_matrix(Some(&pinned));
    drawable.set_position(Vec2::new(100.0, 100.0));
    assert!((drawable.transform(Vec2::ZERO) - Vec2::new(5.0, 0.0)).length() < 1e-6);

    drawable.set_matrix(None);
    assert!((drawable.transform(Vec2::ZERO) - Vec2::new(100.0, 100.0)).length() < 1e-6);
}

// ============================================================================
// Indexed drawing
// ============================================================================

#[test]
fn index_fill_receives_the_slice_base_vertex() {
    let (_device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut first = test_drawable(4, 0);
    let mut second = test_drawable(4, 6);

    first.draw(&shader).unwrap();
    second.draw(&shader).unwrap();

    // second's vertices live after first's in the shared pool.
    assert_eq!(counters(&second).last_base, 4);
    assert_eq!(counters(&second).last_vertex_loc, 4);
    assert_eq!(counters(&second).last_index_loc, 0);
}

#[test]
fn draw_at_skips_slice_management() {
    let (_device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 6);

    drawable.draw_at(7, 3, &shader).unwrap();
    assert_eq!(counters(&drawable).fills, 0);
    assert_eq!(counters(&drawable).renders, 1);
    assert_eq!(counters(&drawable).last_vertex_loc, 7);
    assert_eq!(counters(&drawable).last_index_loc, 3);
    // The drawable stays dirty for its next owned draw.
    assert!(drawable.has_changed());
}

// ============================================================================
// Shaders and texturing
// ============================================================================

#[test]
fn own_shader_receives_the_texturing_flag() {
    let (device, _context) = trace_context();
    let fallback = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 0);
    drawable.set_shader(Some(Arc::new(Shader::new().unwrap())));
    drawable.set_textured(true);

    device.clear_calls();
    drawable.draw(&fallback).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(c, Call::UniformI32 { value: 1, .. })),
        1
    );
}

#[test]
fn shared_fallback_shader_flag_is_left_alone() {
    let (device, _context) = trace_context();
    let fallback = Shader::new().unwrap();
    let mut drawable = test_drawable(4, 0);
    drawable.set_textured(true);

    device.clear_calls();
    drawable.draw(&fallback).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(c, Call::UniformI32 { .. })),
        0
    );
}

// ============================================================================
// Default hooks
// ============================================================================

#[test]
fn default_render_draws_nothing() {
    struct FillOnly;
    impl DrawableSource for FillOnly {
        fn fill(&mut self, vertices: &mut [u8]) {
            vertices.fill(1);
        }
    }

    let (device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut drawable = Drawable::new(FillOnly);
    drawable.set_vertex_count(3);

    device.clear_calls();
    drawable.draw(&shader).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(c, Call::DrawArrays { .. } | Call::DrawElements { .. })),
        0
    );
}

// ============================================================================
// Polygon kind
// ============================================================================

#[test]
fn rectangle_draws_two_indexed_triangles() {
    let (device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut polygon = Polygon::rectangle(Vec2::ZERO, Vec2::new(10.0, 10.0), Color::WHITE);
    assert_eq!(polygon.point_count(), 4);

    polygon.draw(&shader).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(
            c,
            Call::DrawElements {
                mode: Primitive::Triangles,
                count: 6,
                first_index: 0,
            }
        )),
        1
    );
}

#[test]
fn adding_a_corner_extends_the_fan() {
    let (device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut polygon = Polygon::rectangle(Vec2::ZERO, Vec2::new(10.0, 10.0), Color::WHITE);
    polygon.draw(&shader).unwrap();

    polygon.add_point(Vec2::new(-5.0, 5.0), Color::BLACK);
    assert_eq!(polygon.point_count(), 5);

    device.clear_calls();
    polygon.draw(&shader).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(
            c,
            Call::DrawElements {
                mode: Primitive::Triangles,
                count: 9,
                ..
            }
        )),
        1
    );
}

#[test]
fn degenerate_polygons_draw_nothing() {
    let (device, _context) = trace_context();
    let shader = Shader::new().unwrap();
    let mut polygon = Polygon::new();
    polygon.add_point(Vec2::ZERO, Color::WHITE);
    polygon.add_point(Vec2::new(1.0, 0.0), Color::WHITE);

    device.clear_calls();
    polygon.draw(&shader).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(c, Call::DrawElements { .. })),
        0
    );
}

#[test]
fn polygons_move_through_their_drawable() {
    let (_device, _context) = trace_context();
    let mut polygon = Polygon::triangle(
        Vec2::ZERO,
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Color::WHITE,
    );
    polygon.drawable_mut().set_position(Vec2::new(3.0, 4.0));
    let p = polygon.drawable_mut().transform(Vec2::ZERO);
    assert!((p - Vec2::new(3.0, 4.0)).length() < 1e-6);
}
