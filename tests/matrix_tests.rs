//! Matrix tests
//!
//! Tests for:
//! - Identity and element access
//! - Post-multiplication order (right-to-left application to points)
//! - Translation, rotation, scaling
//! - The pivot composition used by drawables
//! - Orthographic projection mapping

use glam::Vec3;
use vitrail::Matrix;

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-4;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

// ============================================================================
// Basics
// ============================================================================

#[test]
fn identity_leaves_points_unchanged() {
    let m = Matrix::identity();
    let p = Vec3::new(3.0, -2.0, 7.5);
    assert_eq!(m.transform(p), p);
}

#[test]
fn get_set_round_trip() {
    let mut m = Matrix::identity();
    m.set(1, 3, 42.0);
    assert_eq!(m.get(1, 3), 42.0);
    assert_eq!(m.as_array()[7], 42.0);
}

#[test]
fn reset_restores_identity() {
    let mut m = Matrix::identity();
    m.translate(5.0, 6.0, 7.0);
    m.reset();
    assert_eq!(m, Matrix::identity());
}

#[test]
fn copy_from_replaces_contents() {
    let mut a = Matrix::identity();
    let mut b = Matrix::identity();
    b.scale(2.0, 3.0, 4.0);
    a.copy_from(&b);
    assert_eq!(a, b);
}

// ============================================================================
// Individual operations
// ============================================================================

#[test]
fn translate_offsets_points() {
    let mut m = Matrix::identity();
    m.translate(10.0, -4.0, 2.0);
    assert!(vec3_approx(
        m.transform(Vec3::new(1.0, 1.0, 1.0)),
        Vec3::new(11.0, -3.0, 3.0)
    ));
}

#[test]
fn scale_multiplies_components() {
    let mut m = Matrix::identity();
    m.scale(2.0, 3.0, 1.0);
    assert!(vec3_approx(
        m.transform(Vec3::new(4.0, 5.0, 6.0)),
        Vec3::new(8.0, 15.0, 6.0)
    ));
}

#[test]
fn rotate_90_about_z_maps_x_to_y() {
    let mut m = Matrix::identity();
    m.rotate(90.0, 0.0, 0.0, 1.0);
    assert!(vec3_approx(
        m.transform(Vec3::new(1.0, 0.0, 0.0)),
        Vec3::new(0.0, 1.0, 0.0)
    ));
}

#[test]
fn rotate_normalizes_the_axis() {
    let mut a = Matrix::identity();
    a.rotate(30.0, 0.0, 0.0, 1.0);
    let mut b = Matrix::identity();
    b.rotate(30.0, 0.0, 0.0, 5.0);
    let p = Vec3::new(2.0, 1.0, 0.0);
    assert!(vec3_approx(a.transform(p), b.transform(p)));
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn operations_apply_right_to_left() {
    // scale recorded second, so it hits the point first
    let mut m = Matrix::identity();
    m.translate(10.0, 0.0, 0.0);
    m.scale(2.0, 2.0, 1.0);
    assert!(vec3_approx(
        m.transform(Vec3::new(1.0, 1.0, 0.0)),
        Vec3::new(12.0, 2.0, 0.0)
    ));
}

#[test]
fn pivot_composition_places_the_origin_at_the_position() {
    // translate(10, 5) . rotate(90) . scale(2) . translate(-1, -1)
    let mut m = Matrix::identity();
    m.translate(10.0, 5.0, 0.0);
    m.rotate(90.0, 0.0, 0.0, 1.0);
    m.scale(2.0, 2.0, 1.0);
    m.translate(-1.0, -1.0, 0.0);

    // The pivot itself lands exactly on the position.
    assert!(vec3_approx(
        m.transform(Vec3::new(1.0, 1.0, 0.0)),
        Vec3::new(10.0, 5.0, 0.0)
    ));
    // One unit right of the pivot: scaled to 2, rotated up.
    assert!(vec3_approx(
        m.transform(Vec3::new(2.0, 1.0, 0.0)),
        Vec3::new(10.0, 7.0, 0.0)
    ));
}

// ============================================================================
// Orthographic projection
// ============================================================================

#[test]
fn ortho_maps_the_rect_corners_to_clip_space() {
    // y-down screen coordinates: top is 0, bottom is 600
    let mut m = Matrix::identity();
    m.set_ortho(0.0, 800.0, 600.0, 0.0);
    assert!(vec3_approx(
        m.transform(Vec3::new(0.0, 0.0, 0.0)),
        Vec3::new(-1.0, 1.0, 0.0)
    ));
    assert!(vec3_approx(
        m.transform(Vec3::new(800.0, 600.0, 0.0)),
        Vec3::new(1.0, -1.0, 0.0)
    ));
    assert!(vec3_approx(
        m.transform(Vec3::new(400.0, 300.0, 0.0)),
        Vec3::new(0.0, 0.0, 0.0)
    ));
}

#[test]
fn ortho_overwrites_previous_contents() {
    let mut m = Matrix::identity();
    m.translate(100.0, 100.0, 0.0);
    m.set_ortho(-1.0, 1.0, -1.0, 1.0);
    let p = Vec3::new(0.5, 0.5, 0.0);
    assert!(vec3_approx(m.transform(p), Vec3::new(0.5, 0.5, 0.0)));
}
