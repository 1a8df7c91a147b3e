//! Filled convex polygons.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::errors::Result;
use crate::gl::Primitive;
use crate::render::drawable::{Drawable, DrawableSource, RenderArgs};
use crate::render::shader::Shader;
use crate::render::vertex::{Color, Vertex};

/// One polygon corner.
#[derive(Clone, Copy, Debug)]
pub struct PolygonPoint {
    pub pos: Vec2,
    pub color: Color,
}

/// Geometry source of a [`Polygon`]: corners in winding order, triangulated
/// as a fan from the first one. Convex outlines render correctly; concave
/// ones are the caller's problem.
pub struct PolygonSource {
    points: Vec<PolygonPoint>,
}

impl PolygonSource {
    fn index_count(&self) -> usize {
        match self.points.len() {
            0..=2 => 0,
            n => (n - 2) * 3,
        }
    }
}

impl DrawableSource for PolygonSource {
    fn fill(&mut self, vertices: &mut [u8]) {
        for (chunk, point) in vertices
            .chunks_exact_mut(size_of::<Vertex>())
            .zip(&self.points)
        {
            let vertex = Vertex::colored(point.pos, point.color);
            chunk.copy_from_slice(bytemuck::bytes_of(&vertex));
        }
    }

    fn fill_indices(&mut self, indices: &mut [u32], base: u32) {
        for (triangle, i) in indices.chunks_exact_mut(3).zip(1..) {
            triangle.copy_from_slice(&[base, base + i, base + i + 1]);
        }
    }

    fn render(&mut self, args: RenderArgs<'_>) -> Result<()> {
        let count = self.index_count();
        if count > 0 {
            args.device
                .draw_elements(Primitive::Triangles, count, args.index_loc);
        }
        Ok(())
    }
}

/// A filled convex polygon with per-corner colors.
pub struct Polygon {
    drawable: Drawable,
}

impl Polygon {
    /// Number of segments circles are approximated with.
    const CIRCLE_STEPS: usize = 40;

    /// An empty polygon; add corners with [`Polygon::add_point`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_points(Vec::new())
    }

    /// An axis-aligned rectangle with its top-left corner at `pos`.
    #[must_use]
    pub fn rectangle(pos: Vec2, size: Vec2, color: Color) -> Self {
        Self::with_points(vec![
            PolygonPoint { pos, color },
            PolygonPoint {
                pos: pos + Vec2::new(size.x, 0.0),
                color,
            },
            PolygonPoint {
                pos: pos + size,
                color,
            },
            PolygonPoint {
                pos: pos + Vec2::new(0.0, size.y),
                color,
            },
        ])
    }

    #[must_use]
    pub fn triangle(a: Vec2, b: Vec2, c: Vec2, color: Color) -> Self {
        Self::with_points(vec![
            PolygonPoint { pos: a, color },
            PolygonPoint { pos: b, color },
            PolygonPoint { pos: c, color },
        ])
    }

    /// A circle approximated by [`Polygon::CIRCLE_STEPS`] segments.
    #[must_use]
    pub fn circle(center: Vec2, radius: f32, color: Color) -> Self {
        let points = (0..Self::CIRCLE_STEPS)
            .map(|i| {
                let angle = TAU * i as f32 / Self::CIRCLE_STEPS as f32;
                PolygonPoint {
                    pos: center + radius * Vec2::new(angle.cos(), angle.sin()),
                    color,
                }
            })
            .collect();
        Self::with_points(points)
    }

    /// A line segment rendered as a `width`-thick quad.
    #[must_use]
    pub fn line(from: Vec2, to: Vec2, width: f32, color: Color) -> Self {
        let dir = (to - from).normalize_or_zero();
        let normal = Vec2::new(-dir.y, dir.x) * (width / 2.0);
        Self::with_points(vec![
            PolygonPoint {
                pos: from + normal,
                color,
            },
            PolygonPoint {
                pos: to + normal,
                color,
            },
            PolygonPoint {
                pos: to - normal,
                color,
            },
            PolygonPoint {
                pos: from - normal,
                color,
            },
        ])
    }

    fn with_points(points: Vec<PolygonPoint>) -> Self {
        let mut polygon = Self {
            drawable: Drawable::new(PolygonSource { points }),
        };
        polygon.sync_counts();
        polygon
    }

    /// Appends a corner.
    pub fn add_point(&mut self, pos: Vec2, color: Color) {
        if let Some(source) = self.drawable.source_mut::<PolygonSource>() {
            source.points.push(PolygonPoint { pos, color });
        }
        self.sync_counts();
    }

    /// Recolors every corner.
    pub fn set_color(&mut self, color: Color) {
        if let Some(source) = self.drawable.source_mut::<PolygonSource>() {
            for point in &mut source.points {
                point.color = color;
            }
        }
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.drawable
            .source::<PolygonSource>()
            .map_or(0, |source| source.points.len())
    }

    /// The underlying drawable, for transform access.
    #[must_use]
    pub fn drawable(&self) -> &Drawable {
        &self.drawable
    }

    pub fn drawable_mut(&mut self) -> &mut Drawable {
        &mut self.drawable
    }

    pub fn draw(&mut self, fallback: &Shader) -> Result<()> {
        self.drawable.draw(fallback)
    }

    fn sync_counts(&mut self) {
        let (vertices, indices) = self
            .drawable
            .source::<PolygonSource>()
            .map_or((0, 0), |source| (source.points.len(), source.index_count()));
        self.drawable.set_vertex_count(vertices);
        self.drawable.set_index_count(indices);
    }
}

impl Default for Polygon {
    fn default() -> Self {
        Self::new()
    }
}
