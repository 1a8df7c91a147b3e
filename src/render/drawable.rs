//! Transformable, lazily-uploaded drawables.
//!
//! A [`Drawable`] pairs a geometry source with a cached transform and with
//! slices of the shared vertex/index pools. Two independent dirty flags keep
//! per-frame work minimal: geometry is refilled and re-uploaded only after
//! [`Drawable::mark_changed`] (or a mutation that implies it), and the model
//! matrix is recomputed only after a transform parameter changed. Redrawing
//! an unchanged drawable touches neither.

use std::any::Any;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::errors::Result;
use crate::gl::Device;
use crate::math::Matrix;
use crate::render::buffer_slice::BufferSlice;
use crate::render::context::Context;
use crate::render::index_buffer::IndexBufferSlice;
use crate::render::shader::{Shader, UniformId};
use crate::render::vertex::VertexLayoutId;

/// Everything a [`DrawableSource::render`] hook needs to issue its draw
/// calls: the slices are already bound, uniforms already set.
pub struct RenderArgs<'a> {
    pub device: &'a dyn Device,
    /// First vertex of this drawable inside the bound vertex buffer.
    pub vertex_loc: usize,
    /// First index of this drawable inside the bound index buffer.
    pub index_loc: usize,
    /// The shader in use for this draw.
    pub shader: &'a Shader,
}

/// The geometry half of a drawable: produces vertex and index data on demand
/// and issues the draw calls.
pub trait DrawableSource: Any {
    /// Writes the drawable's vertices into `vertices`, which holds exactly
    /// the declared vertex count at the drawable's layout stride.
    ///
    /// Called with the pool borrowed: the hook must not create, resize or
    /// drop buffer slices.
    fn fill(&mut self, vertices: &mut [u8]);

    /// Writes the drawable's indices into `indices`, already offset by
    /// `base` (the drawable's first vertex in the shared buffer). The same
    /// restriction as [`DrawableSource::fill`] applies.
    fn fill_indices(&mut self, indices: &mut [u32], base: u32) {
        let _ = (indices, base);
    }

    /// Issues the draw calls. The default draws nothing, which suits sources
    /// that only exist to be batched by a parent.
    fn render(&mut self, args: RenderArgs<'_>) -> Result<()> {
        let _ = args;
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum MatrixState {
    /// A transform parameter changed since the matrix was last computed.
    Stale,
    /// The cached matrix matches the transform parameters.
    Fresh,
    /// A caller-supplied matrix is pinned; parameter changes are ignored.
    Overridden,
}

pub struct Drawable {
    source: Box<dyn DrawableSource>,
    layout: VertexLayoutId,
    vertex_count: usize,
    index_count: usize,
    slice: Option<BufferSlice>,
    index_slice: Option<IndexBufferSlice>,
    shader: Option<Arc<Shader>>,
    matrix: Matrix,
    matrix_state: MatrixState,
    has_changed: bool,
    use_texture: bool,
    pos: Vec2,
    origin: Vec2,
    scale: Vec2,
    angle: f32,
    z: f32,
}

impl Drawable {
    /// A drawable over the default 2D vertex layout. Starts dirty so the
    /// first draw uploads its geometry.
    pub fn new(source: impl DrawableSource) -> Self {
        Self::with_layout(source, crate::render::vertex::default_vertex_layout())
    }

    pub fn with_layout(source: impl DrawableSource, layout: VertexLayoutId) -> Self {
        Self {
            source: Box::new(source),
            layout,
            vertex_count: 0,
            index_count: 0,
            slice: None,
            index_slice: None,
            shader: None,
            matrix: Matrix::identity(),
            matrix_state: MatrixState::Stale,
            has_changed: true,
            use_texture: false,
            pos: Vec2::ZERO,
            origin: Vec2::ZERO,
            scale: Vec2::ONE,
            angle: 0.0,
            z: 0.0,
        }
    }

    #[must_use]
    pub fn layout(&self) -> VertexLayoutId {
        self.layout
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Declares how many vertices [`DrawableSource::fill`] will produce.
    /// Changing the count marks the drawable dirty.
    pub fn set_vertex_count(&mut self, count: usize) {
        if count == self.vertex_count {
            return;
        }
        self.vertex_count = count;
        self.has_changed = true;
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Declares how many indices [`DrawableSource::fill_indices`] will
    /// produce. Changing the count marks the drawable dirty.
    pub fn set_index_count(&mut self, count: usize) {
        if count == self.index_count {
            return;
        }
        self.index_count = count;
        self.has_changed = true;
    }

    /// Replaces the geometry source and marks the drawable dirty.
    pub fn set_source(&mut self, source: impl DrawableSource) {
        self.source = Box::new(source);
        self.has_changed = true;
    }

    /// The source, if it is a `T`.
    #[must_use]
    pub fn source<T: DrawableSource>(&self) -> Option<&T> {
        (&*self.source as &dyn Any).downcast_ref()
    }

    /// Mutable access to the source, if it is a `T`. A successful downcast
    /// marks the drawable dirty, since the caller presumably mutates it.
    pub fn source_mut<T: DrawableSource>(&mut self) -> Option<&mut T> {
        let source = (&mut *self.source as &mut dyn Any).downcast_mut();
        if source.is_some() {
            self.has_changed = true;
        }
        source
    }

    /// Forces a refill and re-upload at the next draw.
    pub fn mark_changed(&mut self) {
        self.has_changed = true;
    }

    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    // ------------------------------------------------------------------
    // Shader and texturing
    // ------------------------------------------------------------------

    /// Attaches a shader; `None` falls back to the one passed to
    /// [`Drawable::draw`].
    pub fn set_shader(&mut self, shader: Option<Arc<Shader>>) {
        self.shader = shader;
    }

    #[must_use]
    pub fn shader(&self) -> Option<&Arc<Shader>> {
        self.shader.as_ref()
    }

    /// Declares whether this drawable samples the bound texture. Takes
    /// effect at the next draw without dirtying the geometry.
    pub fn set_textured(&mut self, textured: bool) {
        self.use_texture = textured;
    }

    #[must_use]
    pub fn is_textured(&self) -> bool {
        self.use_texture
    }

    // ------------------------------------------------------------------
    // Transform
    // ------------------------------------------------------------------

    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
        self.parameters_changed();
    }

    /// The local point that position, rotation and scaling are relative to.
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
        self.parameters_changed();
    }

    #[must_use]
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
        self.parameters_changed();
    }

    /// Rotation around the origin, in degrees.
    #[must_use]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
        self.parameters_changed();
    }

    /// Depth used for ordering; becomes the transformed z coordinate.
    #[must_use]
    pub fn z(&self) -> f32 {
        self.z
    }

    pub fn set_z(&mut self, z: f32) {
        self.z = z;
        self.parameters_changed();
    }

    fn parameters_changed(&mut self) {
        if self.matrix_state != MatrixState::Overridden {
            self.matrix_state = MatrixState::Stale;
        }
    }

    /// Pins an explicit transform, ignoring the parameter-derived one until
    /// cleared with `None` (which recomputes from the parameters).
    pub fn set_matrix(&mut self, matrix: Option<&Matrix>) {
        match matrix {
            Some(matrix) => {
                self.matrix.copy_from(matrix);
                self.matrix_state = MatrixState::Overridden;
            }
            None => self.matrix_state = MatrixState::Stale,
        }
    }

    /// The current transform, recomputed from the parameters if stale.
    pub fn matrix(&mut self) -> &Matrix {
        if self.matrix_state == MatrixState::Stale {
            self.update_matrix();
        }
        &self.matrix
    }

    /// Applies the current transform to a point.
    pub fn transform(&mut self, point: Vec2) -> Vec2 {
        self.matrix().transform(Vec3::new(point.x, point.y, 0.0)).truncate()
    }

    /// translate(pos, z) ∘ rotate(angle) ∘ scale ∘ translate(-origin).
    fn update_matrix(&mut self) {
        self.matrix.reset();
        self.matrix.translate(self.pos.x, self.pos.y, self.z);
        self.matrix.rotate(self.angle, 0.0, 0.0, 1.0);
        self.matrix.scale(self.scale.x, self.scale.y, 1.0);
        self.matrix.translate(-self.origin.x, -self.origin.y, 0.0);
        self.matrix_state = MatrixState::Fresh;
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Draws using the drawable's own pool slices.
    ///
    /// Dirty geometry is refilled and uploaded first; a stale matrix is
    /// recomputed. `fallback` is used when no shader is attached. The
    /// effective shader receives the model-view matrix, and the texturing
    /// flag when the drawable carries its own shader (a shared fallback's
    /// flag is managed by whoever owns the pass).
    pub fn draw(&mut self, fallback: &Shader) -> Result<()> {
        if self.has_changed {
            self.fill_own_buffer()?;
            self.fill_own_index_buffer()?;
            self.has_changed = false;
        }
        if self.matrix_state == MatrixState::Stale {
            self.update_matrix();
        }

        let own_shader = self.shader.clone();
        let effective = own_shader.as_deref().unwrap_or(fallback);
        effective.set_matrix_id(UniformId::ModelView, &self.matrix)?;
        if own_shader.is_some() {
            effective.set_bool_id(UniformId::TextureEnabled, self.use_texture)?;
        }

        let mut vertex_loc = 0;
        if let Some(slice) = &self.slice {
            if self.vertex_count > 0 {
                slice.bind();
            }
            vertex_loc = slice.loc();
        }
        let mut index_loc = 0;
        if let Some(slice) = &self.index_slice {
            if self.index_count > 0 {
                slice.bind();
            }
            index_loc = slice.loc();
        }

        let context = Context::ensure()?;
        let device = Arc::clone(context.device());
        self.source.render(RenderArgs {
            device: &*device,
            vertex_loc,
            index_loc,
            shader: effective,
        })
    }

    /// Draws from externally managed buffers: no slice management, no
    /// refill. The caller has bound its own buffers and passes where this
    /// drawable's data lives in them. Matrix and uniforms are still applied.
    pub fn draw_at(&mut self, vertex_loc: usize, index_loc: usize, fallback: &Shader) -> Result<()> {
        if self.matrix_state == MatrixState::Stale {
            self.update_matrix();
        }

        let own_shader = self.shader.clone();
        let effective = own_shader.as_deref().unwrap_or(fallback);
        effective.set_matrix_id(UniformId::ModelView, &self.matrix)?;
        if own_shader.is_some() {
            effective.set_bool_id(UniformId::TextureEnabled, self.use_texture)?;
        }

        let context = Context::ensure()?;
        let device = Arc::clone(context.device());
        self.source.render(RenderArgs {
            device: &*device,
            vertex_loc,
            index_loc,
            shader: effective,
        })
    }

    /// Fills this drawable's vertices into the staging bytes of the pool.
    /// Called internally when drawing. `fill_indices` is called from
    /// [`Drawable::draw`] after this, so index data can reference the final
    /// vertex location.
    pub fn fill_own_buffer(&mut self) -> Result<()> {
        if self.slice.is_none() {
            self.slice = Some(BufferSlice::new(self.layout, self.vertex_count)?);
        }
        let Some(slice) = self.slice.as_mut() else {
            return Ok(());
        };
        slice.recreate(self.vertex_count);
        if self.vertex_count == 0 {
            return Ok(());
        }
        let source = &mut self.source;
        slice.write(|bytes| source.fill(bytes));
        slice.update();
        Ok(())
    }

    /// Fills this drawable's indices, pre-offset by the vertex slice's
    /// current location.
    pub fn fill_own_index_buffer(&mut self) -> Result<()> {
        if self.index_slice.is_none() {
            if self.index_count == 0 {
                return Ok(());
            }
            self.index_slice = Some(IndexBufferSlice::new(self.index_count)?);
        }
        let base = self.slice.as_ref().map_or(0, BufferSlice::loc) as u32;
        let Some(slice) = self.index_slice.as_mut() else {
            return Ok(());
        };
        slice.recreate(self.index_count);
        if self.index_count == 0 {
            return Ok(());
        }
        let source = &mut self.source;
        slice.write(|indices| source.fill_indices(indices, base));
        slice.update();
        Ok(())
    }
}
