//! Vertex layouts and the default 2D vertex type.
//!
//! A layout describes the per-vertex attribute list of one buffer family:
//! names (as declared by interoperating shaders), component kinds, and the
//! derived byte stride. Layouts are registered once in a process-wide
//! registry and referenced by a small copyable [`VertexLayoutId`] everywhere
//! else; buffers, slices and drawables only carry the tag.

use std::borrow::Cow;
use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::gl::AttribType;
use crate::render::shader;

/// Component kind of one vertex attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AttributeKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    /// Four unsigned bytes, normalized to `[0, 1]` in the shader.
    Color,
}

impl AttributeKind {
    /// Byte size of one attribute of this kind.
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::Float | Self::Color => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
        }
    }

    /// (component count, component type, normalized) for attribute-pointer
    /// setup.
    pub(crate) fn gl_format(self) -> (i32, AttribType, bool) {
        match self {
            Self::Float => (1, AttribType::F32, false),
            Self::Vec2 => (2, AttribType::F32, false),
            Self::Vec3 => (3, AttribType::F32, false),
            Self::Vec4 => (4, AttribType::F32, false),
            Self::Color => (4, AttribType::U8, true),
        }
    }
}

/// One named attribute of a vertex layout.
#[derive(Clone, Debug)]
pub struct VertexAttribute {
    /// Name the attribute is bound to in shader sources.
    pub name: Cow<'static, str>,
    pub kind: AttributeKind,
}

/// An ordered attribute list with a derived stride. Immutable once
/// registered.
#[derive(Clone, Debug, Default)]
pub struct VertexLayout {
    attributes: SmallVec<[VertexAttribute; 4]>,
}

impl VertexLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<Cow<'static, str>>, kind: AttributeKind) -> Self {
        self.attributes.push(VertexAttribute {
            name: name.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Byte size of one vertex of this layout.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.attributes.iter().map(|a| a.kind.byte_size()).sum()
    }

    /// Registers the layout, returning its process-wide tag.
    pub fn register(self) -> VertexLayoutId {
        let mut registry = REGISTRY.write();
        registry.push(self);
        VertexLayoutId(registry.len() - 1)
    }
}

/// Tag of a registered [`VertexLayout`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VertexLayoutId(usize);

static REGISTRY: RwLock<Vec<VertexLayout>> = RwLock::new(Vec::new());

/// Returns a copy of a registered layout.
///
/// # Panics
/// If the id does not come from [`VertexLayout::register`].
#[must_use]
pub fn layout(id: VertexLayoutId) -> VertexLayout {
    REGISTRY.read()[id.0].clone()
}

/// Byte stride of a registered layout.
#[must_use]
pub fn stride(id: VertexLayoutId) -> usize {
    REGISTRY.read()[id.0].stride()
}

/// The default 2D layout (position, color, texture coordinates), matching
/// [`Vertex`] and the reserved attribute names of the default shaders.
pub fn default_vertex_layout() -> VertexLayoutId {
    static DEFAULT: OnceLock<VertexLayoutId> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        VertexLayout::new()
            .with(shader::POSITION_ATTRIBUTE, AttributeKind::Vec2)
            .with(shader::COLOR_ATTRIBUTE, AttributeKind::Color)
            .with(shader::TEXCOORD_ATTRIBUTE, AttributeKind::Vec2)
            .register()
    })
}

/// An RGBA color with 8-bit channels.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The color as normalized floats, the form uniform setters expect.
    #[must_use]
    pub fn to_vec4(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }
}

/// The default 2D vertex, laid out to match [`default_vertex_layout`].
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub pos: Vec2,
    pub color: Color,
    pub tex: Vec2,
}

impl Vertex {
    /// An untextured vertex.
    #[must_use]
    pub fn colored(pos: Vec2, color: Color) -> Self {
        Self {
            pos,
            color,
            tex: Vec2::ZERO,
        }
    }

    #[must_use]
    pub fn textured(pos: Vec2, color: Color, tex: Vec2) -> Self {
        Self { pos, color, tex }
    }
}
