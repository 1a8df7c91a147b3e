//! Ready-made drawable kinds built on [`crate::render::Drawable`].

pub mod polygon;

pub use polygon::Polygon;
