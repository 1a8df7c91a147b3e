//! Transform math for the 2D pipeline.

mod matrix;

pub use matrix::Matrix;
