//! Utility types shared by every stage of the frame pipeline.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Aabb`] and math type re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
