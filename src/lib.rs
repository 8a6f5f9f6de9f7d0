//! # lbvh-render
//!
//! Real-time ray tracing of large, moving particle sets. Every frame the
//! bounding volume hierarchy is rebuilt from scratch as a linear BVH
//! (Morton codes, bitonic sort, Karras hierarchy, atomic bottom-up bounds),
//! traced per pixel, and blended into an exponentially accumulated HDR image.
//!
//! ## Modules
//!
//! - [`util`] - Errors, bounding boxes, glam re-exports
//! - [`config`] - Render configuration (JSON)
//! - [`scene`] - Particles, lights, camera, simulator feed
//! - [`lbvh`] - Per-frame LBVH construction
//! - [`trace`] - Traversal queries, shading, per-pixel tracer
//! - [`temporal`] - Exponential temporal accumulation
//! - [`output`] - Linear HDR image and export
//! - [`pipeline`] - The per-frame pipeline tying it together
//!
//! ## Example
//!
//! ```ignore
//! use lbvh_render::prelude::*;
//!
//! let mut pipeline = FramePipeline::new(RenderConfig::default(), particles.len())?;
//! let lights = LightSet::new(&[PointLight::new(Vec3::Y * 3.0, Vec3::ONE, 8.0, 12.0)])?;
//! let camera = Camera::look_at(Vec3::new(0.0, 1.0, -5.0), Vec3::ZERO, Vec3::Y, 0.8, 16.0 / 9.0);
//!
//! let image = pipeline.render(&FrameInput::new(&particles, &lights, &camera))?;
//! ```

pub mod config;
pub mod lbvh;
pub mod output;
pub mod pipeline;
pub mod scene;
pub mod temporal;
pub mod trace;
pub mod util;

// Re-export commonly used types
pub use config::{RenderConfig, SceneBounds};
pub use output::HdrImage;
pub use pipeline::{FrameInput, FramePipeline, FrameStats};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{RenderConfig, SceneBounds};
    pub use crate::lbvh::{build_bvh, Bvh, BvhNode, LbvhBuilder, NodeRef};
    pub use crate::output::HdrImage;
    pub use crate::pipeline::{FrameInput, FramePipeline, FrameStats};
    pub use crate::scene::{Camera, LightSet, Particle, ParticleSource, PointLight, Ray, SceneBuffer, SimulatorFeed};
    pub use crate::temporal::TemporalAccumulator;
    pub use crate::trace::Hit;
    pub use crate::util::{Aabb, Error, Result, Vec3};
}
