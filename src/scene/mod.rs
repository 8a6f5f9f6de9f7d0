//! Per-frame scene inputs: particles, lights and camera.
//!
//! Everything here is produced outside the pipeline and consumed read-only
//! by the BVH build and the tracer.

mod camera;
mod feed;
mod light;
mod particle;

pub use camera::{Camera, Ray};
pub(crate) use camera::frame_jitter;
pub use feed::{ParticleSource, SimulatorFeed, Snapshot};
pub use light::{LightSet, PointLight, MAX_LIGHTS};
pub use particle::{Particle, SceneBuffer, FLOATS_PER_PARTICLE};
