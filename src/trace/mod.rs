//! Ray queries against the per-frame tree and the per-pixel tracer.

pub mod shade;
pub mod tracer;
pub mod traverse;

pub use shade::{background, speed_albedo, ShadingParams};
pub use tracer::RayTracer;
pub use traverse::{intersect_sphere, Hit, STACK_CAPACITY};
