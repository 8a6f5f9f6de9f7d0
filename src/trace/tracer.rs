//! Per-pixel primary rays into a linear HDR frame.
//!
//! ## Usage
//! ```ignore
//! let tracer = RayTracer::new(ShadingParams::from_config(&config), config.jitter);
//! tracer.render(&bvh, particles, &lights, &camera, frame_index, &mut image);
//! ```

use rayon::prelude::*;

use super::shade::{background, shade_hit, ShadingParams};
use crate::lbvh::Bvh;
use crate::output::HdrImage;
use crate::scene::{frame_jitter, Camera, LightSet, Particle, Ray};
use crate::util::{Vec2, Vec3};

/// Traces one primary ray per pixel and shades the nearest hit.
#[derive(Debug, Clone, Copy)]
pub struct RayTracer {
    params: ShadingParams,
    jitter: bool,
}

impl RayTracer {
    pub fn new(params: ShadingParams, jitter: bool) -> Self {
        Self { params, jitter }
    }

    #[inline]
    pub fn params(&self) -> &ShadingParams {
        &self.params
    }

    /// Radiance along one ray.
    pub fn trace(&self, bvh: &Bvh, particles: &[Particle], lights: &LightSet, ray: &Ray) -> Vec3 {
        match bvh.intersect_nearest(particles, ray, self.params.ray_epsilon, f32::MAX) {
            Some(hit) => shade_hit(&self.params, bvh, particles, lights, ray, &hit),
            None => background(&self.params, ray.direction),
        }
    }

    /// Fill `out` with this frame's radiance. `frame_index` selects the
    /// sub-pixel jitter.
    #[tracing::instrument(skip_all, fields(w = out.width(), h = out.height()))]
    pub fn render(
        &self,
        bvh: &Bvh,
        particles: &[Particle],
        lights: &LightSet,
        camera: &Camera,
        frame_index: u64,
        out: &mut HdrImage,
    ) {
        let (width, height) = out.dimensions();
        if width == 0 {
            return;
        }
        let jitter = if self.jitter { frame_jitter(frame_index) } else { Vec2::ZERO };

        out.pixels_mut()
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let ray = camera.primary_ray(x as u32, y as u32, width, height, jitter);
                    *px = self.trace(bvh, particles, lights, &ray).extend(1.0);
                }
            });
    }
}
