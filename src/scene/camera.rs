//! Camera transforms and primary ray generation.

use crate::util::{Mat4, Vec2, Vec3};

/// A ray with a precomputed reciprocal direction for slab tests.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
    pub inv_direction: Vec3,
}

impl Ray {
    /// Build a ray; `direction` is normalized here.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = direction.normalize();
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// View/projection state maintained outside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Inverse view matrix (world from view).
    pub inv_view: Mat4,
    /// Inverse projection matrix (view from clip).
    pub inv_proj: Mat4,
    /// Camera world position.
    pub position: Vec3,
}

impl Camera {
    /// Build from view and projection matrices.
    pub fn from_matrices(view: Mat4, proj: Mat4) -> Self {
        let inv_view = view.inverse();
        Self {
            inv_view,
            inv_proj: proj.inverse(),
            position: inv_view.w_axis.truncate(),
        }
    }

    /// Right-handed perspective camera looking at `target`. `fov_y` in radians.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        let proj = Mat4::perspective_rh(fov_y, aspect, 0.01, 1000.0);
        Self::from_matrices(view, proj)
    }

    /// Primary ray through pixel `(px, py)` of a `width` x `height` image.
    /// `jitter` is a sub-pixel offset in [-0.5, 0.5).
    pub fn primary_ray(&self, px: u32, py: u32, width: u32, height: u32, jitter: Vec2) -> Ray {
        let u = (px as f32 + 0.5 + jitter.x) / width as f32;
        let v = (py as f32 + 0.5 + jitter.y) / height as f32;
        let ndc = Vec3::new(u * 2.0 - 1.0, 1.0 - v * 2.0, 0.0);
        let view_target = self.inv_proj.project_point3(ndc);
        let dir = self.inv_view.transform_vector3(view_target);
        Ray::new(self.position, dir)
    }

    /// Largest absolute difference to another camera, across position and
    /// both matrices.
    pub fn max_delta(&self, other: &Camera) -> f32 {
        let pos = (self.position - other.position).abs().max_element();
        let view = self
            .inv_view
            .to_cols_array()
            .iter()
            .zip(other.inv_view.to_cols_array().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        let proj = self
            .inv_proj
            .to_cols_array()
            .iter()
            .zip(other.inv_proj.to_cols_array().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        pos.max(view).max(proj)
    }
}

/// Radical inverse of `index` in `base` (Halton sequence element).
pub(crate) fn halton(mut index: u32, base: u32) -> f32 {
    let mut f = 1.0f32;
    let mut r = 0.0f32;
    let inv_base = 1.0 / base as f32;
    while index > 0 {
        f *= inv_base;
        r += f * (index % base) as f32;
        index /= base;
    }
    r
}

/// Sub-pixel jitter for `frame`, Halton(2,3) centered on the pixel.
pub(crate) fn frame_jitter(frame: u64) -> Vec2 {
    // 1-based so frame 0 is not the degenerate (0, 0)
    let i = (frame % 64) as u32 + 1;
    Vec2::new(halton(i, 2) - 0.5, halton(i, 3) - 0.5)
}
