//! 30-bit Morton keys over a fixed scene box.

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

use crate::scene::Particle;
use crate::util::{Aabb, UVec3, Vec3};

/// Quantization cells per axis (10 bits).
pub const GRID_RESOLUTION: f32 = 1024.0;

/// Upper clamp of the normalized coordinate, keeps the cell index below 1024.
const MAX_UNIT: f32 = 0.999;

/// Smallest extent used for quantization, so a flat or point-sized box
/// still maps to a defined cell.
const MIN_EXTENT: f32 = 1e-6;

/// Sort record: Morton code plus the particle it came from.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct MortonKey {
    pub code: u32,
    pub index: u32,
}

impl MortonKey {
    /// All-ones key used to pad the sort up to a power of two.
    /// Sorts after every real key (real codes use 30 bits).
    pub const PADDING: Self = Self {
        code: u32::MAX,
        index: u32::MAX,
    };
}

/// Spread the low 10 bits of `v` so two zero bits sit between each.
#[inline]
pub fn expand_bits(v: u32) -> u32 {
    let mut v = v & 0x3ff;
    v = v.wrapping_mul(0x0001_0001) & 0xff00_00ff;
    v = v.wrapping_mul(0x0000_0101) & 0x0f00_f00f;
    v = v.wrapping_mul(0x0000_0011) & 0xc30c_30c3;
    v = v.wrapping_mul(0x0000_0005) & 0x4924_9249;
    v
}

/// Interleave three 10-bit cell indices into a 30-bit code (x highest).
#[inline]
pub fn interleave(q: UVec3) -> u32 {
    (expand_bits(q.x) << 2) | (expand_bits(q.y) << 1) | expand_bits(q.z)
}

/// Cell of `p` inside `bounds`. Outside points clamp to the border cells;
/// NaN components land in cell 0.
#[inline]
pub fn quantize(p: Vec3, bounds: &Aabb) -> UVec3 {
    let extent = bounds.size().max(Vec3::splat(MIN_EXTENT));
    let unit = (p - bounds.min) / extent;
    let unit = Vec3::select(unit.is_nan_mask(), Vec3::ZERO, unit);
    (unit.clamp(Vec3::ZERO, Vec3::splat(MAX_UNIT)) * GRID_RESOLUTION).as_uvec3()
}

/// Morton code of a point.
#[inline]
pub fn morton_code(p: Vec3, bounds: &Aabb) -> u32 {
    interleave(quantize(p, bounds))
}

/// Write one `(code, index)` pair per particle into `out`.
#[tracing::instrument(skip_all, fields(n = particles.len()))]
pub fn generate_keys(particles: &[Particle], bounds: &Aabb, out: &mut Vec<MortonKey>) {
    out.clear();
    particles
        .par_iter()
        .enumerate()
        .map(|(i, p)| MortonKey {
            code: morton_code(p.position, bounds),
            index: i as u32,
        })
        .collect_into_vec(out);
}

/// Box around every finite particle center. Falls back to the unit cube
/// when there is nothing finite to enclose.
#[tracing::instrument(skip_all, fields(n = particles.len()))]
pub fn reduce_scene_bounds(particles: &[Particle]) -> Aabb {
    let b = particles
        .par_iter()
        .filter(|p| p.position.is_finite())
        .map(|p| Aabb::new(p.position, p.position))
        .reduce(|| Aabb::EMPTY, |a, b| a.union(&b));
    if b.is_empty() {
        Aabb::new(Vec3::ZERO, Vec3::ONE)
    } else {
        b
    }
}
