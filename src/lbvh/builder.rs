//! Per-frame LBVH builder.
//!
//! Owns every scratch buffer the build needs and overwrites all of them each
//! frame; nothing carries over between frames except allocations.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::bounds::{propagate_bounds, PropagationScratch};
use super::hierarchy::{build_internal_nodes, build_leaves};
use super::morton::{generate_keys, reduce_scene_bounds, MortonKey};
use super::node::{Bvh, BvhNode};
use super::sort::BitonicSorter;
use crate::config::SceneBounds;
use crate::scene::Particle;
use crate::util::{Aabb, Error, Result};

/// Largest particle count whose leaf references fit the signed child encoding.
pub const MAX_PARTICLES: usize = i32::MAX as usize;

/// Timings and counts from the last build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    pub particle_count: usize,
    /// Box the Morton codes were quantized against.
    pub scene_bounds: Aabb,
    pub morton: Duration,
    pub sort: Duration,
    pub leaves: Duration,
    pub internal: Duration,
    pub propagate: Duration,
    /// Passes issued, counting the local sort phase as one.
    pub dispatches: usize,
}

impl BuildStats {
    pub fn total(&self) -> Duration {
        self.morton + self.sort + self.leaves + self.internal + self.propagate
    }
}

/// Rebuilds the tree for a fixed particle count.
pub struct LbvhBuilder {
    particle_count: usize,
    scene_bounds: SceneBounds,
    sorter: BitonicSorter,
    keys: Vec<MortonKey>,
    parent_of: Vec<AtomicI32>,
    scratch: PropagationScratch,
    bvh: Bvh,
    stats: BuildStats,
}

impl LbvhBuilder {
    /// Allocate every buffer for `particle_count` particles.
    pub fn new(particle_count: usize, scene_bounds: SceneBounds, sort_block_size: usize) -> Result<Self> {
        if particle_count > MAX_PARTICLES {
            return Err(Error::CapacityExceeded {
                requested: particle_count,
                limit: MAX_PARTICLES,
            });
        }
        let sorter = BitonicSorter::new(sort_block_size)?;
        let node_count = (2 * particle_count).saturating_sub(1);

        Ok(Self {
            particle_count,
            scene_bounds,
            sorter,
            keys: Vec::with_capacity(particle_count.next_power_of_two()),
            parent_of: (0..node_count).map(|_| AtomicI32::new(-1)).collect(),
            scratch: PropagationScratch::with_internal_nodes(particle_count.saturating_sub(1)),
            bvh: Bvh {
                nodes: vec![BvhNode::UNSET; node_count],
                particle_count,
            },
            stats: BuildStats::default(),
        })
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    /// Run Morton → sort → leaves → internal nodes → bounds.
    #[tracing::instrument(skip_all, fields(n = particles.len()))]
    pub fn build(&mut self, particles: &[Particle]) -> Result<&Bvh> {
        let n = particles.len();
        if n != self.particle_count {
            return Err(Error::ParticleCountMismatch {
                expected: self.particle_count,
                actual: n,
            });
        }

        let mut stats = BuildStats {
            particle_count: n,
            ..Default::default()
        };

        let t = Instant::now();
        stats.scene_bounds = match self.scene_bounds {
            SceneBounds::Fixed { min, max } => Aabb::new(min, max),
            SceneBounds::Dynamic => reduce_scene_bounds(particles),
        };
        generate_keys(particles, &stats.scene_bounds, &mut self.keys);
        stats.morton = t.elapsed();

        let t = Instant::now();
        let report = self.sorter.sort(&mut self.keys);
        stats.sort = t.elapsed();
        stats.dispatches = report.dispatches();

        let internal_count = n.saturating_sub(1);
        let (internal, leaves) = self.bvh.nodes.split_at_mut(internal_count);

        let t = Instant::now();
        build_leaves(&self.keys, particles, leaves);
        stats.leaves = t.elapsed();

        let t = Instant::now();
        self.parent_of
            .par_iter()
            .for_each(|p| p.store(-1, Ordering::Relaxed));
        build_internal_nodes(&self.keys, internal, &self.parent_of);
        stats.internal = t.elapsed();

        let t = Instant::now();
        propagate_bounds(&mut self.bvh.nodes, particles, &self.parent_of, &mut self.scratch);
        stats.propagate = t.elapsed();

        // leaves, internal, propagation
        stats.dispatches += 3;
        self.stats = stats;

        tracing::debug!(
            n,
            morton_us = stats.morton.as_micros() as u64,
            sort_us = stats.sort.as_micros() as u64,
            internal_us = stats.internal.as_micros() as u64,
            propagate_us = stats.propagate.as_micros() as u64,
            dispatches = stats.dispatches,
            "lbvh built"
        );
        Ok(&self.bvh)
    }

    /// Tree from the last build.
    #[inline]
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    #[inline]
    pub fn last_stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Keys from the last build, in sorted order.
    #[inline]
    pub fn sorted_keys(&self) -> &[MortonKey] {
        &self.keys
    }

    /// Parent of node `index` from the last build (-1 for the root).
    pub fn parent_of(&self, index: usize) -> Option<i32> {
        self.parent_of.get(index).map(|p| p.load(Ordering::Relaxed))
    }
}

/// Build a tree in one call. Allocates fresh buffers; use [`LbvhBuilder`]
/// to reuse them across frames.
#[tracing::instrument(skip_all, fields(n = particles.len()))]
pub fn build_bvh(particles: &[Particle], scene_bounds: SceneBounds) -> Result<Bvh> {
    let mut builder = LbvhBuilder::new(particles.len(), scene_bounds, super::sort::DEFAULT_BLOCK_SIZE)?;
    builder.build(particles)?;
    Ok(builder.bvh)
}
