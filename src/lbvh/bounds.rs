//! Bottom-up bounds propagation with per-node arrival counters.
//!
//! One walk per leaf climbs the parent links. At each internal node the walk
//! bumps that node's counter: the first child to arrive stops there, the
//! second merges both child boxes, stores the result and keeps climbing.
//! Each internal box is therefore written exactly once, after both children
//! are final, with nothing but one atomic per node for synchronization.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use rayon::prelude::*;

use super::node::{BvhNode, NodeRef};
use crate::scene::Particle;
use crate::util::{Aabb, Vec3};

/// Box stored as raw float bits so walks on other threads can publish it.
#[derive(Debug, Default)]
struct AtomicAabb([AtomicU32; 6]);

impl AtomicAabb {
    #[inline]
    fn store(&self, b: &Aabb) {
        let v = [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z];
        for (slot, f) in self.0.iter().zip(v) {
            slot.store(f.to_bits(), Ordering::Relaxed);
        }
    }

    #[inline]
    fn load(&self) -> Aabb {
        let f = |i: usize| f32::from_bits(self.0[i].load(Ordering::Relaxed));
        Aabb::new(Vec3::new(f(0), f(1), f(2)), Vec3::new(f(3), f(4), f(5)))
    }
}

/// Per-frame scratch for propagation: one arrival counter and one box per
/// internal node. Allocated once and reused.
#[derive(Debug, Default)]
pub struct PropagationScratch {
    arrivals: Vec<AtomicU32>,
    boxes: Vec<AtomicAabb>,
}

impl PropagationScratch {
    pub fn with_internal_nodes(count: usize) -> Self {
        let mut s = Self::default();
        s.resize(count);
        s
    }

    fn resize(&mut self, count: usize) {
        if self.arrivals.len() != count {
            self.arrivals.resize_with(count, AtomicU32::default);
            self.boxes.resize_with(count, AtomicAabb::default);
        }
    }

    /// Arrivals recorded at `node` in the last propagation.
    pub fn arrivals(&self, node: usize) -> u32 {
        self.arrivals[node].load(Ordering::Relaxed)
    }

    /// Internal nodes whose counter is not exactly 2 after propagation.
    pub fn incomplete_nodes(&self) -> usize {
        self.arrivals
            .par_iter()
            .filter(|c| c.load(Ordering::Relaxed) != 2)
            .count()
    }
}

/// Propagate leaf boxes up to the root.
///
/// `nodes` holds `2N-1` records with leaves and children already built;
/// `parent_of` comes from the hierarchy builder. Internal boxes are
/// overwritten.
#[tracing::instrument(skip_all, fields(n = particles.len()))]
pub fn propagate_bounds(
    nodes: &mut [BvhNode],
    particles: &[Particle],
    parent_of: &[AtomicI32],
    scratch: &mut PropagationScratch,
) {
    let n = particles.len();
    if n < 2 {
        return;
    }
    let internal_count = n - 1;
    scratch.resize(internal_count);
    scratch
        .arrivals
        .par_iter()
        .for_each(|c| c.store(0, Ordering::Relaxed));

    {
        let nodes: &[BvhNode] = nodes;
        let scratch: &PropagationScratch = scratch;

        let child_box = |c: NodeRef| match c {
            NodeRef::Internal(i) => scratch.boxes[i as usize].load(),
            NodeRef::Leaf(p) => particles[p as usize].aabb(),
        };

        (0..n).into_par_iter().for_each(|leaf| {
            let mut node = parent_of[internal_count + leaf].load(Ordering::Relaxed);
            while node >= 0 {
                let idx = node as usize;
                // AcqRel: publishes this walk's box writes and, for the second
                // arrival, makes the sibling's writes visible
                if scratch.arrivals[idx].fetch_add(1, Ordering::AcqRel) == 0 {
                    return;
                }
                let (l, r) = nodes[idx].children();
                let merged = child_box(l).union(&child_box(r));
                scratch.boxes[idx].store(&merged);
                node = parent_of[idx].load(Ordering::Relaxed);
            }
        });
    }

    nodes[..internal_count]
        .par_iter_mut()
        .zip(scratch.boxes.par_iter())
        .for_each(|(node, b)| node.set_aabb(&b.load()));

    if cfg!(debug_assertions) {
        let incomplete = scratch.incomplete_nodes();
        if incomplete > 0 {
            tracing::warn!(incomplete, "bounds propagation left nodes without two arrivals");
        }
    }
}
