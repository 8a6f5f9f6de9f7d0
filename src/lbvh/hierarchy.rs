//! Karras (2012) parallel hierarchy construction.
//!
//! Every internal node `i` in `[0, N-2]` derives its key range and split
//! from the sorted codes alone, so all nodes are built independently.
//! Parent links are scattered into an atomic array; each node has exactly
//! one parent, so no two writers touch the same slot.

use std::sync::atomic::{AtomicI32, Ordering};

use rayon::prelude::*;

use super::morton::MortonKey;
use super::node::{BvhNode, NodeRef};
use crate::scene::Particle;

/// Common-prefix length of the keys at sorted positions `a` and `b`.
///
/// Returns -1 when `b` is outside `[0, N)`. Equal codes fall back to the
/// prefix of the positions themselves, offset by 32, so runs of duplicate
/// codes still split in a well-defined order.
#[inline]
pub fn delta(keys: &[MortonKey], a: i64, b: i64) -> i32 {
    let n = keys.len() as i64;
    if a < 0 || a >= n || b < 0 || b >= n {
        return -1;
    }
    let ka = keys[a as usize].code;
    let kb = keys[b as usize].code;
    if ka == kb {
        32 + ((a as u32) ^ (b as u32)).leading_zeros() as i32
    } else {
        (ka ^ kb).leading_zeros() as i32
    }
}

/// Sorted range `[first, last]` covered by internal node `i`.
pub fn determine_range(keys: &[MortonKey], i: i64) -> (i64, i64) {
    let n = keys.len() as i64;

    // Grow towards the neighbour sharing the longer prefix
    let d: i64 = if delta(keys, i, i + 1) > delta(keys, i, i - 1) { 1 } else { -1 };
    let delta_min = delta(keys, i, i - d);

    let mut l_max: i64 = 2;
    while l_max < n && delta(keys, i, i + l_max * d) > delta_min {
        l_max <<= 1;
    }

    let mut l: i64 = 0;
    let mut t = l_max >> 1;
    while t > 0 {
        if delta(keys, i, i + (l + t) * d) > delta_min {
            l += t;
        }
        t >>= 1;
    }

    let j = i + l * d;
    (i.min(j), i.max(j))
}

/// Last position of the left half of `[first, last]`: the highest position
/// whose prefix with `first` is still longer than the whole range's prefix.
pub fn find_split(keys: &[MortonKey], first: i64, last: i64) -> i64 {
    let common = delta(keys, first, last);
    let mut split = first;
    let mut step = last - first;
    loop {
        step = (step + 1) >> 1;
        let candidate = split + step;
        if candidate < last && delta(keys, first, candidate) > common {
            split = candidate;
        }
        if step <= 1 {
            break;
        }
    }
    split
}

/// Children of internal node `i`, as `(left, right, split)`.
pub fn node_children(keys: &[MortonKey], i: i64) -> (NodeRef, NodeRef, i64) {
    let (first, last) = determine_range(keys, i);
    let split = find_split(keys, first, last);

    let left = if split == first {
        NodeRef::Leaf(keys[split as usize].index)
    } else {
        NodeRef::Internal(split as u32)
    };
    let right = if split + 1 == last {
        NodeRef::Leaf(keys[(split + 1) as usize].index)
    } else {
        NodeRef::Internal((split + 1) as u32)
    };
    (left, right, split)
}

/// Fill leaf records `[N-1, 2N-2]` in sorted order with their particle boxes.
#[tracing::instrument(skip_all, fields(n = keys.len()))]
pub fn build_leaves(keys: &[MortonKey], particles: &[Particle], leaves: &mut [BvhNode]) {
    leaves
        .par_iter_mut()
        .zip(keys.par_iter())
        .for_each(|(leaf, key)| {
            let p = &particles[key.index as usize];
            *leaf = BvhNode::leaf(key.index, p.aabb());
        });
}

/// Compute children of every internal node and record parent links.
///
/// `parent_of` is indexed by node index (leaf for sorted position `s` is
/// `N-1+s`); the root gets -1.
#[tracing::instrument(skip_all, fields(n = keys.len()))]
pub fn build_internal_nodes(keys: &[MortonKey], internal: &mut [BvhNode], parent_of: &[AtomicI32]) {
    let n = keys.len();
    if n < 2 {
        return;
    }
    let first_leaf = n - 1;

    internal.par_iter_mut().enumerate().for_each(|(i, node)| {
        let (left, right, split) = node_children(keys, i as i64);
        node.left_child = left.encode();
        node.right_child = right.encode();

        let left_slot = match left {
            NodeRef::Internal(c) => c as usize,
            NodeRef::Leaf(_) => first_leaf + split as usize,
        };
        let right_slot = match right {
            NodeRef::Internal(c) => c as usize,
            NodeRef::Leaf(_) => first_leaf + split as usize + 1,
        };
        parent_of[left_slot].store(i as i32, Ordering::Relaxed);
        parent_of[right_slot].store(i as i32, Ordering::Relaxed);
    });

    parent_of[0].store(-1, Ordering::Relaxed);
}
