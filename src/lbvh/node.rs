//! BVH node layout and the per-frame tree.
//!
//! Flat array layout, GPU-uploadable:
//! - 32-byte nodes (two per cache line)
//! - `[0, N-2]` internal nodes, root at 0
//! - `[N-1, 2N-2]` leaves in Morton order

use bytemuck::{Pod, Zeroable};

use crate::util::{Aabb, Vec3};

/// Flat BVH node (32 bytes).
///
/// Internal node: `left_child` / `right_child` hold encoded [`NodeRef`]s.
/// Leaf node: `left_child` = wrapped particle index, `right_child` = -1.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: Vec3,
    pub left_child: i32,
    pub aabb_max: Vec3,
    pub right_child: i32,
}

impl BvhNode {
    /// Placeholder written before a node is built.
    pub const UNSET: Self = Self {
        aabb_min: Vec3::splat(f32::INFINITY),
        left_child: -1,
        aabb_max: Vec3::splat(f32::NEG_INFINITY),
        right_child: -1,
    };

    /// Leaf record wrapping `particle`.
    #[inline]
    pub fn leaf(particle: u32, bounds: Aabb) -> Self {
        Self {
            aabb_min: bounds.min,
            left_child: particle as i32,
            aabb_max: bounds.max,
            right_child: -1,
        }
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.aabb_min, self.aabb_max)
    }

    #[inline]
    pub fn set_aabb(&mut self, b: &Aabb) {
        self.aabb_min = b.min;
        self.aabb_max = b.max;
    }

    /// Decoded children. Only meaningful on internal nodes.
    #[inline]
    pub fn children(&self) -> (NodeRef, NodeRef) {
        (NodeRef::decode(self.left_child), NodeRef::decode(self.right_child))
    }
}

/// Child reference: an internal node index or a leaf wrapping a particle.
///
/// Stored in a node as a signed integer: `>= 0` is an internal node index,
/// `-(particle) - 1` is a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Internal(u32),
    Leaf(u32),
}

impl NodeRef {
    #[inline]
    pub fn encode(self) -> i32 {
        match self {
            NodeRef::Internal(i) => i as i32,
            NodeRef::Leaf(p) => -(p as i32) - 1,
        }
    }

    #[inline]
    pub fn decode(raw: i32) -> Self {
        if raw >= 0 {
            NodeRef::Internal(raw as u32)
        } else {
            NodeRef::Leaf((-(raw + 1)) as u32)
        }
    }
}

/// The tree for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bvh {
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) particle_count: usize,
}

impl Bvh {
    /// All nodes, internal first then leaves.
    #[inline]
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Nodes as bytes for upload.
    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn internal_count(&self) -> usize {
        self.particle_count.saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particle_count == 0
    }

    /// Index of the first leaf node.
    #[inline]
    pub fn first_leaf(&self) -> usize {
        self.internal_count()
    }

    /// True if node `index` is a leaf record.
    #[inline]
    pub fn is_leaf_node(&self, index: usize) -> bool {
        index >= self.internal_count()
    }

    /// Root reference; `None` for an empty tree. With one particle the root
    /// is that particle's leaf.
    pub fn root(&self) -> Option<NodeRef> {
        match self.particle_count {
            0 => None,
            1 => Some(NodeRef::Leaf(self.nodes[0].left_child as u32)),
            _ => Some(NodeRef::Internal(0)),
        }
    }

    /// Box of the whole tree.
    pub fn root_aabb(&self) -> Aabb {
        self.nodes.first().map(BvhNode::aabb).unwrap_or(Aabb::EMPTY)
    }

    /// Children of an internal node, `None` for leaves and out-of-range indices.
    pub fn children(&self, index: usize) -> Option<(NodeRef, NodeRef)> {
        (index < self.internal_count()).then(|| self.nodes[index].children())
    }

    /// Particles in leaf order (Morton order).
    pub fn leaf_particles(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes[self.first_leaf().min(self.nodes.len())..]
            .iter()
            .map(|n| n.left_child as u32)
    }
}
