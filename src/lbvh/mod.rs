//! Linear BVH rebuilt from scratch every frame.
//!
//! ## Stages
//! ```text
//! particles → Morton keys → bitonic sort → leaves → Karras internal nodes → bounds propagation
//! ```
//!
//! Each stage is one or more data-parallel passes; a pass returning is the
//! point where all of its writes are visible to the next stage.

pub mod bounds;
pub mod builder;
pub mod hierarchy;
pub mod morton;
pub mod node;
pub mod sort;

pub use builder::{build_bvh, BuildStats, LbvhBuilder, MAX_PARTICLES};
pub use morton::MortonKey;
pub use node::{Bvh, BvhNode, NodeRef};
pub use sort::BitonicSorter;
