//! Octree node indexing and world-space conversions.
//!
//! An [`OctreeIndex`] names one node of the multi-resolution grid: `height`
//! selects the resolution level (0 = leaf, `tree_height` = block root) and
//! `position` is the integer cell index at that level. A node at height `h`
//! covers `2^h` leaf cells along each axis.

use super::aabb::Aabb;
use super::morton;
use super::point::{BlockIndex, GridIndex, Point3D};
use serde::{Deserialize, Serialize};

/// Number of children of an octree node
pub const NUM_CHILDREN: usize = 8;

/// Index of a single octree node: resolution level plus cell position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OctreeIndex {
    /// Height above the leaf level (0 = leaf)
    pub height: i32,
    /// Cell position at this height
    pub position: GridIndex,
}

impl OctreeIndex {
    /// Create an index from height and position
    #[inline]
    pub fn new(height: i32, position: GridIndex) -> Self {
        Self { height, position }
    }

    /// Leaf index at the given position
    #[inline]
    pub fn leaf(position: GridIndex) -> Self {
        Self {
            height: 0,
            position,
        }
    }

    /// Index of child `rel` (0..8; bit 0 = x, bit 1 = y, bit 2 = z)
    #[inline]
    pub fn compute_child_index(&self, rel: usize) -> OctreeIndex {
        debug_assert!(rel < NUM_CHILDREN);
        debug_assert!(self.height > 0);
        OctreeIndex {
            height: self.height - 1,
            position: GridIndex::new(
                (self.position.x << 1) + (rel & 1) as i32,
                (self.position.y << 1) + ((rel >> 1) & 1) as i32,
                (self.position.z << 1) + ((rel >> 2) & 1) as i32,
            ),
        }
    }

    /// Index of the ancestor at `parent_height`
    #[inline]
    pub fn compute_parent_index(&self, parent_height: i32) -> OctreeIndex {
        debug_assert!(parent_height >= self.height);
        OctreeIndex {
            height: parent_height,
            position: self.position.shr(parent_height - self.height),
        }
    }

    /// Morton code of the node's position, shifted to leaf scale so that
    /// the bit triple for any level can be extracted directly.
    ///
    /// The position must be non-negative (block-relative indices are).
    #[inline]
    pub fn leaf_scale_morton(&self) -> u64 {
        debug_assert!(self.position.x >= 0 && self.position.y >= 0 && self.position.z >= 0);
        morton::encode(
            self.position.x as u32,
            self.position.y as u32,
            self.position.z as u32,
        ) << (3 * self.height)
    }

    /// Edge length of the node in meters
    #[inline]
    pub fn node_width(&self, min_cell_width: f32) -> f32 {
        min_cell_width * (1u64 << self.height) as f32
    }

    /// World-space bounding box of the node
    pub fn node_aabb(&self, min_cell_width: f32) -> Aabb {
        let width = self.node_width(min_cell_width);
        let min = Point3D::new(
            self.position.x as f32 * width,
            self.position.y as f32 * width,
            self.position.z as f32 * width,
        );
        Aabb::new(min, min + Point3D::new(width, width, width))
    }

    /// World-space center of the node
    pub fn node_center(&self, min_cell_width: f32) -> Point3D {
        let width = self.node_width(min_cell_width);
        Point3D::new(
            (self.position.x as f32 + 0.5) * width,
            (self.position.y as f32 + 0.5) * width,
            (self.position.z as f32 + 0.5) * width,
        )
    }
}

/// Leaf index containing a world-space point
#[inline]
pub fn point_to_leaf_index(p: Point3D, min_cell_width: f32) -> GridIndex {
    GridIndex::new(
        (p.x / min_cell_width).floor() as i32,
        (p.y / min_cell_width).floor() as i32,
        (p.z / min_cell_width).floor() as i32,
    )
}

/// World-space center of a leaf cell
#[inline]
pub fn leaf_index_to_center(index: GridIndex, min_cell_width: f32) -> Point3D {
    Point3D::new(
        (index.x as f32 + 0.5) * min_cell_width,
        (index.y as f32 + 0.5) * min_cell_width,
        (index.z as f32 + 0.5) * min_cell_width,
    )
}

/// Block containing a node, for a map with the given tree height
#[inline]
pub fn block_index_of(node: &OctreeIndex, tree_height: i32) -> BlockIndex {
    debug_assert!(node.height <= tree_height);
    node.position.shr(tree_height - node.height)
}

/// Node index relative to its block's origin
#[inline]
pub fn block_relative_index(node: &OctreeIndex, tree_height: i32) -> OctreeIndex {
    let shift = tree_height - node.height;
    let block = node.position.shr(shift);
    OctreeIndex {
        height: node.height,
        position: node.position - block.shl(shift),
    }
}

/// Root node index of a block, in world coordinates
#[inline]
pub fn block_root_index(block: BlockIndex, tree_height: i32) -> OctreeIndex {
    OctreeIndex {
        height: tree_height,
        position: block,
    }
}

/// World-space bounding box of a whole block
pub fn block_aabb(block: BlockIndex, tree_height: i32, min_cell_width: f32) -> Aabb {
    block_root_index(block, tree_height).node_aabb(min_cell_width)
}
