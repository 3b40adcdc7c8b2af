//! Fixed-height chunk of the wavelet octree.
//!
//! A chunk packs a perfect subtree of `chunk_height` levels into flat
//! arrays: one detail-coefficient slot and one has-child bit per node, plus
//! a lazily allocated array of child-chunk pointers hanging off the chunk's
//! bottom level. Nodes are addressed by [`LinearIndex`], computed from the
//! morton code of the query path.

use super::haar::DetailCoefficients;
use crate::core::tree_math::{level_size, tree_size};

/// Offset into a chunk's flat node array
pub type LinearIndex = usize;

/// Compact bitset sized at construction, one bit per chunk node.
#[derive(Clone, Debug, Default)]
pub struct Bitset {
    words: Vec<u64>,
    len: usize,
}

impl Bitset {
    /// Create a bitset of `len` cleared bits
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of bits
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the bitset holds no bits
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read bit `idx`
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    /// Write bit `idx`
    #[inline]
    pub fn set(&mut self, idx: usize, value: bool) {
        debug_assert!(idx < self.len);
        let mask = 1u64 << (idx % 64);
        if value {
            self.words[idx / 64] |= mask;
        } else {
            self.words[idx / 64] &= !mask;
        }
    }

    /// Clear all bits
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// True if any bit is set
    pub fn any(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }
}

/// One fixed-height chunk of the wavelet octree.
pub struct OctreeChunk {
    /// Number of levels packed into this chunk
    height: i32,
    /// Detail coefficients, one entry per internal node (`tree_size(height)`)
    node_details: Vec<DetailCoefficients>,
    /// Parallel has-at-least-one-child flags
    node_has_child: Bitset,
    /// Child chunks below the bottom level; empty until first allocation,
    /// `level_size(height)` entries afterwards
    children: Vec<Option<Box<OctreeChunk>>>,
}

impl OctreeChunk {
    /// Create an empty chunk with `height` internal levels
    pub fn new(height: i32) -> Self {
        debug_assert!(height > 0);
        let num_nodes = tree_size(height);
        Self {
            height,
            node_details: vec![DetailCoefficients::default(); num_nodes],
            node_has_child: Bitset::new(num_nodes),
            children: Vec::new(),
        }
    }

    /// Number of levels in this chunk
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of internal nodes
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.node_details.len()
    }

    /// Number of child-chunk slots below the bottom level
    #[inline]
    pub fn num_children(&self) -> usize {
        level_size(self.height)
    }

    /// Detail coefficients of the node at `idx`
    #[inline]
    pub fn node_details(&self, idx: LinearIndex) -> &DetailCoefficients {
        &self.node_details[idx]
    }

    /// Mutable detail coefficients of the node at `idx`
    #[inline]
    pub fn node_details_mut(&mut self, idx: LinearIndex) -> &mut DetailCoefficients {
        &mut self.node_details[idx]
    }

    /// Has-at-least-one-child flag of the node at `idx`
    #[inline]
    pub fn node_has_child(&self, idx: LinearIndex) -> bool {
        self.node_has_child.get(idx)
    }

    /// Set the has-at-least-one-child flag of the node at `idx`
    #[inline]
    pub fn set_node_has_child(&mut self, idx: LinearIndex, value: bool) {
        self.node_has_child.set(idx, value);
    }

    /// True if the child-pointer array has been allocated
    #[inline]
    pub fn has_children_array(&self) -> bool {
        !self.children.is_empty()
    }

    /// True if the child chunk at `lin` exists
    #[inline]
    pub fn has_child(&self, lin: LinearIndex) -> bool {
        self.children.get(lin).is_some_and(|c| c.is_some())
    }

    /// Child chunk at `lin`, if allocated
    #[inline]
    pub fn child(&self, lin: LinearIndex) -> Option<&OctreeChunk> {
        self.children.get(lin).and_then(|c| c.as_deref())
    }

    /// Mutable child chunk at `lin`, if allocated
    #[inline]
    pub fn child_mut(&mut self, lin: LinearIndex) -> Option<&mut OctreeChunk> {
        self.children.get_mut(lin).and_then(|c| c.as_deref_mut())
    }

    /// Child chunk at `lin`, allocating it (and the pointer array) on demand
    pub fn get_or_allocate_child(&mut self, lin: LinearIndex) -> &mut OctreeChunk {
        if self.children.is_empty() {
            self.children.resize_with(self.num_children(), || None);
        }
        let height = self.height;
        self.children[lin].get_or_insert_with(|| Box::new(OctreeChunk::new(height)))
    }

    /// Drop the child chunk at `lin`
    pub fn erase_child(&mut self, lin: LinearIndex) {
        if let Some(slot) = self.children.get_mut(lin) {
            *slot = None;
        }
    }

    /// Deallocate the whole child-pointer array
    pub fn delete_children_array(&mut self) {
        self.children = Vec::new();
    }

    /// True if any detail coefficient magnitude exceeds `threshold`
    pub fn has_nonzero_data(&self, threshold: f32) -> bool {
        self.node_details.iter().any(|d| d.is_nonzero(threshold))
    }

    /// Reset all node data and drop all children
    pub fn clear(&mut self) {
        self.node_details.fill(DetailCoefficients::default());
        self.node_has_child.clear();
        self.children = Vec::new();
    }

    /// Approximate heap footprint of this chunk and its descendants, in bytes
    pub fn memory_usage(&self) -> usize {
        let mut bytes = std::mem::size_of::<Self>()
            + self.node_details.capacity() * std::mem::size_of::<DetailCoefficients>()
            + self.node_has_child.words.capacity() * std::mem::size_of::<u64>()
            + self.children.capacity() * std::mem::size_of::<Option<Box<OctreeChunk>>>();
        for child in self.children.iter().flatten() {
            bytes += child.memory_usage();
        }
        bytes
    }
}
