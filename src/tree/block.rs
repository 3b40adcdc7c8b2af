//! One top-level block of the hashed map: a chunked wavelet octree.
//!
//! The block stores log-odds occupancy in Haar-wavelet form. Every internal
//! node holds seven detail coefficients; the scale coefficient of the block
//! root lives outside the chunk tree (the root has no parent to store it).
//! Reconstructing any leaf walks root-to-leaf applying
//! `backward_single_child` at each level, so a write at one leaf touches
//! exactly one node per level.
//!
//! Writes mark the block dirty; the periodic `threshold` (fast, saturates
//! leaves to the configured log-odds bounds) and `prune` (slower, frees
//! all-zero subtrees) passes restore the compact form.

use super::chunk::{LinearIndex, OctreeChunk};
use super::haar;
use crate::core::index::{block_root_index, OctreeIndex};
use crate::core::tree_math::{level_size, tree_size};
use crate::core::{morton, BlockIndex, NUM_CHILDREN};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Detail coefficients with magnitude below this threshold count as zero
/// during thresholding and pruning.
pub const NONZERO_COEFFICIENT_THRESHOLD: f32 = 1e-3;

/// Linear index of the node at `height` inside a chunk whose root sits at
/// `chunk_top`, along the path encoded by a block-relative leaf-scale
/// morton code.
#[inline]
fn node_index_in_chunk(morton_code: u64, chunk_top: i32, height: i32) -> LinearIndex {
    tree_size(chunk_top - height) + morton::level_traversal_distance(morton_code, chunk_top, height)
}

/// One wavelet-octree block.
pub struct WaveletOctreeBlock {
    tree_height: i32,
    chunk_height: i32,
    min_log_odds: f32,
    max_log_odds: f32,
    root_scale: f32,
    root_chunk: OctreeChunk,
    needs_thresholding: bool,
    needs_pruning: bool,
    last_updated_stamp: u64,
    clock: Arc<AtomicU64>,
}

impl WaveletOctreeBlock {
    /// Create an empty block.
    ///
    /// `tree_height` must be a positive multiple of `chunk_height`; the map
    /// validates this at construction.
    pub fn new(
        tree_height: i32,
        chunk_height: i32,
        min_log_odds: f32,
        max_log_odds: f32,
        clock: Arc<AtomicU64>,
    ) -> Self {
        debug_assert!(chunk_height > 0);
        debug_assert!(tree_height > 0 && tree_height % chunk_height == 0);
        debug_assert!(min_log_odds < max_log_odds);
        Self {
            tree_height,
            chunk_height,
            min_log_odds,
            max_log_odds,
            root_scale: 0.0,
            root_chunk: OctreeChunk::new(chunk_height),
            needs_thresholding: false,
            needs_pruning: false,
            last_updated_stamp: 0,
            clock,
        }
    }

    /// Height of the block root above the leaf level
    #[inline]
    pub fn tree_height(&self) -> i32 {
        self.tree_height
    }

    /// Number of levels per chunk
    #[inline]
    pub fn chunk_height(&self) -> i32 {
        self.chunk_height
    }

    /// Scale coefficient of the block root (the block-wide average)
    #[inline]
    pub fn root_scale(&self) -> f32 {
        self.root_scale
    }

    /// Root chunk, for snapshot export
    #[inline]
    pub fn root_chunk(&self) -> &OctreeChunk {
        &self.root_chunk
    }

    /// Mutable root chunk, for snapshot restore
    #[inline]
    pub(crate) fn root_chunk_mut(&mut self) -> &mut OctreeChunk {
        &mut self.root_chunk
    }

    /// Overwrite the root scale, for snapshot restore
    #[inline]
    pub(crate) fn set_root_scale(&mut self, root_scale: f32) {
        self.root_scale = root_scale;
    }

    /// True if a threshold pass is pending
    #[inline]
    pub fn needs_thresholding(&self) -> bool {
        self.needs_thresholding
    }

    /// True if a prune pass is pending
    #[inline]
    pub fn needs_pruning(&self) -> bool {
        self.needs_pruning
    }

    /// Version stamp of the last mutation, for change detection
    #[inline]
    pub fn last_updated_stamp(&self) -> u64 {
        self.last_updated_stamp
    }

    /// True if the block holds no observations: no chunk content and an
    /// unobserved (near-zero) root average.
    pub fn is_empty(&self) -> bool {
        !self.root_chunk.has_children_array()
            && !self
                .root_chunk
                .has_nonzero_data(NONZERO_COEFFICIENT_THRESHOLD)
            && self.root_scale.abs() < NONZERO_COEFFICIENT_THRESHOLD
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.root_chunk.memory_usage()
    }

    fn touch(&mut self) {
        self.last_updated_stamp = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
    }

    fn mark_dirty(&mut self) {
        self.needs_thresholding = true;
        self.needs_pruning = true;
        self.touch();
    }

    /// Reconstructed value of the node at `index` (block-relative).
    ///
    /// Stops refining where chunks are absent; the remaining detail
    /// coefficients are zero there, so the value is already exact.
    pub fn get_cell_value(&self, index: &OctreeIndex) -> f32 {
        debug_assert!((0..=self.tree_height).contains(&index.height));
        let morton_code = index.leaf_scale_morton();
        let mut value = self.root_scale;
        let mut chunk = &self.root_chunk;
        let mut chunk_top = self.tree_height;
        while index.height < chunk_top {
            let chunk_bottom = chunk_top - chunk.height();
            let stop_parent = (index.height + 1).max(chunk_bottom + 1);
            for parent_height in (stop_parent..=chunk_top).rev() {
                let node_idx = node_index_in_chunk(morton_code, chunk_top, parent_height);
                let child_idx = morton::relative_child_index(morton_code, parent_height);
                value =
                    haar::backward_single_child(value, chunk.node_details(node_idx), child_idx);
            }
            if index.height >= chunk_bottom {
                break;
            }
            let lin = morton::level_traversal_distance(morton_code, chunk_top, chunk_bottom);
            match chunk.child(lin) {
                Some(child) => {
                    chunk = child;
                    chunk_top = chunk_bottom;
                }
                None => break,
            }
        }
        value
    }

    /// Set the node at `index` (block-relative) to `new_value`.
    ///
    /// Descends while reconstructing the current value, then distributes the
    /// difference back up through every ancestor's coefficients.
    pub fn set_cell_value(&mut self, index: &OctreeIndex, new_value: f32) {
        debug_assert!((0..=self.tree_height).contains(&index.height));
        debug_assert!(new_value.is_finite());
        self.mark_dirty();
        let morton_code = index.leaf_scale_morton();
        let root_scale = self.root_scale;
        self.root_scale += Self::set_in_chunk(
            &mut self.root_chunk,
            self.tree_height,
            morton_code,
            index.height,
            new_value,
            root_scale,
        );
    }

    /// Recursive worker for `set_cell_value`; returns the scale contribution
    /// for the parent chunk.
    fn set_in_chunk(
        chunk: &mut OctreeChunk,
        chunk_top: i32,
        morton_code: u64,
        target_height: i32,
        new_value: f32,
        incoming_value: f32,
    ) -> f32 {
        let chunk_bottom = chunk_top - chunk.height();
        let stop_parent = (target_height + 1).max(chunk_bottom + 1);

        // Decompress along the path to find the current value
        let mut value = incoming_value;
        for parent_height in (stop_parent..=chunk_top).rev() {
            let node_idx = node_index_in_chunk(morton_code, chunk_top, parent_height);
            let child_idx = morton::relative_child_index(morton_code, parent_height);
            value = haar::backward_single_child(value, chunk.node_details(node_idx), child_idx);
        }

        let mut scale = if target_height < chunk_bottom {
            let lin = morton::level_traversal_distance(morton_code, chunk_top, chunk_bottom);
            let child = chunk.get_or_allocate_child(lin);
            Self::set_in_chunk(child, chunk_bottom, morton_code, target_height, new_value, value)
        } else {
            new_value - value
        };

        // Ascend, folding the change into each ancestor's coefficients
        for parent_height in stop_parent..=chunk_top {
            let node_idx = node_index_in_chunk(morton_code, chunk_top, parent_height);
            let child_idx = morton::relative_child_index(morton_code, parent_height);
            let parent = haar::forward_single_child(scale, child_idx);
            *chunk.node_details_mut(node_idx) += parent.details;
            chunk.set_node_has_child(node_idx, true);
            scale = parent.scale;
        }
        scale
    }

    /// Add `update` to the node at `index` (block-relative).
    ///
    /// Like `set_cell_value`, but the descent only allocates chunks; no
    /// decompression is needed since the transform is linear.
    pub fn add_to_cell_value(&mut self, index: &OctreeIndex, update: f32) {
        debug_assert!((0..=self.tree_height).contains(&index.height));
        debug_assert!(update.is_finite());
        self.mark_dirty();
        let morton_code = index.leaf_scale_morton();
        self.root_scale += Self::add_in_chunk(
            &mut self.root_chunk,
            self.tree_height,
            morton_code,
            index.height,
            update,
        );
    }

    fn add_in_chunk(
        chunk: &mut OctreeChunk,
        chunk_top: i32,
        morton_code: u64,
        target_height: i32,
        update: f32,
    ) -> f32 {
        let chunk_bottom = chunk_top - chunk.height();
        let mut scale = if target_height < chunk_bottom {
            let lin = morton::level_traversal_distance(morton_code, chunk_top, chunk_bottom);
            let child = chunk.get_or_allocate_child(lin);
            Self::add_in_chunk(child, chunk_bottom, morton_code, target_height, update)
        } else {
            update
        };
        let stop_parent = (target_height + 1).max(chunk_bottom + 1);
        for parent_height in stop_parent..=chunk_top {
            let node_idx = node_index_in_chunk(morton_code, chunk_top, parent_height);
            let child_idx = morton::relative_child_index(morton_code, parent_height);
            let parent = haar::forward_single_child(scale, child_idx);
            *chunk.node_details_mut(node_idx) += parent.details;
            chunk.set_node_has_child(node_idx, true);
            scale = parent.scale;
        }
        scale
    }

    /// Saturate all leaves to `[min_log_odds, max_log_odds]` and re-encode.
    ///
    /// Idempotent; a no-op unless a write happened since the last pass.
    pub fn threshold(&mut self) {
        if !self.needs_thresholding {
            return;
        }
        let (scale, _) = Self::threshold_chunk(
            &mut self.root_chunk,
            self.root_scale,
            self.min_log_odds,
            self.max_log_odds,
        );
        self.root_scale = scale;
        self.needs_thresholding = false;
    }

    /// Recursive threshold over one chunk.
    ///
    /// Decompresses the chunk's subtree into a scratch array of
    /// `tree_size(chunk_height + 1)` scale coefficients, recurses into child
    /// chunks at the boundary (clamping leaves where no child exists), then
    /// recompresses bottom-up while rebuilding the has-child flags.
    /// Returns the chunk's new root scale and whether the chunk carries any
    /// nonzero content.
    fn threshold_chunk(
        chunk: &mut OctreeChunk,
        scale_coefficient: f32,
        min_log_odds: f32,
        max_log_odds: f32,
    ) -> (f32, bool) {
        let height = chunk.height();
        let scratch_len = tree_size(height + 1);
        let mut scales = vec![0.0f32; scratch_len];
        let mut nonzero = vec![false; scratch_len];
        scales[0] = scale_coefficient;

        // Decompress level by level
        for level in 0..height {
            let first = tree_size(level);
            let last = tree_size(level + 1);
            for rel in 0..level_size(level) {
                let src = first + rel;
                let children = haar::backward(scales[src], chunk.node_details(src));
                scales[last + NUM_CHILDREN * rel..last + NUM_CHILDREN * (rel + 1)]
                    .copy_from_slice(&children);
            }
        }

        // Boundary: recurse into child chunks, clamp bare leaves
        let first_leaf = tree_size(height);
        for child_lin in 0..chunk.num_children() {
            let scratch_idx = first_leaf + child_lin;
            if let Some(child) = chunk.child_mut(child_lin) {
                let (scale, is_nonzero) =
                    Self::threshold_chunk(child, scales[scratch_idx], min_log_odds, max_log_odds);
                scales[scratch_idx] = scale;
                nonzero[scratch_idx] = is_nonzero;
            } else {
                scales[scratch_idx] = scales[scratch_idx].clamp(min_log_odds, max_log_odds);
            }
        }

        // Recompress bottom-up, rebuilding flags from the children
        for level in (0..height).rev() {
            let first = tree_size(level);
            let last = tree_size(level + 1);
            for rel in (0..level_size(level)).rev() {
                let src = last + NUM_CHILDREN * rel;
                let mut child_scales = [0.0f32; NUM_CHILDREN];
                child_scales.copy_from_slice(&scales[src..src + NUM_CHILDREN]);
                let has_nonzero_child = nonzero[src..src + NUM_CHILDREN].iter().any(|b| *b);

                let parent = haar::forward(&child_scales);
                let dst = first + rel;
                scales[dst] = parent.scale;
                *chunk.node_details_mut(dst) = parent.details;
                chunk.set_node_has_child(dst, has_nonzero_child);
                nonzero[dst] = has_nonzero_child
                    || parent.details.is_nonzero(NONZERO_COEFFICIENT_THRESHOLD);
            }
        }

        (scales[0], nonzero[0])
    }

    /// Free subtrees that no longer carry information.
    ///
    /// Runs `threshold` first so that saturation clears residual noise, then
    /// recursively deletes child chunks that are childless with all detail
    /// magnitudes below the nonzero threshold.
    pub fn prune(&mut self) {
        if !self.needs_pruning {
            return;
        }
        self.threshold();
        Self::prune_chunk(&mut self.root_chunk);
        self.needs_pruning = false;
    }

    fn prune_chunk(chunk: &mut OctreeChunk) {
        if !chunk.has_children_array() {
            return;
        }
        let mut has_at_least_one_child = false;
        for lin in 0..chunk.num_children() {
            let Some(child) = chunk.child_mut(lin) else {
                continue;
            };
            Self::prune_chunk(child);
            let prunable = !child.has_children_array()
                && !child.has_nonzero_data(NONZERO_COEFFICIENT_THRESHOLD);
            if prunable {
                chunk.erase_child(lin);
            } else {
                has_at_least_one_child = true;
            }
        }
        if !has_at_least_one_child {
            chunk.delete_children_array();
        }
    }

    /// Reset the block to the empty state
    pub fn clear(&mut self) {
        self.root_scale = 0.0;
        self.root_chunk.clear();
        self.touch();
    }

    /// Visit every leaf at or above `termination_height`.
    ///
    /// At each node the eight child scales are reconstructed with the
    /// backward transform. Children that exist in the chunk structure and
    /// sit above the termination height are descended into; all others are
    /// emitted to the visitor with their reconstructed scale, which at an
    /// internal node is the subtree's average. Emitted indices are in world
    /// coordinates (offset by `block_index`). Each leaf is seen exactly
    /// once; ordering is unspecified.
    pub fn for_each_leaf<F>(
        &self,
        block_index: BlockIndex,
        termination_height: i32,
        visitor: &mut F,
    ) where
        F: FnMut(OctreeIndex, f32),
    {
        debug_assert!(termination_height >= 0);
        if self.is_empty() {
            return;
        }

        struct StackElement<'a> {
            index: OctreeIndex,
            chunk: &'a OctreeChunk,
            chunk_top: i32,
            scale: f32,
        }
        let mut stack = vec![StackElement {
            index: block_root_index(block_index, self.tree_height),
            chunk: &self.root_chunk,
            chunk_top: self.tree_height,
            scale: self.root_scale,
        }];

        while let Some(element) = stack.pop() {
            let depth = element.chunk_top - element.index.height;
            let rel = element.index.position.mask((1 << depth) - 1);
            let level_offset =
                morton::encode(rel.x as u32, rel.y as u32, rel.z as u32) as LinearIndex;
            let node_idx = tree_size(depth) + level_offset;
            let node_flag = element.chunk.node_has_child(node_idx);
            let child_scales =
                haar::backward(element.scale, element.chunk.node_details(node_idx));

            for rel_child in 0..NUM_CHILDREN {
                let child_index = element.index.compute_child_index(rel_child);
                let child_scale = child_scales[rel_child];

                let child_location = if !node_flag {
                    None
                } else if depth + 1 < element.chunk.height() {
                    Some((element.chunk, element.chunk_top))
                } else {
                    let child_rel = child_index.position.mask((1 << (depth + 1)) - 1);
                    let lin = morton::encode(
                        child_rel.x as u32,
                        child_rel.y as u32,
                        child_rel.z as u32,
                    ) as LinearIndex;
                    element
                        .chunk
                        .child(lin)
                        .map(|child| (child, element.chunk_top - element.chunk.height()))
                };

                match child_location {
                    Some((chunk, chunk_top)) if termination_height < child_index.height => {
                        stack.push(StackElement {
                            index: child_index,
                            chunk,
                            chunk_top,
                            scale: child_scale,
                        });
                    }
                    _ => visitor(child_index, child_scale),
                }
            }
        }
    }
}
