//! The hashed chunked wavelet octree: a hash map from block indices to
//! wavelet-octree blocks.
//!
//! Blocks are created lazily on first write and erased by `prune` once they
//! hold no observations. Each block carries its own read-write lock so that
//! maintenance and readers of distinct blocks can run in parallel; the hash
//! table itself is only mutated through `&mut self`, which excludes all
//! concurrent access to the map structure by borrow rules. Reads of absent
//! blocks return 0 log-odds, the unobserved state.

use super::config::MapConfig;
use crate::config::error::ConfigError;
use crate::core::index::{
    block_aabb, block_index_of, block_relative_index, OctreeIndex,
};
use crate::core::{BlockIndex, Point3D, Stopwatch};
use crate::tree::WaveletOctreeBlock;
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Shared handle to one block and its lock
pub type BlockHandle = Arc<RwLock<WaveletOctreeBlock>>;

/// Multi-resolution occupancy map backed by wavelet-compressed octree
/// blocks in a hash table.
pub struct HashedChunkedWaveletOctree {
    config: MapConfig,
    blocks: FnvHashMap<BlockIndex, BlockHandle>,
    /// Monotone version counter shared by all blocks' update stamps
    clock: Arc<AtomicU64>,
}

impl HashedChunkedWaveletOctree {
    /// Create an empty map; fails on an invalid configuration.
    pub fn new(config: MapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            blocks: FnvHashMap::default(),
            clock: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Map configuration
    #[inline]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Leaf cell width in meters
    #[inline]
    pub fn min_cell_width(&self) -> f32 {
        self.config.min_cell_width
    }

    /// Height of block roots above the leaf level
    #[inline]
    pub fn tree_height(&self) -> i32 {
        self.config.tree_height
    }

    /// Number of allocated blocks
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// True if no blocks are allocated
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over the indices of all allocated blocks
    pub fn block_indices(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.blocks.keys().copied()
    }

    /// True if a block is allocated at `block_index`
    pub fn has_block(&self, block_index: &BlockIndex) -> bool {
        self.blocks.contains_key(block_index)
    }

    /// Handle to the block at `block_index`, if allocated
    pub fn block(&self, block_index: &BlockIndex) -> Option<BlockHandle> {
        self.blocks.get(block_index).cloned()
    }

    /// Handle to the block at `block_index`, allocating it if absent
    pub fn get_or_allocate_block(&mut self, block_index: BlockIndex) -> BlockHandle {
        let config = &self.config;
        let clock = &self.clock;
        self.blocks
            .entry(block_index)
            .or_insert_with(|| {
                Arc::new(RwLock::new(WaveletOctreeBlock::new(
                    config.tree_height,
                    config.chunk_height,
                    config.min_log_odds,
                    config.max_log_odds,
                    Arc::clone(clock),
                )))
            })
            .clone()
    }

    /// Reconstructed value of the node at a world-space `index`.
    ///
    /// An absent block reads as 0 log-odds (unobserved).
    pub fn get_value_at(&self, index: &OctreeIndex) -> f32 {
        let block_index = block_index_of(index, self.config.tree_height);
        match self.blocks.get(&block_index) {
            Some(block) => block
                .read()
                .get_cell_value(&block_relative_index(index, self.config.tree_height)),
            None => 0.0,
        }
    }

    /// Set the node at a world-space `index` to `value`
    pub fn set_cell_value(&mut self, index: &OctreeIndex, value: f32) {
        let block_index = block_index_of(index, self.config.tree_height);
        let relative = block_relative_index(index, self.config.tree_height);
        let block = self.get_or_allocate_block(block_index);
        block.write().set_cell_value(&relative, value);
    }

    /// Add `update` to the node at a world-space `index`
    pub fn add_to_cell_value(&mut self, index: &OctreeIndex, update: f32) {
        let block_index = block_index_of(index, self.config.tree_height);
        let relative = block_relative_index(index, self.config.tree_height);
        let block = self.get_or_allocate_block(block_index);
        block.write().add_to_cell_value(&relative, update);
    }

    /// Threshold every dirty block (fast saturation pass)
    pub fn threshold(&self) {
        for block in self.blocks.values() {
            block.write().threshold();
        }
    }

    /// Prune every dirty block and erase blocks left without observations
    pub fn prune(&mut self) {
        let mut timer = Stopwatch::new();
        timer.start();
        let before = self.blocks.len();
        for block in self.blocks.values() {
            block.write().prune();
        }
        self.blocks.retain(|_, block| !block.read().is_empty());
        timer.stop();
        let erased = before - self.blocks.len();
        if erased > 0 {
            log::debug!(
                "prune: erased {} empty blocks, {} remain ({:.1} ms)",
                erased,
                self.blocks.len(),
                timer.last_episode_seconds() * 1e3
            );
        }
    }

    /// Erase all blocks
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Erase every block lying entirely outside a ball around `center`.
    ///
    /// Blocks straddling the boundary are kept whole; cropping is a coarse
    /// memory reclamation pass, not an exact carve.
    pub fn crop(&mut self, center: Point3D, radius: f32) {
        let mut timer = Stopwatch::new();
        timer.start();
        let before = self.blocks.len();
        let tree_height = self.config.tree_height;
        let min_cell_width = self.config.min_cell_width;
        self.blocks.retain(|block_index, _| {
            block_aabb(*block_index, tree_height, min_cell_width).intersects_ball(center, radius)
        });
        timer.stop();
        let erased = before - self.blocks.len();
        if erased > 0 {
            log::debug!(
                "crop: erased {} blocks outside {:.1}m of ({:.1}, {:.1}, {:.1}) ({:.1} ms)",
                erased,
                radius,
                center.x,
                center.y,
                center.z,
                timer.last_episode_seconds() * 1e3
            );
        }
    }

    /// Visit every leaf of every block at or above `termination_height`.
    ///
    /// Emitted indices are in world coordinates.
    pub fn for_each_leaf<F>(&self, termination_height: i32, visitor: &mut F)
    where
        F: FnMut(OctreeIndex, f32),
    {
        for (block_index, block) in &self.blocks {
            block
                .read()
                .for_each_leaf(*block_index, termination_height, visitor);
        }
    }

    /// Version stamp of the most recent mutation across all blocks.
    ///
    /// Publishers compare stamps between visits to detect changes; per-block
    /// stamps (via [`Self::block`]) narrow a change down to the blocks that
    /// carry it. An empty map reports 0.
    pub fn last_updated_stamp(&self) -> u64 {
        self.blocks
            .values()
            .map(|block| block.read().last_updated_stamp())
            .max()
            .unwrap_or(0)
    }

    /// Approximate heap footprint of the map in bytes
    pub fn memory_usage(&self) -> usize {
        self.blocks
            .values()
            .map(|block| block.read().memory_usage())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GridIndex;

    fn test_map() -> HashedChunkedWaveletOctree {
        HashedChunkedWaveletOctree::new(MapConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MapConfig {
            min_log_odds: 5.0,
            ..Default::default()
        };
        assert!(HashedChunkedWaveletOctree::new(config).is_err());
    }

    #[test]
    fn test_absent_block_reads_unknown() {
        let map = test_map();
        let index = OctreeIndex::leaf(GridIndex::new(100, -50, 3));
        assert_eq!(map.get_value_at(&index), 0.0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_set_get_across_blocks() {
        let mut map = test_map();
        // Leaves in different blocks, including negative coordinates
        let a = OctreeIndex::leaf(GridIndex::new(3, 3, 3));
        let b = OctreeIndex::leaf(GridIndex::new(-1, 0, 0));
        let c = OctreeIndex::leaf(GridIndex::new(200, 0, -130));
        map.set_cell_value(&a, 1.0);
        map.set_cell_value(&b, -0.5);
        map.set_cell_value(&c, 2.0);
        assert_eq!(map.num_blocks(), 3);
        assert!((map.get_value_at(&a) - 1.0).abs() < 1e-5);
        assert!((map.get_value_at(&b) + 0.5).abs() < 1e-5);
        assert!((map.get_value_at(&c) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_add_routes_to_same_block() {
        let mut map = test_map();
        let index = OctreeIndex::leaf(GridIndex::new(-70, 2, 9));
        map.add_to_cell_value(&index, 0.5);
        map.add_to_cell_value(&index, 0.5);
        assert_eq!(map.num_blocks(), 1);
        assert!((map.get_value_at(&index) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_prune_erases_empty_blocks() {
        let mut map = test_map();
        let index = OctreeIndex::leaf(GridIndex::new(5, 5, 5));
        map.set_cell_value(&index, 0.0);
        assert_eq!(map.num_blocks(), 1);
        map.prune();
        assert_eq!(map.num_blocks(), 0);
    }

    #[test]
    fn test_threshold_saturates_across_map() {
        let mut map = test_map();
        let index = OctreeIndex::leaf(GridIndex::new(5, 5, 5));
        map.add_to_cell_value(&index, 100.0);
        map.threshold();
        assert!((map.get_value_at(&index) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_clear() {
        let mut map = test_map();
        map.set_cell_value(&OctreeIndex::leaf(GridIndex::ZERO), 1.0);
        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_crop_keeps_nearby_blocks() {
        let mut map = test_map();
        // Block width is 6.4m; one block near the origin, one far away
        let near = OctreeIndex::leaf(GridIndex::new(1, 1, 1));
        let far = OctreeIndex::leaf(GridIndex::new(1000, 1000, 0));
        map.set_cell_value(&near, 1.0);
        map.set_cell_value(&far, 1.0);
        assert_eq!(map.num_blocks(), 2);
        map.crop(Point3D::ZERO, 10.0);
        assert_eq!(map.num_blocks(), 1);
        assert!((map.get_value_at(&near) - 1.0).abs() < 1e-5);
        assert_eq!(map.get_value_at(&far), 0.0);
    }

    #[test]
    fn test_stamps_increase_monotonically() {
        let mut map = test_map();
        assert_eq!(map.last_updated_stamp(), 0);
        let a = OctreeIndex::leaf(GridIndex::new(0, 0, 0));
        let b = OctreeIndex::leaf(GridIndex::new(100, 0, 0));
        map.set_cell_value(&a, 1.0);
        let block_a = map.block(&GridIndex::ZERO).unwrap();
        let stamp_a = block_a.read().last_updated_stamp();
        map.set_cell_value(&b, 1.0);
        let block_b = map.block(&GridIndex::new(1, 0, 0)).unwrap();
        let stamp_b = block_b.read().last_updated_stamp();
        assert!(stamp_a < stamp_b);
        // The map-wide stamp is the newest per-block stamp
        assert_eq!(map.last_updated_stamp(), stamp_b);
        map.set_cell_value(&a, 2.0);
        assert!(map.last_updated_stamp() > stamp_b);
    }

    #[test]
    fn test_for_each_leaf_world_indices() {
        let mut map = test_map();
        let index = OctreeIndex::leaf(GridIndex::new(-3, 70, 9));
        map.set_cell_value(&index, 1.5);
        map.threshold();
        let mut hits = 0;
        map.for_each_leaf(0, &mut |leaf, value| {
            if value.abs() > 1e-5 {
                assert_eq!(leaf, index);
                assert!((value - 1.5).abs() < 1e-5);
                hits += 1;
            }
        });
        assert_eq!(hits, 1);
    }
}
