//! Cached point-query reader for repeated lookups with spatial locality.

use super::hashed::{BlockHandle, HashedChunkedWaveletOctree};
use crate::core::index::{block_index_of, block_relative_index, OctreeIndex};
use crate::core::BlockIndex;

/// Read accessor that memoizes the last block lookup.
///
/// Query patterns with spatial locality (ray walks, neighborhood scans)
/// mostly stay inside one block, so caching the hash lookup removes it from
/// the hot path. Results are identical to
/// [`HashedChunkedWaveletOctree::get_value_at`]; blocks allocated after the
/// accelerator was created are still found, since misses always fall back to
/// the map.
pub struct QueryAccelerator<'a> {
    map: &'a HashedChunkedWaveletOctree,
    cached: Option<(BlockIndex, BlockHandle)>,
}

impl<'a> QueryAccelerator<'a> {
    /// Create an accelerator over `map`
    pub fn new(map: &'a HashedChunkedWaveletOctree) -> Self {
        Self { map, cached: None }
    }

    /// Reconstructed value of the node at a world-space `index`
    pub fn get_value_at(&mut self, index: &OctreeIndex) -> f32 {
        let block_index = block_index_of(index, self.map.tree_height());
        let cached_hit = matches!(&self.cached, Some((cached, _)) if *cached == block_index);
        if !cached_hit {
            match self.map.block(&block_index) {
                Some(handle) => self.cached = Some((block_index, handle)),
                None => {
                    // Do not cache absence: the block may appear later
                    self.cached = None;
                    return 0.0;
                }
            }
        }
        let (_, handle) = self.cached.as_ref().unwrap();
        handle
            .read()
            .get_cell_value(&block_relative_index(index, self.map.tree_height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GridIndex;
    use crate::map::config::MapConfig;

    #[test]
    fn test_matches_direct_queries() {
        let mut map = HashedChunkedWaveletOctree::new(MapConfig::default()).unwrap();
        let indices = [
            OctreeIndex::leaf(GridIndex::new(0, 0, 0)),
            OctreeIndex::leaf(GridIndex::new(1, 0, 0)),
            OctreeIndex::leaf(GridIndex::new(-100, 5, 63)),
            OctreeIndex::leaf(GridIndex::new(64, 64, 64)),
        ];
        for (i, index) in indices.iter().enumerate() {
            map.set_cell_value(index, i as f32 * 0.5 - 1.0);
        }
        map.prune();

        let mut accelerator = QueryAccelerator::new(&map);
        for index in &indices {
            assert_eq!(accelerator.get_value_at(index), map.get_value_at(index));
        }
        // Queries at coarser heights and in absent blocks agree too
        let coarse = OctreeIndex::new(3, GridIndex::ZERO);
        assert_eq!(accelerator.get_value_at(&coarse), map.get_value_at(&coarse));
        let absent = OctreeIndex::leaf(GridIndex::new(5000, 0, 0));
        assert_eq!(accelerator.get_value_at(&absent), 0.0);
    }

    #[test]
    fn test_repeated_queries_in_one_block() {
        let mut map = HashedChunkedWaveletOctree::new(MapConfig::default()).unwrap();
        let index = OctreeIndex::leaf(GridIndex::new(10, 20, 30));
        map.set_cell_value(&index, 2.0);

        let mut accelerator = QueryAccelerator::new(&map);
        for dx in 0..8 {
            let query = OctreeIndex::leaf(GridIndex::new(10 + dx, 20, 30));
            assert_eq!(accelerator.get_value_at(&query), map.get_value_at(&query));
        }
    }
}
