//! Self-contained block snapshots for serialization collaborators.
//!
//! A snapshot captures one block's wavelet tree — root scale, per-chunk
//! detail arrays, child flags, and sparse child links — as plain serde
//! value types, so a block round-trips without referencing the map it came
//! from. No wire format is mandated here; callers pick a serde backend.

use crate::core::BlockIndex;
use crate::map::HashedChunkedWaveletOctree;
use crate::tree::{DetailCoefficients, OctreeChunk, WaveletOctreeBlock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot restore errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The snapshot geometry does not match the receiving map
    #[error("snapshot geometry mismatch: {0}")]
    GeometryMismatch(String),
}

/// Serializable form of one octree chunk and its descendants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    /// Detail coefficients per node, in linear-index order
    pub details: Vec<DetailCoefficients>,
    /// Has-at-least-one-child flags per node
    pub has_child_flags: Vec<bool>,
    /// Allocated child chunks as (linear index, snapshot) pairs
    pub children: Vec<(u32, ChunkSnapshot)>,
}

impl ChunkSnapshot {
    fn capture(chunk: &OctreeChunk) -> Self {
        let details = (0..chunk.num_nodes())
            .map(|idx| *chunk.node_details(idx))
            .collect();
        let has_child_flags = (0..chunk.num_nodes())
            .map(|idx| chunk.node_has_child(idx))
            .collect();
        let mut children = Vec::new();
        if chunk.has_children_array() {
            for lin in 0..chunk.num_children() {
                if let Some(child) = chunk.child(lin) {
                    children.push((lin as u32, ChunkSnapshot::capture(child)));
                }
            }
        }
        Self {
            details,
            has_child_flags,
            children,
        }
    }

    fn restore_into(&self, chunk: &mut OctreeChunk) -> Result<(), SnapshotError> {
        if self.details.len() != chunk.num_nodes()
            || self.has_child_flags.len() != chunk.num_nodes()
        {
            return Err(SnapshotError::GeometryMismatch(format!(
                "chunk holds {} nodes, snapshot has {}",
                chunk.num_nodes(),
                self.details.len()
            )));
        }
        for (idx, details) in self.details.iter().enumerate() {
            *chunk.node_details_mut(idx) = *details;
        }
        for (idx, flag) in self.has_child_flags.iter().enumerate() {
            chunk.set_node_has_child(idx, *flag);
        }
        for (lin, child_snapshot) in &self.children {
            let lin = *lin as usize;
            if chunk.num_children() <= lin {
                return Err(SnapshotError::GeometryMismatch(format!(
                    "child index {} out of range for {} slots",
                    lin,
                    chunk.num_children()
                )));
            }
            child_snapshot.restore_into(chunk.get_or_allocate_child(lin))?;
        }
        Ok(())
    }
}

/// Serializable form of one block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockSnapshot {
    /// Height of the block root above the leaf level
    pub tree_height: i32,
    /// Levels per chunk
    pub chunk_height: i32,
    /// Root scale coefficient
    pub root_scale: f32,
    /// Chunk tree in depth-first order
    pub root_chunk: ChunkSnapshot,
}

/// Capture a block into a snapshot
pub fn snapshot_block(block: &WaveletOctreeBlock) -> BlockSnapshot {
    BlockSnapshot {
        tree_height: block.tree_height(),
        chunk_height: block.chunk_height(),
        root_scale: block.root_scale(),
        root_chunk: ChunkSnapshot::capture(block.root_chunk()),
    }
}

impl HashedChunkedWaveletOctree {
    /// Capture the block at `block_index` into a snapshot, if allocated
    pub fn block_snapshot(&self, block_index: &BlockIndex) -> Option<BlockSnapshot> {
        self.block(block_index)
            .map(|handle| snapshot_block(&handle.read()))
    }

    /// Restore a snapshot into the block at `block_index`, replacing its
    /// content. Fails if the snapshot geometry does not match the map.
    pub fn restore_block_snapshot(
        &mut self,
        block_index: BlockIndex,
        snapshot: &BlockSnapshot,
    ) -> Result<(), SnapshotError> {
        if snapshot.tree_height != self.tree_height()
            || snapshot.chunk_height != self.config().chunk_height
        {
            return Err(SnapshotError::GeometryMismatch(format!(
                "map is {}x{} (tree x chunk height), snapshot is {}x{}",
                self.tree_height(),
                self.config().chunk_height,
                snapshot.tree_height,
                snapshot.chunk_height
            )));
        }
        let handle = self.get_or_allocate_block(block_index);
        let mut block = handle.write();
        block.clear();
        block.set_root_scale(snapshot.root_scale);
        snapshot.root_chunk.restore_into(block.root_chunk_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GridIndex, OctreeIndex};
    use crate::map::MapConfig;

    fn populated_map() -> HashedChunkedWaveletOctree {
        let mut map = HashedChunkedWaveletOctree::new(MapConfig::default()).unwrap();
        map.set_cell_value(&OctreeIndex::leaf(GridIndex::new(0, 0, 0)), 1.5);
        map.set_cell_value(&OctreeIndex::leaf(GridIndex::new(17, 40, 63)), -1.0);
        map.set_cell_value(&OctreeIndex::new(2, GridIndex::new(5, 5, 5)), 0.75);
        map.threshold();
        map
    }

    #[test]
    fn test_roundtrip_preserves_leaves() {
        let map = populated_map();
        let block_index = GridIndex::ZERO;
        let snapshot = map.block_snapshot(&block_index).unwrap();

        let mut restored = HashedChunkedWaveletOctree::new(MapConfig::default()).unwrap();
        restored
            .restore_block_snapshot(block_index, &snapshot)
            .unwrap();

        let mut leaves = 0;
        map.for_each_leaf(0, &mut |index, value| {
            let restored_value = restored.get_value_at(&index);
            assert!(
                (value - restored_value).abs() < 1e-6,
                "mismatch at {:?}: {} vs {}",
                index,
                value,
                restored_value
            );
            leaves += 1;
        });
        assert!(leaves > 0);
    }

    #[test]
    fn test_snapshot_is_plain_data() {
        let map = populated_map();
        let snapshot = map.block_snapshot(&GridIndex::ZERO).unwrap();
        // Round-trip through a serde backend
        let yaml = serde_yaml::to_string(&snapshot).unwrap();
        let parsed: BlockSnapshot = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.tree_height, snapshot.tree_height);
        assert_eq!(parsed.root_scale, snapshot.root_scale);
        assert_eq!(parsed.root_chunk.children.len(), snapshot.root_chunk.children.len());
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let map = populated_map();
        let snapshot = map.block_snapshot(&GridIndex::ZERO).unwrap();

        let other_config = MapConfig {
            tree_height: 9,
            ..Default::default()
        };
        let mut other = HashedChunkedWaveletOctree::new(other_config).unwrap();
        let result = other.restore_block_snapshot(GridIndex::ZERO, &snapshot);
        assert!(matches!(result, Err(SnapshotError::GeometryMismatch(_))));
    }
}
