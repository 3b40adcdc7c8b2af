//! Serialization hooks: self-contained block snapshots.

pub mod snapshot;

pub use snapshot::{snapshot_block, BlockSnapshot, ChunkSnapshot, SnapshotError};
