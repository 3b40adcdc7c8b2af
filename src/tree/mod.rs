//! The chunked wavelet octree: Haar transform, chunk storage, and the
//! per-block tree with its update, threshold, prune, and traversal
//! operations.

pub mod block;
pub mod chunk;
pub mod haar;

pub use block::WaveletOctreeBlock;
pub use chunk::{Bitset, LinearIndex, OctreeChunk};
pub use haar::{DetailCoefficients, ParentCoefficients};
