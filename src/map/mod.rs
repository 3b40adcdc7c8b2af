//! Hash-block map layer: world-space routing of updates and queries to
//! wavelet-octree blocks, plus map-wide maintenance.

pub mod accelerator;
pub mod config;
pub mod hashed;

pub use accelerator::QueryAccelerator;
pub use config::MapConfig;
pub use hashed::{BlockHandle, HashedChunkedWaveletOctree};
