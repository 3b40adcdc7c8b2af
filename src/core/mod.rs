//! Core types for taranga-map.
//!
//! This module provides the fundamental geometric and indexing types:
//! - [`Point3D`]: 3D point/vector in meters
//! - [`Pose3D`]: rigid sensor-to-world transform
//! - [`PointCloud3D`] / [`PosedPointCloud`]: SoA point clouds
//! - [`Aabb`]: axis-aligned bounding box
//! - [`GridIndex`] / [`OctreeIndex`]: integer cell and octree node indices
//! - morton and perfect-tree arithmetic used by the chunked octree
//!
//! All coordinates use the ROS REP-103 convention:
//! - X-forward, Y-left, Z-up (right-handed)
//! - Angles in radians, counter-clockwise positive

pub mod aabb;
pub mod index;
pub mod morton;
pub mod point;
pub mod pointcloud;
pub mod pose;
pub mod stopwatch;
pub mod tree_math;

pub use aabb::Aabb;
pub use index::{NUM_CHILDREN, OctreeIndex};
pub use point::{BlockIndex, GridIndex, Point3D};
pub use pointcloud::{PointCloud3D, PosedPointCloud};
pub use pose::{Pose3D, Rotation3D};
pub use stopwatch::Stopwatch;
