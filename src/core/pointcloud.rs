//! Point cloud types for range sensor data.
//!
//! `PointCloud3D` uses an SoA (Struct of Arrays) layout: each coordinate
//! lives in its own contiguous array, which keeps per-point iteration
//! cache-friendly and auto-vectorizable.

use super::point::Point3D;
use super::pose::Pose3D;

/// Cartesian point cloud in the sensor frame, SoA layout.
#[derive(Clone, Debug, Default)]
pub struct PointCloud3D {
    /// X coordinates in meters
    pub xs: Vec<f32>,
    /// Y coordinates in meters
    pub ys: Vec<f32>,
    /// Z coordinates in meters
    pub zs: Vec<f32>,
}

impl PointCloud3D {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a point cloud with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            zs: Vec::with_capacity(capacity),
        }
    }

    /// Create from a slice of points
    pub fn from_points(points: &[Point3D]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push(*p);
        }
        cloud
    }

    /// Add a point to the cloud
    #[inline]
    pub fn push(&mut self, p: Point3D) {
        self.xs.push(p.x);
        self.ys.push(p.y);
        self.zs.push(p.z);
    }

    /// Number of points
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Check if the cloud is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Point at a given index
    #[inline]
    pub fn point(&self, i: usize) -> Point3D {
        Point3D::new(self.xs[i], self.ys[i], self.zs[i])
    }

    /// Iterate over the points
    pub fn iter(&self) -> impl Iterator<Item = Point3D> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }
}

/// A point cloud paired with the sensor pose at capture time.
///
/// Points are stored in the sensor frame; `pose` maps them into the world
/// frame.
#[derive(Clone, Debug)]
pub struct PosedPointCloud {
    /// Sensor-to-world transform at capture time
    pub pose: Pose3D,
    /// Measured endpoints in the sensor frame
    pub cloud: PointCloud3D,
}

impl PosedPointCloud {
    /// Create a new posed point cloud
    pub fn new(pose: Pose3D, cloud: PointCloud3D) -> Self {
        Self { pose, cloud }
    }

    /// Number of points
    #[inline]
    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    /// Check if the cloud is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    /// Sensor origin in the world frame
    #[inline]
    pub fn sensor_origin(&self) -> Point3D {
        self.pose.position()
    }

    /// Iterate over the points in the world frame
    pub fn iter_world(&self) -> impl Iterator<Item = Point3D> + '_ {
        self.cloud.iter().map(move |p| self.pose.transform_point(p))
    }
}
