//! Range image: measured ranges binned by discretized bearing.

use super::projector::SphericalProjector;
use crate::core::PointCloud3D;

/// Sentinel for cells no beam was assigned to
pub const NO_BEAM: f32 = f32::INFINITY;

/// Measurements above this length are treated as sensor glitches
const MAX_SANE_RANGE: f32 = 1e3;

/// Counts from one range image build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RangeImageStats {
    /// Points assigned to a cell
    pub points_projected: usize,
    /// Points dropped: NaN coordinates, implausible length, or out of FOV
    pub points_rejected: usize,
}

/// 2D grid of measured ranges, indexed by (elevation row, azimuth column).
#[derive(Clone, Debug)]
pub struct RangeImage2D {
    ranges: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
}

impl RangeImage2D {
    /// Create an image with every cell set to [`NO_BEAM`]
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            ranges: vec![NO_BEAM; num_rows * num_cols],
            num_rows,
            num_cols,
        }
    }

    /// Project a point cloud into a fresh range image.
    ///
    /// Rejects non-finite points and ranges above 1000 m; on collisions the
    /// smaller range wins (closest-surface policy).
    pub fn from_pointcloud(
        projector: &SphericalProjector,
        cloud: &PointCloud3D,
    ) -> (Self, RangeImageStats) {
        let mut image = Self::new(projector.num_rows(), projector.num_cols());
        let mut stats = RangeImageStats::default();
        for point in cloud.iter() {
            if !point.is_finite() {
                log::debug!("skipping measurement with non-finite endpoint");
                stats.points_rejected += 1;
                continue;
            }
            let range = point.norm();
            if MAX_SANE_RANGE < range {
                log::debug!("skipping measurement with suspicious length: {}", range);
                stats.points_rejected += 1;
                continue;
            }
            let (elevation, azimuth) = projector.bearing_to_angles(point);
            match projector.angles_to_nearest_index(elevation, azimuth) {
                Some((row, col)) => {
                    image.insert_range(row, col, range);
                    stats.points_projected += 1;
                }
                None => stats.points_rejected += 1,
            }
        }
        (image, stats)
    }

    /// Number of elevation rows
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of azimuth columns
    #[inline]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Measured range at a cell, or [`NO_BEAM`]
    #[inline]
    pub fn range(&self, row: usize, col: usize) -> f32 {
        self.ranges[row * self.num_cols + col]
    }

    /// True if a beam was assigned to the cell
    #[inline]
    pub fn has_beam(&self, row: usize, col: usize) -> bool {
        self.range(row, col).is_finite()
    }

    /// Record a measurement, keeping the smaller range on collision
    #[inline]
    pub fn insert_range(&mut self, row: usize, col: usize, range: f32) {
        let cell = &mut self.ranges[row * self.num_cols + col];
        if range < *cell {
            *cell = range;
        }
    }

    /// Number of cells with an assigned beam
    pub fn num_beams(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_finite()).count()
    }
}
