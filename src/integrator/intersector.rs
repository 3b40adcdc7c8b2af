//! Classification of world-space boxes against one scan's range image.
//!
//! The intersector answers, for an axis-aligned box, whether the scan saw
//! through it, into it, or not at all. The box is projected into the sensor
//! frame, its bearing window is padded by the angle threshold, and the
//! hierarchical range image supplies the (min, max) measured range over that
//! window in a handful of cell reads. Comparing the box's distance interval
//! against those bounds yields the four-valued result that drives the
//! integrator's recursion.

use crate::core::{Aabb, Point3D, Pose3D};
use crate::projection::{HierarchicalRangeImage, RangeBounds, RangeImage2D, SphericalProjector};
use std::f32::consts::{FRAC_PI_2, PI};

/// Relation of a box to the measured surfaces of one scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntersectionType {
    /// No beam constrains the box: behind all measured surfaces, outside
    /// the field of view, or beyond the sensor's maximum range
    FullyUnknown,
    /// Every beam overlapping the box passed through it without hitting
    Free,
    /// The box straddles measured surfaces
    PossiblyOccupied,
    /// The box lies entirely within the measured surface band
    FullyOccupied,
}

/// Projected bearing window of a box, in sensor-frame angles.
#[derive(Clone, Copy, Debug)]
struct AngleWindow {
    min_elevation: f32,
    max_elevation: f32,
    azimuth: AzimuthWindow,
}

/// Azimuth interval; boxes behind the sensor wrap around the ±pi seam and
/// split into two image column ranges.
#[derive(Clone, Copy, Debug)]
enum AzimuthWindow {
    /// Single interval `[min, max]`
    Contiguous { min: f32, max: f32 },
    /// Wrapped interval `[min, pi] ∪ [-pi, max]`
    Wrapped { min: f32, max: f32 },
}

/// Box classifier over one scan's hierarchical range image.
pub struct RangeImageIntersector<'a> {
    projector: &'a SphericalProjector,
    hierarchical: HierarchicalRangeImage,
    max_range: f32,
    angle_threshold: f32,
    range_delta_threshold: f32,
}

impl<'a> RangeImageIntersector<'a> {
    /// Build the intersector (and its mipmap) for one range image
    pub fn new(
        projector: &'a SphericalProjector,
        range_image: &RangeImage2D,
        max_range: f32,
        angle_threshold: f32,
        range_delta_threshold: f32,
    ) -> Self {
        Self {
            projector,
            hierarchical: HierarchicalRangeImage::new(range_image),
            max_range,
            angle_threshold,
            range_delta_threshold,
        }
    }

    /// Classify a world-space box against the scan taken at `t_w_c`.
    pub fn determine_intersection_type(&self, t_w_c: &Pose3D, w_aabb: &Aabb) -> IntersectionType {
        let sensor = t_w_c.position();
        let d_closest = w_aabb.min_distance_to(sensor);
        if self.max_range < d_closest {
            return IntersectionType::FullyUnknown;
        }
        let d_furthest = w_aabb.max_distance_to(sensor);

        let window = Self::projected_angle_window(t_w_c, w_aabb);
        let Some(bounds) = self.window_range_bounds(&window) else {
            return IntersectionType::FullyUnknown;
        };
        if !bounds.has_beams() {
            return IntersectionType::FullyUnknown;
        }

        let slack = self.range_delta_threshold;
        if bounds.max + slack < d_closest {
            return IntersectionType::FullyUnknown;
        }
        if d_furthest < bounds.min - slack {
            return IntersectionType::Free;
        }
        if bounds.min - slack <= d_closest && d_furthest <= bounds.max + slack {
            return IntersectionType::FullyOccupied;
        }
        IntersectionType::PossiblyOccupied
    }

    /// Bearing window of a box as seen from the sensor.
    ///
    /// Uses the box corners, which under-estimates face extrema slightly;
    /// the angle threshold padding absorbs the difference. A box containing
    /// the sensor covers the full sphere. When the projected azimuths
    /// spread over more than pi the box straddles the rear seam and the
    /// window wraps.
    fn projected_angle_window(t_w_c: &Pose3D, w_aabb: &Aabb) -> AngleWindow {
        if w_aabb.contains(t_w_c.position()) {
            return AngleWindow {
                min_elevation: -FRAC_PI_2,
                max_elevation: FRAC_PI_2,
                azimuth: AzimuthWindow::Contiguous { min: -PI, max: PI },
            };
        }

        let t_c_w = t_w_c.inverse();
        let mut min_elevation = f32::INFINITY;
        let mut max_elevation = f32::NEG_INFINITY;
        let mut azimuths = [0.0f32; 8];
        let mut min_azimuth = f32::INFINITY;
        let mut max_azimuth = f32::NEG_INFINITY;
        for (i, azimuth) in azimuths.iter_mut().enumerate() {
            let corner: Point3D = t_c_w.transform_point(w_aabb.corner(i));
            let az = corner.y.atan2(corner.x);
            let el = corner
                .z
                .atan2((corner.x * corner.x + corner.y * corner.y).sqrt());
            min_elevation = min_elevation.min(el);
            max_elevation = max_elevation.max(el);
            min_azimuth = min_azimuth.min(az);
            max_azimuth = max_azimuth.max(az);
            *azimuth = az;
        }

        let azimuth = if max_azimuth - min_azimuth <= PI {
            AzimuthWindow::Contiguous {
                min: min_azimuth,
                max: max_azimuth,
            }
        } else {
            // Wrapped: the interval runs from the smallest positive azimuth
            // through ±pi to the largest negative one
            let mut min_positive = PI;
            let mut max_negative = -PI;
            for &az in &azimuths {
                if az >= 0.0 {
                    min_positive = min_positive.min(az);
                } else {
                    max_negative = max_negative.max(az);
                }
            }
            AzimuthWindow::Wrapped {
                min: min_positive,
                max: max_negative,
            }
        };

        AngleWindow {
            min_elevation,
            max_elevation,
            azimuth,
        }
    }

    /// Measured range bounds over a bearing window padded by the angle
    /// threshold, or `None` when the window misses the image entirely.
    fn window_range_bounds(&self, window: &AngleWindow) -> Option<RangeBounds> {
        let pad = self.angle_threshold;
        let num_rows = self.projector.num_rows();
        let num_cols = self.projector.num_cols();

        let row_lo = cells_from(
            self.projector
                .elevation_to_fractional_row(window.min_elevation - pad),
        );
        let row_hi = cells_to(
            self.projector
                .elevation_to_fractional_row(window.max_elevation + pad),
        );
        let row_min = row_lo.max(0) as usize;
        let row_max = row_hi.min(num_rows as i64 - 1);
        if row_max < 0 || row_min as i64 > row_max {
            return None;
        }
        let row_max = row_max as usize;

        let col_window = |min_az: f32, max_az: f32| -> Option<(usize, usize)> {
            let col_lo = cells_from(self.projector.azimuth_to_fractional_col(min_az - pad));
            let col_hi = cells_to(self.projector.azimuth_to_fractional_col(max_az + pad));
            let col_min = col_lo.max(0) as usize;
            let col_max = col_hi.min(num_cols as i64 - 1);
            if col_max < 0 || col_min as i64 > col_max {
                return None;
            }
            Some((col_min, col_max as usize))
        };

        match window.azimuth {
            AzimuthWindow::Contiguous { min, max } => {
                let (col_min, col_max) = col_window(min, max)?;
                Some(
                    self.hierarchical
                        .range_bounds(row_min, col_min, row_max, col_max),
                )
            }
            AzimuthWindow::Wrapped { min, max } => {
                let upper = col_window(min, PI);
                let lower = col_window(-PI, max);
                match (upper, lower) {
                    (None, None) => None,
                    (a, b) => {
                        let mut bounds = RangeBounds::empty();
                        for (col_min, col_max) in a.into_iter().chain(b) {
                            bounds = bounds.union(&self.hierarchical.range_bounds(
                                row_min,
                                col_min,
                                row_max,
                                col_max,
                            ));
                        }
                        Some(bounds)
                    }
                }
            }
        }
    }
}

/// First cell whose interval reaches the fractional coordinate `f`
#[inline]
fn cells_from(f: f32) -> i64 {
    (f - 0.5).ceil() as i64
}

/// Last cell whose interval reaches the fractional coordinate `f`
#[inline]
fn cells_to(f: f32) -> i64 {
    (f + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rotation3D;
    use crate::projection::ProjectorConfig;

    /// Range image with every cell set to `range`
    fn uniform_image(projector: &SphericalProjector, range: f32) -> RangeImage2D {
        let mut image = RangeImage2D::new(projector.num_rows(), projector.num_cols());
        for row in 0..projector.num_rows() {
            for col in 0..projector.num_cols() {
                image.insert_range(row, col, range);
            }
        }
        image
    }

    fn cube_at(center: Point3D, half_width: f32) -> Aabb {
        Aabb::new(
            center - Point3D::new(half_width, half_width, half_width),
            center + Point3D::new(half_width, half_width, half_width),
        )
    }

    fn test_projector() -> SphericalProjector {
        SphericalProjector::new(ProjectorConfig::default()).unwrap()
    }

    #[test]
    fn test_box_in_front_of_surface_is_free() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);

        for yaw in [0.0, 0.8, -2.5] {
            let pose = Pose3D::new(Rotation3D::from_euler(0.0, 0.0, yaw), Point3D::ZERO);
            // Box 2m ahead along the viewing direction, well inside R = 5
            let center = pose.transform_point(Point3D::new(2.0, 0.0, 0.0));
            let result =
                intersector.determine_intersection_type(&pose, &cube_at(center, 0.2));
            assert_eq!(result, IntersectionType::Free, "yaw {}", yaw);
        }
    }

    #[test]
    fn test_box_behind_surface_is_unknown() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(8.0, 0.0, 0.0), 0.2));
        assert_eq!(result, IntersectionType::FullyUnknown);
    }

    #[test]
    fn test_box_straddling_surface_is_occupied() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        // Straddles R = 5 by more than the slack on both sides
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(5.0, 0.0, 0.0), 0.5));
        assert_eq!(result, IntersectionType::PossiblyOccupied);
        // Thin box fully inside the measured band
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(5.0, 0.0, 0.0), 0.02));
        assert_eq!(result, IntersectionType::FullyOccupied);
    }

    #[test]
    fn test_box_beyond_max_range_is_unknown() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 6.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(10.0, 0.0, 0.0), 0.2));
        assert_eq!(result, IntersectionType::FullyUnknown);
    }

    #[test]
    fn test_box_outside_fov_is_unknown() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        // Directly above the sensor, far outside the elevation window
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(0.0, 0.0, 3.0), 0.2));
        assert_eq!(result, IntersectionType::FullyUnknown);
    }

    #[test]
    fn test_box_behind_sensor_wraps_azimuth() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        // Box straddling the -x axis: its azimuth window wraps at ±pi
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(-2.0, 0.0, 0.0), 0.3));
        assert_eq!(result, IntersectionType::Free);
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(-8.0, 0.0, 0.0), 0.3));
        assert_eq!(result, IntersectionType::FullyUnknown);
    }

    #[test]
    fn test_box_containing_sensor_is_free() {
        let projector = test_projector();
        let image = uniform_image(&projector, 5.0);
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        let result =
            intersector.determine_intersection_type(&pose, &cube_at(Point3D::ZERO, 0.5));
        assert_eq!(result, IntersectionType::Free);
    }

    #[test]
    fn test_empty_image_is_all_unknown() {
        let projector = test_projector();
        let image = RangeImage2D::new(projector.num_rows(), projector.num_cols());
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        let result = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(2.0, 0.0, 0.0), 0.2));
        assert_eq!(result, IntersectionType::FullyUnknown);
    }

    #[test]
    fn test_partial_beams() {
        // Only the forward hemisphere carries beams; boxes behind the
        // sensor see no constraint
        let projector = test_projector();
        let mut image = RangeImage2D::new(projector.num_rows(), projector.num_cols());
        for row in 0..projector.num_rows() {
            for col in projector.num_cols() / 4..3 * projector.num_cols() / 4 {
                image.insert_range(row, col, 5.0);
            }
        }
        let intersector = RangeImageIntersector::new(&projector, &image, 20.0, 0.01, 0.1);
        let pose = Pose3D::identity();
        let ahead = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(2.0, 0.0, 0.0), 0.2));
        assert_eq!(ahead, IntersectionType::Free);
        let behind = intersector
            .determine_intersection_type(&pose, &cube_at(Point3D::new(-2.0, 0.0, 0.0), 0.2));
        assert_eq!(behind, IntersectionType::FullyUnknown);
    }
}
