//! Spherical projection model mapping sensor-frame bearings to range image
//! indices.
//!
//! Rows discretize elevation, columns azimuth. Cell `i` covers the angle
//! interval `[min + i*step, min + (i+1)*step)` with its center at
//! `min + (i + 0.5)*step`; conversion is monotone and lossless within index
//! granularity.

use crate::config::error::ConfigError;
use crate::core::Point3D;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Field of view and resolution of the range image grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Number of elevation rows
    pub num_rows: usize,
    /// Number of azimuth columns
    pub num_cols: usize,
    /// Lower elevation bound in radians
    pub min_elevation: f32,
    /// Upper elevation bound in radians
    pub max_elevation: f32,
    /// Lower azimuth bound in radians
    pub min_azimuth: f32,
    /// Upper azimuth bound in radians
    pub max_azimuth: f32,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            // Resembles a 32-beam spinning lidar at 0.5 degree azimuth steps
            num_rows: 32,
            num_cols: 720,
            min_elevation: -0.26, // ~15 degrees down
            max_elevation: 0.26,  // ~15 degrees up
            min_azimuth: -PI,
            max_azimuth: PI,
        }
    }
}

impl ProjectorConfig {
    /// Validate all parameters; called by the projector factory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_rows == 0 || self.num_cols == 0 {
            return Err(ConfigError::invalid(format!(
                "projector grid must be non-empty, got {}x{}",
                self.num_rows, self.num_cols
            )));
        }
        if !(self.min_elevation < self.max_elevation) {
            return Err(ConfigError::invalid(format!(
                "min_elevation ({}) must be below max_elevation ({})",
                self.min_elevation, self.max_elevation
            )));
        }
        if self.min_elevation < -PI / 2.0 - 1e-6 || PI / 2.0 + 1e-6 < self.max_elevation {
            return Err(ConfigError::invalid(
                "elevation bounds must lie within [-pi/2, pi/2]".to_string(),
            ));
        }
        if !(self.min_azimuth < self.max_azimuth) {
            return Err(ConfigError::invalid(format!(
                "min_azimuth ({}) must be below max_azimuth ({})",
                self.min_azimuth, self.max_azimuth
            )));
        }
        if self.min_azimuth < -PI - 1e-6 || PI + 1e-6 < self.max_azimuth {
            return Err(ConfigError::invalid(
                "azimuth bounds must lie within [-pi, pi]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bearing-to-index projection for the 2D range image.
#[derive(Clone, Debug)]
pub struct SphericalProjector {
    config: ProjectorConfig,
    elevation_step: f32,
    azimuth_step: f32,
}

impl SphericalProjector {
    /// Create a projector; fails on an invalid configuration.
    pub fn new(config: ProjectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let elevation_step =
            (config.max_elevation - config.min_elevation) / config.num_rows as f32;
        let azimuth_step = (config.max_azimuth - config.min_azimuth) / config.num_cols as f32;
        Ok(Self {
            config,
            elevation_step,
            azimuth_step,
        })
    }

    /// Projector configuration
    #[inline]
    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Number of elevation rows
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.config.num_rows
    }

    /// Number of azimuth columns
    #[inline]
    pub fn num_cols(&self) -> usize {
        self.config.num_cols
    }

    /// Elevation and azimuth of a sensor-frame bearing
    #[inline]
    pub fn bearing_to_angles(&self, bearing: Point3D) -> (f32, f32) {
        let azimuth = bearing.y.atan2(bearing.x);
        let elevation = bearing.z.atan2((bearing.x * bearing.x + bearing.y * bearing.y).sqrt());
        (elevation, azimuth)
    }

    /// Fractional row index of an elevation angle; cell centers land on
    /// whole numbers
    #[inline]
    pub fn elevation_to_fractional_row(&self, elevation: f32) -> f32 {
        (elevation - self.config.min_elevation) / self.elevation_step - 0.5
    }

    /// Fractional column index of an azimuth angle; cell centers land on
    /// whole numbers
    #[inline]
    pub fn azimuth_to_fractional_col(&self, azimuth: f32) -> f32 {
        (azimuth - self.config.min_azimuth) / self.azimuth_step - 0.5
    }

    /// Fractional (row, col) index of a pair of angles
    #[inline]
    pub fn angles_to_fractional_index(&self, elevation: f32, azimuth: f32) -> (f32, f32) {
        (
            self.elevation_to_fractional_row(elevation),
            self.azimuth_to_fractional_col(azimuth),
        )
    }

    /// Nearest in-bounds image index for a pair of angles, if any
    pub fn angles_to_nearest_index(&self, elevation: f32, azimuth: f32) -> Option<(usize, usize)> {
        let (row_f, col_f) = self.angles_to_fractional_index(elevation, azimuth);
        let row = row_f.round();
        let col = col_f.round();
        if row < 0.0
            || col < 0.0
            || row >= self.config.num_rows as f32
            || col >= self.config.num_cols as f32
        {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Center angles of an image cell
    #[inline]
    pub fn index_to_angles(&self, row: usize, col: usize) -> (f32, f32) {
        (
            self.config.min_elevation + (row as f32 + 0.5) * self.elevation_step,
            self.config.min_azimuth + (col as f32 + 0.5) * self.azimuth_step,
        )
    }

    /// Unit bearing at the center of an image cell
    pub fn index_to_bearing(&self, row: usize, col: usize) -> Point3D {
        let (elevation, azimuth) = self.index_to_angles(row, col);
        let (sin_el, cos_el) = elevation.sin_cos();
        let (sin_az, cos_az) = azimuth.sin_cos();
        Point3D::new(cos_el * cos_az, cos_el * sin_az, sin_el)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_projector() -> SphericalProjector {
        SphericalProjector::new(ProjectorConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = ProjectorConfig {
            num_rows: 0,
            ..Default::default()
        };
        assert!(SphericalProjector::new(config.clone()).is_err());
        config.num_rows = 32;
        config.min_elevation = 0.5;
        config.max_elevation = -0.5;
        assert!(SphericalProjector::new(config).is_err());
    }

    #[test]
    fn test_forward_bearing() {
        let projector = test_projector();
        let (elevation, azimuth) = projector.bearing_to_angles(Point3D::new(1.0, 0.0, 0.0));
        assert!(elevation.abs() < 1e-6);
        assert!(azimuth.abs() < 1e-6);
        let index = projector.angles_to_nearest_index(elevation, azimuth).unwrap();
        // Forward looks at the middle of the image
        assert_eq!(index.0, projector.num_rows() / 2);
        assert_eq!(index.1, projector.num_cols() / 2);
    }

    #[test]
    fn test_elevation_sign() {
        let projector = test_projector();
        let (up, _) = projector.bearing_to_angles(Point3D::new(1.0, 0.0, 0.2));
        assert!(up > 0.0);
        let (down, _) = projector.bearing_to_angles(Point3D::new(1.0, 0.0, -0.2));
        assert!(down < 0.0);
    }

    #[test]
    fn test_index_angle_roundtrip() {
        let projector = test_projector();
        for &(row, col) in &[(0usize, 0usize), (15, 400), (31, 719)] {
            let (elevation, azimuth) = projector.index_to_angles(row, col);
            let back = projector.angles_to_nearest_index(elevation, azimuth).unwrap();
            assert_eq!(back, (row, col));
        }
    }

    #[test]
    fn test_out_of_fov_rejected() {
        let projector = test_projector();
        // Steeply upward bearing is outside the +-0.26 rad elevation window
        let (elevation, azimuth) = projector.bearing_to_angles(Point3D::new(0.1, 0.0, 1.0));
        assert!(projector.angles_to_nearest_index(elevation, azimuth).is_none());
    }

    #[test]
    fn test_index_to_bearing_is_unit() {
        let projector = test_projector();
        let bearing = projector.index_to_bearing(10, 100);
        assert!((bearing.norm() - 1.0).abs() < 1e-6);
        let (elevation, azimuth) = projector.bearing_to_angles(bearing);
        let (expected_el, expected_az) = projector.index_to_angles(10, 100);
        assert!((elevation - expected_el).abs() < 1e-5);
        assert!((azimuth - expected_az).abs() < 1e-5);
    }
}
