//! Configuration for the measurement model and the coarse-to-fine
//! integrator.

use crate::config::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Continuous beam model parameters.
///
/// The model blends a free-space and an occupied-shell contribution, both
/// weighted by the angular offset from the nearest beam; see
/// [`crate::integrator::ContinuousBeamModel`] for the closed form.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementModelConfig {
    /// Angular uncertainty of one beam, in radians
    pub angle_sigma: f32,
    /// Range uncertainty of one measurement, in meters
    pub range_sigma: f32,
    /// Log-odds applied to cells well inside the free segment of a beam
    pub log_odds_free: f32,
    /// Log-odds applied to cells at the measured surface
    pub log_odds_occupied: f32,
}

impl Default for MeasurementModelConfig {
    fn default() -> Self {
        Self {
            angle_sigma: 0.0035, // ~0.2 degrees
            range_sigma: 0.05,
            log_odds_free: -0.4,
            log_odds_occupied: 0.85,
        }
    }
}

impl MeasurementModelConfig {
    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.angle_sigma > 0.0) || !self.angle_sigma.is_finite() {
            return Err(ConfigError::invalid(format!(
                "angle_sigma must be positive, got {}",
                self.angle_sigma
            )));
        }
        if !(self.range_sigma > 0.0) || !self.range_sigma.is_finite() {
            return Err(ConfigError::invalid(format!(
                "range_sigma must be positive, got {}",
                self.range_sigma
            )));
        }
        if !(self.log_odds_free < 0.0) {
            return Err(ConfigError::invalid(format!(
                "log_odds_free must be negative, got {}",
                self.log_odds_free
            )));
        }
        if !(self.log_odds_occupied > 0.0) {
            return Err(ConfigError::invalid(format!(
                "log_odds_occupied must be positive, got {}",
                self.log_odds_occupied
            )));
        }
        Ok(())
    }
}

/// Integrator parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Cells closer to the sensor than this receive no update
    pub min_range: f32,
    /// Cells (and boxes) beyond this range are treated as out of reach
    pub max_range: f32,
    /// Angular padding applied to projected boxes before querying the
    /// hierarchical range image, in radians
    pub angle_threshold: f32,
    /// Range slack applied when classifying boxes against measured ranges,
    /// in meters
    pub range_delta_threshold: f32,
    /// Largest admissible beam-model variation across a node before the
    /// integrator must descend further, in log-odds
    pub max_update_error: f32,
    /// Beam model parameters
    pub measurement_model: MeasurementModelConfig,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            min_range: 0.5,
            max_range: 20.0,
            angle_threshold: 0.007,
            range_delta_threshold: 0.1,
            max_update_error: 0.1,
            measurement_model: MeasurementModelConfig::default(),
        }
    }
}

impl IntegratorConfig {
    /// Validate all parameters; called by the integrator factory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_range < 0.0 || !self.min_range.is_finite() {
            return Err(ConfigError::invalid(format!(
                "min_range must be non-negative, got {}",
                self.min_range
            )));
        }
        if !(self.min_range < self.max_range) || !self.max_range.is_finite() {
            return Err(ConfigError::invalid(format!(
                "max_range ({}) must exceed min_range ({})",
                self.max_range, self.min_range
            )));
        }
        if self.angle_threshold < 0.0 {
            return Err(ConfigError::invalid(format!(
                "angle_threshold must be non-negative, got {}",
                self.angle_threshold
            )));
        }
        if self.range_delta_threshold < 0.0 {
            return Err(ConfigError::invalid(format!(
                "range_delta_threshold must be non-negative, got {}",
                self.range_delta_threshold
            )));
        }
        if !(self.max_update_error > 0.0) {
            return Err(ConfigError::invalid(format!(
                "max_update_error must be positive, got {}",
                self.max_update_error
            )));
        }
        self.measurement_model.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(IntegratorConfig::default().validate().is_ok());
        assert!(MeasurementModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_ranges() {
        let config = IntegratorConfig {
            min_range: 5.0,
            max_range: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_sigmas() {
        let config = MeasurementModelConfig {
            range_sigma: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_flipped_log_odds() {
        let config = MeasurementModelConfig {
            log_odds_free: 0.4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
