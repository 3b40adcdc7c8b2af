//! Continuous beam model producing per-cell log-odds updates.
//!
//! For a cell at distance `d` from the sensor, angular offset `theta` from
//! the nearest beam, and measured beam range `z`, with
//! `f = (z - d) / range_sigma` and `g = theta / angle_sigma`:
//!
//! ```text
//! w_angle    = Q(g + 3) - Q(g - 3)          support: |g| < 6
//! w_occupied = Q(2f + 3) - Q(2f - 3)        support: |f| < 3
//! w_free     = Q(f - 3)                     ramps in over f in (0, 6)
//! update     = w_angle * (log_odds_occupied * w_occupied
//!                         + log_odds_free * w_free)
//! ```
//!
//! `Q` is a piecewise-quadratic CDF approximation with support [-3, 3] and
//! `Q(0) = 1/2`. The update equals `log_odds_occupied` at the surface,
//! `log_odds_free` well inside the free segment, and zero more than three
//! range sigmas behind the surface or six angle sigmas off the beam.

use super::config::MeasurementModelConfig;

/// Piecewise-quadratic approximation of a Gaussian CDF, support [-3, 3].
#[inline]
fn quasi_gaussian_cdf(t: f32) -> f32 {
    if t <= -3.0 {
        0.0
    } else if t < 0.0 {
        let u = 3.0 + t;
        u * u / 18.0
    } else if t < 3.0 {
        let u = 3.0 - t;
        1.0 - u * u / 18.0
    } else {
        1.0
    }
}

/// Continuous beam model; see the module docs for the closed form.
#[derive(Clone, Debug)]
pub struct ContinuousBeamModel {
    config: MeasurementModelConfig,
}

impl ContinuousBeamModel {
    /// Create a model from validated parameters
    pub fn new(config: MeasurementModelConfig) -> Self {
        Self { config }
    }

    /// Model parameters
    #[inline]
    pub fn config(&self) -> &MeasurementModelConfig {
        &self.config
    }

    /// Log-odds increment for a cell at `distance` from the sensor,
    /// `angle_to_beam` radians off the nearest beam, with that beam
    /// measuring `measured_distance`.
    pub fn compute_update(
        &self,
        distance: f32,
        angle_to_beam: f32,
        measured_distance: f32,
    ) -> f32 {
        let f = (measured_distance - distance) / self.config.range_sigma;
        let g = angle_to_beam / self.config.angle_sigma;

        let w_angle = quasi_gaussian_cdf(g + 3.0) - quasi_gaussian_cdf(g - 3.0);
        if w_angle <= 0.0 {
            return 0.0;
        }
        let w_occupied = quasi_gaussian_cdf(2.0 * f + 3.0) - quasi_gaussian_cdf(2.0 * f - 3.0);
        let w_free = quasi_gaussian_cdf(f - 3.0);

        w_angle
            * (self.config.log_odds_occupied * w_occupied + self.config.log_odds_free * w_free)
    }

    /// Angular offset beyond which the update is exactly zero
    #[inline]
    pub fn angle_support(&self) -> f32 {
        6.0 * self.config.angle_sigma
    }

    /// Distance behind the measured surface beyond which the update is
    /// exactly zero
    #[inline]
    pub fn range_support_behind_surface(&self) -> f32 {
        3.0 * self.config.range_sigma
    }

    /// Worst-case `|d update / d theta|` in the free region, divided by the
    /// cell distance at evaluation time by the caller.
    ///
    /// Inside the free segment the range profile is saturated, so only the
    /// angular weight varies: its slope is bounded by `max |Q'| / angle_sigma
    /// = 1 / (3 * angle_sigma)`, scaled by `|log_odds_free|`.
    #[inline]
    pub fn free_gradient_bound(&self) -> f32 {
        self.config.log_odds_free.abs() / (3.0 * self.config.angle_sigma)
    }

    /// Worst-case `|d update / d range|` near the measured surface.
    ///
    /// The occupied bump contributes at most `2 * max |Q'| / range_sigma`
    /// and the free ramp at most `max |Q'| / range_sigma`, each scaled by
    /// its log-odds magnitude.
    #[inline]
    pub fn boundary_gradient_bound(&self) -> f32 {
        (2.0 * self.config.log_odds_occupied.abs() + self.config.log_odds_free.abs())
            / (3.0 * self.config.range_sigma)
    }
}
