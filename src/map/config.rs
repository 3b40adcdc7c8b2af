//! Configuration for the hashed chunked wavelet octree map.

use crate::config::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Map geometry and saturation bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Leaf cell edge length in meters
    pub min_cell_width: f32,

    /// Height of each block's root above the leaf level; a block spans
    /// `2^tree_height` leaf cells per axis
    pub tree_height: i32,

    /// Levels per octree chunk; `tree_height` must be a multiple of this
    pub chunk_height: i32,

    /// Lower saturation bound for leaf log-odds
    pub min_log_odds: f32,

    /// Upper saturation bound for leaf log-odds
    pub max_log_odds: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            min_cell_width: 0.1, // 10cm leaves
            tree_height: 6,      // 6.4m blocks
            chunk_height: 3,
            min_log_odds: -2.0,
            max_log_odds: 4.0,
        }
    }
}

impl MapConfig {
    /// Validate all parameters; called by the map factory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_cell_width > 0.0) || !self.min_cell_width.is_finite() {
            return Err(ConfigError::invalid(format!(
                "min_cell_width must be positive, got {}",
                self.min_cell_width
            )));
        }
        if self.chunk_height < 1 {
            return Err(ConfigError::invalid(format!(
                "chunk_height must be at least 1, got {}",
                self.chunk_height
            )));
        }
        if self.tree_height < self.chunk_height || self.tree_height % self.chunk_height != 0 {
            return Err(ConfigError::invalid(format!(
                "tree_height ({}) must be a positive multiple of chunk_height ({})",
                self.tree_height, self.chunk_height
            )));
        }
        // Block-relative morton codes must fit in a u64
        if self.tree_height > 21 {
            return Err(ConfigError::invalid(format!(
                "tree_height must be at most 21, got {}",
                self.tree_height
            )));
        }
        if !(self.min_log_odds < self.max_log_odds) {
            return Err(ConfigError::invalid(format!(
                "min_log_odds ({}) must be below max_log_odds ({})",
                self.min_log_odds, self.max_log_odds
            )));
        }
        Ok(())
    }

    /// Edge length of one block in meters
    #[inline]
    pub fn block_width(&self) -> f32 {
        self.min_cell_width * (1u64 << self.tree_height) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.block_width() - 6.4).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_cell_width() {
        let config = MapConfig {
            min_cell_width: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_indivisible_tree_height() {
        let config = MapConfig {
            tree_height: 7,
            chunk_height: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_log_odds() {
        let config = MapConfig {
            min_log_odds: 1.0,
            max_log_odds: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
