//! Unified configuration: one YAML-loadable record aggregating the map,
//! projector, and integrator sections.

pub mod error;

pub use error::ConfigError;

use crate::integrator::IntegratorConfig;
use crate::map::MapConfig;
use crate::projection::ProjectorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full taranga-map configuration loaded from YAML.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TarangaConfig {
    /// Map geometry and saturation bounds
    #[serde(default)]
    pub map: MapConfig,

    /// Range image field of view and resolution
    #[serde(default)]
    pub projector: ProjectorConfig,

    /// Integrator and measurement model settings
    #[serde(default)]
    pub integrator: IntegratorConfig,
}

impl TarangaConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.map.validate()?;
        self.projector.validate()?;
        self.integrator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TarangaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.map.tree_height, 6);
        assert_eq!(config.projector.num_rows, 32);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = TarangaConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = TarangaConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.map.min_cell_width, config.map.min_cell_width);
        assert_eq!(parsed.integrator.max_range, config.integrator.max_range);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "map:\n  min_cell_width: 0.05\n";
        let config = TarangaConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.map.min_cell_width, 0.05);
        assert_eq!(config.map.tree_height, 6);
        assert_eq!(config.projector.num_cols, 720);
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(TarangaConfig::from_yaml("map: [not, a, map]").is_err());
        // Parses but fails validation
        let yaml = "map:\n  min_cell_width: -1.0\n";
        assert!(TarangaConfig::from_yaml(yaml).is_err());
    }
}
