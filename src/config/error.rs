//! Configuration error types.

use thiserror::Error;

/// Errors raised when validating or loading a configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter value is out of its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Reading a config file failed
    #[error("config I/O error: {0}")]
    Io(String),

    /// Parsing YAML failed
    #[error("config parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::InvalidParameter(msg.into())
    }
}
