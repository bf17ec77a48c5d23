//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
