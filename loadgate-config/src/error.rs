//! Errors raised while assembling a loadgate configuration

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override carried a value that does not parse
    #[error("environment override {var}={value} rejected: {reason}")]
    Override {
        var: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// One configuration section, or one route, failed validation
    #[error("{domain}: {message}")]
    Domain { domain: String, message: String },
}
