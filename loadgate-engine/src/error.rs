//! Engine error types

use crate::metrics::MetricsError;
use crate::routes::RouteError;
use crate::thresholds::ThresholdError;
use loadgate_config::ConfigError;
use loadgate_http::HttpError;
use thiserror::Error;

/// Errors that prevent a load test from starting
///
/// Everything here is raised before the first virtual user is spawned;
/// failures during a run only show up in its metrics.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid route: {0}")]
    Route(#[from] RouteError),

    #[error("Invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Invalid metric: {0}")]
    Metrics(#[from] MetricsError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] HttpError),
}

pub type LoadResult<T> = Result<T, LoadError>;
