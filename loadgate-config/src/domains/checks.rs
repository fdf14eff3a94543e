//! Response check configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the checks run against every response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Upper bound on `timings.duration`
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_max_duration"
    )]
    pub max_duration: Duration,

    /// Header that must be present on every response
    #[serde(default = "default_required_header")]
    pub required_header: String,

    /// Rate metric fed with the aggregate verdict
    #[serde(default = "default_success_metric")]
    pub success_metric: String,

    /// Rate metric fed with the negated verdict
    #[serde(default = "default_error_metric")]
    pub error_metric: String,

    /// Trend metric fed with `timings.waiting`
    #[serde(default = "default_waiting_metric")]
    pub waiting_metric: String,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            max_duration: default_max_duration(),
            required_header: default_required_header(),
            success_metric: default_success_metric(),
            error_metric: default_error_metric(),
            waiting_metric: default_waiting_metric(),
        }
    }
}

impl Validatable for ChecksConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive_duration(self.max_duration, "max_duration", self.domain_name())?;
        validate_required_string(&self.required_header, "required_header", self.domain_name())?;
        validate_required_string(&self.success_metric, "success_metric", self.domain_name())?;
        validate_required_string(&self.error_metric, "error_metric", self.domain_name())?;
        validate_required_string(&self.waiting_metric, "waiting_metric", self.domain_name())?;

        if self.success_metric == self.error_metric {
            return Err(self.validation_error("success_metric and error_metric must differ"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "checks"
    }
}

fn default_max_duration() -> Duration {
    Duration::from_millis(500)
}

fn default_required_header() -> String {
    "Content-Type".to_string()
}

fn default_success_metric() -> String {
    "success_rate".to_string()
}

fn default_error_metric() -> String {
    "errors".to_string()
}

fn default_waiting_metric() -> String {
    "waiting_time".to_string()
}
