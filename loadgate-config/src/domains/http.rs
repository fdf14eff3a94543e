//! HTTP client configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL joined with relative route templates
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_timeout"
    )]
    pub timeout: Duration,

    /// Maximum number of redirects to follow
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to verify SSL certificates
    #[serde(default = "crate::domains::utils::default_true")]
    pub verify_ssl: bool,

    /// Headers sent with every request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            verify_ssl: true,
            headers: BTreeMap::new(),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_positive_duration(self.timeout, "timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;

        for name in self.headers.keys() {
            validate_required_string(name, "header name", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_redirects() -> u32 {
    10
}

fn default_user_agent() -> String {
    concat!("loadgate/", env!("CARGO_PKG_VERSION")).to_string()
}
