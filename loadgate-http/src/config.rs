//! HTTP client settings

use loadgate_config::HttpConfig;
use std::collections::BTreeMap;
use std::time::Duration;

/// Settings used to build a [`crate::ReqwestClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Request timeout
    pub timeout: Duration,

    /// Maximum number of redirects to follow
    pub max_redirects: u32,

    /// User agent string
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    /// Headers attached to every request
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(HttpConfig::default())
    }
}

impl From<HttpConfig> for ClientSettings {
    fn from(config: HttpConfig) -> Self {
        Self {
            timeout: config.timeout,
            max_redirects: config.max_redirects,
            user_agent: config.user_agent,
            verify_ssl: config.verify_ssl,
            default_headers: config.headers,
        }
    }
}

impl From<&HttpConfig> for ClientSettings {
    fn from(config: &HttpConfig) -> Self {
        Self::from(config.clone())
    }
}
