//! Domain-specific configuration modules

pub mod checks;
pub mod http;
pub mod load;
pub mod logging;
pub mod routes;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which HTTP collaborator serves the requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// In-process mock backend
    #[default]
    Mock,
    /// Real network requests
    Http,
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(TargetKind::Mock),
            "http" => Ok(TargetKind::Http),
            _ => Err(format!("Invalid target: {}", s)),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Mock => write!(f, "mock"),
            TargetKind::Http => write!(f, "http"),
        }
    }
}

/// Body of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// One weighted random route per iteration
    #[default]
    Weighted,
    /// Every route once per iteration, in declaration order
    Sequential,
    /// Every route issued concurrently as one batch per iteration
    Batch,
}

/// Mock backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MockConfig {
    /// Sleep for the synthesized duration before answering
    #[serde(default = "utils::default_false")]
    pub simulate_latency: bool,
}

/// Main loadgate configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadgateConfig {
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    #[serde(default)]
    pub http: http::HttpConfig,

    #[serde(default)]
    pub target: TargetKind,

    #[serde(default)]
    pub mock: MockConfig,

    #[serde(default)]
    pub load: load::LoadConfig,

    #[serde(default)]
    pub scenario: ScenarioKind,

    /// Route table keyed by route name
    #[serde(default)]
    pub routes: BTreeMap<String, routes::RouteConfig>,

    #[serde(default)]
    pub checks: checks::ChecksConfig,

    /// Threshold expressions keyed by metric selector, e.g. `errors: ["rate<0.01"]`
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl Default for LoadgateConfig {
    fn default() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("httpbin".to_string(), routes::RouteConfig::get("/get"));

        let mut thresholds = BTreeMap::new();
        thresholds.insert("http_req_duration".to_string(), vec!["p(95)<500".to_string()]);
        thresholds.insert("errors".to_string(), vec!["rate<0.01".to_string()]);

        Self {
            logging: Default::default(),
            http: Default::default(),
            target: TargetKind::Mock,
            mock: MockConfig::default(),
            load: Default::default(),
            scenario: ScenarioKind::Weighted,
            routes,
            checks: Default::default(),
            thresholds,
        }
    }
}

impl LoadgateConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.logging.validate()?;
        self.http.validate()?;
        self.load.validate()?;
        self.checks.validate()?;

        if self.routes.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one route must be configured".to_string(),
            ));
        }
        for (name, route) in &self.routes {
            crate::validation::validate_required_string(name, "route name", "routes")?;
            route.validate().map_err(|e| ConfigError::Domain {
                domain: format!("routes.{}", name),
                message: e.to_string(),
            })?;
        }

        for (selector, expressions) in &self.thresholds {
            crate::validation::validate_required_string(selector, "metric selector", "thresholds")?;
            if expressions.is_empty() {
                return Err(ConfigError::Domain {
                    domain: "thresholds".to_string(),
                    message: format!("'{}' has no expressions", selector),
                });
            }
            for expression in expressions {
                crate::validation::validate_required_string(expression, selector, "thresholds")?;
            }
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = LoadgateConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
