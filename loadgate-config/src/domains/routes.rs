//! Route table configuration

use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

const METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Source of values for one `{placeholder}` in a URL template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicSourceConfig {
    /// Finite candidate set, one drawn uniformly per request
    Values(Vec<JsonValue>),
    /// Integer drawn uniformly from `min..=max`
    Range { min: i64, max: i64 },
}

impl DynamicSourceConfig {
    /// Candidate values rendered as they appear in a URL
    pub fn rendered_values(&self) -> Option<Vec<String>> {
        match self {
            DynamicSourceConfig::Values(values) => Some(
                values
                    .iter()
                    .map(|v| match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            DynamicSourceConfig::Range { .. } => None,
        }
    }
}

/// One named route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "default_method")]
    pub method: String,

    /// Absolute URL or path relative to `http.base_url`, with `{name}` placeholders
    pub url: String,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic: BTreeMap<String, DynamicSourceConfig>,

    /// JSON body sent with POST, PUT and PATCH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,

    /// Extra tags attached to this route's samples
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl RouteConfig {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
            expected_status: default_expected_status(),
            weight: default_weight(),
            dynamic: BTreeMap::new(),
            body: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_values<I, V>(mut self, placeholder: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        self.dynamic.insert(
            placeholder.to_string(),
            DynamicSourceConfig::Values(values.into_iter().map(Into::into).collect()),
        );
        self
    }
}

impl Validatable for RouteConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_enum_choice(&self.method, &METHODS, "method", self.domain_name())?;
        validate_required_string(&self.url, "url", self.domain_name())?;

        if !self.weight.is_finite() {
            return Err(self.validation_error(format!("weight must be finite, got {}", self.weight)));
        }
        validate_positive(self.weight, "weight", self.domain_name())?;

        if !(100..=599).contains(&self.expected_status) {
            return Err(self.validation_error(format!(
                "expected_status {} is not an HTTP status code",
                self.expected_status
            )));
        }

        for (name, source) in &self.dynamic {
            match source {
                DynamicSourceConfig::Values(values) if values.is_empty() => {
                    return Err(self.validation_error(format!(
                        "dynamic source '{}' has no values",
                        name
                    )));
                }
                DynamicSourceConfig::Range { min, max } if min > max => {
                    return Err(self.validation_error(format!(
                        "dynamic source '{}' has min {} greater than max {}",
                        name, min, max
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "routes"
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_weight() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_defaults() {
        let route: RouteConfig = serde_yaml::from_str("url: /get").unwrap();
        assert_eq!(route.method, "GET");
        assert_eq!(route.expected_status, 200);
        assert_eq!(route.weight, 1.0);
        assert!(route.validate().is_ok());
    }

    #[test]
    fn test_dynamic_sources_parse() {
        let yaml = r#"
url: /test/{endpoint}/{id}
weight: 2
dynamic:
  endpoint: { values: [posts, comments, albums] }
  id: { range: { min: 1, max: 100 } }
"#;
        let route: RouteConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(route.validate().is_ok());
        assert_eq!(
            route.dynamic["endpoint"].rendered_values().unwrap(),
            vec!["posts", "comments", "albums"]
        );
        assert_eq!(
            route.dynamic["id"],
            DynamicSourceConfig::Range { min: 1, max: 100 }
        );
    }

    #[test]
    fn test_numeric_values_render_without_quotes() {
        let route = RouteConfig::get("/reqres/users/{id}").with_values("id", [1, 2, 3]);
        assert_eq!(
            route.dynamic["id"].rendered_values().unwrap(),
            vec!["1", "2", "3"]
        );
    }

    #[test]
    fn test_non_positive_weight_rejected() {
        assert!(RouteConfig::get("/get").with_weight(0.0).validate().is_err());
        assert!(RouteConfig::get("/get").with_weight(-1.0).validate().is_err());
        assert!(RouteConfig::get("/get").with_weight(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_bad_method_and_empty_sources_rejected() {
        let mut route = RouteConfig::get("/get");
        route.method = "FETCH".to_string();
        assert!(route.validate().is_err());

        let route = RouteConfig::get("/users/{id}").with_values("id", Vec::<i64>::new());
        assert!(route.validate().is_err());

        let mut route = RouteConfig::get("/users/{id}");
        route
            .dynamic
            .insert("id".to_string(), DynamicSourceConfig::Range { min: 5, max: 1 });
        assert!(route.validate().is_err());
    }
}
