//! Route table and weighted selection

use crate::metrics::Tags;
use loadgate_config::{DynamicSourceConfig, RouteConfig};
use loadgate_http::HttpMethod;
use rand::{Rng, RngCore};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("route '{0}' is already registered")]
    Duplicate(String),

    #[error("route '{route}' has a malformed template: {reason}")]
    MalformedTemplate { route: String, reason: String },

    #[error("route '{route}' has invalid weight {weight}")]
    InvalidWeight { route: String, weight: f64 },

    #[error("route '{route}' has invalid method '{method}'")]
    InvalidMethod { route: String, method: String },

    #[error("unknown route '{0}'")]
    Unknown(String),

    #[error("no candidate routes to select from")]
    NoCandidates,
}

type Generator = dyn Fn(&mut dyn RngCore) -> String + Send + Sync;

/// Where the value of one placeholder comes from
#[derive(Clone)]
pub enum DynamicSource {
    /// Drawn uniformly from a finite set
    Candidates(Vec<String>),
    /// Integer drawn uniformly from `min..=max`
    Range { min: i64, max: i64 },
    /// Computed per request
    Generator(Arc<Generator>),
}

impl DynamicSource {
    pub fn candidates<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DynamicSource::Candidates(values.into_iter().map(Into::into).collect())
    }

    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(&mut dyn RngCore) -> String + Send + Sync + 'static,
    {
        DynamicSource::Generator(Arc::new(f))
    }

    /// Integer drawn uniformly from `min..=max`; registration rejects `min > max`
    pub fn range(min: i64, max: i64) -> Self {
        DynamicSource::Range { min, max }
    }

    pub fn draw(&self, rng: &mut dyn RngCore) -> String {
        match self {
            DynamicSource::Candidates(values) => {
                // Registration rejects empty candidate lists
                let index = rng.gen_range(0..values.len());
                values[index].clone()
            }
            DynamicSource::Range { min, max } => rng.gen_range(*min..=*max).to_string(),
            DynamicSource::Generator(f) => f(rng),
        }
    }
}

impl fmt::Debug for DynamicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicSource::Candidates(values) => f.debug_tuple("Candidates").field(values).finish(),
            DynamicSource::Range { min, max } => write!(f, "Range({}..={})", min, max),
            DynamicSource::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

impl From<&DynamicSourceConfig> for DynamicSource {
    fn from(config: &DynamicSourceConfig) -> Self {
        match config {
            DynamicSourceConfig::Range { min, max } => DynamicSource::range(*min, *max),
            DynamicSourceConfig::Values(_) => {
                DynamicSource::Candidates(config.rendered_values().unwrap_or_default())
            }
        }
    }
}

/// A named, weighted request template
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub method: HttpMethod,
    pub url_template: String,
    pub expected_status: u16,
    pub weight: f64,
    pub dynamic_sources: BTreeMap<String, DynamicSource>,
    pub body: Option<JsonValue>,
    pub tags: Tags,
}

impl Route {
    pub fn new(name: impl Into<String>, method: HttpMethod, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            url_template: url_template.into(),
            expected_status: 200,
            weight: 1.0,
            dynamic_sources: BTreeMap::new(),
            body: None,
            tags: Tags::new(),
        }
    }

    pub fn get(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Get, url_template)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_source(mut self, placeholder: impl Into<String>, source: DynamicSource) -> Self {
        self.dynamic_sources.insert(placeholder.into(), source);
        self
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn from_config(name: &str, config: &RouteConfig) -> Result<Self, RouteError> {
        let method = config
            .method
            .parse::<HttpMethod>()
            .map_err(|_| RouteError::InvalidMethod {
                route: name.to_string(),
                method: config.method.clone(),
            })?;

        Ok(Self {
            name: name.to_string(),
            method,
            url_template: config.url.clone(),
            expected_status: config.expected_status,
            weight: config.weight,
            dynamic_sources: config
                .dynamic
                .iter()
                .map(|(placeholder, source)| (placeholder.clone(), DynamicSource::from(source)))
                .collect(),
            body: config.body.clone(),
            tags: config.tags.clone(),
        })
    }

    /// Placeholder names in template order
    pub fn placeholders(&self) -> Result<Vec<String>, RouteError> {
        parse_placeholders(&self.url_template).map_err(|reason| RouteError::MalformedTemplate {
            route: self.name.clone(),
            reason,
        })
    }

    /// Substitute one drawn value per placeholder
    pub fn render(&self, rng: &mut dyn RngCore) -> Result<String, RouteError> {
        let mut rendered = String::with_capacity(self.url_template.len());
        let mut rest = self.url_template.as_str();

        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| self.malformed("unterminated placeholder"))?;
            let placeholder = after[..close].trim();
            let source = self
                .dynamic_sources
                .get(placeholder)
                .ok_or_else(|| self.malformed(format!("no source for '{{{}}}'", placeholder)))?;
            rendered.push_str(&source.draw(rng));
            rest = &after[close + 1..];
        }
        rendered.push_str(rest);
        Ok(rendered)
    }

    fn malformed(&self, reason: impl Into<String>) -> RouteError {
        RouteError::MalformedTemplate {
            route: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn check(&self) -> Result<(), RouteError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(RouteError::InvalidWeight {
                route: self.name.clone(),
                weight: self.weight,
            });
        }
        for placeholder in self.placeholders()? {
            match self.dynamic_sources.get(&placeholder) {
                None => {
                    return Err(self.malformed(format!(
                        "placeholder '{{{}}}' has no dynamic source",
                        placeholder
                    )))
                }
                Some(DynamicSource::Candidates(values)) if values.is_empty() => {
                    return Err(self.malformed(format!(
                        "placeholder '{{{}}}' has no candidates",
                        placeholder
                    )))
                }
                Some(DynamicSource::Range { min, max }) if min > max => {
                    return Err(self.malformed(format!(
                        "placeholder '{{{}}}' has empty range {}..={}",
                        placeholder, min, max
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn parse_placeholders(template: &str) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err("unmatched '}'".to_string());
        }
        let after = &rest[open + 1..];
        let close = after
            .find(['{', '}'])
            .filter(|&i| after[i..].starts_with('}'))
            .ok_or_else(|| "unterminated placeholder".to_string())?;
        let name = after[..close].trim();
        if name.is_empty() {
            return Err("empty placeholder '{}'".to_string());
        }
        names.push(name.to_string());
        rest = &after[close + 1..];
    }
    Ok(names)
}

/// Cumulative-weight table; one uniform draw is mapped to an index by
/// binary search
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSelector {
    cumulative: Vec<f64>,
}

impl WeightedSelector {
    /// `None` when there are no weights
    pub fn new(weights: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut total = 0.0;
        let cumulative: Vec<f64> = weights
            .into_iter()
            .map(|w| {
                total += w;
                total
            })
            .collect();
        if cumulative.is_empty() {
            None
        } else {
            Some(Self { cumulative })
        }
    }

    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn pick(&self, rng: &mut dyn RngCore) -> usize {
        let draw = rng.gen::<f64>() * self.total();
        let index = self.cumulative.partition_point(|&c| c <= draw);
        index.min(self.cumulative.len() - 1)
    }
}

/// Registry of routes in registration order
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
    all: Option<WeightedSelector>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(routes: &BTreeMap<String, RouteConfig>) -> Result<Self, RouteError> {
        let mut table = Self::new();
        for (name, config) in routes {
            table.register(Route::from_config(name, config)?)?;
        }
        Ok(table)
    }

    pub fn register(&mut self, route: Route) -> Result<(), RouteError> {
        if self.index.contains_key(&route.name) {
            return Err(RouteError::Duplicate(route.name));
        }
        route.check()?;

        self.index.insert(route.name.clone(), self.routes.len());
        self.routes.push(route);
        self.all = WeightedSelector::new(self.routes.iter().map(|r| r.weight));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Route, RouteError> {
        self.index
            .get(name)
            .map(|&i| &self.routes[i])
            .ok_or_else(|| RouteError::Unknown(name.to_string()))
    }

    /// Pick one of `candidates` with probability proportional to its weight
    pub fn select_weighted<S: AsRef<str>>(
        &self,
        candidates: &[S],
        rng: &mut dyn RngCore,
    ) -> Result<&Route, RouteError> {
        let routes = candidates
            .iter()
            .map(|name| self.resolve(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let selector =
            WeightedSelector::new(routes.iter().map(|r| r.weight)).ok_or(RouteError::NoCandidates)?;
        Ok(routes[selector.pick(rng)])
    }

    /// Weighted pick over every registered route
    pub fn select_any(&self, rng: &mut dyn RngCore) -> Result<&Route, RouteError> {
        let selector = self.all.as_ref().ok_or(RouteError::NoCandidates)?;
        Ok(&self.routes[selector.pick(rng)])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.name.as_str())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
