//! Metrics pipeline
//!
//! Samples flow from the dispatcher, validator and scheduler into a
//! [`MetricsRecorder`]. During an iteration that recorder is an
//! [`IterationBuffer`]; completed iterations are committed to the shared
//! [`MetricsSink`], which is read once at run end through a
//! [`MetricsSnapshot`].

mod accumulator;
mod buffer;
pub mod names;
mod sink;
mod snapshot;

pub use buffer::IterationBuffer;
pub use sink::MetricsSink;
pub use snapshot::{MetricSummary, MetricsSnapshot, SeriesData, SeriesSnapshot, TrendSummary};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Tag set partitioning a metric into series
pub type Tags = BTreeMap<String, String>;

/// Build a tag set from pairs
pub fn tags<I, K, V>(pairs: I) -> Tags
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Kind of a metric, fixed per name for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic sum
    Counter,
    /// Fraction of true outcomes
    Rate,
    /// Distribution of values, usually milliseconds
    Trend,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Trend => write!(f, "trend"),
        }
    }
}

/// One sample; its variant determines the metric kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Rate(bool),
    Trend(f64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Rate(_) => MetricKind::Rate,
            MetricValue::Trend(_) => MetricKind::Trend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("metric '{name}' is a {existing}, cannot record a {attempted} sample")]
    KindMismatch {
        name: String,
        existing: MetricKind,
        attempted: MetricKind,
    },
}

/// Destination for metric samples
pub trait MetricsRecorder: Send + Sync {
    fn record(&self, name: &str, tags: &Tags, value: MetricValue);

    fn add(&self, name: &str, tags: &Tags, count: u64) {
        self.record(name, tags, MetricValue::Counter(count));
    }

    fn rate(&self, name: &str, tags: &Tags, outcome: bool) {
        self.record(name, tags, MetricValue::Rate(outcome));
    }

    fn trend(&self, name: &str, tags: &Tags, value: f64) {
        self.record(name, tags, MetricValue::Trend(value));
    }

    /// Record a duration as milliseconds
    fn trend_duration(&self, name: &str, tags: &Tags, value: Duration) {
        self.trend(name, tags, value.as_secs_f64() * 1000.0);
    }
}
