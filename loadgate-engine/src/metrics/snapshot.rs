//! Point-in-time view of the sink and the aggregation math

use super::{MetricKind, Tags};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Raw accumulated data of one series
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Counter { total: u64 },
    Rate { passes: u64, total: u64 },
    Trend { values: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub name: String,
    pub tags: Tags,
    pub data: SeriesData,
}

impl SeriesSnapshot {
    /// Whether this series carries every pair of `filter`
    pub fn matches(&self, filter: &Tags) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.tags.get(key) == Some(value))
    }
}

/// Distribution summary of a trend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl TrendSummary {
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(|a, b| a.total_cmp(b));
        let count = values.len() as u64;
        let sum: f64 = values.iter().sum();
        let at = |p: f64| percentile(&values, p).unwrap_or(0.0);

        Self {
            count,
            min: values.first().copied().unwrap_or(0.0),
            max: values.last().copied().unwrap_or(0.0),
            avg: if count > 0 { sum / count as f64 } else { 0.0 },
            med: at(50.0),
            p90: at(90.0),
            p95: at(95.0),
            p99: at(99.0),
            sorted: values,
        }
    }

    /// Arbitrary percentile, `None` without samples
    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.sorted, p)
    }
}

/// Linear interpolation between closest ranks over sorted values
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Aggregate of every series of a metric that matched a tag filter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricSummary {
    Counter { total: u64, per_second: f64 },
    Rate { passes: u64, total: u64, rate: f64 },
    Trend(TrendSummary),
}

impl MetricSummary {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSummary::Counter { .. } => MetricKind::Counter,
            MetricSummary::Rate { .. } => MetricKind::Rate,
            MetricSummary::Trend(_) => MetricKind::Trend,
        }
    }

    /// Number of samples behind the summary; counters count their total
    pub fn sample_count(&self) -> u64 {
        match self {
            MetricSummary::Counter { total, .. } => *total,
            MetricSummary::Rate { total, .. } => *total,
            MetricSummary::Trend(trend) => trend.count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    kinds: BTreeMap<String, MetricKind>,
    series: Vec<SeriesSnapshot>,
    elapsed: Duration,
}

impl MetricsSnapshot {
    pub(crate) fn new(
        kinds: BTreeMap<String, MetricKind>,
        series: Vec<SeriesSnapshot>,
        elapsed: Duration,
    ) -> Self {
        Self {
            kinds,
            series,
            elapsed,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.kinds.get(name).copied()
    }

    /// Every metric known to the sink, declared or recorded
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn series<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SeriesSnapshot> + 'a {
        self.series.iter().filter(move |s| s.name == name)
    }

    /// Combine all series of `name` whose tags include `filter`
    ///
    /// Returns `None` only when the metric is unknown; a known metric with
    /// no matching samples yields an empty summary.
    pub fn aggregate(&self, name: &str, filter: &Tags) -> Option<MetricSummary> {
        let kind = self.kind_of(name)?;
        let matching = self.series(name).filter(|s| s.matches(filter));

        let summary = match kind {
            MetricKind::Counter => {
                let total: u64 = matching
                    .map(|s| match s.data {
                        SeriesData::Counter { total } => total,
                        _ => 0,
                    })
                    .sum();
                let secs = self.elapsed.as_secs_f64();
                MetricSummary::Counter {
                    total,
                    per_second: if secs > 0.0 { total as f64 / secs } else { 0.0 },
                }
            }
            MetricKind::Rate => {
                let (passes, total) = matching.fold((0, 0), |(p, t), s| match s.data {
                    SeriesData::Rate { passes, total } => (p + passes, t + total),
                    _ => (p, t),
                });
                MetricSummary::Rate {
                    passes,
                    total,
                    rate: if total > 0 { passes as f64 / total as f64 } else { 0.0 },
                }
            }
            MetricKind::Trend => {
                let values: Vec<f64> = matching
                    .flat_map(|s| match &s.data {
                        SeriesData::Trend { values } => values.clone(),
                        _ => Vec::new(),
                    })
                    .collect();
                MetricSummary::Trend(TrendSummary::from_values(values))
            }
        };
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tags;

    fn trend(name: &str, t: Tags, values: &[f64]) -> SeriesSnapshot {
        SeriesSnapshot {
            name: name.to_string(),
            tags: t,
            data: SeriesData::Trend {
                values: values.to_vec(),
            },
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(100.0));
        let p95 = percentile(&values, 95.0).unwrap();
        assert!((p95 - 95.05).abs() < 1e-9);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[7.0], 99.0), Some(7.0));
    }

    #[test]
    fn test_trend_summary() {
        let summary = TrendSummary::from_values(vec![40.0, 10.0, 30.0, 20.0]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 40.0);
        assert_eq!(summary.avg, 25.0);
        assert_eq!(summary.med, 25.0);
        assert_eq!(summary.percentile(50.0), Some(25.0));
    }

    #[test]
    fn test_aggregate_combines_matching_series() {
        let mut kinds = BTreeMap::new();
        kinds.insert("http_req_duration".to_string(), MetricKind::Trend);
        let snapshot = MetricsSnapshot::new(
            kinds,
            vec![
                trend(
                    "http_req_duration",
                    tags([("route", "static"), ("type", "static")]),
                    &[10.0, 20.0],
                ),
                trend("http_req_duration", tags([("route", "users")]), &[300.0]),
            ],
            Duration::from_secs(10),
        );

        match snapshot.aggregate("http_req_duration", &Tags::new()) {
            Some(MetricSummary::Trend(t)) => assert_eq!(t.count, 3),
            other => panic!("unexpected {:?}", other),
        }
        match snapshot.aggregate("http_req_duration", &tags([("type", "static")])) {
            Some(MetricSummary::Trend(t)) => {
                assert_eq!(t.count, 2);
                assert_eq!(t.max, 20.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        match snapshot.aggregate("http_req_duration", &tags([("type", "dynamic")])) {
            Some(summary) => assert_eq!(summary.sample_count(), 0),
            None => panic!("known metric must aggregate"),
        }
        assert!(snapshot.aggregate("unknown", &Tags::new()).is_none());
    }

    #[test]
    fn test_counter_rate_uses_elapsed() {
        let mut kinds = BTreeMap::new();
        kinds.insert("http_reqs".to_string(), MetricKind::Counter);
        let snapshot = MetricsSnapshot::new(
            kinds,
            vec![SeriesSnapshot {
                name: "http_reqs".to_string(),
                tags: Tags::new(),
                data: SeriesData::Counter { total: 50 },
            }],
            Duration::from_secs(5),
        );
        assert_eq!(
            snapshot.aggregate("http_reqs", &Tags::new()),
            Some(MetricSummary::Counter {
                total: 50,
                per_second: 10.0
            })
        );
    }

    #[test]
    fn test_summary_serializes_with_kind_tag() {
        let summary = MetricSummary::Rate {
            passes: 9,
            total: 10,
            rate: 0.9,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "rate");
        assert_eq!(json["total"], 10);
    }
}
