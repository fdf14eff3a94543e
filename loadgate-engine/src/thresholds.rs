//! SLO thresholds over aggregated metrics
//!
//! A threshold pairs a metric selector (`http_req_duration` or
//! `http_req_duration{route:users}`) with an expression such as
//! `p(95)<500`. Thresholds are parsed before the run and evaluated once
//! against the final snapshot; they never stop a run.

use crate::metrics::{MetricKind, MetricSummary, MetricsSnapshot, Tags};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("Invalid metric selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid threshold expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Aggregate '{aggregate}' does not apply to {kind} metric '{metric}'")]
    KindMismatch {
        metric: String,
        kind: MetricKind,
        aggregate: String,
    },

    #[error("No samples for '{selector}'")]
    InsufficientData { selector: String },
}

/// Statistic a threshold compares
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Rate,
    Count,
}

impl Aggregate {
    fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        match input {
            "avg" => Ok(Aggregate::Avg),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "med" => Ok(Aggregate::Med),
            "rate" => Ok(Aggregate::Rate),
            "count" => Ok(Aggregate::Count),
            _ => {
                let inner = input
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown aggregate '{}'", input))?;
                let p: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile '{}'", inner))?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(format!("percentile {} out of range 0-100", p));
                }
                Ok(Aggregate::Percentile(p))
            }
        }
    }

    pub fn applies_to(&self, kind: MetricKind) -> bool {
        match self {
            Aggregate::Percentile(_)
            | Aggregate::Avg
            | Aggregate::Min
            | Aggregate::Max
            | Aggregate::Med => kind == MetricKind::Trend,
            Aggregate::Rate => matches!(kind, MetricKind::Rate | MetricKind::Counter),
            Aggregate::Count => kind == MetricKind::Counter,
        }
    }

    /// Value of this statistic, `None` when the summary holds no samples
    pub fn observe(&self, summary: &MetricSummary) -> Option<f64> {
        if summary.sample_count() == 0 {
            return None;
        }
        match (self, summary) {
            (Aggregate::Percentile(p), MetricSummary::Trend(t)) => t.percentile(*p),
            (Aggregate::Avg, MetricSummary::Trend(t)) => Some(t.avg),
            (Aggregate::Min, MetricSummary::Trend(t)) => Some(t.min),
            (Aggregate::Max, MetricSummary::Trend(t)) => Some(t.max),
            (Aggregate::Med, MetricSummary::Trend(t)) => Some(t.med),
            (Aggregate::Rate, MetricSummary::Rate { rate, .. }) => Some(*rate),
            (Aggregate::Rate, MetricSummary::Counter { per_second, .. }) => Some(*per_second),
            (Aggregate::Count, MetricSummary::Counter { total, .. }) => Some(*total as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Percentile(p) => write!(f, "p({})", p),
            Aggregate::Avg => write!(f, "avg"),
            Aggregate::Min => write!(f, "min"),
            Aggregate::Max => write!(f, "max"),
            Aggregate::Med => write!(f, "med"),
            Aggregate::Rate => write!(f, "rate"),
            Aggregate::Count => write!(f, "count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    selector: String,
    expression: String,
    metric: String,
    filter: Tags,
    aggregate: Aggregate,
    comparison: Comparison,
    value: f64,
}

impl Threshold {
    /// Parse `selector` (`name` or `name{key:value,...}`) and an
    /// `aggregate op value` expression
    pub fn parse(selector: &str, expression: &str) -> Result<Self, ThresholdError> {
        let (metric, filter) = parse_selector(selector)?;
        let invalid = |reason: String| ThresholdError::InvalidExpression {
            expression: expression.to_string(),
            reason,
        };

        let at = expression
            .find(['<', '>'])
            .ok_or_else(|| invalid("missing comparison operator".to_string()))?;
        let (lhs, rest) = expression.split_at(at);
        let (comparison, rhs) = match rest.as_bytes() {
            [b'<', b'=', ..] => (Comparison::Le, &rest[2..]),
            [b'>', b'=', ..] => (Comparison::Ge, &rest[2..]),
            [b'<', ..] => (Comparison::Lt, &rest[1..]),
            _ => (Comparison::Gt, &rest[1..]),
        };

        let aggregate = Aggregate::parse(lhs).map_err(invalid)?;
        let value: f64 = rhs
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid value '{}'", rhs.trim())))?;
        if !value.is_finite() {
            return Err(invalid(format!("value {} is not finite", value)));
        }

        Ok(Self {
            selector: selector.trim().to_string(),
            expression: expression.trim().to_string(),
            metric,
            filter,
            aggregate,
            comparison,
            value,
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn filter(&self) -> &Tags {
        &self.filter
    }

    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    /// Reject an aggregate that makes no sense for the metric's kind
    pub fn check_kind(&self, kind: MetricKind) -> Result<(), ThresholdError> {
        if self.aggregate.applies_to(kind) {
            Ok(())
        } else {
            Err(ThresholdError::KindMismatch {
                metric: self.metric.clone(),
                kind,
                aggregate: self.aggregate.to_string(),
            })
        }
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdResult {
        let outcome = snapshot
            .aggregate(&self.metric, &self.filter)
            .ok_or_else(|| self.insufficient())
            .and_then(|summary| {
                self.check_kind(summary.kind())?;
                self.aggregate
                    .observe(&summary)
                    .ok_or_else(|| self.insufficient())
            });

        match outcome {
            Ok(observed) => ThresholdResult {
                selector: self.selector.clone(),
                expression: self.expression.clone(),
                passed: self.comparison.holds(observed, self.value),
                observed: Some(observed),
                error: None,
            },
            Err(error) => ThresholdResult {
                selector: self.selector.clone(),
                expression: self.expression.clone(),
                passed: false,
                observed: None,
                error: Some(error),
            },
        }
    }

    fn insufficient(&self) -> ThresholdError {
        ThresholdError::InsufficientData {
            selector: self.selector.clone(),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.selector, self.expression)
    }
}

fn parse_selector(selector: &str) -> Result<(String, Tags), ThresholdError> {
    let selector = selector.trim();
    let invalid = |reason: &str| ThresholdError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    };

    let (name, filter) = match selector.find('{') {
        None => (selector, None),
        Some(open) => {
            let body = selector[open + 1..]
                .strip_suffix('}')
                .ok_or_else(|| invalid("tag filter must end with '}'"))?;
            (&selector[..open], Some(body))
        }
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("metric name is empty"));
    }
    if name.contains(['}', ' ']) {
        return Err(invalid("metric name contains invalid characters"));
    }

    let mut tags = Tags::new();
    if let Some(body) = filter {
        for pair in body.split(',') {
            let (key, value) = pair
                .split_once(':')
                .ok_or_else(|| invalid("tag filter entries must be key:value"))?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(invalid("tag filter entries must be key:value"));
            }
            tags.insert(key.to_string(), value.to_string());
        }
    }

    Ok((name.to_string(), tags))
}

/// Verdict of one threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub selector: String,
    pub expression: String,
    pub passed: bool,
    pub observed: Option<f64>,
    #[serde(serialize_with = "error_message", skip_serializing_if = "Option::is_none")]
    pub error: Option<ThresholdError>,
}

fn error_message<S: Serializer>(error: &Option<ThresholdError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Parse every configured threshold, keyed by selector
pub fn parse_thresholds(config: &BTreeMap<String, Vec<String>>) -> Result<Vec<Threshold>, ThresholdError> {
    config
        .iter()
        .flat_map(|(selector, expressions)| {
            expressions
                .iter()
                .map(move |expression| Threshold::parse(selector, expression))
        })
        .collect()
}

pub fn evaluate(snapshot: &MetricsSnapshot, thresholds: &[Threshold]) -> Vec<ThresholdResult> {
    thresholds.iter().map(|t| t.evaluate(snapshot)).collect()
}

/// Overall verdict: every threshold passed
pub fn verdict(results: &[ThresholdResult]) -> bool {
    results.iter().all(|r| r.passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{names, tags, MetricsRecorder, MetricsSink};
    use std::time::Duration;

    fn errors_sink(failures: u64, total: u64) -> MetricsSink {
        let sink = MetricsSink::new();
        let none = Tags::new();
        for i in 0..total {
            sink.rate(names::ERRORS, &none, i < failures);
        }
        sink
    }

    #[test]
    fn test_error_rate_threshold() {
        let threshold = Threshold::parse("errors", "rate<0.01").unwrap();

        let ok = threshold.evaluate(&errors_sink(5, 1000).snapshot(Duration::from_secs(10)));
        assert!(ok.passed);
        assert_eq!(ok.observed, Some(0.005));

        let bad = threshold.evaluate(&errors_sink(15, 1000).snapshot(Duration::from_secs(10)));
        assert!(!bad.passed);
        assert_eq!(bad.observed, Some(0.015));
        assert!(bad.error.is_none());
    }

    #[test]
    fn test_parse_expressions() {
        let t = Threshold::parse("http_req_duration", "p(95) < 500").unwrap();
        assert_eq!(t.aggregate(), Aggregate::Percentile(95.0));
        assert_eq!(t.comparison, Comparison::Lt);
        assert_eq!(t.value, 500.0);

        let t = Threshold::parse("iterations", "count>=10").unwrap();
        assert_eq!(t.aggregate(), Aggregate::Count);
        assert_eq!(t.comparison, Comparison::Ge);

        let t = Threshold::parse("waiting_time", "avg<=200.5").unwrap();
        assert_eq!(t.comparison, Comparison::Le);
        assert_eq!(t.value, 200.5);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Threshold::parse("errors", "rate 0.01"),
            Err(ThresholdError::InvalidExpression { .. })
        ));
        assert!(matches!(
            Threshold::parse("errors", "mean<1"),
            Err(ThresholdError::InvalidExpression { .. })
        ));
        assert!(matches!(
            Threshold::parse("errors", "p(101)<1"),
            Err(ThresholdError::InvalidExpression { .. })
        ));
        assert!(matches!(
            Threshold::parse("errors", "rate<abc"),
            Err(ThresholdError::InvalidExpression { .. })
        ));
        assert!(matches!(
            Threshold::parse("errors{route", "rate<1"),
            Err(ThresholdError::InvalidSelector { .. })
        ));
        assert!(matches!(
            Threshold::parse("errors{route}", "rate<1"),
            Err(ThresholdError::InvalidSelector { .. })
        ));
        assert!(matches!(
            Threshold::parse("", "rate<1"),
            Err(ThresholdError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_kind_applicability() {
        let p95 = Threshold::parse("errors", "p(95)<1").unwrap();
        assert!(matches!(
            p95.check_kind(MetricKind::Rate),
            Err(ThresholdError::KindMismatch { .. })
        ));
        assert!(p95.check_kind(MetricKind::Trend).is_ok());

        let rate = Threshold::parse("http_reqs", "rate>10").unwrap();
        assert!(rate.check_kind(MetricKind::Counter).is_ok());
        assert!(rate.check_kind(MetricKind::Trend).is_err());

        let count = Threshold::parse("errors", "count<10").unwrap();
        assert!(count.check_kind(MetricKind::Rate).is_err());
    }

    #[test]
    fn test_insufficient_data() {
        let sink = MetricsSink::new();
        sink.declare(names::HTTP_REQ_DURATION, MetricKind::Trend).unwrap();
        let snapshot = sink.snapshot(Duration::from_secs(1));

        for threshold in [
            Threshold::parse("http_req_duration", "p(95)<500").unwrap(),
            Threshold::parse("not_recorded", "rate<1").unwrap(),
        ] {
            let result = threshold.evaluate(&snapshot);
            assert!(!result.passed);
            assert_eq!(result.observed, None);
            assert!(matches!(result.error, Some(ThresholdError::InsufficientData { .. })));
        }
    }

    #[test]
    fn test_tag_filtered_selector() {
        let sink = MetricsSink::new();
        for ms in [100.0, 120.0, 140.0] {
            sink.trend(names::HTTP_REQ_DURATION, &tags([("route", "fast")]), ms);
        }
        for ms in [900.0, 1100.0] {
            sink.trend(names::HTTP_REQ_DURATION, &tags([("route", "slow")]), ms);
        }
        let snapshot = sink.snapshot(Duration::from_secs(1));

        let fast = Threshold::parse("http_req_duration{route:fast}", "max<500").unwrap();
        assert_eq!(fast.filter(), &tags([("route", "fast")]));
        let result = fast.evaluate(&snapshot);
        assert!(result.passed);
        assert_eq!(result.observed, Some(140.0));

        let all = Threshold::parse("http_req_duration", "max<500").unwrap();
        assert!(!all.evaluate(&snapshot).passed);

        let unknown_tag = Threshold::parse("http_req_duration{route:other}", "max<500").unwrap();
        assert!(matches!(
            unknown_tag.evaluate(&snapshot).error,
            Some(ThresholdError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_counter_rate_and_verdict() {
        let sink = MetricsSink::new();
        sink.add(names::HTTP_REQS, &Tags::new(), 50);
        let snapshot = sink.snapshot(Duration::from_secs(10));

        let mut config = BTreeMap::new();
        config.insert(
            names::HTTP_REQS.to_string(),
            vec!["rate>=5".to_string(), "count>100".to_string()],
        );
        let thresholds = parse_thresholds(&config).unwrap();
        let results = evaluate(&snapshot, &thresholds);

        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert_eq!(results[0].observed, Some(5.0));
        assert!(!results[1].passed);
        assert!(!verdict(&results));
        assert!(verdict(&results[..1]));
    }

    #[test]
    fn test_result_serializes_error_message() {
        let result = Threshold::parse("gone", "rate<1")
            .unwrap()
            .evaluate(&MetricsSink::new().snapshot(Duration::from_secs(1)));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["error"], "No samples for 'gone'");
    }
}
