//! End-of-run summary

use crate::metrics::{MetricKind, MetricSummary, MetricsSnapshot, Tags};
use crate::scheduler::RunOutcome;
use crate::thresholds::{Threshold, ThresholdResult};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

/// Summary of one metric across all its series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReport {
    pub name: String,
    /// `None` for a threshold metric nothing ever recorded
    pub kind: Option<MetricKind>,
    pub summary: Option<MetricSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
    pub aborted: bool,
    pub vus_max: u64,
    pub iterations_completed: u64,
    pub iterations_dropped: u64,
    pub metrics: Vec<MetricReport>,
    pub thresholds: Vec<ThresholdResult>,
    pub passed: bool,
}

fn as_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl RunReport {
    /// Assemble the report; every known metric and every threshold metric
    /// appears exactly once, sorted by name
    pub fn build(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        outcome: &RunOutcome,
        snapshot: &MetricsSnapshot,
        thresholds: &[Threshold],
        results: Vec<ThresholdResult>,
    ) -> Self {
        let names: BTreeSet<&str> = snapshot
            .metric_names()
            .chain(thresholds.iter().map(Threshold::metric))
            .collect();
        let all = Tags::new();

        let metrics = names
            .into_iter()
            .map(|name| MetricReport {
                name: name.to_string(),
                kind: snapshot.kind_of(name),
                summary: snapshot.aggregate(name, &all),
            })
            .collect();

        let passed = crate::thresholds::verdict(&results);
        Self {
            run_id,
            started_at,
            elapsed: outcome.elapsed,
            aborted: outcome.aborted,
            vus_max: outcome.vus_max,
            iterations_completed: outcome.iterations_completed,
            iterations_dropped: outcome.iterations_dropped,
            metrics,
            thresholds: results,
            passed,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricReport> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
