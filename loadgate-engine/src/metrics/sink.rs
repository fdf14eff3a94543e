//! Shared metrics sink

use super::accumulator::Accumulator;
use super::snapshot::{MetricsSnapshot, SeriesSnapshot};
use super::{MetricKind, MetricValue, MetricsError, MetricsRecorder, Tags};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    name: String,
    tags: Tags,
}

/// Concurrent store of every series recorded during a run
///
/// Each series owns its accumulator, so concurrent writers only contend
/// when they hit the same series.
#[derive(Debug, Default)]
pub struct MetricsSink {
    kinds: DashMap<String, MetricKind>,
    series: DashMap<SeriesKey, Arc<Accumulator>>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the kind of a metric before any sample arrives
    pub fn declare(&self, name: &str, kind: MetricKind) -> Result<(), MetricsError> {
        self.claim_kind(name, kind)
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.kinds.get(name).map(|kind| *kind)
    }

    pub fn try_record(&self, name: &str, tags: &Tags, value: MetricValue) -> Result<(), MetricsError> {
        self.claim_kind(name, value.kind())?;

        let key = SeriesKey {
            name: name.to_string(),
            tags: tags.clone(),
        };
        let accumulator = Arc::clone(
            self.series
                .entry(key)
                .or_insert_with(|| Arc::new(Accumulator::new(value.kind())))
                .value(),
        );
        accumulator.apply(value);
        Ok(())
    }

    fn claim_kind(&self, name: &str, kind: MetricKind) -> Result<(), MetricsError> {
        if let Some(existing) = self.kinds.get(name) {
            return check_kind(name, *existing, kind);
        }
        match self.kinds.entry(name.to_string()) {
            Entry::Occupied(entry) => check_kind(name, *entry.get(), kind),
            Entry::Vacant(entry) => {
                entry.insert(kind);
                Ok(())
            }
        }
    }

    /// Copy every series out of the sink
    ///
    /// `elapsed` is the run time used for per-second counter rates.
    pub fn snapshot(&self, elapsed: Duration) -> MetricsSnapshot {
        let mut series: Vec<SeriesSnapshot> = self
            .series
            .iter()
            .map(|entry| SeriesSnapshot {
                name: entry.key().name.clone(),
                tags: entry.key().tags.clone(),
                data: entry.value().data(),
            })
            .collect();
        series.sort_by(|a, b| (&a.name, &a.tags).cmp(&(&b.name, &b.tags)));

        let kinds: BTreeMap<String, MetricKind> = self
            .kinds
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        MetricsSnapshot::new(kinds, series, elapsed)
    }
}

fn check_kind(name: &str, existing: MetricKind, attempted: MetricKind) -> Result<(), MetricsError> {
    if existing == attempted {
        Ok(())
    } else {
        Err(MetricsError::KindMismatch {
            name: name.to_string(),
            existing,
            attempted,
        })
    }
}

impl MetricsRecorder for MetricsSink {
    fn record(&self, name: &str, tags: &Tags, value: MetricValue) {
        if let Err(e) = self.try_record(name, tags, value) {
            warn!("Dropping sample: {}", e);
        }
    }
}
