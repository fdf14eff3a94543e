//! Per-series accumulators

use super::{MetricKind, MetricValue, SeriesData};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulated state of one series
#[derive(Debug)]
pub(crate) enum Accumulator {
    Counter { total: AtomicU64 },
    /// `(passes, total)`, updated and read together
    Rate { outcomes: Mutex<(u64, u64)> },
    Trend { values: Mutex<Vec<f64>> },
}

impl Accumulator {
    pub(crate) fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Accumulator::Counter {
                total: AtomicU64::new(0),
            },
            MetricKind::Rate => Accumulator::Rate {
                outcomes: Mutex::new((0, 0)),
            },
            MetricKind::Trend => Accumulator::Trend {
                values: Mutex::new(Vec::new()),
            },
        }
    }

    /// Apply a sample. The caller guarantees the kinds agree; mismatched
    /// samples are ignored here.
    pub(crate) fn apply(&self, value: MetricValue) {
        match (self, value) {
            (Accumulator::Counter { total }, MetricValue::Counter(n)) => {
                total.fetch_add(n, Ordering::Relaxed);
            }
            (Accumulator::Rate { outcomes }, MetricValue::Rate(outcome)) => {
                let mut outcomes = outcomes.lock();
                outcomes.0 += u64::from(outcome);
                outcomes.1 += 1;
            }
            (Accumulator::Trend { values }, MetricValue::Trend(v)) => {
                values.lock().push(v);
            }
            _ => {}
        }
    }

    pub(crate) fn data(&self) -> SeriesData {
        match self {
            Accumulator::Counter { total } => SeriesData::Counter {
                total: total.load(Ordering::Relaxed),
            },
            Accumulator::Rate { outcomes } => {
                let (passes, total) = *outcomes.lock();
                SeriesData::Rate { passes, total }
            }
            Accumulator::Trend { values } => SeriesData::Trend {
                values: values.lock().clone(),
            },
        }
    }
}
