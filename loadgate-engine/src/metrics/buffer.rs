//! Per-iteration staging of samples

use super::{MetricValue, MetricsRecorder, MetricsSink, Tags};
use parking_lot::Mutex;
use tracing::warn;

/// Holds the samples of one iteration until it completes
///
/// Dropping the buffer without committing discards every sample, which is
/// what happens to an iteration that is forcibly stopped.
#[derive(Debug, Default)]
pub struct IterationBuffer {
    samples: Mutex<Vec<(String, Tags, MetricValue)>>,
}

impl IterationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Move every sample into the sink, returning how many were accepted
    pub fn commit(self, sink: &MetricsSink) -> usize {
        let samples = self.samples.into_inner();
        let mut accepted = 0;
        for (name, tags, value) in samples {
            match sink.try_record(&name, &tags, value) {
                Ok(()) => accepted += 1,
                Err(e) => warn!("Dropping sample: {}", e),
            }
        }
        accepted
    }
}

impl MetricsRecorder for IterationBuffer {
    fn record(&self, name: &str, tags: &Tags, value: MetricValue) {
        self.samples
            .lock()
            .push((name.to_string(), tags.clone(), value));
    }
}
