//! Response validation

use crate::dispatcher::DispatchError;
use crate::metrics::{names, MetricKind, MetricsRecorder, Tags};
use loadgate_config::ChecksConfig;
use loadgate_http::ResponseRecord;
use loadgate_logging::{DiagnosticRecord, Diagnostics};
use std::sync::Arc;
use std::time::Duration;

/// Check parameters and the names of the metrics the validator writes
#[derive(Debug, Clone, PartialEq)]
pub struct CheckSettings {
    pub max_duration: Duration,
    pub required_header: String,
    pub success_metric: String,
    pub error_metric: String,
    pub waiting_metric: String,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self::from(&ChecksConfig::default())
    }
}

impl From<&ChecksConfig> for CheckSettings {
    fn from(config: &ChecksConfig) -> Self {
        Self {
            max_duration: config.max_duration,
            required_header: config.required_header.clone(),
            success_metric: config.success_metric.clone(),
            error_metric: config.error_metric.clone(),
            waiting_metric: config.waiting_metric.clone(),
        }
    }
}

/// Outcome of one named check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

pub struct Validator {
    settings: CheckSettings,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Validator {
    pub fn new(settings: CheckSettings, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            settings,
            diagnostics,
        }
    }

    pub fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    /// Metrics written by the validator, for declaring them up front
    pub fn metric_kinds(&self) -> [(&str, MetricKind); 3] {
        [
            (self.settings.success_metric.as_str(), MetricKind::Rate),
            (self.settings.error_metric.as_str(), MetricKind::Rate),
            (self.settings.waiting_metric.as_str(), MetricKind::Trend),
        ]
    }

    /// Evaluate every check without recording anything
    pub fn checks(&self, response: &ResponseRecord, expected_status: u16) -> Vec<CheckOutcome> {
        let max_ms = self.settings.max_duration.as_millis();
        let duration_ms = response.timings.duration.as_secs_f64() * 1000.0;
        let header = &self.settings.required_header;

        vec![
            CheckOutcome {
                name: format!("status is {}", expected_status),
                passed: response.status == expected_status,
                expected: expected_status.to_string(),
                actual: response.status.to_string(),
            },
            CheckOutcome {
                name: format!("response time < {}ms", max_ms),
                passed: response.timings.duration < self.settings.max_duration,
                expected: format!("< {}ms", max_ms),
                actual: format!("{:.1}ms", duration_ms),
            },
            CheckOutcome {
                name: format!("{} present", header),
                passed: response.header(header).is_some(),
                expected: "present".to_string(),
                actual: if response.header(header).is_some() {
                    "present".to_string()
                } else {
                    "missing".to_string()
                },
            },
        ]
    }

    /// Run the checks and record their outcome exactly once
    ///
    /// Returns the conjunction of all checks.
    pub fn validate(
        &self,
        route: &str,
        response: &ResponseRecord,
        expected_status: u16,
        recorder: &dyn MetricsRecorder,
    ) -> bool {
        let route_tags: Tags = [(names::tag::ROUTE.to_string(), route.to_string())]
            .into_iter()
            .collect();
        let mut passed = true;

        for check in self.checks(response, expected_status) {
            let mut tags = route_tags.clone();
            tags.insert(names::tag::CHECK.to_string(), check.name.clone());
            recorder.rate(names::CHECKS, &tags, check.passed);

            if !check.passed {
                passed = false;
                self.diagnostics.record(DiagnosticRecord::check_failed(
                    route,
                    &check.name,
                    &check.expected,
                    &check.actual,
                ));
            }
        }

        recorder.rate(&self.settings.success_metric, &route_tags, passed);
        recorder.rate(&self.settings.error_metric, &route_tags, !passed);
        recorder.trend_duration(&self.settings.waiting_metric, &route_tags, response.timings.waiting);
        passed
    }

    /// Count a request that produced no response as a failed validation
    pub fn record_failure(&self, error: &DispatchError, recorder: &dyn MetricsRecorder) {
        let mut route_tags = Tags::new();
        if let Some(route) = error.route() {
            route_tags.insert(names::tag::ROUTE.to_string(), route.to_string());
        }
        recorder.rate(&self.settings.success_metric, &route_tags, false);
        recorder.rate(&self.settings.error_metric, &route_tags, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricSummary, MetricsSink};
    use crate::routes::RouteError;
    use loadgate_http::{Headers, Timings};
    use loadgate_logging::{DiagnosticKind, MemoryDiagnostics};

    fn response(status: u16, duration_ms: u64, content_type: bool) -> ResponseRecord {
        let mut headers = Headers::new();
        if content_type {
            headers.insert("content-type", "application/json");
        }
        ResponseRecord::new(
            status,
            headers,
            b"{}".to_vec(),
            Timings::new(Duration::from_millis(duration_ms / 2), Duration::from_millis(duration_ms)),
        )
    }

    fn rate(sink: &MetricsSink, name: &str) -> (u64, u64) {
        match sink.snapshot(Duration::from_secs(1)).aggregate(name, &Tags::new()) {
            Some(MetricSummary::Rate { passes, total, .. }) => (passes, total),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_passing_response() {
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let validator = Validator::new(CheckSettings::default(), diagnostics.clone());
        let sink = MetricsSink::new();

        assert!(validator.validate("users", &response(200, 120, true), 200, &sink));
        assert_eq!(rate(&sink, names::SUCCESS_RATE), (1, 1));
        assert_eq!(rate(&sink, names::ERRORS), (0, 1));
        assert_eq!(rate(&sink, names::CHECKS), (3, 3));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_each_check_can_fail() {
        let validator = Validator::new(CheckSettings::default(), Arc::new(MemoryDiagnostics::new()));
        let names: Vec<_> = validator
            .checks(&response(200, 10, true), 200)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            names,
            vec!["status is 200", "response time < 500ms", "Content-Type present"]
        );

        let failing = |r: ResponseRecord| {
            validator
                .checks(&r, 200)
                .into_iter()
                .filter(|c| !c.passed)
                .map(|c| c.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(failing(response(404, 10, true)), vec!["status is 200"]);
        assert_eq!(failing(response(200, 500, true)), vec!["response time < 500ms"]);
        assert_eq!(failing(response(200, 10, false)), vec!["Content-Type present"]);
    }

    #[test]
    fn test_failed_check_emits_diagnostic() {
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let validator = Validator::new(CheckSettings::default(), diagnostics.clone());
        let sink = MetricsSink::new();

        assert!(!validator.validate("missing", &response(404, 10, true), 200, &sink));
        let records = diagnostics.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, DiagnosticKind::CheckFailed);
        assert_eq!(records[0].route, "missing");
        assert_eq!(records[0].expected.as_deref(), Some("200"));
        assert_eq!(records[0].actual.as_deref(), Some("404"));
        assert_eq!(rate(&sink, names::ERRORS), (1, 1));
    }

    #[test]
    fn test_validate_twice_records_twice() {
        let validator = Validator::new(CheckSettings::default(), Arc::new(MemoryDiagnostics::new()));
        let sink = MetricsSink::new();
        let r = response(500, 10, true);

        let first = validator.validate("broken", &r, 200, &sink);
        let second = validator.validate("broken", &r, 200, &sink);
        assert_eq!(first, second);
        assert_eq!(rate(&sink, names::SUCCESS_RATE), (0, 2));
        assert_eq!(rate(&sink, names::ERRORS), (2, 2));
        match sink.snapshot(Duration::from_secs(1)).aggregate(names::WAITING_TIME, &Tags::new()) {
            Some(MetricSummary::Trend(t)) => assert_eq!(t.count, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_record_failure_counts_as_error() {
        let validator = Validator::new(CheckSettings::default(), Arc::new(MemoryDiagnostics::new()));
        let sink = MetricsSink::new();
        let error = DispatchError::from(RouteError::Unknown("gone".to_string()));

        validator.record_failure(&error, &sink);
        assert_eq!(rate(&sink, names::SUCCESS_RATE), (0, 1));
        assert_eq!(rate(&sink, names::ERRORS), (1, 1));
        assert!(sink.kind_of(names::WAITING_TIME).is_none());
    }

    #[test]
    fn test_configurable_metric_names() {
        let settings = CheckSettings {
            success_metric: "gateway_ok".to_string(),
            error_metric: "gateway_errors".to_string(),
            waiting_metric: "gateway_waiting".to_string(),
            ..CheckSettings::default()
        };
        let validator = Validator::new(settings, Arc::new(MemoryDiagnostics::new()));
        let sink = MetricsSink::new();
        validator.validate("users", &response(200, 10, true), 200, &sink);

        assert_eq!(rate(&sink, "gateway_ok"), (1, 1));
        assert_eq!(sink.kind_of("gateway_waiting"), Some(MetricKind::Trend));
        assert!(sink.kind_of(names::SUCCESS_RATE).is_none());
    }
}
