//! Names of the metrics recorded by the engine itself

use super::MetricKind;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_WAITING: &str = "http_req_waiting";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const CHECKS: &str = "checks";
pub const SUCCESS_RATE: &str = "success_rate";
pub const ERRORS: &str = "errors";
pub const WAITING_TIME: &str = "waiting_time";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
pub const GROUP_DURATION: &str = "group_duration";

/// Metrics whose names cannot be changed through configuration
pub const BUILTIN: [(&str, MetricKind); 9] = [
    (HTTP_REQS, MetricKind::Counter),
    (HTTP_REQ_DURATION, MetricKind::Trend),
    (HTTP_REQ_WAITING, MetricKind::Trend),
    (HTTP_REQ_FAILED, MetricKind::Rate),
    (CHECKS, MetricKind::Rate),
    (ITERATIONS, MetricKind::Counter),
    (ITERATION_DURATION, MetricKind::Trend),
    (DROPPED_ITERATIONS, MetricKind::Counter),
    (GROUP_DURATION, MetricKind::Trend),
];

/// Tag keys
pub mod tag {
    pub const ROUTE: &str = "route";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const CHECK: &str = "check";
    pub const GROUP: &str = "group";
}
