//! Load generation engine for loadgate
//!
//! This crate drives virtual users through a ramp profile, dispatches
//! weighted route invocations, validates responses, aggregates metrics and
//! evaluates SLO thresholds into a final verdict.

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod report;
pub mod routes;
pub mod runner;
pub mod scenario;
pub mod scheduler;
pub mod thresholds;
pub mod validator;

// Re-export commonly used types
pub use dispatcher::{BatchRequest, DispatchError, Dispatcher};
pub use error::{LoadError, LoadResult};
pub use metrics::{
    IterationBuffer, MetricKind, MetricSummary, MetricValue, MetricsError, MetricsRecorder,
    MetricsSink, MetricsSnapshot, Tags, TrendSummary,
};
pub use report::{MetricReport, RunReport};
pub use routes::{DynamicSource, Route, RouteError, RouteTable, WeightedSelector};
pub use runner::{LoadTest, LoadTestBuilder};
pub use scenario::{BatchScenario, IterationContext, Scenario, SequentialScenario, WeightedScenario};
pub use scheduler::{
    RampProfile, RunOutcome, Scheduler, SchedulerSettings, SchedulerState, SchedulerStatus, Stage,
    ThinkTime, Workload,
};
pub use thresholds::{Threshold, ThresholdError, ThresholdResult};
pub use validator::{CheckOutcome, CheckSettings, Validator};
