//! Iteration bodies
//!
//! A [`Scenario`] is what one virtual user runs per iteration. It receives
//! an [`IterationContext`] that dispatches and validates route invocations
//! against the iteration's metric buffer.

use crate::dispatcher::{BatchRequest, DispatchError, Dispatcher};
use crate::metrics::{names, tags, MetricValue, MetricsRecorder, Tags};
use crate::routes::Route;
use crate::validator::Validator;
use async_trait::async_trait;
use futures::future::BoxFuture;
use loadgate_config::ScenarioKind;
use rand::rngs::StdRng;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::warn;

/// Everything an iteration may touch
pub struct IterationContext<'a> {
    /// Ordinal of the running virtual user
    pub vu: u64,
    /// 1-based iteration counter of this virtual user
    pub iteration: u64,
    pub rng: &'a mut StdRng,
    pub recorder: &'a dyn MetricsRecorder,
    pub dispatcher: &'a Dispatcher,
    pub validator: &'a Validator,
}

impl<'a> IterationContext<'a> {
    /// Dispatch the named route and validate its response
    pub async fn invoke(&mut self, name: &str) -> bool {
        self.invoke_with_body(name, None).await
    }

    pub async fn invoke_with_body(&mut self, name: &str, body: Option<&JsonValue>) -> bool {
        let dispatcher = self.dispatcher;
        match dispatcher.routes().resolve(name) {
            Ok(route) => self.invoke_route(route, body).await,
            Err(e) => {
                let e = DispatchError::from(e);
                warn!(vu = self.vu, "{}", e);
                self.validator.record_failure(&e, self.recorder);
                false
            }
        }
    }

    pub async fn invoke_route(&mut self, route: &Route, body: Option<&JsonValue>) -> bool {
        match self
            .dispatcher
            .dispatch(route, body, &mut *self.rng, self.recorder)
            .await
        {
            Ok(response) => {
                self.validator
                    .validate(&route.name, &response, route.expected_status, self.recorder)
            }
            Err(e) => {
                self.validator.record_failure(&e, self.recorder);
                false
            }
        }
    }

    /// Issue a batch and validate every response; verdicts keep request order
    pub async fn invoke_batch(&mut self, requests: &[BatchRequest]) -> Vec<bool> {
        let dispatcher = self.dispatcher;
        let results = dispatcher
            .batch(requests, &mut *self.rng, self.recorder)
            .await;

        requests
            .iter()
            .zip(results)
            .map(|(request, result)| match result {
                Ok(response) => {
                    let expected = dispatcher
                        .routes()
                        .resolve(&request.route)
                        .map(|route| route.expected_status)
                        .unwrap_or(200);
                    self.validator
                        .validate(&request.route, &response, expected, self.recorder)
                }
                Err(e) => {
                    self.validator.record_failure(&e, self.recorder);
                    false
                }
            })
            .collect()
    }

    /// Run `f` as a named group of steps
    ///
    /// Samples recorded inside the group carry a `group` tag (the innermost
    /// group wins when groups nest), and the group's wall time is recorded
    /// as a `group_duration` sample.
    ///
    /// ```ignore
    /// ctx.group("login", |ctx| Box::pin(async move { ctx.invoke("login").await })).await;
    /// ```
    pub async fn group<T, F>(&mut self, name: &str, f: F) -> T
    where
        F: for<'g> FnOnce(&'g mut IterationContext<'_>) -> BoxFuture<'g, T> + Send,
        T: Send,
    {
        let recorder = GroupRecorder {
            inner: self.recorder,
            group: name.to_string(),
        };
        let started = Instant::now();
        let output = {
            let mut grouped = IterationContext {
                vu: self.vu,
                iteration: self.iteration,
                rng: &mut *self.rng,
                recorder: &recorder,
                dispatcher: self.dispatcher,
                validator: self.validator,
            };
            f(&mut grouped).await
        };

        self.recorder.trend_duration(
            names::GROUP_DURATION,
            &tags([(names::tag::GROUP, name)]),
            started.elapsed(),
        );
        output
    }
}

/// Adds the enclosing group's tag to samples that have none yet
struct GroupRecorder<'a> {
    inner: &'a dyn MetricsRecorder,
    group: String,
}

impl MetricsRecorder for GroupRecorder<'_> {
    fn record(&self, name: &str, tags: &Tags, value: MetricValue) {
        if tags.contains_key(names::tag::GROUP) {
            self.inner.record(name, tags, value);
        } else {
            let mut tagged = tags.clone();
            tagged.insert(names::tag::GROUP.to_string(), self.group.clone());
            self.inner.record(name, &tagged, value);
        }
    }
}

/// Body of one iteration
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    async fn iteration(&self, ctx: &mut IterationContext<'_>);
}

/// One weighted random route per iteration
#[derive(Debug, Clone, Default)]
pub struct WeightedScenario {
    candidates: Option<Vec<String>>,
}

impl WeightedScenario {
    /// Draw from every registered route
    pub fn all() -> Self {
        Self { candidates: None }
    }

    /// Draw only from the given routes
    pub fn among<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: Some(names.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Scenario for WeightedScenario {
    fn name(&self) -> &str {
        "weighted"
    }

    async fn iteration(&self, ctx: &mut IterationContext<'_>) {
        let dispatcher = ctx.dispatcher;
        let selected = match &self.candidates {
            None => dispatcher.routes().select_any(&mut *ctx.rng),
            Some(names) => dispatcher.routes().select_weighted(names.as_slice(), &mut *ctx.rng),
        };
        match selected {
            Ok(route) => {
                ctx.invoke_route(route, None).await;
            }
            Err(e) => warn!(vu = ctx.vu, "No route selected: {}", e),
        }
    }
}

/// Every route once per iteration, in order
#[derive(Debug, Clone)]
pub struct SequentialScenario {
    routes: Vec<String>,
}

impl SequentialScenario {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Scenario for SequentialScenario {
    fn name(&self) -> &str {
        "sequential"
    }

    async fn iteration(&self, ctx: &mut IterationContext<'_>) {
        for route in &self.routes {
            ctx.invoke(route).await;
        }
    }
}

/// Every route issued concurrently, once per iteration
#[derive(Debug, Clone)]
pub struct BatchScenario {
    requests: Vec<BatchRequest>,
}

impl BatchScenario {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requests: routes.into_iter().map(BatchRequest::new).collect(),
        }
    }
}

#[async_trait]
impl Scenario for BatchScenario {
    fn name(&self) -> &str {
        "batch"
    }

    async fn iteration(&self, ctx: &mut IterationContext<'_>) {
        ctx.invoke_batch(&self.requests).await;
    }
}

/// Built-in scenario for a configured kind over the registered routes
pub fn builtin(kind: ScenarioKind, dispatcher: &Dispatcher) -> Arc<dyn Scenario> {
    let names = dispatcher.routes().names().map(str::to_string);
    match kind {
        ScenarioKind::Weighted => Arc::new(WeightedScenario::all()),
        ScenarioKind::Sequential => Arc::new(SequentialScenario::new(names)),
        ScenarioKind::Batch => Arc::new(BatchScenario::new(names)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{IterationBuffer, MetricKind, MetricSummary, MetricsSink};
    use crate::routes::{Route, RouteTable};
    use crate::validator::CheckSettings;
    use loadgate_http::MockBackend;
    use loadgate_logging::MemoryDiagnostics;
    use rand::SeedableRng;
    use std::time::Duration;

    fn fixture() -> (Dispatcher, Validator) {
        let mut table = RouteTable::new();
        table.register(Route::get("home", "/get")).unwrap();
        table.register(Route::get("missing", "/status/404")).unwrap();
        table
            .register(Route::get("heavy", "/heavy").with_weight(3.0))
            .unwrap();
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let dispatcher = Dispatcher::new(Arc::new(table), Arc::new(MockBackend::new()), diagnostics.clone());
        let validator = Validator::new(CheckSettings::default(), diagnostics);
        (dispatcher, validator)
    }

    async fn run(scenario: &dyn Scenario, iterations: u64) -> MetricsSink {
        let (dispatcher, validator) = fixture();
        let sink = MetricsSink::new();
        let mut rng = StdRng::seed_from_u64(11);
        for iteration in 1..=iterations {
            let buffer = IterationBuffer::new();
            let mut ctx = IterationContext {
                vu: 1,
                iteration,
                rng: &mut rng,
                recorder: &buffer,
                dispatcher: &dispatcher,
                validator: &validator,
            };
            scenario.iteration(&mut ctx).await;
            buffer.commit(&sink);
        }
        sink
    }

    fn requests_per_route(sink: &MetricsSink, route: &str) -> u64 {
        let filter: Tags = crate::metrics::tags([("route", route)]);
        sink.snapshot(Duration::from_secs(1))
            .aggregate(names::HTTP_REQS, &filter)
            .map(|s| s.sample_count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_sequential_visits_every_route() {
        let sink = run(&SequentialScenario::new(["home", "missing"]), 4).await;
        assert_eq!(requests_per_route(&sink, "home"), 4);
        assert_eq!(requests_per_route(&sink, "missing"), 4);
        match sink.snapshot(Duration::from_secs(1)).aggregate(names::ERRORS, &Tags::new()) {
            Some(MetricSummary::Rate { passes, total, .. }) => assert_eq!((passes, total), (4, 8)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_weighted_subset() {
        let sink = run(&WeightedScenario::among(["home"]), 10).await;
        assert_eq!(requests_per_route(&sink, "home"), 10);
        assert_eq!(requests_per_route(&sink, "heavy"), 0);
    }

    #[tokio::test]
    async fn test_weighted_all_issues_one_request_per_iteration() {
        let sink = run(&WeightedScenario::all(), 200).await;
        let total: u64 = ["home", "missing", "heavy"]
            .iter()
            .map(|r| requests_per_route(&sink, r))
            .sum();
        assert_eq!(total, 200);
        assert!(requests_per_route(&sink, "heavy") > requests_per_route(&sink, "home"));
    }

    #[tokio::test]
    async fn test_batch_scenario_and_unknown_route() {
        let sink = run(&BatchScenario::new(["home", "nope"]), 2).await;
        assert_eq!(requests_per_route(&sink, "home"), 2);
        match sink.snapshot(Duration::from_secs(1)).aggregate(names::SUCCESS_RATE, &Tags::new()) {
            Some(MetricSummary::Rate { passes, total, .. }) => assert_eq!((passes, total), (2, 4)),
            other => panic!("unexpected {:?}", other),
        }
    }

    /// Browses inside one group, looks up inside a nested one, then
    /// requests outside any group
    struct Grouped;

    #[async_trait]
    impl Scenario for Grouped {
        fn name(&self) -> &str {
            "grouped"
        }

        async fn iteration(&self, ctx: &mut IterationContext<'_>) {
            ctx.group("browse", |ctx| {
                Box::pin(async move {
                    ctx.invoke("home").await;
                    ctx.group("lookup", |ctx| Box::pin(async move { ctx.invoke("missing").await }))
                        .await
                })
            })
            .await;
            ctx.invoke("heavy").await;
        }
    }

    #[tokio::test]
    async fn test_groups_tag_samples_and_record_duration() {
        let sink = run(&Grouped, 3).await;
        let snapshot = sink.snapshot(Duration::from_secs(1));
        let in_group = |group: &str| crate::metrics::tags([("group", group)]);

        let count = |name: &str, filter: &Tags| {
            snapshot
                .aggregate(name, filter)
                .map(|s| s.sample_count())
                .unwrap_or(0)
        };
        assert_eq!(count(names::HTTP_REQS, &in_group("browse")), 3);
        assert_eq!(count(names::HTTP_REQS, &in_group("lookup")), 3);
        assert_eq!(
            count(
                names::HTTP_REQS,
                &crate::metrics::tags([("group", "lookup"), ("route", "missing")])
            ),
            3
        );

        // Outside any group
        assert_eq!(requests_per_route(&sink, "heavy"), 3);
        assert!(snapshot
            .series(names::HTTP_REQS)
            .filter(|s| s.tags.get("route").map(String::as_str) == Some("heavy"))
            .all(|s| !s.tags.contains_key("group")));

        // Failed checks inside the nested group keep its tag
        match snapshot.aggregate(names::ERRORS, &in_group("lookup")) {
            Some(MetricSummary::Rate { passes, total, .. }) => assert_eq!((passes, total), (3, 3)),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(snapshot.kind_of(names::GROUP_DURATION), Some(MetricKind::Trend));
        assert_eq!(count(names::GROUP_DURATION, &in_group("browse")), 3);
        assert_eq!(count(names::GROUP_DURATION, &in_group("lookup")), 3);
        assert_eq!(count(names::GROUP_DURATION, &Tags::new()), 6);
    }

    #[test]
    fn test_builtin_kinds() {
        let (dispatcher, _) = fixture();
        assert_eq!(builtin(ScenarioKind::Weighted, &dispatcher).name(), "weighted");
        assert_eq!(builtin(ScenarioKind::Sequential, &dispatcher).name(), "sequential");
        assert_eq!(builtin(ScenarioKind::Batch, &dispatcher).name(), "batch");
    }
}
