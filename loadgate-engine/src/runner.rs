//! Load test assembly
//!
//! [`LoadTest`] turns a validated [`LoadgateConfig`] into a ready-to-run
//! engine: the route table, the HTTP collaborator, the metrics sink with
//! every built-in metric declared, the parsed thresholds and the scheduler.
//! Everything that can be wrong with a configuration fails here, before the
//! first virtual user exists.

use crate::dispatcher::Dispatcher;
use crate::error::{LoadError, LoadResult};
use crate::metrics::{names, MetricsSink};
use crate::report::RunReport;
use crate::routes::RouteTable;
use crate::scenario::{self, Scenario};
use crate::scheduler::{RampProfile, Scheduler, SchedulerSettings, SchedulerStatus, Workload};
use crate::thresholds::{self, Threshold};
use crate::validator::{CheckSettings, Validator};
use chrono::Utc;
use loadgate_config::{LoadgateConfig, TargetKind};
use loadgate_http::{ClientSettings, HttpClient, MockBackend, ReqwestClient};
use loadgate_logging::{Diagnostics, TracingDiagnostics};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Builder for [`LoadTest`] with optional collaborator overrides
pub struct LoadTestBuilder {
    config: LoadgateConfig,
    client: Option<Arc<dyn HttpClient>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    scenario: Option<Arc<dyn Scenario>>,
}

impl LoadTestBuilder {
    /// Replace the client chosen by `target`
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Replace the built-in scenario chosen by `scenario`
    pub fn scenario(mut self, scenario: Arc<dyn Scenario>) -> Self {
        self.scenario = Some(scenario);
        self
    }

    pub fn build(self) -> LoadResult<LoadTest> {
        let config = self.config;
        config.validate_all()?;

        let routes = Arc::new(RouteTable::from_config(&config.routes)?);
        if routes.is_empty() {
            return Err(LoadError::Configuration("no routes configured".to_string()));
        }
        let profile = RampProfile::from_config(&config.load)?;

        let client = match self.client {
            Some(client) => client,
            None => default_client(&config)?,
        };
        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(TracingDiagnostics));

        let validator = Validator::new(CheckSettings::from(&config.checks), Arc::clone(&diagnostics));
        let sink = MetricsSink::new();
        for (name, kind) in names::BUILTIN {
            sink.declare(name, kind)?;
        }
        for (name, kind) in validator.metric_kinds() {
            sink.declare(name, kind)?;
        }

        let thresholds = thresholds::parse_thresholds(&config.thresholds)?;
        for threshold in &thresholds {
            if let Some(kind) = sink.kind_of(threshold.metric()) {
                threshold.check_kind(kind)?;
            }
        }

        let dispatcher =
            Dispatcher::new(routes, client, diagnostics).with_base_url(config.http.base_url.clone());
        let scenario = self
            .scenario
            .unwrap_or_else(|| scenario::builtin(config.scenario, &dispatcher));

        info!(
            "Load test ready: {} routes, {} scenario, {} thresholds, target {:?}",
            dispatcher.routes().len(),
            scenario.name(),
            thresholds.len(),
            config.target
        );

        Ok(LoadTest {
            run_id: Uuid::new_v4(),
            scheduler: Scheduler::new(profile, SchedulerSettings::from(&config.load)),
            workload: Arc::new(Workload {
                scenario,
                dispatcher: Arc::new(dispatcher),
                validator: Arc::new(validator),
                sink: Arc::new(sink),
            }),
            thresholds,
            cancel: CancellationToken::new(),
        })
    }
}

fn default_client(config: &LoadgateConfig) -> LoadResult<Arc<dyn HttpClient>> {
    Ok(match config.target {
        TargetKind::Mock => {
            Arc::new(MockBackend::new().with_simulated_latency(config.mock.simulate_latency))
        }
        TargetKind::Http => Arc::new(ReqwestClient::new(ClientSettings::from(&config.http))?),
    })
}

/// A fully assembled run
pub struct LoadTest {
    run_id: Uuid,
    scheduler: Scheduler,
    workload: Arc<Workload>,
    thresholds: Vec<Threshold>,
    cancel: CancellationToken,
}

impl LoadTest {
    pub fn builder(config: LoadgateConfig) -> LoadTestBuilder {
        LoadTestBuilder {
            config,
            client: None,
            diagnostics: None,
            scenario: None,
        }
    }

    pub fn from_config(config: &LoadgateConfig) -> LoadResult<Self> {
        Self::builder(config.clone()).build()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> watch::Receiver<SchedulerStatus> {
        self.scheduler.subscribe()
    }

    /// Run to completion, then evaluate thresholds against the final metrics
    pub async fn run(self) -> RunReport {
        let started_at = Utc::now();
        info!(run_id = %self.run_id, "Starting load test");

        let outcome = self
            .scheduler
            .run(Arc::clone(&self.workload), self.cancel.clone())
            .await;

        let snapshot = self.workload.sink.snapshot(outcome.elapsed);
        let results = thresholds::evaluate(&snapshot, &self.thresholds);
        for result in results.iter().filter(|r| !r.passed) {
            match &result.error {
                Some(e) => warn!("Threshold {} {} failed: {}", result.selector, result.expression, e),
                None => warn!(
                    "Threshold {} {} failed (observed {:?})",
                    result.selector, result.expression, result.observed
                ),
            }
        }

        let report = RunReport::build(
            self.run_id,
            started_at,
            &outcome,
            &snapshot,
            &self.thresholds,
            results,
        );
        info!(run_id = %self.run_id, passed = report.passed, "Load test finished");
        report
    }
}
