//! Load scheduler
//!
//! Drives virtual users through a ramp profile. Every tick the scheduler
//! computes the target concurrency for the elapsed time and converges on it,
//! spawning new VUs or retiring the most recently spawned ones. Retired VUs
//! finish their in-flight iteration unless their grace period runs out, in
//! which case they are killed and the iteration is discarded.

use crate::dispatcher::Dispatcher;
use crate::error::{LoadError, LoadResult};
use crate::metrics::{names, IterationBuffer, MetricsRecorder, MetricsSink, Tags};
use crate::scenario::{IterationContext, Scenario};
use crate::validator::Validator;
use loadgate_config::LoadConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One segment of a ramp profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Ordered stages plus the grace periods used when VUs are retired
#[derive(Debug, Clone, PartialEq)]
pub struct RampProfile {
    start_vus: u64,
    stages: Vec<Stage>,
    graceful_ramp_down: Duration,
    graceful_stop: Duration,
}

impl RampProfile {
    pub fn new(start_vus: u64, stages: Vec<Stage>) -> LoadResult<Self> {
        if stages.is_empty() {
            return Err(LoadError::Configuration(
                "ramp profile needs at least one stage".to_string(),
            ));
        }
        if let Some(i) = stages.iter().position(|s| s.duration.is_zero()) {
            return Err(LoadError::Configuration(format!(
                "stage {} has a zero duration",
                i
            )));
        }
        Ok(Self {
            start_vus,
            stages,
            graceful_ramp_down: Duration::from_secs(30),
            graceful_stop: Duration::from_secs(30),
        })
    }

    /// A fixed population held for `duration`
    pub fn constant(vus: u64, duration: Duration) -> LoadResult<Self> {
        Self::new(vus, vec![Stage::new(duration, vus)])
    }

    pub fn from_config(config: &LoadConfig) -> LoadResult<Self> {
        let stages = config
            .effective_stages()
            .into_iter()
            .map(|s| Stage::new(s.duration, s.target))
            .collect();
        Ok(Self::new(config.effective_start_vus(), stages)?
            .with_graceful_ramp_down(config.graceful_ramp_down)
            .with_graceful_stop(config.graceful_stop))
    }

    pub fn with_graceful_ramp_down(mut self, grace: Duration) -> Self {
        self.graceful_ramp_down = grace;
        self
    }

    pub fn with_graceful_stop(mut self, grace: Duration) -> Self {
        self.graceful_stop = grace;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn start_vus(&self) -> u64 {
        self.start_vus
    }

    pub fn graceful_ramp_down(&self) -> Duration {
        self.graceful_ramp_down
    }

    pub fn graceful_stop(&self) -> Duration {
        self.graceful_stop
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Highest concurrency the profile ever asks for
    pub fn max_target(&self) -> u64 {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, u64::max)
    }

    /// Index of the stage running at `elapsed`, `None` once the profile ended
    pub fn stage_at(&self, elapsed: Duration) -> Option<usize> {
        let mut end = Duration::ZERO;
        for (i, stage) in self.stages.iter().enumerate() {
            end += stage.duration;
            if elapsed < end {
                return Some(i);
            }
        }
        None
    }

    /// Target concurrency at `elapsed`, linearly interpolated inside the
    /// current stage and rounded to the nearest VU
    pub fn target_at(&self, elapsed: Duration) -> u64 {
        let mut from = self.start_vus;
        let mut start = Duration::ZERO;
        for stage in &self.stages {
            let end = start + stage.duration;
            if elapsed < end {
                let progress = (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                let value = from as f64 + (stage.target as f64 - from as f64) * progress;
                return value.round() as u64;
            }
            from = stage.target;
            start = end;
        }
        from
    }
}

/// Pause between iterations of one VU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min: Duration,
    pub max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn draw(&self, rng: &mut impl Rng) -> Duration {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub think_time: ThinkTime,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            think_time: ThinkTime::new(Duration::from_secs(1), Duration::from_secs(3)),
        }
    }
}

impl From<&LoadConfig> for SchedulerSettings {
    fn from(config: &LoadConfig) -> Self {
        Self {
            tick_interval: config.tick_interval,
            think_time: ThinkTime::new(config.think_time.min, config.think_time.max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    NotStarted,
    /// Inside the stage with this index
    Ramping(usize),
    /// Profile finished, waiting for VUs to stop
    Draining,
    Completed,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::NotStarted => write!(f, "not started"),
            SchedulerState::Ramping(stage) => write!(f, "ramping (stage {})", stage + 1),
            SchedulerState::Draining => write!(f, "draining"),
            SchedulerState::Completed => write!(f, "completed"),
        }
    }
}

/// Published on every scheduler tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub active_vus: u64,
    pub retiring_vus: u64,
    pub target_vus: u64,
    pub elapsed: Duration,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::NotStarted,
            active_vus: 0,
            retiring_vus: 0,
            target_vus: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// What a finished run looked like from the scheduler's side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub vus_max: u64,
    pub iterations_completed: u64,
    pub iterations_dropped: u64,
    pub aborted: bool,
    pub elapsed: Duration,
}

/// Shared by every VU of a run
pub struct Workload {
    pub scenario: Arc<dyn Scenario>,
    pub dispatcher: Arc<Dispatcher>,
    pub validator: Arc<Validator>,
    pub sink: Arc<MetricsSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VuState {
    Running,
    Retiring,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy)]
struct VuReport {
    completed: u64,
    dropped: u64,
}

struct VuHandle {
    ordinal: u64,
    state: VuState,
    retire: CancellationToken,
    kill: CancellationToken,
    deadline: Option<Instant>,
    task: JoinHandle<VuReport>,
}

impl VuHandle {
    fn retire(&mut self, grace: Duration) {
        self.state = VuState::Retiring;
        self.deadline = Some(Instant::now() + grace);
        self.retire.cancel();
    }
}

pub struct Scheduler {
    profile: RampProfile,
    settings: SchedulerSettings,
    status: watch::Sender<SchedulerStatus>,
}

impl Scheduler {
    pub fn new(profile: RampProfile, settings: SchedulerSettings) -> Self {
        let (status, _) = watch::channel(SchedulerStatus::default());
        Self {
            profile,
            settings,
            status,
        }
    }

    pub fn profile(&self) -> &RampProfile {
        &self.profile
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    /// Run the profile to completion or until `cancel` fires
    pub async fn run(&self, workload: Arc<Workload>, cancel: CancellationToken) -> RunOutcome {
        let started = Instant::now();
        let mut run = RunState::default();
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting run: {} stages over {:?}, up to {} VUs",
            self.profile.stages.len(),
            self.profile.total_duration(),
            self.profile.max_target()
        );

        // Ramping
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    run.aborted = true;
                    break;
                }
                _ = ticker.tick() => {}
            }

            let elapsed = started.elapsed();
            let Some(stage) = self.profile.stage_at(elapsed) else {
                break;
            };
            let target = self.profile.target_at(elapsed);

            run.reap().await;
            run.enforce_deadlines();
            self.converge(&mut run, target, &workload, &cancel);
            self.publish(SchedulerState::Ramping(stage), &run, target, elapsed);
        }

        // Draining
        if !run.aborted {
            debug!("Profile finished, draining {} VUs", run.running());
            for vu in run.vus.iter_mut().filter(|vu| vu.state == VuState::Running) {
                vu.retire(self.profile.graceful_stop);
            }

            while !run.vus.is_empty() {
                self.publish(SchedulerState::Draining, &run, 0, started.elapsed());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        run.aborted = true;
                        break;
                    }
                    _ = ticker.tick() => {}
                }
                run.reap().await;
                run.enforce_deadlines();
            }
        }

        if run.aborted {
            warn!("Run cancelled, stopping {} VUs", run.vus.len());
            for vu in &run.vus {
                vu.kill.cancel();
            }
        }
        run.join_all().await;

        let outcome = RunOutcome {
            vus_max: run.vus_max,
            iterations_completed: run.totals.completed,
            iterations_dropped: run.totals.dropped,
            aborted: run.aborted,
            elapsed: started.elapsed(),
        };
        self.publish(SchedulerState::Completed, &run, 0, outcome.elapsed);
        info!(
            "Run finished in {:?}: {} iterations, {} dropped, max {} VUs",
            outcome.elapsed, outcome.iterations_completed, outcome.iterations_dropped, outcome.vus_max
        );
        outcome
    }

    fn converge(
        &self,
        run: &mut RunState,
        target: u64,
        workload: &Arc<Workload>,
        cancel: &CancellationToken,
    ) {
        let running = run.running();
        if target > running {
            for _ in running..target {
                let ordinal = run.next_ordinal;
                run.next_ordinal += 1;
                run.vus.push(self.spawn_vu(ordinal, workload, cancel));
            }
        } else if target < running {
            let mut excess = running - target;
            for vu in run.vus.iter_mut().rev() {
                if excess == 0 {
                    break;
                }
                if vu.state == VuState::Running {
                    debug!(vu = vu.ordinal, "Retiring VU");
                    vu.retire(self.profile.graceful_ramp_down);
                    excess -= 1;
                }
            }
        }
        run.vus_max = run.vus_max.max(run.running());
    }

    fn spawn_vu(&self, ordinal: u64, workload: &Arc<Workload>, cancel: &CancellationToken) -> VuHandle {
        let retire = CancellationToken::new();
        let kill = cancel.child_token();
        debug!(vu = ordinal, "Spawning VU");
        let task = tokio::spawn(run_vu(
            ordinal,
            Arc::clone(workload),
            self.settings.think_time,
            retire.clone(),
            kill.clone(),
        ));
        VuHandle {
            ordinal,
            state: VuState::Running,
            retire,
            kill,
            deadline: None,
            task,
        }
    }

    fn publish(&self, state: SchedulerState, run: &RunState, target: u64, elapsed: Duration) {
        self.status.send_replace(SchedulerStatus {
            state,
            active_vus: run.running(),
            retiring_vus: run.vus.len() as u64 - run.running(),
            target_vus: target,
            elapsed,
        });
    }
}

#[derive(Default)]
struct RunState {
    /// Live VUs in spawn order
    vus: Vec<VuHandle>,
    next_ordinal: u64,
    vus_max: u64,
    totals: VuReport,
    aborted: bool,
}

impl RunState {
    fn running(&self) -> u64 {
        self.vus
            .iter()
            .filter(|vu| vu.state == VuState::Running)
            .count() as u64
    }

    /// Collect VUs whose task has ended
    async fn reap(&mut self) {
        let mut i = 0;
        while i < self.vus.len() {
            if self.vus[i].task.is_finished() {
                let vu = self.vus.remove(i);
                self.collect(vu).await;
            } else {
                i += 1;
            }
        }
    }

    /// Kill retiring VUs whose grace period ran out
    fn enforce_deadlines(&mut self) {
        let now = Instant::now();
        for vu in &mut self.vus {
            if vu.state == VuState::Retiring && vu.deadline.is_some_and(|d| now >= d) {
                debug!(vu = vu.ordinal, "Grace period expired, stopping VU");
                vu.state = VuState::Stopped;
                vu.kill.cancel();
            }
        }
    }

    async fn join_all(&mut self) {
        for vu in std::mem::take(&mut self.vus) {
            self.collect(vu).await;
        }
    }

    async fn collect(&mut self, vu: VuHandle) {
        match vu.task.await {
            Ok(report) => {
                self.totals.completed += report.completed;
                self.totals.dropped += report.dropped;
            }
            Err(e) => warn!(vu = vu.ordinal, "VU task failed: {}", e),
        }
    }
}

async fn run_vu(
    ordinal: u64,
    workload: Arc<Workload>,
    think_time: ThinkTime,
    retire: CancellationToken,
    kill: CancellationToken,
) -> VuReport {
    let mut rng = StdRng::from_entropy();
    let mut report = VuReport::default();
    let no_tags = Tags::new();
    let mut iteration = 0;

    while !retire.is_cancelled() && !kill.is_cancelled() {
        iteration += 1;
        let buffer = IterationBuffer::new();
        let started = Instant::now();

        let finished = {
            let mut ctx = IterationContext {
                vu: ordinal,
                iteration,
                rng: &mut rng,
                recorder: &buffer,
                dispatcher: &workload.dispatcher,
                validator: &workload.validator,
            };
            tokio::select! {
                biased;
                _ = kill.cancelled() => false,
                _ = workload.scenario.iteration(&mut ctx) => true,
            }
        };

        if !finished {
            // The buffer is dropped with every sample of the interrupted iteration
            workload.sink.add(names::DROPPED_ITERATIONS, &no_tags, 1);
            report.dropped += 1;
            debug!(vu = ordinal, iteration, "Iteration discarded on forced stop");
            break;
        }

        buffer.trend_duration(names::ITERATION_DURATION, &no_tags, started.elapsed());
        buffer.add(names::ITERATIONS, &no_tags, 1);
        buffer.commit(&workload.sink);
        report.completed += 1;

        let pause = think_time.draw(&mut rng);
        if pause.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }
        tokio::select! {
            biased;
            _ = kill.cancelled() => break,
            _ = retire.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricSummary;
    use crate::routes::{Route, RouteTable};
    use crate::scenario::WeightedScenario;
    use crate::validator::CheckSettings;
    use async_trait::async_trait;
    use loadgate_http::MockBackend;
    use loadgate_logging::MemoryDiagnostics;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn workload(scenario: Arc<dyn Scenario>) -> Arc<Workload> {
        let mut table = RouteTable::new();
        table.register(Route::get("home", "/get")).unwrap();
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        Arc::new(Workload {
            scenario,
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(table),
                Arc::new(MockBackend::new()),
                diagnostics.clone(),
            )),
            validator: Arc::new(Validator::new(CheckSettings::default(), diagnostics)),
            sink: Arc::new(MetricsSink::new()),
        })
    }

    /// Never finishes an iteration
    struct Stuck;

    #[async_trait]
    impl Scenario for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn iteration(&self, ctx: &mut IterationContext<'_>) {
            ctx.recorder.add("stuck_samples", &Tags::new(), 1);
            std::future::pending::<()>().await;
        }
    }

    #[test]
    fn test_target_interpolation() {
        let profile =
            RampProfile::new(0, vec![Stage::new(secs(10), 10), Stage::new(secs(10), 20)]).unwrap();
        assert_eq!(profile.target_at(Duration::ZERO), 0);
        assert_eq!(profile.target_at(secs(5)), 5);
        assert_eq!(profile.target_at(secs(10)), 10);
        // d1 + d2/2 lands halfway between t1 and t2
        assert_eq!(profile.target_at(secs(15)), 15);
        assert_eq!(profile.target_at(secs(20)), 20);
        assert_eq!(profile.target_at(secs(60)), 20);
    }

    #[test]
    fn test_hold_and_ramp_down() {
        let profile = RampProfile::new(
            4,
            vec![
                Stage::new(secs(30), 20),
                Stage::new(secs(60), 20),
                Stage::new(secs(30), 0),
            ],
        )
        .unwrap();
        assert_eq!(profile.target_at(Duration::ZERO), 4);
        assert_eq!(profile.target_at(secs(15)), 12);
        assert_eq!(profile.target_at(secs(45)), 20);
        assert_eq!(profile.target_at(secs(89)), 20);
        assert_eq!(profile.target_at(secs(105)), 10);
        assert_eq!(profile.target_at(secs(120)), 0);
        assert_eq!(profile.max_target(), 20);
        assert_eq!(profile.total_duration(), secs(120));
    }

    #[test]
    fn test_stage_lookup() {
        let profile =
            RampProfile::new(0, vec![Stage::new(secs(10), 5), Stage::new(secs(5), 0)]).unwrap();
        assert_eq!(profile.stage_at(Duration::ZERO), Some(0));
        assert_eq!(profile.stage_at(Duration::from_millis(9_999)), Some(0));
        assert_eq!(profile.stage_at(secs(10)), Some(1));
        assert_eq!(profile.stage_at(secs(15)), None);
    }

    #[test]
    fn test_invalid_profiles() {
        assert!(RampProfile::new(0, vec![]).is_err());
        assert!(RampProfile::new(0, vec![Stage::new(Duration::ZERO, 3)]).is_err());
    }

    #[test]
    fn test_constant_profile_from_config() {
        let config = LoadConfig::constant(3, secs(5));
        let profile = RampProfile::from_config(&config).unwrap();
        assert_eq!(profile.start_vus(), 3);
        for t in [0, 1, 4] {
            assert_eq!(profile.target_at(secs(t)), 3);
        }
        assert_eq!(profile.total_duration(), secs(5));
    }

    #[test]
    fn test_think_time_draw() {
        let mut rng = StdRng::seed_from_u64(9);
        let think = ThinkTime::new(secs(1), secs(3));
        for _ in 0..100 {
            let pause = think.draw(&mut rng);
            assert!(pause >= secs(1) && pause <= secs(3));
        }
        assert_eq!(ThinkTime::none().draw(&mut rng), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_scheduler_follows_ramp() {
        let profile =
            RampProfile::new(0, vec![Stage::new(secs(10), 10), Stage::new(secs(10), 20)]).unwrap();
        let scheduler = Arc::new(Scheduler::new(profile, SchedulerSettings::default()));
        let status = scheduler.subscribe();
        let cancel = CancellationToken::new();
        let work = workload(Arc::new(WeightedScenario::all()));

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(work, cancel).await })
        };

        tokio::time::sleep(secs(15)).await;
        let observed = status.borrow().clone();
        assert_eq!(observed.state, SchedulerState::Ramping(1));
        assert!(
            observed.active_vus.abs_diff(15) <= 1,
            "active VUs {} at 15s",
            observed.active_vus
        );

        let outcome = handle.await.unwrap();
        assert!(!outcome.aborted);
        assert!(outcome.vus_max >= 19);
        assert!(outcome.iterations_completed > 0);
        assert_eq!(status.borrow().state, SchedulerState::Completed);
        assert_eq!(status.borrow().active_vus, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_iterations_are_committed() {
        let profile = RampProfile::constant(2, secs(10)).unwrap();
        let scheduler = Scheduler::new(profile, SchedulerSettings::default());
        let work = workload(Arc::new(WeightedScenario::all()));

        let outcome = scheduler.run(Arc::clone(&work), CancellationToken::new()).await;
        assert_eq!(outcome.vus_max, 2);
        assert_eq!(outcome.iterations_dropped, 0);

        let snapshot = work.sink.snapshot(outcome.elapsed);
        let iterations = snapshot
            .aggregate(names::ITERATIONS, &Tags::new())
            .unwrap()
            .sample_count();
        assert_eq!(iterations, outcome.iterations_completed);
        // Two VUs, 1-3s think time, 10s plus graceful stop
        assert!(outcome.iterations_completed >= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_stop_discards_iteration() {
        let profile = RampProfile::new(1, vec![Stage::new(secs(2), 1)])
            .unwrap()
            .with_graceful_stop(Duration::from_millis(500));
        let scheduler = Scheduler::new(profile, SchedulerSettings::default());
        let work = workload(Arc::new(Stuck));

        let outcome = scheduler.run(Arc::clone(&work), CancellationToken::new()).await;
        assert_eq!(outcome.iterations_completed, 0);
        assert_eq!(outcome.iterations_dropped, 1);
        assert!(!outcome.aborted);

        let snapshot = work.sink.snapshot(outcome.elapsed);
        // Samples of the discarded iteration never reach the sink
        assert!(snapshot.kind_of("stuck_samples").is_none());
        assert_eq!(
            snapshot.aggregate(names::DROPPED_ITERATIONS, &Tags::new()),
            Some(MetricSummary::Counter {
                total: 1,
                per_second: 1.0 / outcome.elapsed.as_secs_f64()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_down_retires_most_recent_vus() {
        let profile = RampProfile::new(
            3,
            vec![Stage::new(secs(1), 3), Stage::new(Duration::from_millis(100), 1), Stage::new(secs(5), 1)],
        )
        .unwrap()
        .with_graceful_ramp_down(Duration::from_millis(200));
        let scheduler = Arc::new(Scheduler::new(profile, SchedulerSettings::default()));
        let status = scheduler.subscribe();
        let work = workload(Arc::new(Stuck));

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run(work, CancellationToken::new()).await })
        };

        tokio::time::sleep(secs(3)).await;
        let observed = status.borrow().clone();
        assert_eq!(observed.active_vus, 1);
        assert_eq!(observed.retiring_vus, 0);

        let outcome = handle.await.unwrap();
        // Two retired VUs were killed mid-iteration, the last one on stop
        assert_eq!(outcome.iterations_dropped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_run() {
        let profile = RampProfile::constant(4, secs(600)).unwrap();
        let scheduler = Scheduler::new(profile, SchedulerSettings::default());
        let cancel = CancellationToken::new();
        let work = workload(Arc::new(WeightedScenario::all()));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(secs(5)).await;
            trigger.cancel();
        });

        let outcome = scheduler.run(Arc::clone(&work), cancel).await;
        assert!(outcome.aborted);
        assert!(outcome.elapsed < secs(6));
        assert_eq!(outcome.vus_max, 4);

        let iterations = work
            .sink
            .snapshot(outcome.elapsed)
            .aggregate(names::ITERATIONS, &Tags::new())
            .unwrap()
            .sample_count();
        assert_eq!(iterations, outcome.iterations_completed);
    }
}
