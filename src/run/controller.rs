//! Simulated run controller.
//!
//! Drives the phased state machine (idle → ping → download → upload →
//! complete) with a fixed-step timed loop, samples each metric from the
//! configured [`MetricModel`], and records a [`TestResult`] on completion.
//!
//! The controller is meant to be shared behind an `Arc`: one task awaits
//! [`TestRunController::start`] while others read [`state`] snapshots or
//! call [`reset`] to abort.
//!
//! [`state`]: TestRunController::state
//! [`reset`]: TestRunController::reset

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};

use super::grade::Grade;
use super::history::{ResultHistory, ResultIdGenerator, TestResult};
use super::progress::{
    NoProgress, ProgressCallback, ProgressEvent, TestPhase,
    ThroughputDirection,
};
use super::state::TestRunState;
use crate::random::{RandomSource, SeededRandom};
use crate::timer::{sleep_or_cancel, CancelToken, Ticker, TokioTicker};

/// Step schedule for one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    /// Number of samples taken in the phase
    pub steps: u32,
    /// Delay before each sample
    pub interval: Duration,
    /// Overall progress when the phase starts
    pub progress_start: f64,
    /// Overall progress after the last step
    pub progress_end: f64,
}

impl PhasePlan {
    pub const fn new(
        steps: u32,
        interval_ms: u64,
        progress_start: f64,
        progress_end: f64,
    ) -> Self {
        Self {
            steps,
            interval: Duration::from_millis(interval_ms),
            progress_start,
            progress_end,
        }
    }

    /// Overall progress after `step` (1-indexed) samples.
    pub fn progress_at(&self, step: u32) -> f64 {
        if self.steps == 0 {
            return self.progress_end;
        }
        let fraction = step.min(self.steps) as f64 / self.steps as f64;
        self.progress_start + (self.progress_end - self.progress_start) * fraction
    }

    /// Wall-clock length of the phase with a real ticker.
    pub fn duration(&self) -> Duration {
        self.interval * self.steps
    }
}

/// A ramp-plus-noise sample clamped to `[0, cap]`.
///
/// `sample = min(base + per_step·step + noise·r, cap)`
#[derive(Debug, Clone, PartialEq)]
pub struct MetricModel {
    pub base: f64,
    pub per_step: f64,
    pub noise: f64,
    pub cap: f64,
}

impl MetricModel {
    pub const fn new(base: f64, per_step: f64, noise: f64, cap: f64) -> Self {
        Self { base, per_step, noise, cap }
    }

    pub fn sample(&self, step: u32, random: &mut dyn RandomSource) -> f64 {
        let raw =
            self.base + self.per_step * step as f64 + self.noise * random.next_f64();
        raw.min(self.cap).max(0.0)
    }
}

/// Configuration for the simulated run.
///
/// Defaults reproduce the reference timings: ping 50×30 ms, download
/// 100×40 ms, upload 100×35 ms.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub ping_plan: PhasePlan,
    pub download_plan: PhasePlan,
    pub upload_plan: PhasePlan,

    /// Ping in ms: 15-35, capped at 50
    pub ping_model: MetricModel,
    /// Download in Mbps: 0.5 per step plus up to 10 noise, capped at 100
    pub download_model: MetricModel,
    /// Upload in Mbps: 0.3 per step plus up to 8 noise, capped at 50
    pub upload_model: MetricModel,

    /// Jitter range in ms, drawn at completion
    pub jitter_range: (f64, f64),
    /// Packet loss range in percent, drawn at completion
    pub packet_loss_range: (f64, f64),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ping_plan: PhasePlan::new(50, 30, 0.0, 20.0),
            download_plan: PhasePlan::new(100, 40, 20.0, 60.0),
            upload_plan: PhasePlan::new(100, 35, 60.0, 100.0),
            ping_model: MetricModel::new(15.0, 0.0, 20.0, 50.0),
            download_model: MetricModel::new(0.0, 0.5, 10.0, 100.0),
            upload_model: MetricModel::new(0.0, 0.3, 8.0, 50.0),
            jitter_range: (5.0, 20.0),
            packet_loss_range: (0.0, 2.0),
        }
    }
}

impl SimulationConfig {
    /// Total wall-clock length of a run with a real ticker.
    pub fn total_duration(&self) -> Duration {
        self.ping_plan.duration()
            + self.download_plan.duration()
            + self.upload_plan.duration()
    }
}

/// How a call to [`TestRunController::start`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run finished and this result was added to history
    Completed(TestResult),
    /// The run was aborted by a reset
    Cancelled,
    /// Another run was already active; nothing happened
    AlreadyRunning,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the running flag even if the run future is dropped mid-way.
struct RunGuard<'a> {
    controller: &'a TestRunController,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.controller.active) = None;
        self.controller.running.store(false, Ordering::SeqCst);
    }
}

/// Owns the run state machine, its history and its random source.
pub struct TestRunController {
    config: SimulationConfig,
    ticker: Arc<dyn Ticker>,
    progress: Arc<dyn ProgressCallback>,
    random: Mutex<Box<dyn RandomSource>>,
    state: Mutex<TestRunState>,
    history: Mutex<ResultHistory>,
    ids: Mutex<ResultIdGenerator>,
    running: AtomicBool,
    active: Mutex<Option<CancelToken>>,
}

impl TestRunController {
    /// Controller with a real-time ticker, entropy-seeded randomness and no
    /// progress listener.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            ticker: Arc::new(TokioTicker),
            progress: Arc::new(NoProgress),
            random: Mutex::new(Box::new(SeededRandom::new(None))),
            state: Mutex::new(TestRunState::new()),
            history: Mutex::new(ResultHistory::new()),
            ids: Mutex::new(ResultIdGenerator::new()),
            running: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn with_random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = Mutex::new(random);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Snapshot of the current run state.
    pub fn state(&self) -> TestRunState {
        lock(&self.state).clone()
    }

    /// Snapshot of the result history.
    pub fn history(&self) -> ResultHistory {
        lock(&self.history).clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the full simulated sequence.
    ///
    /// Returns [`RunOutcome::AlreadyRunning`] without touching state when a
    /// run is active. Allowed from `idle` and from `complete`.
    pub async fn start(&self) -> RunOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start ignored: a run is already active");
            return RunOutcome::AlreadyRunning;
        }

        let token = CancelToken::new();
        *lock(&self.active) = Some(token.clone());
        let _guard = RunGuard { controller: self };

        info!(
            "Starting simulated run ({:.1}s)",
            self.config.total_duration().as_secs_f64()
        );

        match self.drive(&token).await {
            Some(result) => {
                info!(
                    "Run complete: download={:.2} Mbps, upload={:.2} Mbps, \
                     ping={:.0} ms, grade={}",
                    result.download_speed,
                    result.upload_speed,
                    result.ping,
                    result.grade
                );
                RunOutcome::Completed(result)
            }
            None => {
                info!("Run cancelled");
                lock(&self.state).reset();
                self.progress.on_progress(ProgressEvent::Cancelled);
                RunOutcome::Cancelled
            }
        }
    }

    /// Return to the idle zero state.
    ///
    /// From `complete` (or `idle`) the state is reset immediately. During a
    /// run the active run is cancelled: no result is recorded and no further
    /// samples are applied.
    pub fn reset(&self) {
        if let Some(token) = lock(&self.active).as_ref() {
            debug!("reset requested during a run; cancelling");
            token.cancel();
        }

        lock(&self.state).reset();
        self.progress.on_progress(ProgressEvent::Reset);
    }

    /// Apply an event to state unless the run was cancelled, then forward
    /// it to the listener. Returns `false` when the event was dropped.
    fn emit(&self, token: &CancelToken, event: ProgressEvent) -> bool {
        {
            let mut state = lock(&self.state);
            // Checked under the state lock so a concurrent reset cannot be
            // overwritten by a late sample.
            if token.is_cancelled() {
                return false;
            }
            state.update_from_event(&event);
        }

        self.progress.on_progress(event);
        true
    }

    fn draw<F>(&self, f: F) -> f64
    where
        F: FnOnce(&mut dyn RandomSource) -> f64,
    {
        let mut random = lock(&self.random);
        f(&mut **random)
    }

    async fn drive(&self, token: &CancelToken) -> Option<TestResult> {
        self.run_ping_phase(token).await?;

        self.run_throughput_phase(
            token,
            ThroughputDirection::Download,
            &self.config.download_plan,
            &self.config.download_model,
        )
        .await?;

        self.run_throughput_phase(
            token,
            ThroughputDirection::Upload,
            &self.config.upload_plan,
            &self.config.upload_model,
        )
        .await?;

        self.complete(token)
    }

    async fn run_ping_phase(&self, token: &CancelToken) -> Option<()> {
        let plan = &self.config.ping_plan;
        debug!("Ping phase: {} steps every {:?}", plan.steps, plan.interval);

        if !self.emit(token, ProgressEvent::PhaseChange(TestPhase::Ping)) {
            return None;
        }

        for step in 1..=plan.steps {
            if !sleep_or_cancel(&*self.ticker, plan.interval, token).await {
                return None;
            }

            let ping_ms = self.draw(|r| self.config.ping_model.sample(step, r));
            let event = ProgressEvent::PingSample {
                ping_ms,
                progress: plan.progress_at(step),
            };

            if !self.emit(token, event) {
                return None;
            }
        }

        Some(())
    }

    async fn run_throughput_phase(
        &self,
        token: &CancelToken,
        direction: ThroughputDirection,
        plan: &PhasePlan,
        model: &MetricModel,
    ) -> Option<()> {
        let phase = match direction {
            ThroughputDirection::Download => TestPhase::Download,
            ThroughputDirection::Upload => TestPhase::Upload,
        };
        debug!(
            "{:?} phase: {} steps every {:?}",
            phase, plan.steps, plan.interval
        );

        if !self.emit(token, ProgressEvent::PhaseChange(phase)) {
            return None;
        }

        for step in 1..=plan.steps {
            if !sleep_or_cancel(&*self.ticker, plan.interval, token).await {
                return None;
            }

            let speed_mbps = self.draw(|r| model.sample(step, r));
            let event = ProgressEvent::ThroughputSample {
                direction,
                speed_mbps,
                progress: plan.progress_at(step),
            };

            if !self.emit(token, event) {
                return None;
            }
        }

        Some(())
    }

    fn complete(&self, token: &CancelToken) -> Option<TestResult> {
        let (jitter_low, jitter_high) = self.config.jitter_range;
        let (loss_low, loss_high) = self.config.packet_loss_range;
        let jitter_ms = self.draw(|r| r.range(jitter_low, jitter_high));
        let packet_loss_pct = self.draw(|r| r.range(loss_low, loss_high));

        // Grade the metrics as they stand at the end of the upload phase.
        let snapshot = self.state();
        let grade = Grade::for_metrics(
            snapshot.download_speed,
            snapshot.upload_speed,
            snapshot.ping,
        );

        let timestamp = Utc::now();
        let id = lock(&self.ids).next_id(timestamp);
        let result = TestResult::new(
            id,
            timestamp,
            snapshot.download_speed,
            snapshot.upload_speed,
            snapshot.ping,
            grade,
        );

        let event = ProgressEvent::Completed {
            jitter_ms,
            packet_loss_pct,
            result: result.clone(),
        };

        {
            let mut state = lock(&self.state);
            if token.is_cancelled() {
                return None;
            }
            state.update_from_event(&event);
            lock(&self.history).push(result.clone());
        }

        self.progress.on_progress(event);
        Some(result)
    }
}
