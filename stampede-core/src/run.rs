use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::gate::IterationGate;
use crate::http::HttpClient;
use crate::metrics::RunMetrics;
use crate::progress::{ProgressFn, ProgressUpdate};
use crate::scenario::{Scenario, ScenarioConfig, ScenarioError};
use crate::summary::{RunSummary, build_run_summary};
use crate::vu::{Signal, VuContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum RunPhase {
    Idle = 0,
    Setup = 1,
    Running = 2,
    Draining = 3,
    Completed = 4,
}

impl RunPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Setup,
            2 => Self::Running,
            3 => Self::Draining,
            _ => Self::Completed,
        }
    }
}

/// Observes and controls a run from outside the runner.
#[derive(Debug, Default)]
pub struct RunHandle {
    phase: AtomicU8,
    stop: Signal,
}

impl RunHandle {
    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Stops starting new iterations. In-flight requests are not cancelled.
    pub fn stop(&self) {
        self.stop.fire();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_fired()
    }

    pub async fn stopped(&self) {
        self.stop.wait().await;
    }

    // Phases only move forward.
    fn advance(&self, phase: RunPhase) {
        self.phase.fetch_max(phase as u8, Ordering::AcqRel);
    }
}

/// Collaborators shared by a run. Clone it to keep access to metrics and the handle.
#[derive(Clone)]
pub struct RunContext {
    pub client: Arc<HttpClient>,
    pub metrics: Arc<RunMetrics>,
    pub handle: Arc<RunHandle>,
    pub progress: Option<ProgressFn>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            client: Arc::new(HttpClient::default()),
            metrics: Arc::new(RunMetrics::default()),
            handle: Arc::new(RunHandle::default()),
            progress: None,
        }
    }
}

impl RunContext {
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

pub async fn run_scenario<S: Scenario>(
    scenario: Arc<S>,
    config: ScenarioConfig,
    run: RunContext,
) -> Result<RunSummary> {
    config.validate()?;

    let RunContext {
        client,
        metrics,
        handle,
        progress,
    } = run;
    let name: Arc<str> = Arc::from(scenario.name());

    handle.advance(RunPhase::Setup);
    tracing::info!(scenario = %name, "running setup");

    let mut setup_vu = VuContext::new(
        0,
        name.clone(),
        client.clone(),
        metrics.clone(),
        config.seed,
        config.request_timeout,
    );
    let ctx = match scenario.setup(&mut setup_vu).await {
        Ok(ctx) => Arc::new(ctx),
        Err(source) => {
            tracing::error!(scenario = %name, error = %source, "setup failed, aborting run");
            handle.advance(RunPhase::Completed);
            return Err(Error::Setup {
                scenario: name.to_string(),
                source,
            });
        }
    };
    drop(setup_vu);

    let gate = Arc::new(IterationGate::new(config.iterations, config.duration));
    let start = Arc::new(Signal::default());

    let mut handles = Vec::with_capacity(usize::try_from(config.vus).unwrap_or(usize::MAX));
    for vu_id in 1..=config.vus {
        let vu = VuContext::new(
            vu_id,
            name.clone(),
            client.clone(),
            metrics.clone(),
            config.seed,
            config.request_timeout,
        );
        handles.push(tokio::spawn(vu_loop(
            scenario.clone(),
            ctx.clone(),
            vu,
            VuShared {
                gate: gate.clone(),
                start: start.clone(),
                handle: handle.clone(),
                pause: config.pause,
            },
        )));
    }

    let started = Instant::now();
    gate.start_at(started);
    handle.advance(RunPhase::Running);
    start.fire();
    tracing::info!(
        scenario = %name,
        vus = config.vus,
        duration = ?config.duration,
        iterations = ?config.iterations,
        "load started"
    );

    let watcher = {
        let handle = handle.clone();
        let deadline = tokio::time::Instant::from_std(started + config.duration);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = handle.stopped() => {}
            }
            handle.advance(RunPhase::Draining);
        })
    };

    let progress_handle = progress.map(|progress| {
        tokio::spawn(report_progress(
            progress,
            metrics.clone(),
            name.clone(),
            config.vus,
            config.duration,
            started,
        ))
    });

    let mut join_error = None;
    for h in handles {
        if let Err(err) = h.await {
            join_error.get_or_insert(err);
        }
    }

    watcher.abort();
    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }

    handle.advance(RunPhase::Draining);
    handle.advance(RunPhase::Completed);

    if let Some(err) = join_error {
        return Err(err.into());
    }

    let elapsed = started.elapsed();
    tracing::info!(scenario = %name, elapsed_ms = elapsed.as_millis() as u64, "run completed");
    Ok(build_run_summary(&name, config.vus, &metrics, elapsed))
}

struct VuShared {
    gate: Arc<IterationGate>,
    start: Arc<Signal>,
    handle: Arc<RunHandle>,
    pause: Option<Duration>,
}

async fn vu_loop<S: Scenario>(
    scenario: Arc<S>,
    ctx: Arc<S::Context>,
    mut vu: VuContext,
    shared: VuShared,
) {
    shared.start.wait().await;

    loop {
        if shared.handle.is_stopped() || !shared.gate.next() {
            break;
        }

        let started = Instant::now();
        let outcome = scenario.iteration(&mut vu, &ctx).await;
        let ok = outcome.is_ok();
        vu.record_iteration(started.elapsed(), ok);

        match outcome {
            Ok(()) => {}
            Err(err @ ScenarioError::EmptyDomain(_)) => {
                tracing::error!(vu = vu.vu_id(), scenario = vu.scenario(), error = %err, "iteration failed");
            }
            Err(err) => {
                tracing::warn!(vu = vu.vu_id(), scenario = vu.scenario(), error = %err, "iteration failed");
            }
        }

        let Some(pause) = shared.pause.filter(|p| !p.is_zero()) else {
            continue;
        };
        let wake = match shared.gate.deadline() {
            Some(deadline) => (Instant::now() + pause).min(deadline),
            None => Instant::now() + pause,
        };
        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {}
            _ = shared.handle.stopped() => break,
        }
    }
}

async fn report_progress(
    progress: ProgressFn,
    metrics: Arc<RunMetrics>,
    scenario: Arc<str>,
    vus: u64,
    duration: Duration,
    started: Instant,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let mut tick: u64 = 0;
    let mut last_at = Instant::now();
    let mut last_requests = metrics.requests_total(&scenario);

    loop {
        interval.tick().await;

        tick = tick.saturating_add(1);
        let now = Instant::now();
        let dt = now.duration_since(last_at);
        last_at = now;

        let requests_total = metrics.requests_total(&scenario);
        let delta = requests_total.saturating_sub(last_requests);
        last_requests = requests_total;

        (progress)(ProgressUpdate {
            tick,
            elapsed: started.elapsed(),
            duration,
            scenario: scenario.to_string(),
            vus,
            rps_now: delta as f64 / dt.as_secs_f64().max(1e-9),
            requests_total,
            transport_errors_total: metrics.transport_errors_total(&scenario),
            checks_failed_total: metrics.checks_failed_total(&scenario),
            iterations_total: metrics.iterations_total(&scenario),
            iterations_failed: metrics.iterations_failed(&scenario),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_never_move_backwards() {
        let handle = RunHandle::default();
        assert_eq!(handle.phase(), RunPhase::Idle);

        handle.advance(RunPhase::Running);
        handle.advance(RunPhase::Setup);
        assert_eq!(handle.phase(), RunPhase::Running);

        handle.advance(RunPhase::Completed);
        handle.advance(RunPhase::Draining);
        assert_eq!(handle.phase(), RunPhase::Completed);
    }

    #[test]
    fn stop_is_sticky() {
        let handle = RunHandle::default();
        assert!(!handle.is_stopped());
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
    }
}
