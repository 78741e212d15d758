//! The per-job wait/execute loop.
//!
//! One [`JobScheduler`] drives one registered job: compute the next
//! occurrence of its cron expression, sleep until then (or until cancelled),
//! acquire a fresh execution scope, resolve and run the job, release the
//! scope, and go again with the post-execution instant as the new reference.
//! The loop is strictly sequential per job — two executions of the same job
//! never overlap, and a slow run never causes a burst of catch-up runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use uhrwerk_core::config::ErrorPolicy;

use crate::cron::next_occurrence;
use crate::error::{Result, SchedulerError};
use crate::scope::ScopeProvider;
use crate::state::SchedulerState;

/// Drives one job through repeated wait/execute cycles until stopped.
pub struct JobScheduler {
    name: String,
    schedule: Schedule,
    timezone: Tz,
    error_policy: ErrorPolicy,
    stop_grace: Duration,
    scopes: Arc<dyn ScopeProvider>,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    state_rx: watch::Receiver<SchedulerState>,
    handle: Option<JoinHandle<()>>,
}

impl JobScheduler {
    pub(crate) fn new(
        name: String,
        schedule: Schedule,
        timezone: Tz,
        error_policy: ErrorPolicy,
        stop_grace: Duration,
        scopes: Arc<dyn ScopeProvider>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SchedulerState::idle());
        Self {
            name,
            schedule,
            timezone,
            error_policy,
            stop_grace,
            scopes,
            cancel: CancellationToken::new(),
            state_tx: Arc::new(state_tx),
            state_rx,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state snapshot.
    pub fn state(&self) -> SchedulerState {
        self.state_rx.borrow().clone()
    }

    /// Begin the loop on a child of `parent`. Returns immediately; the first
    /// loop iteration publishes `Waiting` with the computed wake instant.
    pub fn start(&mut self, parent: &CancellationToken) {
        if self.handle.is_some() {
            warn!(job = %self.name, "scheduler already started");
            return;
        }
        self.cancel = parent.child_token();
        let scheduler_loop = SchedulerLoop {
            name: self.name.clone(),
            schedule: self.schedule.clone(),
            timezone: self.timezone,
            error_policy: self.error_policy,
            scopes: self.scopes.clone(),
            cancel: self.cancel.clone(),
            state: self.state_tx.clone(),
        };
        self.handle = Some(tokio::spawn(scheduler_loop.run()));
    }

    /// Request cancellation and wait up to the grace period for the loop to
    /// unwind. Idempotent; has no effect when already stopped.
    ///
    /// A loop that outlives the grace period is abandoned, not killed: its
    /// in-flight execution keeps running until it observes the cancellation
    /// token, but the state is reported as `Stopped` from here on.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let deadline = Instant::now() + self.stop_grace;
        self.join_until(deadline).await;
    }

    /// Join the loop task, bounded by `deadline`. Used by the host so one
    /// grace period covers all schedulers together.
    pub(crate) async fn join_until(&mut self, deadline: Instant) {
        let Some(handle) = self.handle.take() else {
            self.state_tx.send_replace(SchedulerState::stopped());
            return;
        };
        match timeout_at(deadline, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(job = %self.name, error = %e, "scheduler task ended abnormally");
                self.state_tx.send_replace(SchedulerState::stopped());
            }
            Err(_) => {
                warn!(
                    job = %self.name,
                    "scheduler did not stop within the grace period, abandoning"
                );
                self.state_tx.send_replace(SchedulerState::stopped());
            }
        }
    }
}

// ── Loop ────────────────────────────────────────────────────────────

/// The owned half of a scheduler that runs inside the spawned task.
struct SchedulerLoop {
    name: String,
    schedule: Schedule,
    timezone: Tz,
    error_policy: ErrorPolicy,
    scopes: Arc<dyn ScopeProvider>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl SchedulerLoop {
    async fn run(self) {
        info!(job = %self.name, timezone = %self.timezone, "job scheduler started");

        let mut reference = Utc::now();
        loop {
            let next = match next_occurrence(&self.schedule, reference, self.timezone) {
                Some(next) => next,
                None => {
                    info!(job = %self.name, "schedule has no future occurrences, ending loop");
                    break;
                }
            };

            // Negative when the evaluator returned an instant at or before
            // `now` (clock skew); fire immediately instead of erroring.
            let now = Utc::now();
            let delay = (next - now).to_std().unwrap_or_default();
            self.state.send_replace(SchedulerState::waiting(next));
            debug!(job = %self.name, scheduled_for = %next, delay_ms = delay.as_millis() as u64, "waiting for next occurrence");

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(job = %self.name, "cancellation requested during wait");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            self.state.send_replace(SchedulerState::executing(next));
            let run_id = Uuid::new_v4();
            let started = std::time::Instant::now();
            match self.execute_tick().await {
                Ok(()) => {
                    debug!(
                        job = %self.name,
                        run_id = %run_id,
                        scheduled_for = %next,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "tick completed"
                    );
                }
                Err(e) => {
                    error!(
                        job = %self.name,
                        run_id = %run_id,
                        scheduled_for = %next,
                        error = %e,
                        "tick failed"
                    );
                    if self.error_policy == ErrorPolicy::Stop {
                        warn!(job = %self.name, "error policy is 'stop', ending job loop");
                        break;
                    }
                }
            }

            if self.cancel.is_cancelled() {
                info!(job = %self.name, "cancellation requested during execution");
                break;
            }

            // The evaluator is strictly-after its reference; advancing to at
            // least the fired occurrence guarantees forward progress even if
            // the clock moved backwards during the run, and using the
            // post-execution instant means a slow run never queues catch-ups.
            reference = std::cmp::max(Utc::now(), next);
        }

        self.state.send_replace(SchedulerState::stopped());
        info!(job = %self.name, "job scheduler stopped");
    }

    /// One tick: acquire a scope, resolve the job, execute it, release the
    /// scope. The scope is released on every exit path, including failed
    /// resolution.
    async fn execute_tick(&self) -> Result<()> {
        let mut scope = self.scopes.create_scope()?;
        let result = match scope.resolve(&self.name) {
            Ok(job) => job
                .execute(self.cancel.clone())
                .await
                .map_err(|source| SchedulerError::Execution {
                    job: self.name.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };
        scope.release();
        result
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::{parse_schedule, parse_timezone};
    use crate::job::CronJob;
    use crate::scope::StaticScopeProvider;
    use crate::state::SchedulerPhase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        name: String,
        schedule: String,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CronJob for CountingJob {
        fn name(&self) -> &str {
            &self.name
        }

        fn schedule(&self) -> &str {
            &self.schedule
        }

        async fn execute(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scheduler_for(job: Arc<CountingJob>) -> JobScheduler {
        let schedule = parse_schedule(job.name(), job.schedule()).unwrap();
        let provider = Arc::new(StaticScopeProvider::new().with_job(job.clone()));
        JobScheduler::new(
            job.name().to_string(),
            schedule,
            parse_timezone("UTC").unwrap(),
            ErrorPolicy::Continue,
            Duration::from_secs(2),
            provider,
        )
    }

    #[tokio::test]
    async fn exhausted_schedule_stops_without_executing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(CountingJob {
            name: "one-shot-past".to_string(),
            schedule: "0 0 0 1 1 * 2015".to_string(),
            runs: runs.clone(),
        });
        let mut scheduler = scheduler_for(job);

        let root = CancellationToken::new();
        scheduler.start(&root);

        // The loop should notice exhaustion on its first iteration.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while scheduler.state().phase != SchedulerPhase::Stopped {
            assert!(std::time::Instant::now() < deadline, "loop did not stop");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_during_wait_executes_nothing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(CountingJob {
            name: "far-future".to_string(),
            // Year-pinned far future: never fires during a test run.
            schedule: "0 0 0 1 1 * 2099".to_string(),
            runs: runs.clone(),
        });
        let mut scheduler = scheduler_for(job);

        let root = CancellationToken::new();
        scheduler.start(&root);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.state().phase, SchedulerPhase::Waiting);

        scheduler.stop().await;
        assert_eq!(scheduler.state().phase, SchedulerPhase::Stopped);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(CountingJob {
            name: "idem".to_string(),
            schedule: "0 0 0 1 1 * 2099".to_string(),
            runs,
        });
        let mut scheduler = scheduler_for(job);

        let root = CancellationToken::new();
        scheduler.start(&root);
        scheduler.stop().await;
        scheduler.stop().await;
        assert_eq!(scheduler.state().phase, SchedulerPhase::Stopped);
    }

    #[tokio::test]
    async fn waiting_state_carries_next_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(CountingJob {
            name: "visible".to_string(),
            schedule: "0 0 0 1 1 * 2099".to_string(),
            runs,
        });
        let mut scheduler = scheduler_for(job);

        let root = CancellationToken::new();
        scheduler.start(&root);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = scheduler.state();
        assert_eq!(state.phase, SchedulerPhase::Waiting);
        let next = state.next_run.expect("waiting state should carry next_run");
        assert!(next > Utc::now());

        scheduler.stop().await;
    }
}
