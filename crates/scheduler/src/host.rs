//! The scheduler host: owns every job's scheduler and the shared shutdown
//! signal.
//!
//! Registration is fail-fast — an invalid cron expression, a duplicate job
//! name or an unknown timezone never makes it past this module. Everything
//! after `start_all` is contained per job: one job's failures never stop
//! another job's loop.

use std::sync::Arc;

use chrono_tz::Tz;
use cron::Schedule;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use uhrwerk_core::config::SchedulerConfig;

use crate::cron::{parse_schedule, parse_timezone};
use crate::error::{Result, SchedulerError};
use crate::job::CronJob;
use crate::runner::JobScheduler;
use crate::scope::ScopeProvider;
use crate::state::SchedulerState;

struct JobRegistration {
    name: String,
    schedule: Schedule,
}

/// Starts and stops one [`JobScheduler`] per registered job.
pub struct SchedulerHost {
    config: SchedulerConfig,
    timezone: Tz,
    scopes: Arc<dyn ScopeProvider>,
    registrations: Vec<JobRegistration>,
    schedulers: Vec<JobScheduler>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SchedulerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHost")
            .field("timezone", &self.timezone)
            .field("registrations", &self.registrations.len())
            .field("schedulers", &self.schedulers.len())
            .finish()
    }
}

impl SchedulerHost {
    /// Build a host. Fails fast on an unknown timezone.
    pub fn new(config: SchedulerConfig, scopes: Arc<dyn ScopeProvider>) -> Result<Self> {
        let timezone = parse_timezone(&config.timezone)?;
        Ok(Self {
            config,
            timezone,
            scopes,
            registrations: Vec::new(),
            schedulers: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Register a job by its declared name and cron expression.
    ///
    /// The host keeps only the name and the parsed schedule — the instance
    /// that actually executes is resolved from a fresh scope on every tick.
    pub fn register(&mut self, job: &dyn CronJob) -> Result<()> {
        let name = job.name().to_string();
        if self.registrations.iter().any(|r| r.name == name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        let schedule = parse_schedule(&name, job.schedule())?;
        info!(job = %name, cron = %job.schedule(), "job registered");
        self.registrations.push(JobRegistration { name, schedule });
        Ok(())
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.registrations.len()
    }

    /// Construct and start one scheduler per registered job. Schedulers run
    /// independently; no ordering across jobs is guaranteed.
    pub fn start_all(&mut self) {
        if !self.schedulers.is_empty() {
            warn!("scheduler host already started");
            return;
        }
        for registration in &self.registrations {
            let mut scheduler = JobScheduler::new(
                registration.name.clone(),
                registration.schedule.clone(),
                self.timezone,
                self.config.error_policy,
                self.config.stop_grace(),
                self.scopes.clone(),
            );
            scheduler.start(&self.cancel);
            self.schedulers.push(scheduler);
        }
        info!(jobs = self.schedulers.len(), "scheduler host started");
    }

    /// Cancel the shared signal once and wait for every scheduler to reach
    /// `Stopped`, bounded by a single grace period. Schedulers that do not
    /// stop in time are abandoned (their in-flight execution is not killed).
    pub async fn stop_all(&mut self) {
        self.cancel.cancel();
        let deadline = Instant::now() + self.config.stop_grace();
        for scheduler in &mut self.schedulers {
            scheduler.join_until(deadline).await;
        }
        info!("scheduler host stopped");
    }

    /// State snapshot of one job's scheduler, by name.
    pub fn state_of(&self, job_name: &str) -> Option<SchedulerState> {
        self.schedulers
            .iter()
            .find(|s| s.name() == job_name)
            .map(|s| s.state())
    }

    /// State snapshots of every started scheduler.
    pub fn states(&self) -> Vec<(String, SchedulerState)> {
        self.schedulers
            .iter()
            .map(|s| (s.name().to_string(), s.state()))
            .collect()
    }
}

// ── Shutdown signal ─────────────────────────────────────────────────

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}

// ── Tests ───────────────────────────────────────────────────────────
