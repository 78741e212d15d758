//! Per-job cron scheduling on tokio.
//!
//! Each registered job gets its own wait/execute loop: compute the next
//! occurrence of its cron expression, sleep until then (or until cancelled),
//! resolve the job inside a fresh [`ExecutionScope`], run it, release the
//! scope, repeat. The [`SchedulerHost`] owns one [`JobScheduler`] per job and
//! the shared shutdown signal.

mod cron;
pub mod error;
pub mod host;
pub mod job;
pub mod runner;
pub mod scope;
pub mod state;

pub use error::SchedulerError;
pub use host::{shutdown_signal, SchedulerHost};
pub use job::CronJob;
pub use runner::JobScheduler;
pub use scope::{ExecutionScope, ScopeProvider, StaticScopeProvider};
pub use state::{SchedulerPhase, SchedulerState};
