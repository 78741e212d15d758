//! The capability every scheduled task implements.

use tokio_util::sync::CancellationToken;

/// A recurring job driven by a cron expression.
///
/// Implementations carry their dependencies; instances are resolved from a
/// fresh [`ExecutionScope`](crate::ExecutionScope) for every tick, so nothing
/// a job holds outlives one execution unless the scope provider says so.
#[async_trait::async_trait]
pub trait CronJob: Send + Sync {
    /// Unique job name. Used for registration, scope resolution and logging.
    fn name(&self) -> &str;

    /// Cron expression (5, 6 or 7 fields). 5-field expressions get a seconds
    /// column prepended during registration.
    fn schedule(&self) -> &str;

    /// Run one tick. The token is the host's shutdown signal: a long-running
    /// job should observe it and return early when cancellation is requested.
    async fn execute(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn CronJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronJob")
            .field("name", &self.name())
            .field("schedule", &self.schedule())
            .finish()
    }
}
