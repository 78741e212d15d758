//! Per-execution dependency scopes.
//!
//! A scope is created immediately before one execution and released
//! immediately after it completes, on every exit path. Whatever a scope
//! resolves must not outlive it. The host never holds long-lived resolved
//! dependencies; a scheduler that waits for days holds no scope at all.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SchedulerError};
use crate::job::CronJob;

/// An isolated dependency-resolution context for a single execution.
///
/// `release` is idempotent and safe to call after a failed resolution.
/// Implementations should also release on drop so an early return cannot
/// leak resolved instances.
pub trait ExecutionScope: Send {
    /// Resolve the job instance to execute this tick.
    fn resolve(&mut self, job_name: &str) -> Result<Arc<dyn CronJob>>;

    /// Release everything resolved within this scope. Idempotent.
    fn release(&mut self);
}

/// Creates one [`ExecutionScope`] per execution.
pub trait ScopeProvider: Send + Sync {
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>>;
}

// ── Static provider ─────────────────────────────────────────────────

/// Name-keyed scope provider over pre-built job instances.
///
/// Good enough for binaries and tests; deployments with real per-execution
/// dependencies (connections, transactions) implement [`ScopeProvider`] over
/// their own wiring instead.
#[derive(Default)]
pub struct StaticScopeProvider {
    jobs: HashMap<String, Arc<dyn CronJob>>,
}

impl StaticScopeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job, keyed by its own `name()`.
    pub fn with_job(mut self, job: Arc<dyn CronJob>) -> Self {
        self.jobs.insert(job.name().to_string(), job);
        self
    }
}

impl ScopeProvider for StaticScopeProvider {
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>> {
        Ok(Box::new(StaticScope {
            jobs: self.jobs.clone(),
            released: false,
        }))
    }
}

struct StaticScope {
    jobs: HashMap<String, Arc<dyn CronJob>>,
    released: bool,
}

impl ExecutionScope for StaticScope {
    fn resolve(&mut self, job_name: &str) -> Result<Arc<dyn CronJob>> {
        if self.released {
            return Err(SchedulerError::Resolution {
                job: job_name.to_string(),
                message: "scope already released".to_string(),
            });
        }
        self.jobs
            .get(job_name)
            .cloned()
            .ok_or_else(|| SchedulerError::Resolution {
                job: job_name.to_string(),
                message: "job not present in scope".to_string(),
            })
    }

    fn release(&mut self) {
        self.released = true;
        self.jobs.clear();
    }
}

impl Drop for StaticScope {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    struct NoopJob;

    #[async_trait::async_trait]
    impl CronJob for NoopJob {
        fn name(&self) -> &str {
            "noop"
        }

        fn schedule(&self) -> &str {
            "* * * * * *"
        }

        async fn execute(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn resolves_registered_job() {
        let provider = StaticScopeProvider::new().with_job(Arc::new(NoopJob));
        let mut scope = provider.create_scope().unwrap();
        let job = scope.resolve("noop").unwrap();
        assert_eq!(job.name(), "noop");
    }

    #[test]
    fn unknown_job_is_a_resolution_error() {
        let provider = StaticScopeProvider::new();
        let mut scope = provider.create_scope().unwrap();
        let err = scope.resolve("missing").unwrap_err();
        assert!(matches!(err, SchedulerError::Resolution { .. }));
    }

    #[test]
    fn release_is_idempotent() {
        let provider = StaticScopeProvider::new().with_job(Arc::new(NoopJob));
        let mut scope = provider.create_scope().unwrap();
        scope.release();
        scope.release();
        assert!(scope.resolve("noop").is_err());
    }

    #[test]
    fn each_scope_is_independent() {
        let provider = StaticScopeProvider::new().with_job(Arc::new(NoopJob));
        let mut first = provider.create_scope().unwrap();
        first.release();

        // Releasing one scope must not affect a fresh one.
        let mut second = provider.create_scope().unwrap();
        assert!(second.resolve("noop").is_ok());
    }
}
