use thiserror::Error;

/// Errors that can occur while registering or running scheduled jobs.
///
/// Only the registration-time variants (`InvalidSchedule`, `DuplicateJob`,
/// `UnknownTimezone`) ever reach a caller. `Resolution` and `Execution` are
/// per-tick failures: they are logged at the loop boundary and handled
/// according to the configured error policy.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression for job '{job}': {source}")]
    InvalidSchedule {
        job: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("failed to resolve job '{job}': {message}")]
    Resolution { job: String, message: String },

    #[error("job '{job}' execution failed: {source}")]
    Execution {
        job: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
