//! Cron normalization and next-occurrence helpers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires at least 6 fields: `sec min hour day-of-month
/// month day-of-week` (an optional 7th year field). Users typically write
/// standard 5-field cron: `min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6/7-field or non-standard; pass through as-is.
        trimmed.to_string()
    }
}

/// Parse a job's cron expression at registration time.
pub(crate) fn parse_schedule(job: &str, expr: &str) -> Result<Schedule> {
    Schedule::from_str(&normalize_cron(expr)).map_err(|source| SchedulerError::InvalidSchedule {
        job: job.to_string(),
        source,
    })
}

/// Validate an IANA timezone name once, at host construction.
pub(crate) fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse::<Tz>()
        .map_err(|_| SchedulerError::UnknownTimezone(tz.to_string()))
}

/// Next occurrence strictly after `reference`, computed in `tz`.
///
/// Returns `None` when the schedule is exhausted (e.g. a year-pinned
/// expression whose last occurrence has passed).
pub(crate) fn next_occurrence(
    schedule: &Schedule,
    reference: DateTime<Utc>,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    schedule
        .after(&reference.with_timezone(&tz))
        .next()
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Tests ───────────────────────────────────────────────────────────
