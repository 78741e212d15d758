//! Per-job runtime state, published by each scheduler's own loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a job's scheduler currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    /// Constructed, loop not started yet.
    Idle,
    /// Sleeping until the next occurrence.
    Waiting,
    /// A tick is in flight.
    Executing,
    /// Loop has ended (cancelled, exhausted schedule, or stop error policy).
    Stopped,
}

/// Snapshot of one job scheduler's state.
///
/// Written only by the owning loop; everyone else observes through a watch
/// channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub phase: SchedulerPhase,
    /// The occurrence being waited for (`Waiting`) or executed (`Executing`).
    pub next_run: Option<DateTime<Utc>>,
}

impl SchedulerState {
    pub fn idle() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            next_run: None,
        }
    }

    pub fn waiting(next_run: DateTime<Utc>) -> Self {
        Self {
            phase: SchedulerPhase::Waiting,
            next_run: Some(next_run),
        }
    }

    pub fn executing(scheduled_for: DateTime<Utc>) -> Self {
        Self {
            phase: SchedulerPhase::Executing,
            next_run: Some(scheduled_for),
        }
    }

    pub fn stopped() -> Self {
        Self {
            phase: SchedulerPhase::Stopped,
            next_run: None,
        }
    }
}
