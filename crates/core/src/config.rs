use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            scheduler: SchedulerConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  scheduler:  timezone={}", self.scheduler.timezone);
        tracing::info!("  scheduler:  error_policy={:?}", self.scheduler.error_policy);
        tracing::info!(
            "  scheduler:  stop_grace={}s",
            self.scheduler.stop_grace_secs
        );
    }

    /// Return a view safe for API responses / diagnostics.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "scheduler": {
                "timezone": self.scheduler.timezone,
                "error_policy": self.scheduler.error_policy,
                "stop_grace_secs": self.scheduler.stop_grace_secs,
            },
        })
    }
}

// ── Scheduler ─────────────────────────────────────────────────

/// What a job scheduler does after a tick fails (resolution or execution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure and keep scheduling (default).
    Continue,
    /// Log the failure and end that job's loop.
    Stop,
}

impl ErrorPolicy {
    /// Parse a policy value; falls back to `Continue` with a warning on
    /// anything unrecognized.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Self::Continue,
            "stop" => Self::Stop,
            other => {
                tracing::warn!(
                    value = %other,
                    "unrecognized error policy, falling back to 'continue'"
                );
                Self::Continue
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA timezone name used for next-occurrence computation (e.g. "UTC",
    /// "Asia/Manila"). Validated by the host at construction.
    pub timezone: String,
    /// Whether a failed tick ends that job's loop or is logged and skipped.
    pub error_policy: ErrorPolicy,
    /// Maximum time `stop` waits for a loop to unwind before abandoning it.
    pub stop_grace_secs: u64,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            timezone: env_or("UHRWERK_TIMEZONE", "UTC"),
            error_policy: ErrorPolicy::parse_lenient(&env_or(
                "UHRWERK_ERROR_POLICY",
                "continue",
            )),
            stop_grace_secs: env_u64("UHRWERK_STOP_GRACE_SECS", 5),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            error_policy: ErrorPolicy::Continue,
            stop_grace_secs: 5,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_policy_parses_known_values() {
        assert_eq!(ErrorPolicy::parse_lenient("continue"), ErrorPolicy::Continue);
        assert_eq!(ErrorPolicy::parse_lenient("stop"), ErrorPolicy::Stop);
        assert_eq!(ErrorPolicy::parse_lenient("  Stop "), ErrorPolicy::Stop);
    }

    #[test]
    fn error_policy_falls_back_to_continue() {
        assert_eq!(ErrorPolicy::parse_lenient("halt"), ErrorPolicy::Continue);
        assert_eq!(ErrorPolicy::parse_lenient(""), ErrorPolicy::Continue);
    }

    #[test]
    fn scheduler_config_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.timezone, "UTC");
        assert_eq!(cfg.error_policy, ErrorPolicy::Continue);
        assert_eq!(cfg.stop_grace(), Duration::from_secs(5));
    }
}
