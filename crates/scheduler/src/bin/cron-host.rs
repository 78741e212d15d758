//! cron-host — runs registered cron jobs until SIGINT/SIGTERM.
//!
//! Ships with a single heartbeat job so the host can be exercised end to end
//! from the command line:
//!
//! ```text
//! cron-host --cron "*/10 * * * * *" --message "still here"
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use uhrwerk_core::config::{load_dotenv, Config};
use uhrwerk_scheduler::{shutdown_signal, CronJob, SchedulerHost, StaticScopeProvider};

// ── CLI ─────────────────────────────────────────────────────────────

/// In-process cron job host.
#[derive(Parser, Debug)]
#[command(name = "cron-host", version, about)]
struct Cli {
    /// Cron expression for the heartbeat job (5, 6 or 7 fields).
    #[arg(long, env = "UHRWERK_CRON", default_value = "*/10 * * * * *")]
    cron: String,

    /// Message the heartbeat job logs on every tick.
    #[arg(long, env = "UHRWERK_MESSAGE", default_value = "heartbeat")]
    message: String,

    /// Override the configured timezone (IANA name, e.g. "Asia/Manila").
    #[arg(long, env = "UHRWERK_TIMEZONE_OVERRIDE")]
    timezone: Option<String>,
}

// ── Heartbeat job ───────────────────────────────────────────────────

/// Logs a message on every tick. Exists so the host has something to run.
struct HeartbeatJob {
    cron: String,
    message: String,
}

#[async_trait::async_trait]
impl CronJob for HeartbeatJob {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn schedule(&self) -> &str {
        &self.cron
    }

    async fn execute(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        info!(message = %self.message, "tick");
        Ok(())
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let mut config = Config::from_env();
    if let Some(tz) = cli.timezone {
        config.scheduler.timezone = tz;
    }
    config.log_summary();

    let heartbeat = Arc::new(HeartbeatJob {
        cron: cli.cron,
        message: cli.message,
    });

    let provider = Arc::new(StaticScopeProvider::new().with_job(heartbeat.clone()));
    let mut host = SchedulerHost::new(config.scheduler, provider)?;
    host.register(heartbeat.as_ref())?;

    host.start_all();
    info!("cron-host running — press Ctrl-C to stop");

    shutdown_signal().await;
    info!("shutdown signal received");

    host.stop_all().await;
    info!("cron-host exited cleanly");
    Ok(())
}
