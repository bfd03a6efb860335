//! meeting-relay: forward completed meetings to a webhook.
//!
//! Runs one pass with `--once`, otherwise polls every
//! `monitoring.pollIntervalMinutes` until Ctrl-C / SIGTERM.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use relay_core::Config;
use relay_ledger::{JsonFileLedger, LedgerOptions};
use relay_monitor::{CacheFileSource, MonitorError, MonitorLoop};
use relay_notify::NotificationEvent;

/// Relay finished meetings from the local notes cache to a signed webhook.
#[derive(Parser, Debug)]
#[command(name = "meeting-relay", version)]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "MEETING_RELAY_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,

    /// Send a test message through every enabled notification channel and exit.
    #[arg(long)]
    test_notifications: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    config.log_summary();

    let source = CacheFileSource::from_config(&config.source).context("no meeting source")?;
    let load = JsonFileLedger::load(
        config.monitoring.state_file_path.clone(),
        LedgerOptions::from(&config.monitoring),
    );
    let recovered = load.recovered.map(|e| e.to_string());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut monitor = MonitorLoop::from_config(&config, Box::new(source), Box::new(load.ledger))
        .context("failed to initialise monitor")?
        .with_shutdown(shutdown_rx.clone());

    if args.test_notifications {
        return test_notifications(&monitor).await;
    }

    if let Some(err) = recovered {
        monitor
            .notifier()
            .notify(&NotificationEvent::LedgerRecovered {
                path: config.monitoring.state_file_path.display().to_string(),
                error: err,
            })
            .await;
    }

    if args.once {
        let summary = monitor.run_once().await?;
        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            skipped = summary.skipped,
            "single run finished"
        );
        return Ok(());
    }

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let interval = Duration::from_secs(u64::from(config.monitoring.poll_interval_minutes.max(1)) * 60);
    info!(interval_secs = interval.as_secs(), "polling for meetings");
    poll(&mut monitor, interval, shutdown_rx).await;

    info!("meeting-relay exited cleanly");
    Ok(())
}

async fn poll(monitor: &mut MonitorLoop, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        match monitor.run_once().await {
            Ok(_) => {}
            Err(MonitorError::UpstreamFetch(e)) => {
                warn!(error = %e, "could not read meetings, will retry next interval");
            }
            Err(e) => error!(error = %e, "monitor run failed"),
        }

        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }
    }
}

async fn test_notifications(monitor: &MonitorLoop) -> anyhow::Result<()> {
    let results = monitor.notifier().test_all().await;
    if results.is_empty() {
        warn!("no notification channels are enabled");
        return Ok(());
    }
    let mut failed = 0;
    for r in &results {
        if r.success {
            info!(channel = %r.channel, duration_ms = r.duration_ms, "test notification sent");
        } else {
            failed += 1;
            error!(channel = %r.channel, error = r.error.as_deref().unwrap_or(""), "test notification failed");
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} notification channels failed", results.len());
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
