//! Email Worker Service
//!
//! Hosts a [`NotificationEngine`] and its drain worker, fed by JSON email
//! commands on stdin (see [`ingress`]).
//!
//! ## Architecture
//!
//! ```text
//! stdin (one EmailCommand per line)
//!   ↓
//! queue_email / send_* helpers
//!   ↓
//! DispatchQueue (high → normal → low)
//!   ↓ (drain worker, one job at a time)
//! EmailProvider (SMTP or simulated, EMAIL_PROVIDER)
//! ```
//!
//! ## Features
//!
//! - Env-driven provider, rate limits, retries and branding
//! - Periodic stats heartbeat (`EMAIL_WORKER_STATS_INTERVAL_SECS`)
//! - Drains and exits when stdin closes, unless `EMAIL_WORKER_EXIT_ON_EOF=false`
//! - Graceful shutdown on SIGINT or SIGTERM

pub mod ingress;

use core_config::{env_flag, env_parse, Environment};
use domain_notifications::NotificationEngine;
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Run the email worker
///
/// 1. Sets up error reports and structured logging (JSON for prod, pretty for dev)
/// 2. Builds the engine from the environment
/// 3. Spawns the drain worker, a stats heartbeat and the stdin ingress
/// 4. Waits for a shutdown signal, or for stdin to close and the queue to
///    drain, then stops them
///
/// # Errors
///
/// Returns an error if the provider, engine or heartbeat configuration is
/// invalid, or if the worker task panics.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting email worker service"
    );

    let stats_interval: u64 = env_parse("EMAIL_WORKER_STATS_INTERVAL_SECS", 60)
        .wrap_err("Failed to load worker configuration")?;
    let exit_on_eof = env_flag("EMAIL_WORKER_EXIT_ON_EOF", true)
        .wrap_err("Failed to load worker configuration")?;

    let engine = Arc::new(
        NotificationEngine::from_env().wrap_err("Failed to build notification engine")?,
    );

    match engine.health_check().await {
        Ok(true) => info!("Email provider is healthy"),
        Ok(false) => warn!("Email provider reported unhealthy, jobs may fail"),
        Err(e) => warn!(error = %e, "Email provider health check failed"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    tokio::spawn({
        let shutdown_tx = Arc::clone(&shutdown_tx);
        async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error waiting for shutdown signal: {:?}", e);
            }
            let _ = shutdown_tx.send(true);
        }
    });

    tokio::spawn({
        let engine = Arc::clone(&engine);
        let shutdown_rx = shutdown_rx.clone();
        async move {
            let reader = BufReader::new(tokio::io::stdin());
            let summary = ingress::consume(&engine, reader, shutdown_rx).await;
            info!(
                accepted = summary.accepted,
                rejected = summary.rejected,
                malformed = summary.malformed,
                "Email command input closed"
            );

            if exit_on_eof && !summary.interrupted {
                ingress::wait_until_idle(&engine, Duration::from_millis(100)).await;
                info!("Queue drained after end of input, initiating shutdown...");
                let _ = shutdown_tx.send(true);
            }
        }
    });

    let heartbeat = tokio::spawn(log_stats(
        Arc::clone(&engine),
        Duration::from_secs(stats_interval.max(1)),
        shutdown_rx.clone(),
    ));

    let worker = engine.spawn_worker(shutdown_rx);
    worker.await.wrap_err("Email dispatch worker panicked")?;
    heartbeat.await.wrap_err("Stats heartbeat panicked")?;

    let stats = engine.stats();
    if stats.queue_size > 0 {
        warn!(pending = stats.queue_size, "Queued emails dropped on shutdown");
    }
    info!(
        sent = stats.emails_sent,
        failed = stats.emails_failed,
        rate_limited = stats.rate_limited,
        retries = stats.retries,
        "Email worker service stopped"
    );
    Ok(())
}

async fn log_stats(
    engine: Arc<NotificationEngine>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stats = engine.stats();
                info!(
                    sent = stats.emails_sent,
                    failed = stats.emails_failed,
                    queue_size = stats.queue_size,
                    processing = stats.is_processing_queue,
                    provider = %stats.provider,
                    "Email engine stats"
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .wrap_err("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), eyre::Report>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
