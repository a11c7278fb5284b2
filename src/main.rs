mod config;
mod exec;
mod git;
mod health;
mod http;
mod workspace;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::health::{LifecycleState, Liveness};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "gitifyd", about = "Local git automation daemon")]
struct Cli {
    /// Path to the YAML configuration file.  Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,
    /// Listen address override (e.g. `0.0.0.0:5000`).
    #[arg(long)]
    listen_addr: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub liveness: Liveness,
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

/// Flip the liveness flag and wake the drain watcher.
///
/// The flag is set before the watcher fires (and before the shutdown future
/// resolves), so health checks start failing before the listener stops
/// accepting new connections.
fn begin_drain(liveness: &Liveness, drain_tx: &watch::Sender<bool>) {
    liveness.set(LifecycleState::Draining);
    let _ = drain_tx.send(true);
}

/// Resolve on the first SIGINT/SIGTERM.  There is exactly one shutdown
/// coordinator per process; repeated signals reach an already-draining
/// server and have no further effect.
async fn shutdown_signal(liveness: Liveness, drain_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }

    begin_drain(&liveness, &drain_tx);
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ---- Config ----
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(addr) = cli.listen_addr {
        config.server.listen = addr;
        config::validate_config(&config)?;
    }
    let config = Arc::new(config);

    tracing::info!("starting gitifyd");

    // ---- App state ----
    let liveness = Liveness::new();
    let state = AppState {
        config: Arc::clone(&config),
        liveness: liveness.clone(),
    };

    let app = http::handler::create_router(state);

    // ---- Listener ----
    let listen_addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", config.server.listen))?;

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {listen_addr}"))?;

    liveness.set(LifecycleState::Ready);
    tracing::info!(%listen_addr, "server ready to handle requests");

    // ---- Serve with bounded graceful shutdown ----
    let (drain_tx, mut drain_rx) = watch::channel(false);
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);

    let mut serve = {
        let liveness = liveness.clone();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal(liveness, drain_tx))
            .await
        })
    };

    tokio::select! {
        // The server exited without a shutdown signal: a serve error,
        // which there is no recovering from.
        res = &mut serve => {
            res.context("server task panicked")?.context("server error")?;
        }
        _ = drain_rx.changed() => {
            tracing::info!(
                grace_secs = grace.as_secs(),
                "server draining in-flight requests"
            );
            match tokio::time::timeout(grace, &mut serve).await {
                Ok(res) => {
                    res.context("server task panicked")?.context("server error")?;
                    liveness.set(LifecycleState::Stopped);
                    tracing::info!("server stopped");
                }
                Err(_) => {
                    bail!(
                        "graceful shutdown timed out after {}s with requests still in flight",
                        grace.as_secs()
                    );
                }
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_drain_flips_the_flag_before_notifying() {
        let liveness = Liveness::new();
        liveness.set(LifecycleState::Ready);
        let (drain_tx, drain_rx) = watch::channel(false);

        begin_drain(&liveness, &drain_tx);

        // The watcher observes the drain only after the flag is already
        // flipped, matching the ordering the health endpoint relies on.
        assert_eq!(liveness.get(), LifecycleState::Draining);
        assert!(drain_rx.has_changed().unwrap());
    }

    #[test]
    fn begin_drain_is_idempotent() {
        let liveness = Liveness::new();
        liveness.set(LifecycleState::Ready);
        let (drain_tx, drain_rx) = watch::channel(false);

        begin_drain(&liveness, &drain_tx);
        begin_drain(&liveness, &drain_tx);

        assert_eq!(liveness.get(), LifecycleState::Draining);
        assert!(drain_rx.has_changed().unwrap());
    }

    #[test]
    fn drain_notification_survives_a_dropped_receiver() {
        let liveness = Liveness::new();
        let (drain_tx, drain_rx) = watch::channel(false);
        drop(drain_rx);
        // Must not panic even with no watcher left.
        begin_drain(&liveness, &drain_tx);
        assert_eq!(liveness.get(), LifecycleState::Draining);
    }
}
