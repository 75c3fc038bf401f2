//! keyrelay client: entry point.
//!
//! Polls the keyboard and streams every press/release to a keyrelay server.
//!
//! # Usage
//!
//! ```text
//! keyrelay-client [OPTIONS]
//!
//! Options:
//!   --config            <PATH>  Config file [default: <config dir>/keyrelay/client.toml]
//!   --host              <HOST>  Server host name or IP
//!   --port              <PORT>  Server port
//!   --poll-interval-ms  <MS>    Pause between key-state polls
//!   --local                     Print events locally instead of streaming
//! ```
//!
//! Command-line values override the config file.  The flags can also be set
//! through `KEYRELAY_CONFIG`, `KEYRELAY_HOST`, `KEYRELAY_PORT` and
//! `KEYRELAY_POLL_INTERVAL_MS`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keyrelay_client::application::ConsoleSink;
use keyrelay_client::infrastructure::key_state::platform_key_state;
use keyrelay_client::infrastructure::network::{ClientOptions, StreamingClient};
use keyrelay_client::infrastructure::storage::load_client_config;
use keyrelay_core::EdgeDetector;

/// How often the main task checks whether the client stopped by itself.
const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_millis(200);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// keyrelay client: streams key presses to a keyrelay server.
#[derive(Debug, Parser)]
#[command(name = "keyrelay-client", version)]
struct Cli {
    /// Path to `client.toml`.
    #[arg(long, env = "KEYRELAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "KEYRELAY_HOST")]
    host: Option<String>,

    #[arg(long, env = "KEYRELAY_PORT")]
    port: Option<u16>,

    #[arg(long, env = "KEYRELAY_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Print detected events to stdout instead of connecting to a server.
    #[arg(long)]
    local: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        load_client_config(cli.config.as_deref()).context("failed to load client config")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval_ms = ms;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("keyrelay-client v{} starting", env!("CARGO_PKG_VERSION"));
    let source = platform_key_state()?;
    let options = config.to_options();

    if cli.local {
        return run_local(options, source).await;
    }

    let mut client = StreamingClient::new(options);
    client.connect(&config.host, config.port).await?;
    client.start(source).await?;
    info!("streaming key events; press Ctrl+C to stop");

    let mut liveness = tokio::time::interval(LIVENESS_CHECK_INTERVAL);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl+C")?;
                info!("Ctrl+C received; shutting down");
                break;
            }
            _ = liveness.tick() => {
                if !client.is_running() {
                    warn!("connection to server lost");
                    break;
                }
            }
        }
    }

    client.stop().await?;
    Ok(())
}

/// Runs the detector with console output until Ctrl+C.
async fn run_local(
    options: ClientOptions,
    source: Box<dyn keyrelay_core::KeyStateSource + Send>,
) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(false));
    let handle = EdgeDetector::new(options.catalog).spawn(
        source,
        ConsoleSink::stdout(),
        options.poll_interval,
        Arc::clone(&running),
    )?;
    info!("monitoring keys locally; press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    running.store(false, Ordering::SeqCst);

    tokio::task::spawn_blocking(move || handle.stop())
        .await
        .context("detector thread join failed")??;
    Ok(())
}
