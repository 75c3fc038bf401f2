//! keyrelay server: entry point.
//!
//! Listens for keyrelay clients and prints every key event they stream.
//!
//! # Usage
//!
//! ```text
//! keyrelay-server [OPTIONS]
//!
//! Options:
//!   --config         <PATH>   Config file [default: <config dir>/keyrelay/server.toml]
//!   --bind           <IP>     Address to listen on
//!   --port           <PORT>   TCP port
//!   --max-frame-len  <BYTES>  Longest accepted line, 0 = unlimited
//! ```
//!
//! Command-line values override the config file.  Each flag can also be set
//! through the environment (`KEYRELAY_CONFIG`, `KEYRELAY_BIND`,
//! `KEYRELAY_PORT`, `KEYRELAY_MAX_FRAME_LEN`).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyrelay_server::infrastructure::storage::load_server_config;
use keyrelay_server::infrastructure::StreamingServer;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// keyrelay server: receives key events from streaming clients.
#[derive(Debug, Parser)]
#[command(name = "keyrelay-server", version)]
struct Cli {
    /// Path to `server.toml`.
    #[arg(long, env = "KEYRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind.  `0.0.0.0` accepts connections on every interface.
    #[arg(long, env = "KEYRELAY_BIND")]
    bind: Option<String>,

    #[arg(long, env = "KEYRELAY_PORT")]
    port: Option<u16>,

    #[arg(long, env = "KEYRELAY_MAX_FRAME_LEN")]
    max_frame_len: Option<usize>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        load_server_config(cli.config.as_deref()).context("failed to load server config")?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(max) = cli.max_frame_len {
        config.max_frame_len = max;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let options = config
        .to_options()
        .with_context(|| format!("invalid bind address '{}'", config.bind_address))?;

    info!("keyrelay-server v{} starting", env!("CARGO_PKG_VERSION"));

    let server = StreamingServer::new(options);
    server.start(None).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Ctrl+C received; shutting down");

    server.stop().await;
    Ok(())
}
