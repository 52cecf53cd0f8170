//! Chat Relay server entry point.
//!
//! Loads the TOML configuration, applies command-line overrides, initialises
//! logging, and runs the accept loop until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! chat-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>         Config file [default: platform config dir]
//!   --port <PORT>           TCP port to listen on
//!   --bind <ADDR>           IP address to bind
//!   --max-sessions <N>      Concurrent session limit (at most 127)
//!   --idle-timeout <SECS>   Drop clients silent this long (0 = never)
//!   --write-config          Save the effective configuration and exit
//! ```
//!
//! | Variable      | Overrides  |
//! |---------------|------------|
//! | `CHAT_CONFIG` | `--config` |
//! | `CHAT_PORT`   | `--port`   |
//! | `CHAT_BIND`   | `--bind`   |
//!
//! `RUST_LOG` takes precedence over the config file's `log_level`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_server::infrastructure::network::run_server;
use chat_server::infrastructure::storage::config::{
    config_file_path, load_config, save_config, ServerConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Chat Relay server.
///
/// Accepts chat clients over TCP and relays direct messages, broadcasts,
/// and group discussions between them.
#[derive(Debug, Parser)]
#[command(name = "chat-server", about = "Multi-user TCP chat relay server", version)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// Defaults to `server.toml` in the platform config directory.  A missing
    /// file is not an error: built-in defaults are used.
    #[arg(long, env = "CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides the config file).
    #[arg(long, env = "CHAT_PORT")]
    port: Option<u16>,

    /// IP address to bind (overrides the config file).
    ///
    /// Use `0.0.0.0` for every interface or `127.0.0.1` for local clients only.
    #[arg(long, env = "CHAT_BIND")]
    bind: Option<String>,

    /// Maximum number of concurrent sessions (overrides the config file).
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Seconds of silence before a client is disconnected; 0 disables.
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if the
    /// resulting bind address is not a valid IP address.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(self.config.as_deref()).context("failed to load config")?;

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(max_sessions) = self.max_sessions {
            config.limits.max_sessions = max_sessions;
        }
        if let Some(idle_timeout) = self.idle_timeout {
            config.limits.idle_timeout_secs = idle_timeout;
        }

        config.socket_addr()?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let write_config = cli.write_config;
    let config = cli.into_server_config()?;

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    if write_config {
        let path = match config_path {
            Some(path) => path,
            None => config_file_path()?,
        };
        save_config(&path, &config)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        info!("configuration written to {}", path.display());
        return Ok(());
    }

    info!("Chat Relay server starting");

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(config, running).await?;

    info!("Chat Relay server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
