//! TCP listener: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting client connections and spawning one Tokio task per client.
//! 3. Running each connection's read → handle → reply loop until the client
//!    sends EXIT, disconnects, or sends a frame that cannot be processed.
//! 4. Deregistering the session (and telling everyone else) on every exit
//!    path.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! Handlers only share the [`SessionRegistry`]; everything else belongs to
//! one connection.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use chat_core::{decode_request, encode_response, ProtocolError};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::delivery::SharedSink;
use crate::application::session_protocol::{fatal_reply, Flow, ProtocolSession};
use crate::application::session_registry::SessionRegistry;
use crate::infrastructure::network::channel::{ChannelError, ChannelReader, ChannelWriter};
use crate::infrastructure::storage::config::ServerConfig;

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Per-connection I/O limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub write_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            write_timeout: config.write_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the configured address and serves clients until `running` is set to
/// `false`.
///
/// # Errors
///
/// Returns an error if the address is invalid or the listener cannot be bound
/// (e.g., the port is already in use).
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind chat listener on {addr}"))?;

    info!(
        "chat server listening on {addr} (max {} sessions)",
        config.max_sessions()
    );

    let registry = SessionRegistry::new(config.max_sessions());
    serve(listener, registry, ConnectionSettings::from(&config), running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Split out from [`run_server`] so tests can bind `127.0.0.1:0`, read the
/// chosen port, and share the registry with the server.
///
/// # Errors
///
/// Currently always returns `Ok(())` once `running` is cleared; accept errors
/// are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    registry: SessionRegistry,
    settings: ConnectionSettings,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the flag is re-checked even when nobody connects.
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("accepted connection from {peer_addr}");
                let registry = registry.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, registry, settings).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Top-level handler for one client connection.
///
/// Wraps [`run_connection`] and logs the outcome.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: SessionRegistry,
    settings: ConnectionSettings,
) {
    match run_connection(stream, peer_addr, registry, settings).await {
        Ok(()) => info!("connection {peer_addr} closed"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one client connection.
///
/// Whatever way the frame loop ends, the session is terminated (deregistered,
/// others notified) and the write half is shut down before returning.
async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: SessionRegistry,
    settings: ConnectionSettings,
) -> anyhow::Result<()> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("connection {peer_addr}: could not set TCP_NODELAY: {e}");
    }

    let (read_half, write_half) = stream.into_split();
    let mut reader = ChannelReader::new(read_half).with_idle_timeout(settings.idle_timeout);
    let channel = Arc::new(ChannelWriter::new(write_half, settings.write_timeout));
    let writer: SharedSink = channel.clone();
    let mut session = ProtocolSession::new(registry, Arc::clone(&writer), peer_addr.to_string());

    let outcome = serve_frames(&mut reader, &channel, &writer, &mut session).await;

    session.terminate().await;
    writer.close().await;
    outcome
}

/// The read → handle → reply loop for one connection.
///
/// Also ends when `channel` closes underneath it, which happens when a push
/// from another handler fails or times out mid-frame.
async fn serve_frames(
    reader: &mut ChannelReader<OwnedReadHalf>,
    channel: &ChannelWriter<OwnedWriteHalf>,
    writer: &SharedSink,
    session: &mut ProtocolSession,
) -> anyhow::Result<()> {
    loop {
        let read = tokio::select! {
            read = reader.read_frame() => read,
            _ = channel.closed() => {
                return Err(anyhow::anyhow!("outbound channel failed; dropping connection"));
            }
        };
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(ChannelError::Closed) => return Ok(()),
            Err(ChannelError::Protocol(e)) => return Err(reject(writer, e).await),
            Err(e) => return Err(e.into()),
        };

        let frame = match decode_request(&bytes) {
            Ok((frame, _)) => frame,
            Err(e) => return Err(reject(writer, e).await),
        };

        let reply = session.handle(frame).await;
        let encoded = encode_response(&reply.response)
            .with_context(|| format!("cannot encode {:?}", reply.response.response_type()))?;
        writer
            .send_frame(&encoded)
            .await
            .context("failed to write reply")?;

        if reply.flow == Flow::Terminate {
            return Ok(());
        }
    }
}

/// Sends a best-effort ERROR frame for a fatal protocol error and returns the
/// error for the caller to propagate.
async fn reject(writer: &SharedSink, error: ProtocolError) -> anyhow::Error {
    if let Ok(frame) = encode_response(&fatal_reply(&error)) {
        if let Err(e) = writer.send_frame(&frame).await {
            debug!("could not send ERROR frame: {e}");
        }
    }
    anyhow::Error::new(error).context("fatal protocol error")
}
