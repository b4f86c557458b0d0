//! TCP accept loop and per-connection routing.
//!
//! Every connection is one HTTP request.  `GET /websocket` with a valid
//! upgrade becomes a long-lived WebSocket session feeding the virtual
//! keyboard; any other target is answered from the static `www` root
//! and the connection closes.
//!
//! Each accepted connection runs in its own Tokio task, so a stalled
//! browser never blocks the accept loop or other sessions.  All
//! sessions share one [`KeyboardSink`]; serialization of the actual
//! event writes happens inside the sink.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use webkey_core::ws::validate_upgrade;

use crate::application::{run_session, KeyboardSink};
use crate::domain::DaemonConfig;
use crate::infrastructure::http::{
    self, read_request_head, write_bad_request, write_not_found, write_ok,
    write_switching_protocols,
};

/// Route that upgrades to the key-event WebSocket.
const WEBSOCKET_ROUTE: &str = "/websocket";

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Runs the listener until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.  Accept errors on
/// individual connections are logged and do not stop the loop.
pub async fn run_server(
    config: Arc<DaemonConfig>,
    sink: Arc<dyn KeyboardSink>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    info!("listening on http://{}", config.bind_addr);

    // Session tasks live in a JoinSet so shutdown can tear them all
    // down before the caller drops the keyboard device.
    let mut sessions: JoinSet<()> = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Reap finished sessions so the set does not grow unbounded.
        while sessions.try_join_next().is_some() {}

        // Short timeout so the loop can notice the shutdown flag even
        // when no one is connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                let sink = Arc::clone(&sink);
                sessions.spawn(async move {
                    handle_connection(stream, peer_addr, cfg, sink).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept failure (e.g. fd exhaustion); keep going.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout; loop back to check the flag.
            }
        }
    }

    if !sessions.is_empty() {
        info!("aborting {} active sessions", sessions.len());
    }
    sessions.shutdown().await;

    Ok(())
}

/// Entry point of each per-connection task; logs the outcome so
/// `serve_connection` can use `?` freely.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<DaemonConfig>,
    sink: Arc<dyn KeyboardSink>,
) {
    let peer = peer_addr.to_string();
    match serve_connection(&mut stream, &peer, &config, sink.as_ref()).await {
        Ok(()) => debug!("connection {peer} closed"),
        Err(e) => warn!("connection {peer} failed: {e:#}"),
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

/// Reads one request and dispatches it: WebSocket upgrade, static file,
/// or error response.
///
/// Generic over the stream so tests can drive it with in-memory pipes.
///
/// # Errors
///
/// Socket and HTTP parse errors, and session errors after an upgrade.
pub async fn serve_connection<S>(
    stream: &mut S,
    peer: &str,
    config: &DaemonConfig,
    sink: &dyn KeyboardSink,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (head, leftover) = read_request_head(stream).await?;
    debug!("{peer}: {} {}", head.method, head.target);

    if head.target.split('?').next() == Some(WEBSOCKET_ROUTE) {
        return upgrade_and_run(stream, &leftover, peer, &head, sink).await;
    }

    serve_static(stream, peer, config, &head).await
}

/// Validates the upgrade and, on success, runs the session until the
/// browser disconnects.
async fn upgrade_and_run<S>(
    stream: &mut S,
    leftover: &[u8],
    peer: &str,
    head: &http::RequestHead,
    sink: &dyn KeyboardSink,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let accept = match validate_upgrade(&head.method, &head.version, head.headers.as_slice()) {
        Ok(token) => token,
        Err(e) => {
            warn!("{peer}: rejected upgrade: {e}");
            write_bad_request(stream).await?;
            return Ok(());
        }
    };

    write_switching_protocols(stream, &accept).await?;
    info!("{peer}: WebSocket session established");

    run_session(stream, leftover, peer, sink).await
}

/// Answers a plain HTTP request from the `www` root.
async fn serve_static<S>(
    stream: &mut S,
    peer: &str,
    config: &DaemonConfig,
    head: &http::RequestHead,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if head.method != "GET" {
        write_not_found(stream).await?;
        return Ok(());
    }

    let path = match http::resolve_static_path(&config.www_root, &head.target) {
        Some(path) => path,
        None => {
            warn!("{peer}: refusing path {:?}", head.target);
            write_not_found(stream).await?;
            return Ok(());
        }
    };

    match tokio::fs::read(&path).await {
        Ok(body) => {
            write_ok(stream, http::content_type_for(&path), &body).await?;
        }
        Err(e) => {
            debug!("{peer}: {} not served: {e}", path.display());
            write_not_found(stream).await?;
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
