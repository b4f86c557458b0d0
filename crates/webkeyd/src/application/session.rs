//! Per-connection WebSocket session: decode frames, translate key
//! events, inject them into the virtual keyboard.
//!
//! A session starts after the HTTP upgrade response has been written.
//! From then on the stream carries WebSocket frames both ways.  The
//! loop is strictly sequential per session, so events from one browser
//! are injected in exactly the order they arrived.
//!
//! # Error policy
//!
//! - Frame-level protocol violations kill the session (the decoder is
//!   poisoned and the TCP stream is dropped).
//! - Malformed payload lines and unknown key symbols are logged and
//!   dropped; the session continues.
//! - Injection failures are logged and dropped; a transient `write()`
//!   error on the uinput device should not disconnect the browser.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use webkey_core::ws::{encode_close, encode_pong};
use webkey_core::{keymap, FrameDecoder, KeyAction, KeyEvent, WsMessage};

use crate::domain::MAX_MESSAGE_LEN;

// ── Injection seam ────────────────────────────────────────────────────────────

/// Abstraction over the virtual keyboard device.
///
/// The session loop only ever needs "press keycode N with action A".
/// Production uses the uinput-backed implementation; tests use a
/// recording sink, so the whole session path runs without a kernel
/// device.
pub trait KeyboardSink: Send + Sync {
    /// Emits one key event followed by a report sync.
    ///
    /// # Errors
    ///
    /// An I/O error from the underlying device.  Callers treat this as
    /// non-fatal.
    fn inject(&self, code: u16, action: KeyAction) -> io::Result<()>;
}

// ── Session loop ──────────────────────────────────────────────────────────────

/// Runs a WebSocket session to completion.
///
/// `leftover` holds any bytes the HTTP layer read past the end of the
/// upgrade request head; they are the first frame bytes of the session
/// and are fed to the decoder before the stream is read.
///
/// Returns `Ok(())` on a clean close (Close frame or EOF) and an error
/// on a protocol violation or stream failure.
///
/// # Errors
///
/// Frame decoding errors and socket read/write errors.
pub async fn run_session<S>(
    stream: &mut S,
    leftover: &[u8],
    peer: &str,
    sink: &dyn KeyboardSink,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new(MAX_MESSAGE_LEN);
    decoder.feed(leftover)?;

    let mut read_buf = [0u8; 4096];

    loop {
        // Drain every complete message before reading again — one TCP
        // segment can carry many frames.
        while let Some(msg) = decoder.next_message()? {
            match msg {
                WsMessage::Text(line) => handle_key_line(&line, peer, sink),

                WsMessage::Binary(data) => {
                    // The key-event protocol is text-only.
                    warn!("session {peer}: unexpected binary frame ({} bytes), ignored", data.len());
                }

                WsMessage::Ping(payload) => {
                    debug!("session {peer}: ping ({} bytes)", payload.len());
                    stream.write_all(&encode_pong(&payload)).await?;
                }

                WsMessage::Pong(_) => {
                    debug!("session {peer}: pong received");
                }

                WsMessage::Close => {
                    debug!("session {peer}: close frame received");
                    // Best-effort close reply; the peer may already be gone.
                    let _ = stream.write_all(&encode_close()).await;
                    return Ok(());
                }
            }
        }

        let n = stream.read(&mut read_buf).await?;
        if n == 0 {
            debug!("session {peer}: stream ended");
            return Ok(());
        }
        decoder.feed(&read_buf[..n])?;
    }
}

/// Translates one `"<symbol> <action>"` line and injects the result.
///
/// Every failure mode here is drop-and-continue: a browser sending one
/// odd line should keep its session.
fn handle_key_line(line: &str, peer: &str, sink: &dyn KeyboardSink) {
    let event = match KeyEvent::parse(line) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("session {peer}: dropping malformed line {line:?}: {e}");
            return;
        }
    };

    let code = match keymap::lookup(&event.symbol) {
        Some(code) => code,
        None => {
            debug!("session {peer}: unmapped symbol {:?}, dropped", event.symbol);
            return;
        }
    };

    if let Err(e) = sink.inject(code, event.action) {
        warn!(
            "session {peer}: failed to inject {:?} {:?}: {e}",
            event.symbol, event.action
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
