//! Minimal HTTP/1.1 support: just enough to read one request head,
//! answer the WebSocket upgrade, and serve the static keyboard page.
//!
//! The daemon is not a general web server.  It understands exactly
//! three outcomes per connection: a `101 Switching Protocols` upgrade
//! on the WebSocket route, a static file, or a fixed error page.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use webkey_core::ws::HeaderLookup;

/// Upper bound on the request head.  Browsers send upgrade requests of
/// a few hundred bytes; anything larger is hostile or broken.
const MAX_HEAD_LEN: usize = 8 * 1024;

/// Fixed body of the 400 response to a failed upgrade.
pub const BAD_REQUEST_BODY: &str = "Invalid WebSocket request!";

/// Fixed body of the 404 response.
pub const NOT_FOUND_BODY: &str = "404 Not Found";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request head exceeds {MAX_HEAD_LEN} bytes")]
    HeadTooLarge,

    #[error("connection closed before the request head completed")]
    TruncatedHead,

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parsed request line and headers of one HTTP request.
#[derive(Debug)]
pub struct RequestHead {
    pub method: String,
    /// Request target as sent, e.g. `/websocket` or `/index.html`.
    pub target: String,
    /// Protocol token from the request line, e.g. `HTTP/1.1`.
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Case-insensitive single-header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_slice().header(name)
    }
}

// ── Request parsing ───────────────────────────────────────────────────────────

/// Reads one request head (through the blank line) from the stream.
///
/// Returns the parsed head plus any bytes read past the terminator —
/// for an upgrade request those are the first WebSocket frame bytes and
/// must be handed to the session.
///
/// # Errors
///
/// [`HttpError`] if the head is oversized, truncated, or malformed, or
/// on a socket error.
pub async fn read_request_head<S>(stream: &mut S) -> Result<(RequestHead, Vec<u8>), HttpError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() >= MAX_HEAD_LEN {
            return Err(HttpError::HeadTooLarge);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::TruncatedHead);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let leftover = buf[head_end..].to_vec();
    let head_text = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let head = parse_head(&head_text)?;
    Ok((head, leftover))
}

/// Position just past `\r\n\r\n`, if present.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_head(text: &str) -> Result<RequestHead, HttpError> {
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) => (m.to_string(), t.to_string(), v.to_string()),
        _ => return Err(HttpError::MalformedRequestLine(request_line.to_string())),
    };

    let headers = lines
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Writes the `101 Switching Protocols` upgrade response.
pub async fn write_switching_protocols<S>(stream: &mut S, accept: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    );
    stream.write_all(response.as_bytes()).await
}

/// Writes a `400 Bad Request` with the fixed refusal body.
pub async fn write_bad_request<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    write_plain(stream, "400 Bad Request", BAD_REQUEST_BODY).await
}

/// Writes a `404 Not Found` with the fixed body.
pub async fn write_not_found<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    write_plain(stream, "404 Not Found", NOT_FOUND_BODY).await
}

async fn write_plain<S>(stream: &mut S, status: &str, body: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await
}

/// Writes a `200 OK` with the given body and content type.
pub async fn write_ok<S>(stream: &mut S, content_type: &str, body: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(body).await
}

// ── Static files ──────────────────────────────────────────────────────────────

/// Resolves a request target to a file under `www_root`.
///
/// `/` maps to `index.html`.  Targets that escape the root (absolute
/// components, `..`) resolve to `None`.
pub fn resolve_static_path(www_root: &Path, target: &str) -> Option<PathBuf> {
    // Drop any query string; the page never sends one but links might.
    let path = target.split('?').next().unwrap_or(target);
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = if path.is_empty() { "index.html" } else { path };

    let relative = Path::new(path);
    let traversal_free = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !traversal_free {
        return None;
    }
    Some(www_root.join(relative))
}

/// Content type by file extension; the page only uses a handful.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("ico") => "image/x-icon",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
