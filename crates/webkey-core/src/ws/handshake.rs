//! WebSocket opening handshake validation (RFC 6455 §4.2).
//!
//! The HTTP layer parses the request line and headers; this module
//! decides whether they form a valid upgrade request and, if so,
//! derives the `Sec-WebSocket-Accept` token the 101 response must
//! carry.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Fixed GUID appended to the client key before hashing, per RFC 6455.
const WS_ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Decoded length of a valid `Sec-WebSocket-Key` nonce.
const WS_KEY_NONCE_LEN: usize = 16;

/// Why an upgrade request was refused.  All variants produce the same
/// 400 response on the wire; the distinction is for logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("method is {0}, upgrade requires GET")]
    NotGet(String),

    #[error("HTTP version {0} is below 1.1")]
    BadHttpVersion(String),

    #[error("missing or malformed Host header")]
    MissingHost,

    #[error("Upgrade header is not 'websocket'")]
    BadUpgradeHeader,

    #[error("Connection header does not include 'Upgrade'")]
    BadConnectionHeader,

    #[error("missing or malformed Sec-WebSocket-Key")]
    BadKey,

    #[error("unsupported Sec-WebSocket-Version: {0:?}")]
    BadVersion(Option<String>),
}

/// Header lookup the validator reads through.  Case-insensitive on the
/// header name; returns the first matching value.
pub trait HeaderLookup {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for [(String, String)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Validates an upgrade request and returns the accept token for the
/// 101 response.
///
/// Checks, in order: GET method, HTTP/1.1 or later, a nonempty `Host`,
/// `Upgrade: websocket` (case-insensitive value), `Connection`
/// containing an `Upgrade` token, a `Sec-WebSocket-Key` that decodes
/// to a 16-byte nonce, and `Sec-WebSocket-Version: 13`.
///
/// # Errors
///
/// The first check that fails, as a [`HandshakeError`].
pub fn validate_upgrade(
    method: &str,
    http_version: &str,
    headers: &(impl HeaderLookup + ?Sized),
) -> Result<String, HandshakeError> {
    if method != "GET" {
        return Err(HandshakeError::NotGet(method.to_string()));
    }

    if !version_at_least_1_1(http_version) {
        return Err(HandshakeError::BadHttpVersion(http_version.to_string()));
    }

    match headers.header("Host") {
        Some(host) if !host.trim().is_empty() => {}
        _ => return Err(HandshakeError::MissingHost),
    }

    match headers.header("Upgrade") {
        Some(v) if v.trim().eq_ignore_ascii_case("websocket") => {}
        _ => return Err(HandshakeError::BadUpgradeHeader),
    }

    // Connection is a comma-separated token list; proxies commonly send
    // "keep-alive, Upgrade".
    let connection_has_upgrade = headers
        .header("Connection")
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);
    if !connection_has_upgrade {
        return Err(HandshakeError::BadConnectionHeader);
    }

    let key = match headers.header("Sec-WebSocket-Key") {
        Some(k) => k.trim(),
        None => return Err(HandshakeError::BadKey),
    };
    match BASE64.decode(key) {
        Ok(nonce) if nonce.len() == WS_KEY_NONCE_LEN => {}
        _ => return Err(HandshakeError::BadKey),
    }

    match headers.header("Sec-WebSocket-Version") {
        Some(v) if v.trim() == "13" => {}
        other => return Err(HandshakeError::BadVersion(other.map(str::to_string))),
    }

    Ok(accept_token(key))
}

/// `"HTTP/1.1"` and anything newer qualifies.
fn version_at_least_1_1(version: &str) -> bool {
    let Some(rest) = version.strip_prefix("HTTP/") else {
        return false;
    };
    let (major, minor) = match rest.split_once('.') {
        Some((maj, min)) => (maj.parse::<u32>().ok(), min.parse::<u32>().ok()),
        None => (rest.parse::<u32>().ok(), Some(0)),
    };
    match (major, minor) {
        (Some(major), Some(minor)) => major > 1 || (major == 1 && minor >= 1),
        _ => false,
    }
}

/// Derives the `Sec-WebSocket-Accept` value:
/// `base64(SHA-1(key ++ GUID))`.
pub fn accept_token(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_ACCEPT_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_headers() -> Vec<(String, String)> {
        vec![
            ("Host".to_string(), "127.0.0.1:8080".to_string()),
            ("Upgrade".to_string(), "websocket".to_string()),
            ("Connection".to_string(), "Upgrade".to_string()),
            (
                "Sec-WebSocket-Key".to_string(),
                "dGhlIHNhbXBsZSBub25jZQ==".to_string(),
            ),
            ("Sec-WebSocket-Version".to_string(), "13".to_string()),
        ]
    }

    fn without(name: &str) -> Vec<(String, String)> {
        valid_headers()
            .into_iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(name))
            .collect()
    }

    fn with(name: &str, value: &str) -> Vec<(String, String)> {
        let mut headers = without(name);
        headers.push((name.to_string(), value.to_string()));
        headers
    }

    #[test]
    fn test_accept_token_matches_rfc_example() {
        // Worked example from RFC 6455 §1.3.
        assert_eq!(
            accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_valid_request_yields_accept_token() {
        let token = validate_upgrade("GET", "HTTP/1.1", valid_headers().as_slice()).unwrap();
        assert_eq!(token, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_non_get_method_is_rejected() {
        assert_eq!(
            validate_upgrade("POST", "HTTP/1.1", valid_headers().as_slice()),
            Err(HandshakeError::NotGet("POST".to_string()))
        );
    }

    #[test]
    fn test_missing_host_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", without("Host").as_slice()),
            Err(HandshakeError::MissingHost)
        );
    }

    #[test]
    fn test_wrong_upgrade_value_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", with("Upgrade", "h2c").as_slice()),
            Err(HandshakeError::BadUpgradeHeader)
        );
    }

    #[test]
    fn test_upgrade_value_is_case_insensitive() {
        assert!(validate_upgrade("GET", "HTTP/1.1", with("Upgrade", "WebSocket").as_slice()).is_ok());
    }

    #[test]
    fn test_connection_token_list_is_accepted() {
        let headers = with("Connection", "keep-alive, Upgrade");
        assert!(validate_upgrade("GET", "HTTP/1.1", headers.as_slice()).is_ok());
    }

    #[test]
    fn test_connection_without_upgrade_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", with("Connection", "keep-alive").as_slice()),
            Err(HandshakeError::BadConnectionHeader)
        );
    }

    #[test]
    fn test_short_key_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", with("Sec-WebSocket-Key", "c2hvcnQ=").as_slice()),
            Err(HandshakeError::BadKey)
        );
    }

    #[test]
    fn test_missing_key_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", without("Sec-WebSocket-Key").as_slice()),
            Err(HandshakeError::BadKey)
        );
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", with("Sec-WebSocket-Version", "8").as_slice()),
            Err(HandshakeError::BadVersion(Some("8".to_string())))
        );
    }

    #[test]
    fn test_missing_version_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.1", without("Sec-WebSocket-Version").as_slice()),
            Err(HandshakeError::BadVersion(None))
        );
    }

    #[test]
    fn test_http_1_0_is_rejected() {
        assert_eq!(
            validate_upgrade("GET", "HTTP/1.0", valid_headers().as_slice()),
            Err(HandshakeError::BadHttpVersion("HTTP/1.0".to_string()))
        );
    }

    #[test]
    fn test_http_2_is_accepted() {
        assert!(validate_upgrade("GET", "HTTP/2", valid_headers().as_slice()).is_ok());
    }

    #[test]
    fn test_key_that_is_not_base64_is_rejected() {
        assert_eq!(
            validate_upgrade(
                "GET",
                "HTTP/1.1",
                with("Sec-WebSocket-Key", "####not-base64-padding##").as_slice()
            ),
            Err(HandshakeError::BadKey)
        );
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let headers: Vec<(String, String)> = valid_headers()
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        assert!(validate_upgrade("GET", "HTTP/1.1", headers.as_slice()).is_ok());
    }
}
