//! Key event wire format: `"<symbol> <action>"`.
//!
//! Every WebSocket text message from the browser carries exactly one
//! key transition, e.g. `"A down"`, `"{enter} up"`,
//! `"{shiftleft} repeat"`.  This module parses that two-token format
//! into a typed [`KeyEvent`].
//!
//! Parsing is deliberately strict about structure (token count, action
//! word) and deliberately loose about the symbol: an unknown symbol is
//! still a well-formed event.  Whether it maps to a key is the
//! [`crate::keymap`] table's business, and unmapped symbols are dropped
//! silently downstream rather than failing the parse.

use thiserror::Error;

/// Errors produced while parsing a key event payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The payload did not contain two whitespace-separated tokens.
    #[error("expected '<symbol> <action>', got {0:?}")]
    MissingToken(String),

    /// The second token was not one of `up` / `down` / `repeat`.
    #[error("unknown action word: {0:?}")]
    UnknownAction(String),
}

/// State transition of a key, in wire order of likelihood.
///
/// The discriminants are the Linux input event values written to the
/// device (`0` release, `1` press, `2` autorepeat), so translation to
/// the platform is a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum KeyAction {
    Released = 0,
    Pressed = 1,
    Repeated = 2,
}

impl KeyAction {
    /// Parses the wire action word.  Exact match, case-sensitive.
    pub fn from_wire(word: &str) -> Option<Self> {
        match word {
            "up" => Some(Self::Released),
            "down" => Some(Self::Pressed),
            "repeat" => Some(Self::Repeated),
            _ => None,
        }
    }

    /// The numeric event value written to the input device.
    pub fn value(self) -> i32 {
        self as i32
    }
}

/// One parsed key transition from the browser.
///
/// Ephemeral: produced per completed WebSocket message, translated and
/// injected immediately, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Symbolic key name as sent by the client, looked up verbatim in
    /// the mapping table.
    pub symbol: String,
    pub action: KeyAction,
}

impl KeyEvent {
    /// Parses a complete text payload into a key event.
    ///
    /// The payload is split on the first run of whitespace; the
    /// remainder (trimmed) must be a valid action word.
    ///
    /// # Errors
    ///
    /// [`ParseError::MissingToken`] when fewer than two tokens are
    /// present, [`ParseError::UnknownAction`] when the action word is
    /// not `up`/`down`/`repeat`.
    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        let mut tokens = payload.split_whitespace();
        let symbol = tokens
            .next()
            .ok_or_else(|| ParseError::MissingToken(payload.to_string()))?;
        let word = tokens
            .next()
            .ok_or_else(|| ParseError::MissingToken(payload.to_string()))?;

        let action =
            KeyAction::from_wire(word).ok_or_else(|| ParseError::UnknownAction(word.to_string()))?;

        Ok(Self {
            symbol: symbol.to_string(),
            action,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
