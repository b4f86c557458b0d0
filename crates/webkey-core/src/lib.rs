//! Protocol and translation core for the webkey daemon.
//!
//! This crate is platform-independent and does no I/O.  It provides:
//!
//! - [`ws`]: WebSocket opening-handshake validation and an incremental
//!   RFC 6455 frame decoder with server-side frame encoding.
//! - [`event`]: the one-line text protocol (`"<symbol> <action>"`)
//!   spoken over the WebSocket, parsed into typed key events.
//! - [`keymap`]: the symbol-to-Linux-keycode table shared between the
//!   translator and device setup.
//!
//! The daemon crate wires these to sockets and to the kernel's uinput
//! interface.

pub mod event;
pub mod keymap;
pub mod ws;

pub use event::{KeyAction, KeyEvent, ParseError};
pub use ws::{FrameDecoder, FrameError, WsMessage};
