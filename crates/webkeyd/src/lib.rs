//! webkeyd library crate.
//!
//! Layered the usual way:
//!
//! - [`domain`]: configuration types, no I/O.
//! - [`application`]: the per-connection session loop and the
//!   [`application::KeyboardSink`] seam it injects through.
//! - [`infrastructure`]: the TCP/HTTP listener and the uinput device
//!   behind the sink.
//!
//! The binary in `main.rs` parses the CLI, creates the device, and
//! hands both to [`infrastructure::run_server`].

pub mod application;
pub mod domain;
pub mod infrastructure;
