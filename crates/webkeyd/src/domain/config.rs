//! Daemon configuration types.
//!
//! [`DaemonConfig`] is the single source of truth for all runtime
//! settings.  The binary populates it from CLI arguments and
//! environment variables; the domain itself never reads the
//! environment, which keeps sessions and the device layer easy to
//! drive from tests.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Largest WebSocket message the daemon will buffer.  Key-event lines
/// are tens of bytes; anything near this limit is not a client we want.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// All runtime configuration for the daemon.
///
/// Built once at startup and shared across session tasks behind an
/// `Arc`.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Address and port the HTTP/WebSocket listener binds to.
    ///
    /// `0.0.0.0` accepts connections from any interface.  Anyone who
    /// can reach this port can type on the machine, so bind to
    /// `127.0.0.1` unless the network is trusted.
    pub bind_addr: SocketAddr,

    /// Directory served for plain HTTP GET requests (the browser
    /// keyboard page).
    pub www_root: PathBuf,

    /// Identity the virtual keyboard registers with the kernel.
    pub device: DeviceIdentity,
}

/// How the virtual keyboard appears to the input subsystem
/// (`/proc/bus/input/devices`, libinput, X11/Wayland).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Device name, capped at 79 bytes by the uinput setup struct.
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: "x-virtual-keyboard".to_string(),
            vendor: 0x1234,
            product: 0x5678,
            version: 1,
        }
    }
}

impl Default for DaemonConfig {
    /// Defaults suitable for running on the target machine directly:
    /// listen on all interfaces at port 8080 and serve `./www`.
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address string.
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            www_root: PathBuf::from("www"),
            device: DeviceIdentity::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
