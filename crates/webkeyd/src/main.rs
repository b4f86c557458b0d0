//! webkeyd — WebSocket-to-uinput keyboard bridge, entry point.
//!
//! A phone or laptop browser loads the served keyboard page, which
//! captures key presses and sends one text line per event
//! (`"<symbol> <action>"`) over a WebSocket.  This daemon translates
//! each line into a Linux input event and writes it to a virtual
//! uinput keyboard, so the browser types on this machine as if a
//! physical keyboard were attached.
//!
//! # Usage
//!
//! ```text
//! webkeyd [OPTIONS]
//!
//! Options:
//!   --port        <PORT>  HTTP/WebSocket listener port [default: 8080]
//!   --bind        <ADDR>  Address to bind to [default: 0.0.0.0]
//!   --www-root    <DIR>   Directory with the keyboard page [default: www]
//!   --device-name <NAME>  Virtual keyboard device name
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable              | Default              |
//! |-----------------------|----------------------|
//! | `WEBKEY_PORT`         | `8080`               |
//! | `WEBKEY_BIND`         | `0.0.0.0`            |
//! | `WEBKEY_WWW_ROOT`     | `www`                |
//! | `WEBKEY_DEVICE_NAME`  | `x-virtual-keyboard` |
//!
//! The daemon needs write access to `/dev/uinput` (root, or a udev
//! rule granting the user access).  Device registration happens before
//! the listener binds: if uinput is unavailable there is no point
//! accepting browsers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webkeyd::domain::{DaemonConfig, DeviceIdentity};
use webkeyd::infrastructure::{run_server, UinputKeyboard};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket-to-uinput keyboard bridge.
///
/// Serves a browser keyboard page and injects the key events it sends
/// into a virtual Linux keyboard device.
#[derive(Debug, Parser)]
#[command(name = "webkeyd", about = "Remote keyboard over WebSocket", version)]
struct Cli {
    /// TCP port for the HTTP/WebSocket listener.
    #[arg(long, default_value_t = 8080, env = "WEBKEY_PORT")]
    port: u16,

    /// IP address to bind to.
    ///
    /// `0.0.0.0` accepts connections from any interface.  Anyone who
    /// can reach the port can type on this machine.
    #[arg(long, default_value = "0.0.0.0", env = "WEBKEY_BIND")]
    bind: String,

    /// Directory containing the static keyboard page.
    #[arg(long, default_value = "www", env = "WEBKEY_WWW_ROOT")]
    www_root: PathBuf,

    /// Name the virtual keyboard registers under.
    #[arg(long, default_value = "x-virtual-keyboard", env = "WEBKEY_DEVICE_NAME")]
    device_name: String,
}

impl Cli {
    /// Converts the parsed arguments into a [`DaemonConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address.
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;

        Ok(DaemonConfig {
            bind_addr,
            www_root: self.www_root,
            device: DeviceIdentity {
                name: self.device_name,
                ..DeviceIdentity::default()
            },
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls verbosity; default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(cli.into_config()?);

    info!(
        "webkeyd starting — listen={}, www={}, device={:?}",
        config.bind_addr,
        config.www_root.display(),
        config.device.name
    );

    // Register the virtual keyboard first; a daemon that cannot inject
    // has nothing to offer browsers.
    let keyboard = Arc::new(
        UinputKeyboard::create(&config.device).context("failed to create uinput keyboard")?,
    );

    // Ctrl+C clears the flag; the accept loop polls it every 200 ms.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, keyboard, running).await?;

    // Dropping the keyboard here destroys the kernel device.
    info!("webkeyd stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
