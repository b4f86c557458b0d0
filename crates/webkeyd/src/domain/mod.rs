//! Domain layer: configuration types with no I/O dependencies.

pub mod config;

pub use config::{DaemonConfig, DeviceIdentity, MAX_MESSAGE_LEN};
