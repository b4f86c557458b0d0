//! Infrastructure layer: TCP listener, HTTP plumbing, and the
//! uinput-backed keyboard device.

pub mod http;
pub mod server;
pub mod uinput;

pub use server::run_server;
pub use uinput::{DeviceError, UinputKeyboard};
