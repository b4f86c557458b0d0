//! Application layer: the per-connection session loop and the
//! injection seam it drives.

pub mod session;

pub use session::{run_session, KeyboardSink};
