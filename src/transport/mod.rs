//! Process-level transports for a session.

pub mod stdio;

pub use stdio::{run_bridge, run_stdio_bridge};
