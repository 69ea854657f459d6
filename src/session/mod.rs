//! Session lifecycle and the single task that owns all call state.

pub mod controller;
pub mod messages;
pub mod state;

pub use controller::{SessionController, SessionHandle, session_channel};
pub use messages::{SessionCommand, SessionMessage, SessionPhase};
pub use state::{SessionScope, SessionState, TeardownSummary};
