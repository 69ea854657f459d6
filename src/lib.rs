//! Voxlink: tool-call reconciliation for realtime voice sessions.
//!
//! A realtime speech endpoint announces each tool call through several
//! redundant, unordered events, some carrying incomplete arguments. This
//! crate turns that stream into exactly one dispatch per call, runs the call
//! against a backend under a hard timeout, and answers with a tool output
//! followed by a delayed request to resume generation.
//!
//! # Architecture
//!
//! - **Realtime events**: inbound events are opaque tagged JSON; outbound
//!   events are typed and each carries a fresh `event_id`
//! - **Calls**: detection rules, argument readiness, the per-session dedup
//!   ledger, dispatch with timeout, and result coordination
//! - **Session**: a single task owns all call state and multiplexes control
//!   commands, executor results, timers and inbound events
//! - **Executor**: the backend boundary; the HTTP executor talks to the
//!   retrieval and notes function-call routes
//! - **Transport**: a stdin/stdout JSON-lines bridge

pub mod calls;
pub mod config;
pub mod error;
pub mod executor;
pub mod observability;
pub mod realtime;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use executor::{ToolExecutor, ToolInvocation, ToolOutcome};
pub use realtime::{InboundEvent, OutboundEvent, ToolOutput};
pub use session::{SessionController, SessionHandle, SessionPhase, session_channel};
pub use tools::ToolRegistry;
