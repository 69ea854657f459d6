//! Realtime transport event model.
//!
//! - [`event`]: inbound events as delivered by the transport
//! - [`outbound`]: events the bridge emits (tool registration, tool output,
//!   resume generation)

pub mod event;
pub mod outbound;

pub use event::InboundEvent;
pub use outbound::{OutboundEvent, ToolOutput, new_event_id};
