//! Outbound realtime transport events.
//!
//! Every event carries a fresh `event_id`. The remote endpoint silently
//! ignores events without one, so ids are minted at construction time and
//! never reuse a call id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolSchema;

/// Prefix for minted outbound event ids.
pub const EVENT_ID_PREFIX: &str = "evt_";

/// Mint a fresh outbound event id.
#[must_use]
pub fn new_event_id() -> String {
    format!("{EVENT_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Uniform tool-output envelope: `{ ok, payload | error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    /// Build a success envelope.
    #[must_use]
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Build a failure envelope.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(reason.into()),
        }
    }
}

/// Events the bridge sends to the realtime endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Advertise the callable tool set. Sent once per session.
    RegisterTools {
        event_id: String,
        tools: Vec<ToolSchema>,
    },
    /// Return a tool result for a call.
    SubmitToolOutput {
        event_id: String,
        call_id: String,
        output: ToolOutput,
    },
    /// Ask the endpoint to start a new generation turn.
    ResumeGeneration { event_id: String },
}

impl OutboundEvent {
    #[must_use]
    pub fn register_tools(tools: Vec<ToolSchema>) -> Self {
        Self::RegisterTools {
            event_id: new_event_id(),
            tools,
        }
    }

    #[must_use]
    pub fn submit_tool_output(call_id: impl Into<String>, output: ToolOutput) -> Self {
        Self::SubmitToolOutput {
            event_id: new_event_id(),
            call_id: call_id.into(),
            output,
        }
    }

    #[must_use]
    pub fn resume_generation() -> Self {
        Self::ResumeGeneration {
            event_id: new_event_id(),
        }
    }

    /// The wire `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterTools { .. } => "register_tools",
            Self::SubmitToolOutput { .. } => "submit_tool_output",
            Self::ResumeGeneration { .. } => "resume_generation",
        }
    }

    /// The event's unique id.
    #[must_use]
    pub fn event_id(&self) -> &str {
        match self {
            Self::RegisterTools { event_id, .. }
            | Self::SubmitToolOutput { event_id, .. }
            | Self::ResumeGeneration { event_id } => event_id,
        }
    }

    /// The call this event answers, if any.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::SubmitToolOutput { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}
