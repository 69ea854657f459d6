//! Inbound realtime transport events.

use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Function-call arguments have finished streaming.
pub const ARGUMENTS_DONE: &str = "response.function_call_arguments.done";
/// A model response has been finalized.
pub const RESPONSE_DONE: &str = "response.done";
/// Dedicated function-call event.
pub const FUNCTION_CALL: &str = "function_call";
/// Dedicated function-call finalized event.
pub const FUNCTION_CALL_DONE: &str = "function_call.done";
/// A conversation item has been finalized.
pub const ITEM_DONE: &str = "conversation.item.done";
/// A conversation item changed.
pub const CONVERSATION_UPDATED: &str = "conversation.updated";

/// Item/output `type` value marking a function call.
pub const FUNCTION_CALL_ITEM: &str = "function_call";

/// One event from the realtime transport: a type tag plus its full JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    kind: String,
    payload: Value,
}

impl InboundEvent {
    /// Build an event from a tag and payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Build an event from a decoded JSON object, taking the tag from its
    /// `type` field.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedEvent`] if the value is not an object
    /// or carries no string `type`.
    pub fn from_value(payload: Value) -> Result<Self> {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedEvent("event has no string `type` field".into()))?
            .to_owned();
        Ok(Self { kind, payload })
    }

    /// Decode an event from a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedEvent`] on invalid JSON or a missing tag.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| BridgeError::MalformedEvent(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// The event type tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The full event body.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Look up a top-level payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
