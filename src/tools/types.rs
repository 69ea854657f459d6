//! Core tool types.
//!
//! Defines the [`ToolSpec`] trait describing a callable function (its
//! schema, its backend route, and how its success payload is shaped for the
//! model) and [`ToolSchema`], the wire form used in tool registration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum accepted length of a free-text query argument.
pub const MAX_QUERY_LENGTH: usize = 10_000;

/// Maximum accepted length of a note title.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum accepted length of a note body.
pub const MAX_CONTENT_LENGTH: usize = 10_000;

/// Tool description as advertised to the realtime endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub parameters: Value,
}

/// A function the model may call.
///
/// All tools must be `Send + Sync`; they are shared between the session
/// task and executor tasks.
pub trait ToolSpec: Send + Sync {
    /// Returns the function name (e.g. "rag_knowledge").
    fn name(&self) -> &str;

    /// Returns a description the model uses to decide when to call the tool.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's arguments.
    fn schema(&self) -> Value;

    /// Route on the function-call backend that executes this tool.
    fn backend_path(&self) -> &str;

    /// Shape a successful backend result into the payload of the output
    /// envelope.
    fn format_success(&self, result: Value) -> Value {
        result
    }

    /// Wire schema for tool registration.
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.schema(),
        }
    }
}

/// Pull an optional non-empty `message` string out of a backend result.
pub(crate) fn result_message(result: &Value) -> Option<String> {
    result
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}
