//! Knowledge retrieval tool (`rag_knowledge`).

use serde_json::{Value, json};

use super::types::{MAX_QUERY_LENGTH, ToolSpec, result_message};

/// Message surfaced to the model when retrieval finds nothing.
pub const NO_CONTEXT_MESSAGE: &str = "No relevant information found in knowledge base";

/// Searches the document knowledge base and returns relevant context.
///
/// # Arguments (JSON)
///
/// - `query` (string, required): what to look up
///
/// # Success payload
///
/// `{ "context": string, "sources": [...], "message"?: string }`
#[derive(Debug, Default)]
pub struct KnowledgeTool;

impl KnowledgeTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolSpec for KnowledgeTool {
    fn name(&self) -> &str {
        "rag_knowledge"
    }

    fn description(&self) -> &str {
        "Search the uploaded document knowledge base. Use this whenever the user asks about \
         information that may be contained in their documents. Returns relevant passages \
         and the documents they came from."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question or search terms to look up",
                    "maxLength": MAX_QUERY_LENGTH
                }
            },
            "required": ["query"]
        })
    }

    fn backend_path(&self) -> &str {
        "/api/rag/function-call"
    }

    fn format_success(&self, result: Value) -> Value {
        let context = result
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let sources = result
            .get("sources")
            .filter(|s| s.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]));

        let message = if context.is_empty() {
            Some(result_message(&result).unwrap_or_else(|| NO_CONTEXT_MESSAGE.to_owned()))
        } else {
            result_message(&result)
        };

        let mut payload = json!({
            "context": context,
            "sources": sources,
        });
        if let Some(message) = message {
            payload["message"] = Value::String(message);
        }
        payload
    }
}
