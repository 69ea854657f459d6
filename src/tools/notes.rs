//! Notes management tool (`manage_notes`).

use serde_json::{Value, json};

use super::types::{MAX_CONTENT_LENGTH, MAX_QUERY_LENGTH, MAX_TITLE_LENGTH, ToolSpec, result_message};

/// Actions accepted by `manage_notes`.
pub const NOTE_ACTIONS: [&str; 5] = ["create", "list", "search", "update", "delete"];

/// Creates, lists, searches, updates and deletes the user's notes.
///
/// # Arguments (JSON)
///
/// - `action` (string, required): one of [`NOTE_ACTIONS`]
/// - `title`, `content` (string): for `create` / `update`
/// - `note_id` (string): for `update` / `delete` / fetching one note via `list`
/// - `query` (string): for `search`
///
/// # Success payload
///
/// `{ "notes": [...], "count": n, "message"?: string }`
#[derive(Debug, Default)]
pub struct NotesTool;

impl NotesTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolSpec for NotesTool {
    fn name(&self) -> &str {
        "manage_notes"
    }

    fn description(&self) -> &str {
        "Create, list, search, update or delete the user's notes. Use `create` with a title and \
         content, `list` (optionally with note_id), `search` with a query, `update` with a \
         note_id and new title or content, and `delete` with a note_id."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": NOTE_ACTIONS,
                    "description": "Operation to perform"
                },
                "title": {
                    "type": "string",
                    "description": "Note title (create/update)",
                    "maxLength": MAX_TITLE_LENGTH
                },
                "content": {
                    "type": "string",
                    "description": "Note body (create/update)",
                    "maxLength": MAX_CONTENT_LENGTH
                },
                "note_id": {
                    "type": "string",
                    "description": "Note identifier (update/delete, or list a single note)"
                },
                "query": {
                    "type": "string",
                    "description": "Full-text search terms (search)",
                    "maxLength": MAX_QUERY_LENGTH
                }
            },
            "required": ["action"]
        })
    }

    fn backend_path(&self) -> &str {
        "/api/notes/function-call"
    }

    fn format_success(&self, result: Value) -> Value {
        // Backend nests notes under `data`; accept a flat shape too.
        let data = result.get("data").filter(|d| d.is_object()).unwrap_or(&result);
        let notes = data
            .get("notes")
            .filter(|n| n.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]));
        let count = data
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| notes.as_array().map_or(0, |n| n.len() as u64));

        let mut payload = json!({
            "notes": notes,
            "count": count,
        });
        if let Some(message) = result_message(&result) {
            payload["message"] = Value::String(message);
        }
        payload
    }
}
