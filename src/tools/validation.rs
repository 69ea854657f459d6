//! Tool argument validation against JSON schemas.
//!
//! Checks that parsed call arguments conform to the tool's declared schema
//! before they are sent to a backend: required fields, JSON types, `enum`
//! membership and string `maxLength`.
//!
//! # Examples
//!
//! ```
//! use voxlink::tools::validation::validate_tool_args;
//!
//! let schema = serde_json::json!({
//!     "type": "object",
//!     "properties": { "query": { "type": "string" } },
//!     "required": ["query"]
//! });
//! let args = serde_json::json!({ "query": "release date" });
//!
//! assert!(validate_tool_args("rag_knowledge", &args, &schema).is_ok());
//! ```

use serde_json::Value;

/// Why a set of arguments was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("tool '{tool}': expected object arguments, got {actual}")]
    NotAnObject { tool: String, actual: &'static str },

    #[error("tool '{tool}': missing required field '{field}'")]
    MissingField { tool: String, field: String },

    #[error("tool '{tool}': field '{field}' expected {expected}, got {actual}")]
    WrongType {
        tool: String,
        field: String,
        expected: String,
        actual: &'static str,
    },

    #[error("tool '{tool}': field '{field}' must be one of {allowed}")]
    NotAllowed {
        tool: String,
        field: String,
        allowed: String,
    },

    #[error("tool '{tool}': field '{field}' exceeds {max} characters")]
    TooLong {
        tool: String,
        field: String,
        max: u64,
    },
}

/// Validate tool arguments against a JSON schema.
///
/// Extra fields not in the schema are allowed (open schema).
///
/// # Errors
///
/// Returns the first [`ArgumentError`] found.
pub fn validate_tool_args(
    tool_name: &str,
    args: &Value,
    schema: &Value,
) -> Result<(), ArgumentError> {
    let schema_type = schema.get("type").and_then(Value::as_str).unwrap_or("");
    if schema_type != "object" {
        return Ok(());
    }

    let obj = args.as_object().ok_or_else(|| ArgumentError::NotAnObject {
        tool: tool_name.to_owned(),
        actual: json_type_name(args),
    })?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field_name in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(field_name) {
                return Err(ArgumentError::MissingField {
                    tool: tool_name.to_owned(),
                    field: field_name.to_owned(),
                });
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, val) in obj {
            if let Some(prop_schema) = properties.get(key) {
                validate_field(tool_name, key, val, prop_schema)?;
            }
        }
    }

    Ok(())
}

fn validate_field(
    tool_name: &str,
    field_name: &str,
    value: &Value,
    prop_schema: &Value,
) -> Result<(), ArgumentError> {
    // Optional fields sent as explicit nulls are treated as absent.
    if value.is_null() {
        return Ok(());
    }

    if let Some(expected) = prop_schema.get("type").and_then(Value::as_str) {
        let matches = match expected {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !matches {
            return Err(ArgumentError::WrongType {
                tool: tool_name.to_owned(),
                field: field_name.to_owned(),
                expected: expected.to_owned(),
                actual: json_type_name(value),
            });
        }
    }

    if let Some(allowed) = prop_schema.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        let allowed = allowed
            .iter()
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ArgumentError::NotAllowed {
            tool: tool_name.to_owned(),
            field: field_name.to_owned(),
            allowed,
        });
    }

    if let (Some(max), Some(text)) = (
        prop_schema.get("maxLength").and_then(Value::as_u64),
        value.as_str(),
    ) && text.chars().count() as u64 > max
    {
        return Err(ArgumentError::TooLong {
            tool: tool_name.to_owned(),
            field: field_name.to_owned(),
            max,
        });
    }

    Ok(())
}

/// Get a human-readable name for a JSON value's type.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
