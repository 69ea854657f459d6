//! HTTP executor for the function-call backend.
//!
//! Each tool names its backend route ([`ToolSpec::backend_path`]). A call is
//! validated against the tool's schema, POSTed as
//! `{ call_id, function_name, arguments }`, and the backend's
//! `{ result: { success, error, ... } }` body is mapped to a [`ToolOutcome`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolExecutor, ToolInvocation, ToolOutcome};
use crate::config::BackendConfig;
use crate::error::{BridgeError, Result};
use crate::tools::validation::validate_tool_args;
use crate::tools::{ToolRegistry, ToolSpec};

/// Longest slice of a non-JSON error body quoted in a failure reason.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct FunctionCallResponse {
    #[serde(default)]
    call_id: Option<String>,
    result: Value,
}

/// Executes calls by POSTing them to the function-call backend.
pub struct HttpToolExecutor {
    client: reqwest::Client,
    base_url: String,
    tools: Arc<ToolRegistry>,
}

impl std::fmt::Debug for HttpToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpToolExecutor")
            .field("base_url", &self.base_url)
            .field("tools", &self.tools)
            .finish()
    }
}

impl HttpToolExecutor {
    /// Create an executor for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Backend`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, tools: Arc<ToolRegistry>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BridgeError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            tools,
        })
    }

    async fn call_backend(&self, tool: &dyn ToolSpec, invocation: &ToolInvocation) -> Result<Value> {
        let url = format!("{}{}", self.base_url, tool.backend_path());
        let body = json!({
            "call_id": invocation.call_id,
            "function_name": invocation.function_name,
            "arguments": invocation.arguments,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Backend(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&body_text)
            )));
        }

        let parsed: FunctionCallResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Backend(format!("invalid backend response: {e}")))?;

        if let Some(echoed) = parsed.call_id.as_deref()
            && echoed != invocation.call_id
        {
            tracing::warn!(
                call_id = %invocation.call_id,
                echoed_call_id = echoed,
                "backend echoed a different call id"
            );
        }

        Ok(parsed.result)
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn submit(&self, invocation: ToolInvocation) -> ToolOutcome {
        let Some(tool) = self.tools.get(&invocation.function_name) else {
            tracing::warn!(tool_name = %invocation.function_name, "unknown function");
            return ToolOutcome::Failure(format!("Unknown function: {}", invocation.function_name));
        };

        if let Err(e) = validate_tool_args(
            &invocation.function_name,
            &invocation.arguments_value(),
            &tool.schema(),
        ) {
            tracing::warn!(call_id = %invocation.call_id, error = %e, "rejected tool arguments");
            return ToolOutcome::Failure(e.to_string());
        }

        let start = std::time::Instant::now();
        match self.call_backend(tool.as_ref(), &invocation).await {
            Ok(result) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                if result.get("success").and_then(Value::as_bool).unwrap_or(false) {
                    tracing::info!(
                        call_id = %invocation.call_id,
                        tool_name = %invocation.function_name,
                        duration_ms,
                        "backend call succeeded"
                    );
                    ToolOutcome::Success(result)
                } else {
                    let reason = result
                        .get("error")
                        .and_then(Value::as_str)
                        .filter(|e| !e.is_empty())
                        .unwrap_or("tool execution failed")
                        .to_owned();
                    tracing::info!(
                        call_id = %invocation.call_id,
                        tool_name = %invocation.function_name,
                        duration_ms,
                        reason = %reason,
                        "backend reported failure"
                    );
                    ToolOutcome::Failure(reason)
                }
            }
            Err(e) => {
                tracing::error!(
                    call_id = %invocation.call_id,
                    tool_name = %invocation.function_name,
                    error = %e,
                    "backend call failed"
                );
                ToolOutcome::Failure(e.message())
            }
        }
    }
}

fn map_request_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Timeout(format!("backend request timed out: {e}"))
    } else if e.is_connect() {
        BridgeError::Backend(format!("failed to connect to backend: {e}"))
    } else {
        BridgeError::Backend(format!("backend request failed: {e}"))
    }
}

/// Extract a readable message from a backend error body.
///
/// Understands `{"error": {"message", "type", "code"}}`, `{"error": "..."}`,
/// `{"detail": ...}` and `{"message": "..."}`; anything else is quoted,
/// truncated to 500 characters.
fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return "empty response body".to_owned();
        }
        return trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    };

    match value.get("error") {
        Some(Value::Object(err)) => {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            let kind = err.get("type").and_then(Value::as_str).unwrap_or("");
            let code = err.get("code").and_then(Value::as_str).unwrap_or("");
            if kind.is_empty() && code.is_empty() {
                return message.to_owned();
            }
            return format!("{message} (type: {kind}, code: {code})");
        }
        Some(Value::String(s)) => return s.clone(),
        _ => {}
    }

    match value.get("detail") {
        Some(Value::String(s)) => return s.clone(),
        Some(other) => return other.to_string(),
        None => {}
    }

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return message.to_owned();
    }

    value.to_string()
}
