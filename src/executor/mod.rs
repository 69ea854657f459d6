//! Tool execution boundary.
//!
//! The [`ToolExecutor`] trait is the only thing the reconciliation core
//! knows about the backends that actually perform retrieval or note
//! operations. An executor returns exactly one [`ToolOutcome`], or never
//! returns; the dispatcher applies its own timeout either way.
//!
//! [`http::HttpToolExecutor`] is the production implementation.

pub mod http;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use http::HttpToolExecutor;

/// A ready call handed to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub function_name: String,
    /// Parsed, non-empty arguments.
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Arguments as a JSON object value.
    #[must_use]
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// The single result of executing a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Domain payload from the backend.
    Success(Value),
    /// Human-readable failure reason.
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Executes tool calls against some backend.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute one call. Failures are reported as [`ToolOutcome::Failure`],
    /// never as panics or errors.
    async fn submit(&self, invocation: ToolInvocation) -> ToolOutcome;
}
