//! Shared helpers for integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use voxlink::config::BridgeConfig;
use voxlink::executor::{ToolExecutor, ToolInvocation, ToolOutcome};
use voxlink::realtime::{InboundEvent, OutboundEvent};
use voxlink::session::{SessionHandle, session_channel};
use voxlink::tools::ToolRegistry;

/// How the scripted executor answers one call id.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Return `outcome` after `delay`.
    After(Duration, ToolOutcome),
    /// Never return.
    Never,
}

/// One call seen by the scripted executor.
#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub invocation: ToolInvocation,
    pub at: Instant,
}

/// Executor whose behaviour is scripted per call id.
///
/// Unscripted calls succeed immediately with an empty retrieval result.
#[derive(Debug, Default)]
pub(crate) struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, Script>>,
    submissions: Mutex<Vec<Submission>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn script(&self, call_id: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(call_id.to_owned(), script);
    }

    pub(crate) fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Number of submissions for `call_id`.
    pub(crate) fn count(&self, call_id: &str) -> usize {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.invocation.call_id == call_id)
            .count()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn submit(&self, invocation: ToolInvocation) -> ToolOutcome {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&invocation.call_id)
            .cloned()
            .unwrap_or_else(|| {
                Script::After(
                    Duration::ZERO,
                    ToolOutcome::Success(json!({"success": true, "context": "", "sources": []})),
                )
            });
        self.submissions.lock().unwrap().push(Submission {
            invocation,
            at: Instant::now(),
        });
        match script {
            Script::After(delay, outcome) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            Script::Never => std::future::pending().await,
        }
    }
}

/// A running session with its outbound stream.
pub(crate) struct Harness {
    pub handle: SessionHandle,
    pub outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    pub executor: Arc<ScriptedExecutor>,
}

impl Harness {
    /// Spawn a session without starting it.
    pub(crate) fn spawn(executor: Arc<ScriptedExecutor>) -> Self {
        Self::spawn_with(&BridgeConfig::default(), executor)
    }

    pub(crate) fn spawn_with(config: &BridgeConfig, executor: Arc<ScriptedExecutor>) -> Self {
        let (handle, controller, outbound) = session_channel(
            config,
            Arc::new(ToolRegistry::with_defaults()),
            executor.clone(),
        );
        tokio::spawn(controller.run());
        Self {
            handle,
            outbound,
            executor,
        }
    }

    /// Spawn, start, and consume the `register_tools` event.
    pub(crate) async fn active(executor: Arc<ScriptedExecutor>) -> Self {
        let mut harness = Self::spawn(executor);
        harness.handle.start().await.unwrap();
        harness.handle.transport_ready().await.unwrap();
        let (event, _) = harness.next().await;
        assert_eq!(event.kind(), "register_tools");
        harness
    }

    pub(crate) async fn deliver(&self, event: Value) {
        let event = InboundEvent::from_value(event).expect("test event has a type");
        self.handle.deliver(event).await.unwrap();
    }

    /// Next outbound event and the (virtual) time it was received.
    pub(crate) async fn next(&mut self) -> (OutboundEvent, Instant) {
        let event = self.outbound.recv().await.expect("outbound channel open");
        (event, Instant::now())
    }

    /// Let the session run for `period`, then assert nothing was emitted.
    pub(crate) async fn assert_quiet_for(&mut self, period: Duration) {
        tokio::time::sleep(period).await;
        if let Ok(event) = self.outbound.try_recv() {
            panic!("unexpected outbound event: {event:?}");
        }
    }
}

/// The `output` of a `submit_tool_output` event as JSON.
pub(crate) fn output_json(event: &OutboundEvent) -> Value {
    match event {
        OutboundEvent::SubmitToolOutput { output, .. } => serde_json::to_value(output).unwrap(),
        other => panic!("expected submit_tool_output, got {}", other.kind()),
    }
}

// ── Event builders ───────────────────────────────────────────

pub(crate) fn arguments_done(name: &str, arguments: &str, call_id: &str) -> Value {
    json!({
        "type": "response.function_call_arguments.done",
        "name": name,
        "arguments": arguments,
        "call_id": call_id,
        "item_id": format!("item_{call_id}"),
    })
}

pub(crate) fn response_done(name: &str, arguments: &str, call_id: &str) -> Value {
    json!({
        "type": "response.done",
        "response": {
            "status": "completed",
            "output": [
                {"type": "message", "id": "msg_1", "content": []},
                {
                    "type": "function_call",
                    "id": format!("item_{call_id}"),
                    "call_id": call_id,
                    "name": name,
                    "arguments": arguments,
                }
            ]
        }
    })
}

pub(crate) fn function_call(name: &str, arguments: &str, call_id: &str) -> Value {
    json!({
        "type": "function_call",
        "name": name,
        "arguments": arguments,
        "call_id": call_id,
    })
}

pub(crate) fn function_call_done(name: &str, arguments: &str, call_id: &str) -> Value {
    json!({
        "type": "function_call.done",
        "function_call": {"name": name, "arguments": arguments, "call_id": call_id},
    })
}

pub(crate) fn nested_response(name: &str, arguments: &str, call_id: &str) -> Value {
    json!({
        "type": "response.output_item.done",
        "response": {
            "type": "function_call",
            "name": name,
            "arguments": arguments,
            "call_id": call_id,
        },
    })
}

pub(crate) fn item_done(name: &str, arguments: &str, call_id: &str) -> Value {
    json!({
        "type": "conversation.item.done",
        "item": {
            "type": "function_call",
            "id": format!("item_{call_id}"),
            "call_id": call_id,
            "name": name,
            "arguments": arguments,
            "status": "completed",
        },
    })
}

pub(crate) fn conversation_updated(name: &str, arguments: &str, call_id: &str, status: &str) -> Value {
    json!({
        "type": "conversation.updated",
        "item": {
            "type": "function_call",
            "id": format!("item_{call_id}"),
            "call_id": call_id,
            "name": name,
            "arguments": arguments,
            "status": status,
        },
    })
}

/// Every call-bearing shape for one call, in detection-rule order.
pub(crate) fn all_shapes(name: &str, arguments: &str, call_id: &str) -> Vec<Value> {
    vec![
        arguments_done(name, arguments, call_id),
        response_done(name, arguments, call_id),
        function_call(name, arguments, call_id),
        function_call_done(name, arguments, call_id),
        nested_response(name, arguments, call_id),
        item_done(name, arguments, call_id),
        conversation_updated(name, arguments, call_id, "completed"),
    ]
}

/// Assert `at` is `expected` after `start`, to timer resolution.
pub(crate) fn assert_at(at: Instant, start: Instant, expected: Duration) {
    let elapsed = at - start;
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(1),
        "expected event at {expected:?}, got {elapsed:?}"
    );
}
