//! Function-call backend contract tests for the HTTP executor.
//!
//! Verify the request body and route per tool, the mapping of the backend's
//! `result` object to outcomes, and error-body handling.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use voxlink::config::{BackendConfig, BridgeConfig};
use voxlink::executor::{HttpToolExecutor, ToolExecutor, ToolInvocation, ToolOutcome};
use voxlink::session::session_channel;
use voxlink::tools::ToolRegistry;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{arguments_done, output_json};

fn executor_for(server: &MockServer) -> HttpToolExecutor {
    let config = BackendConfig {
        base_url: server.uri(),
        request_timeout_secs: 5,
    };
    HttpToolExecutor::new(&config, Arc::new(ToolRegistry::with_defaults())).unwrap()
}

fn invocation(call_id: &str, function_name: &str, arguments: Value) -> ToolInvocation {
    let arguments: Map<String, Value> = match arguments {
        Value::Object(map) => map,
        other => panic!("arguments must be an object, got {other}"),
    };
    ToolInvocation {
        call_id: call_id.to_owned(),
        function_name: function_name.to_owned(),
        arguments,
    }
}

// ────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────

#[tokio::test]
async fn knowledge_call_posts_to_rag_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/function-call"))
        .and(body_json(json!({
            "call_id": "c1",
            "function_name": "rag_knowledge",
            "arguments": {"query": "release date"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "call_id": "c1",
            "function_name": "rag_knowledge",
            "result": {
                "success": true,
                "context": "Released in May 2015.",
                "sources": ["history.md"]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = executor_for(&server)
        .submit(invocation("c1", "rag_knowledge", json!({"query": "release date"})))
        .await;

    match outcome {
        ToolOutcome::Success(result) => {
            assert_eq!(result["context"], "Released in May 2015.");
            assert_eq!(result["sources"], json!(["history.md"]));
        }
        ToolOutcome::Failure(reason) => panic!("unexpected failure: {reason}"),
    }
}

#[tokio::test]
async fn notes_call_posts_to_notes_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notes/function-call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "call_id": "n1",
            "function_name": "manage_notes",
            "result": {
                "success": true,
                "message": "Found 1 note",
                "data": {"notes": [{"id": 3, "title": "Groceries"}], "count": 1}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = executor_for(&server)
        .submit(invocation("n1", "manage_notes", json!({"action": "search", "query": "groc"})))
        .await;
    assert!(outcome.is_success());
}

// ────────────────────────────────────────────────────────────
// Failure mapping
// ────────────────────────────────────────────────────────────

#[tokio::test]
async fn backend_reported_failure_carries_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notes/function-call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "call_id": "n2",
            "function_name": "manage_notes",
            "result": {"success": false, "error": "Note not found"}
        })))
        .mount(&server)
        .await;

    let outcome = executor_for(&server)
        .submit(invocation("n2", "manage_notes", json!({"action": "delete", "note_id": "99"})))
        .await;
    assert_eq!(outcome, ToolOutcome::Failure("Note not found".into()));
}

#[tokio::test]
async fn http_error_uses_detail_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/function-call"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "vector store offline"})),
        )
        .mount(&server)
        .await;

    let outcome = executor_for(&server)
        .submit(invocation("c1", "rag_knowledge", json!({"query": "x"})))
        .await;
    match outcome {
        ToolOutcome::Failure(reason) => {
            assert!(reason.contains("HTTP 500"), "{reason}");
            assert!(reason.contains("vector store offline"), "{reason}");
        }
        ToolOutcome::Success(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn unknown_function_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = executor_for(&server)
        .submit(invocation("x1", "launch_rockets", json!({"target": "moon"})))
        .await;
    assert_eq!(
        outcome,
        ToolOutcome::Failure("Unknown function: launch_rockets".into())
    );
}

#[tokio::test]
async fn invalid_arguments_never_reach_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let missing = executor
        .submit(invocation("c1", "rag_knowledge", json!({"topic": "x"})))
        .await;
    let bad_action = executor
        .submit(invocation("n1", "manage_notes", json!({"action": "archive"})))
        .await;

    match missing {
        ToolOutcome::Failure(reason) => assert!(reason.contains("missing required field 'query'")),
        ToolOutcome::Success(_) => panic!("expected failure"),
    }
    assert!(!bad_action.is_success());
}

#[tokio::test]
async fn unreachable_backend_is_a_failure() {
    let config = BackendConfig {
        base_url: "http://127.0.0.1:9".into(),
        request_timeout_secs: 2,
    };
    let executor = HttpToolExecutor::new(&config, Arc::new(ToolRegistry::with_defaults())).unwrap();
    let outcome = executor
        .submit(invocation("c1", "rag_knowledge", json!({"query": "x"})))
        .await;
    assert!(!outcome.is_success());
}

// ────────────────────────────────────────────────────────────
// Through a session
// ────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_formats_backend_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/function-call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "call_id": "c9",
            "function_name": "rag_knowledge",
            "result": {"success": true, "context": "", "sources": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = BridgeConfig::default();
    config.backend.base_url = server.uri();
    let tools = Arc::new(ToolRegistry::with_defaults());
    let executor = HttpToolExecutor::new(&config.backend, Arc::clone(&tools)).unwrap();
    let (handle, controller, mut outbound) = session_channel(&config, tools, Arc::new(executor));
    tokio::spawn(controller.run());

    handle.start().await.unwrap();
    handle.transport_ready().await.unwrap();
    assert_eq!(outbound.recv().await.unwrap().kind(), "register_tools");

    let event = voxlink::InboundEvent::from_value(arguments_done(
        "rag_knowledge",
        r#"{"query":"unknown topic"}"#,
        "c9",
    ))
    .unwrap();
    handle.deliver(event).await.unwrap();

    let output = tokio::time::timeout(Duration::from_secs(5), outbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        output_json(&output),
        json!({
            "ok": true,
            "payload": {
                "context": "",
                "sources": [],
                "message": "No relevant information found in knowledge base"
            }
        })
    );
    let resume = outbound.recv().await.unwrap();
    assert_eq!(resume.kind(), "resume_generation");
}
