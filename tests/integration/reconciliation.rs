//! Call reconciliation through a running session: dedup, deferral,
//! timeouts and the output/resume sequence.

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use voxlink::executor::ToolOutcome;

use crate::helpers::{
    Harness, Script, ScriptedExecutor, all_shapes, arguments_done, assert_at,
    conversation_updated, function_call, output_json, response_done,
};

const TIMEOUT: Duration = Duration::from_secs(30);
const SETTLE: Duration = Duration::from_millis(100);

// ── Literal scenarios ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn duplicate_after_dispatch_is_dropped() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    session
        .deliver(arguments_done("rag_knowledge", r#"{"query":"x"}"#, "c1"))
        .await;
    session
        .deliver(response_done("rag_knowledge", r#"{"query":"x"}"#, "c1"))
        .await;

    let (output, _) = session.next().await;
    assert_eq!(output.call_id(), Some("c1"));
    let (resume, _) = session.next().await;
    assert_eq!(resume.kind(), "resume_generation");
    session.assert_quiet_for(Duration::from_secs(60)).await;

    let submissions = executor.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        submissions[0].invocation.arguments_value(),
        json!({"query": "x"})
    );
}

#[tokio::test(start_paused = true)]
async fn empty_arguments_defer_to_later_signal() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    session.deliver(arguments_done("rag_knowledge", "", "c1")).await;
    session.assert_quiet_for(Duration::from_secs(1)).await;
    assert!(executor.submissions().is_empty());

    session
        .deliver(response_done("rag_knowledge", r#"{"query":"x"}"#, "c1"))
        .await;
    let (output, _) = session.next().await;
    assert_eq!(output.call_id(), Some("c1"));

    assert_eq!(executor.count("c1"), 1);
    assert_eq!(
        executor.submissions()[0].invocation.arguments_value(),
        json!({"query": "x"})
    );
}

#[tokio::test(start_paused = true)]
async fn silent_executor_times_out_at_thirty_seconds() {
    let executor = ScriptedExecutor::new();
    executor.script("c2", Script::Never);
    let mut session = Harness::active(executor.clone()).await;

    let start = Instant::now();
    session
        .deliver(arguments_done("rag_knowledge", r#"{"query":"x"}"#, "c2"))
        .await;

    let (output, at) = session.next().await;
    assert_at(at, start, TIMEOUT);
    assert_eq!(output.call_id(), Some("c2"));
    assert_eq!(
        output_json(&output),
        json!({"ok": false, "error": "execution timeout"})
    );

    let (resume, at) = session.next().await;
    assert_eq!(resume.kind(), "resume_generation");
    assert_at(at, start, TIMEOUT + SETTLE);
}

#[tokio::test(start_paused = true)]
async fn success_cancels_timer_and_resumes_after_settle() {
    let executor = ScriptedExecutor::new();
    executor.script(
        "c3",
        Script::After(
            Duration::from_secs(5),
            ToolOutcome::Success(json!({
                "success": true,
                "context": "Rust 1.0 shipped on 15 May 2015",
                "sources": ["rust-history.md"]
            })),
        ),
    );
    let mut session = Harness::active(executor.clone()).await;

    let start = Instant::now();
    session
        .deliver(arguments_done("rag_knowledge", r#"{"query":"rust 1.0"}"#, "c3"))
        .await;

    let (output, at) = session.next().await;
    assert_at(at, start, Duration::from_secs(5));
    let envelope = output_json(&output);
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["payload"]["context"], "Rust 1.0 shipped on 15 May 2015");
    assert_eq!(envelope["payload"]["sources"], json!(["rust-history.md"]));

    let (resume, at) = session.next().await;
    assert_eq!(resume.kind(), "resume_generation");
    assert_at(at, start, Duration::from_secs(5) + SETTLE);

    // Well past the original deadline: no timeout output.
    session.assert_quiet_for(Duration::from_secs(60)).await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_keep_independent_timers() {
    let executor = ScriptedExecutor::new();
    executor.script("c4", Script::Never);
    executor.script(
        "c5",
        Script::After(
            Duration::from_secs(10),
            ToolOutcome::Success(json!({"success": true, "data": {"notes": [], "count": 0}})),
        ),
    );
    let mut session = Harness::active(executor.clone()).await;

    let start = Instant::now();
    session
        .deliver(arguments_done("rag_knowledge", r#"{"query":"a"}"#, "c4"))
        .await;
    session
        .deliver(arguments_done("manage_notes", r#"{"action":"list"}"#, "c5"))
        .await;

    let (event, at) = session.next().await;
    assert_eq!(event.call_id(), Some("c5"));
    assert_eq!(output_json(&event)["ok"], true);
    assert_at(at, start, Duration::from_secs(10));

    let (event, at) = session.next().await;
    assert_eq!(event.kind(), "resume_generation");
    assert_at(at, start, Duration::from_secs(10) + SETTLE);

    let (event, at) = session.next().await;
    assert_eq!(event.call_id(), Some("c4"));
    assert_eq!(output_json(&event)["error"], "execution timeout");
    assert_at(at, start, TIMEOUT);

    let (event, at) = session.next().await;
    assert_eq!(event.kind(), "resume_generation");
    assert_at(at, start, TIMEOUT + SETTLE);

    assert_eq!(executor.count("c4"), 1);
    assert_eq!(executor.count("c5"), 1);
}

// ── Properties ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn every_ordering_of_shapes_dispatches_once() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    let shape_count = all_shapes("rag_knowledge", "{}", "probe").len();
    for rotation in 0..shape_count {
        let call_id = format!("rot{rotation}");
        let mut shapes = all_shapes("rag_knowledge", r#"{"query":"x"}"#, &call_id);
        shapes.rotate_left(rotation);
        // Repeat the whole sequence reversed to add late duplicates.
        let mut replay = shapes.clone();
        replay.reverse();
        shapes.extend(replay);
        for event in shapes {
            session.deliver(event).await;
        }
    }

    // One output and one resume per call.
    for _ in 0..shape_count * 2 {
        session.next().await;
    }
    session.assert_quiet_for(Duration::from_secs(60)).await;

    for rotation in 0..shape_count {
        assert_eq!(executor.count(&format!("rot{rotation}")), 1, "rotation {rotation}");
    }
}

#[tokio::test(start_paused = true)]
async fn incomplete_arguments_never_dispatch() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    for partial in ["", "{", r#"{"query":"#, "{}", "[]", "null", "42"] {
        session.deliver(arguments_done("rag_knowledge", partial, "c1")).await;
    }
    session
        .deliver(conversation_updated("rag_knowledge", "", "c1", "in_progress"))
        .await;
    session.assert_quiet_for(Duration::from_secs(5)).await;
    assert!(executor.submissions().is_empty());

    session
        .deliver(conversation_updated("rag_knowledge", r#"{"query":"done"}"#, "c1", "completed"))
        .await;
    let (output, _) = session.next().await;
    assert_eq!(output.call_id(), Some("c1"));
    assert_eq!(executor.count("c1"), 1);
}

#[tokio::test(start_paused = true)]
async fn late_result_after_timeout_is_dropped() {
    let executor = ScriptedExecutor::new();
    executor.script(
        "slow",
        Script::After(
            Duration::from_secs(31),
            ToolOutcome::Success(json!({"success": true, "context": "late", "sources": []})),
        ),
    );
    let mut session = Harness::active(executor.clone()).await;

    let start = Instant::now();
    session
        .deliver(arguments_done("rag_knowledge", r#"{"query":"x"}"#, "slow"))
        .await;

    let (output, at) = session.next().await;
    assert_at(at, start, TIMEOUT);
    assert_eq!(output_json(&output)["ok"], false);
    let (resume, _) = session.next().await;
    assert_eq!(resume.kind(), "resume_generation");

    session.assert_quiet_for(Duration::from_secs(10)).await;
}

#[tokio::test(start_paused = true)]
async fn result_just_before_deadline_wins() {
    let executor = ScriptedExecutor::new();
    executor.script(
        "edge",
        Script::After(
            Duration::from_millis(29_999),
            ToolOutcome::Failure("Note not found".into()),
        ),
    );
    let mut session = Harness::active(executor.clone()).await;

    session
        .deliver(arguments_done("manage_notes", r#"{"action":"delete","note_id":"9"}"#, "edge"))
        .await;

    let (output, _) = session.next().await;
    assert_eq!(
        output_json(&output),
        json!({"ok": false, "error": "Note not found"})
    );
    let (resume, _) = session.next().await;
    assert_eq!(resume.kind(), "resume_generation");
    session.assert_quiet_for(Duration::from_secs(60)).await;
}

#[tokio::test(start_paused = true)]
async fn outputs_precede_resumes_and_ids_are_fresh() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    for call_id in ["a", "b", "c"] {
        session
            .deliver(arguments_done("rag_knowledge", r#"{"query":"x"}"#, call_id))
            .await;
    }

    let mut seen_ids = std::collections::HashSet::new();
    let mut outputs = Vec::new();
    let mut resumes = Vec::new();
    for _ in 0..6 {
        let (event, at) = session.next().await;
        assert!(seen_ids.insert(event.event_id().to_owned()));
        assert!(!["a", "b", "c"].contains(&event.event_id()));
        match event.kind() {
            "submit_tool_output" => outputs.push(at),
            "resume_generation" => resumes.push(at),
            other => panic!("unexpected {other}"),
        }
    }
    assert_eq!(outputs.len(), 3);
    assert_eq!(resumes.len(), 3);
    for (output, resume) in outputs.iter().zip(&resumes) {
        assert!(*resume >= *output + SETTLE);
    }
}

// ── Dropped signals ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn call_without_identifier_is_dropped() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    session
        .deliver(json!({
            "type": "function_call",
            "name": "rag_knowledge",
            "arguments": "{\"query\":\"x\"}"
        }))
        .await;
    session.assert_quiet_for(Duration::from_secs(60)).await;
    assert!(executor.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unregistered_tool_is_ignored() {
    let executor = ScriptedExecutor::new();
    let mut session = Harness::active(executor.clone()).await;

    session
        .deliver(function_call("launch_rockets", r#"{"target":"moon"}"#, "r1"))
        .await;
    session
        .deliver(json!({"type": "response.audio.delta", "delta": "AAAA"}))
        .await;
    session.assert_quiet_for(Duration::from_secs(60)).await;
    assert!(executor.submissions().is_empty());
}
