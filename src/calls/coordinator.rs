//! Turns call outcomes into outbound events.
//!
//! Every finished call produces exactly two events: a `submit_tool_output`
//! straight away, then a `resume_generation` once the settle delay has
//! passed. Success, failure and timeout all follow the same sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::registry::{CallRegistry, CallState};
use crate::error::{BridgeError, Result};
use crate::executor::ToolOutcome;
use crate::observability::{FIELD_CALL_ID, FIELD_EPOCH, FIELD_TOOL_NAME, SPAN_CALL_RESULT};
use crate::realtime::{OutboundEvent, ToolOutput};
use crate::session::{SessionMessage, SessionScope};
use crate::tools::ToolRegistry;

/// Failure reason reported when a call exceeds the dispatch timeout.
pub const TIMEOUT_REASON: &str = "execution timeout";

/// How a dispatched call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The executor returned.
    Executed(ToolOutcome),
    /// The dispatch timer expired first.
    TimedOut,
}

pub struct ResultCoordinator {
    tools: Arc<ToolRegistry>,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    messages: mpsc::UnboundedSender<SessionMessage>,
    settle_delay: Duration,
}

impl std::fmt::Debug for ResultCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCoordinator")
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl ResultCoordinator {
    pub fn new(
        tools: Arc<ToolRegistry>,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
        messages: mpsc::UnboundedSender<SessionMessage>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            tools,
            outbound,
            messages,
            settle_delay,
        }
    }

    /// Apply the outcome of a dispatched call.
    ///
    /// A call that is not `Dispatched` has already been resolved and the
    /// outcome is dropped. Otherwise the timer is cancelled before anything
    /// else, the output is emitted, the settle timer is started and the
    /// record moves to `Completed` or `TimedOut`. Returns whether an output
    /// was emitted.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the outbound channel is closed.
    pub fn on_result(
        &self,
        registry: &mut CallRegistry,
        scope: &SessionScope,
        call_id: &str,
        outcome: CallOutcome,
    ) -> Result<bool> {
        let Some(record) = registry.get_mut(call_id) else {
            tracing::debug!(call_id, "outcome for unknown call dropped");
            return Ok(false);
        };
        if record.state != CallState::Dispatched {
            tracing::debug!(call_id, state = %record.state, "outcome for resolved call dropped");
            return Ok(false);
        }

        record.cancel_timeout();

        let span = tracing::info_span!(
            SPAN_CALL_RESULT,
            { FIELD_CALL_ID } = call_id,
            { FIELD_TOOL_NAME } = %record.function_name,
            { FIELD_EPOCH } = scope.epoch,
        );
        let _enter = span.enter();

        let output = self.format_output(&record.function_name, &outcome);
        match outcome {
            CallOutcome::TimedOut => record.mark_timed_out()?,
            CallOutcome::Executed(_) => record.mark_completed()?,
        }
        tracing::info!(ok = output.ok, state = %record.state, "emitting tool output");

        self.emit(OutboundEvent::submit_tool_output(call_id, output))?;
        self.spawn_settle_timer(scope, call_id.to_owned());
        Ok(true)
    }

    /// Emit the resume request for a call whose settle delay has passed.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the outbound channel is closed.
    pub fn on_settled(&self, call_id: &str) -> Result<()> {
        tracing::debug!(call_id, "resuming generation");
        self.emit(OutboundEvent::resume_generation())
    }

    fn format_output(&self, function_name: &str, outcome: &CallOutcome) -> ToolOutput {
        match outcome {
            CallOutcome::Executed(ToolOutcome::Success(result)) => {
                let payload = match self.tools.get(function_name) {
                    Some(tool) => tool.format_success(result.clone()),
                    None => result.clone(),
                };
                ToolOutput::success(payload)
            }
            CallOutcome::Executed(ToolOutcome::Failure(reason)) => ToolOutput::failure(reason),
            CallOutcome::TimedOut => ToolOutput::failure(TIMEOUT_REASON),
        }
    }

    fn emit(&self, event: OutboundEvent) -> Result<()> {
        self.outbound
            .send(event)
            .map_err(|e| BridgeError::Channel(format!("outbound channel closed: {e}")))
    }

    fn spawn_settle_timer(&self, scope: &SessionScope, call_id: String) {
        let messages = self.messages.clone();
        let cancel = scope.token.child_token();
        let deadline = tokio::time::Instant::now() + self.settle_delay;
        let epoch = scope.epoch;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = messages.send(SessionMessage::SettleElapsed { epoch, call_id });
                }
            }
        });
    }
}
