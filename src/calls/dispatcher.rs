//! Hands ready calls to the executor and arms their timeouts.
//!
//! Both the executor call and the timer run on spawned tasks. Neither
//! touches session state: each posts a [`SessionMessage`] stamped with the
//! session epoch and the session loop acts on it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::coordinator::{CallOutcome, ResultCoordinator};
use super::registry::{CallRegistry, CallState, TimeoutHandle};
use crate::error::{BridgeError, Result};
use crate::executor::{ToolExecutor, ToolInvocation};
use crate::observability::{FIELD_CALL_ID, FIELD_EPOCH, FIELD_TOOL_NAME, SPAN_CALL_DISPATCH};
use crate::session::{SessionMessage, SessionScope};

pub struct Dispatcher {
    executor: Arc<dyn ToolExecutor>,
    messages: mpsc::UnboundedSender<SessionMessage>,
    timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        messages: mpsc::UnboundedSender<SessionMessage>,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            messages,
            timeout,
        }
    }

    /// Dispatch an admitted call.
    ///
    /// Marks the record `Dispatched`, submits the call to the executor and
    /// starts the timer. The outcome arrives later as
    /// [`SessionMessage::Executed`] or [`SessionMessage::TimeoutElapsed`].
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidTransition`] if `call_id` is not admitted and
    /// `Pending`, or `arguments` is empty. Nothing is spawned in that case.
    pub fn dispatch(
        &self,
        registry: &mut CallRegistry,
        scope: &SessionScope,
        call_id: &str,
        arguments: Map<String, Value>,
    ) -> Result<()> {
        let record = registry.get_mut(call_id).ok_or_else(|| {
            BridgeError::InvalidTransition(format!("call {call_id} was never admitted"))
        })?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        let timer = scope.token.child_token();
        record.mark_dispatched(arguments.clone(), TimeoutHandle::new(timer.clone()))?;

        let invocation = ToolInvocation {
            call_id: call_id.to_owned(),
            function_name: record.function_name.clone(),
            arguments,
        };

        let span = tracing::info_span!(
            SPAN_CALL_DISPATCH,
            { FIELD_CALL_ID } = %invocation.call_id,
            { FIELD_TOOL_NAME } = %invocation.function_name,
            { FIELD_EPOCH } = scope.epoch,
        );
        span.in_scope(|| {
            tracing::info!(timeout_ms = self.timeout.as_millis() as u64, "dispatching call");
        });

        self.spawn_execution(scope, invocation, span.clone());
        self.spawn_timer(scope, call_id.to_owned(), deadline, timer, span);
        Ok(())
    }

    fn spawn_execution(&self, scope: &SessionScope, invocation: ToolInvocation, span: tracing::Span) {
        let executor = Arc::clone(&self.executor);
        let messages = self.messages.clone();
        let cancel = scope.token.clone();
        let epoch = scope.epoch;
        let call_id = invocation.call_id.clone();

        tokio::spawn(
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("execution abandoned by teardown");
                    }
                    outcome = executor.submit(invocation) => {
                        tracing::debug!(success = outcome.is_success(), "executor returned");
                        let _ = messages.send(SessionMessage::Executed {
                            epoch,
                            call_id,
                            outcome,
                        });
                    }
                }
            }
            .instrument(span),
        );
    }

    fn spawn_timer(
        &self,
        scope: &SessionScope,
        call_id: String,
        deadline: tokio::time::Instant,
        timer: tokio_util::sync::CancellationToken,
        span: tracing::Span,
    ) {
        let messages = self.messages.clone();
        let epoch = scope.epoch;

        tokio::spawn(
            async move {
                tokio::select! {
                    biased;
                    _ = timer.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        let _ = messages.send(SessionMessage::TimeoutElapsed { epoch, call_id });
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Handle an expired timer.
    ///
    /// Only a call still `Dispatched` times out; if its result already
    /// landed the expiry is stale and dropped. Returns whether a timeout
    /// output was emitted.
    ///
    /// # Errors
    ///
    /// Propagates [`BridgeError::Channel`] from the coordinator when the
    /// outbound channel is closed.
    pub fn on_timeout(
        &self,
        registry: &mut CallRegistry,
        coordinator: &ResultCoordinator,
        scope: &SessionScope,
        call_id: &str,
    ) -> Result<bool> {
        match registry.get(call_id).map(|r| r.state) {
            Some(CallState::Dispatched) => {
                tracing::warn!(
                    call_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "call timed out"
                );
                coordinator.on_result(registry, scope, call_id, CallOutcome::TimedOut)
            }
            state => {
                tracing::debug!(call_id, ?state, "stale timeout dropped");
                Ok(false)
            }
        }
    }
}
