//! The session loop.
//!
//! [`session_channel`] returns a cloneable [`SessionHandle`] for the
//! transport owner, the [`SessionController`] to spawn, and the receiver of
//! outbound events. The controller owns every piece of call state and is
//! the only emitter of outbound events; everything else talks to it through
//! channels.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::messages::{SessionCommand, SessionMessage, SessionPhase};
use super::state::SessionState;
use crate::calls::{
    ArgumentResolution, ArgumentResolver, CallOutcome, CallSignatureExtractor, Dispatcher,
    ResultCoordinator,
};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::executor::ToolExecutor;
use crate::observability::{FIELD_EPOCH, FIELD_EVENT_TYPE, SPAN_INBOUND_EVENT, SPAN_SESSION_TEARDOWN};
use crate::realtime::{InboundEvent, OutboundEvent};
use crate::tools::ToolRegistry;

/// Items on the inbound queue. End of input travels behind the events that
/// preceded it.
#[derive(Debug)]
enum Inbound {
    Event(InboundEvent),
    EndOfInput(oneshot::Sender<()>),
}

/// Client side of a session: lifecycle commands, inbound events, phase.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    control_tx: mpsc::Sender<SessionCommand>,
    inbound_tx: mpsc::Sender<Inbound>,
    phase_rx: watch::Receiver<SessionPhase>,
}

impl SessionHandle {
    /// Queue an inbound transport event.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn deliver(&self, event: InboundEvent) -> Result<()> {
        self.inbound_tx
            .send(Inbound::Event(event))
            .await
            .map_err(|e| BridgeError::Channel(format!("failed to deliver inbound event: {e}")))
    }

    /// Mark the end of the inbound stream and wait for the session to close.
    ///
    /// Events delivered before this call are processed first. Calls already
    /// dispatched finish (or time out) and get their resume before the
    /// session is torn down.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn end_input(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.inbound_tx
            .send(Inbound::EndOfInput(done_tx))
            .await
            .map_err(|e| BridgeError::Channel(format!("failed to signal end of input: {e}")))?;
        done_rx
            .await
            .map_err(|_| BridgeError::Channel("session loop exited before input drained".into()))
    }

    /// Send a lifecycle command.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.control_tx
            .send(command)
            .await
            .map_err(|e| BridgeError::Channel(format!("failed to send session command: {e}")))
    }

    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start).await
    }

    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn transport_ready(&self) -> Result<()> {
        self.send(SessionCommand::TransportReady).await
    }

    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn stop(&self) -> Result<()> {
        self.send(SessionCommand::Stop).await
    }

    /// # Errors
    ///
    /// [`BridgeError::Channel`] if the session loop has exited.
    pub async fn transport_failed(&self, reason: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::TransportFailed {
            reason: reason.into(),
        })
        .await
    }

    /// The most recently published phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase_rx.borrow()
    }

    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }
}

/// Owns the session state and runs the event loop.
pub struct SessionController {
    state: SessionState,
    tools: Arc<ToolRegistry>,
    extractor: CallSignatureExtractor,
    resolver: ArgumentResolver,
    dispatcher: Dispatcher,
    coordinator: ResultCoordinator,
    outbound_tx: mpsc::UnboundedSender<OutboundEvent>,
    control_rx: mpsc::Receiver<SessionCommand>,
    inbound_rx: mpsc::Receiver<Inbound>,
    message_rx: mpsc::UnboundedReceiver<SessionMessage>,
    phase_tx: watch::Sender<SessionPhase>,
    /// Waiting on end of input; answered when the session closes.
    drain_waiters: Vec<oneshot::Sender<()>>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

/// Build a session: handle, controller and outbound event receiver.
///
/// The controller does nothing until spawned with
/// [`SessionController::run`].
#[must_use]
pub fn session_channel(
    config: &BridgeConfig,
    tools: Arc<ToolRegistry>,
    executor: Arc<dyn ToolExecutor>,
) -> (
    SessionHandle,
    SessionController,
    mpsc::UnboundedReceiver<OutboundEvent>,
) {
    let (control_tx, control_rx) = mpsc::channel(config.session.control_capacity.max(1));
    let (inbound_tx, inbound_rx) = mpsc::channel(config.session.inbound_capacity.max(1));
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);

    let dispatcher = Dispatcher::new(executor, message_tx.clone(), config.dispatch.timeout());
    let coordinator = ResultCoordinator::new(
        Arc::clone(&tools),
        outbound_tx.clone(),
        message_tx,
        config.dispatch.settle_delay(),
    );

    (
        SessionHandle {
            control_tx,
            inbound_tx,
            phase_rx,
        },
        SessionController {
            state: SessionState::new(),
            extractor: CallSignatureExtractor::from_registry(&tools),
            tools,
            resolver: ArgumentResolver::new(),
            dispatcher,
            coordinator,
            outbound_tx,
            control_rx,
            inbound_rx,
            message_rx,
            phase_tx,
            drain_waiters: Vec::new(),
        },
        outbound_rx,
    )
}

impl SessionController {
    /// Run until every [`SessionHandle`] is dropped.
    ///
    /// Control commands are served first, then internal messages, then
    /// inbound events. Within each source order is preserved.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.control_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown("control channel closed");
                        break;
                    }
                },
                Some(message) = self.message_rx.recv() => {
                    let result = self.handle_message(message);
                    self.absorb(result);
                    self.close_if_drained();
                }
                inbound = self.inbound_rx.recv() => match inbound {
                    Some(Inbound::Event(event)) => {
                        let result = self.handle_inbound(event);
                        self.absorb(result);
                    }
                    Some(Inbound::EndOfInput(done)) => {
                        tracing::info!(epoch = self.state.epoch(), "end of input, draining session");
                        self.drain_waiters.push(done);
                        self.close_if_drained();
                    }
                    None => {
                        self.teardown("inbound channel closed");
                        break;
                    }
                },
            }
        }
        tracing::debug!("session loop exited");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start => {
                if !self.state.begin() {
                    tracing::debug!(phase = %self.state.phase(), "start ignored, session already open");
                    return;
                }
                tracing::info!(epoch = self.state.epoch(), "session starting");
                self.publish_phase();
                self.register_if_due();
            }
            SessionCommand::TransportReady => {
                self.state.mark_transport_ready();
                self.register_if_due();
            }
            SessionCommand::Stop => self.teardown("stop requested"),
            SessionCommand::TransportFailed { reason } => {
                tracing::warn!(reason = %reason, "transport failed");
                self.teardown(&reason);
            }
        }
    }

    /// Emit `register_tools` once the session is started and the transport
    /// is ready, whichever happens last.
    fn register_if_due(&mut self) {
        if !self.state.registration_due() {
            return;
        }
        let schemas = self.tools.schemas_for_api();
        let count = schemas.len();
        if let Err(e) = self.emit(OutboundEvent::register_tools(schemas)) {
            tracing::error!(error = %e, "tool registration failed");
            self.teardown(&e.message());
            return;
        }
        self.state.activate();
        tracing::info!(tools = count, epoch = self.state.epoch(), "tools registered, session active");
        self.publish_phase();
    }

    fn handle_message(&mut self, message: SessionMessage) -> Result<()> {
        if !self.state.is_current(message.epoch()) {
            tracing::debug!(
                kind = message.kind(),
                call_id = message.call_id(),
                message_epoch = message.epoch(),
                epoch = self.state.epoch(),
                "stale session message dropped"
            );
            return Ok(());
        }

        let registry = &mut self.state.registry;
        let scope = &self.state.scope;
        match message {
            SessionMessage::Executed {
                call_id, outcome, ..
            } => {
                let emitted = self.coordinator.on_result(
                    registry,
                    scope,
                    &call_id,
                    CallOutcome::Executed(outcome),
                )?;
                if emitted {
                    self.state.resume_scheduled();
                }
            }
            SessionMessage::TimeoutElapsed { call_id, .. } => {
                let emitted =
                    self.dispatcher
                        .on_timeout(registry, &self.coordinator, scope, &call_id)?;
                if emitted {
                    self.state.resume_scheduled();
                }
            }
            SessionMessage::SettleElapsed { call_id, .. } => {
                self.coordinator.on_settled(&call_id)?;
                self.state.resume_sent();
            }
        }
        Ok(())
    }

    /// After end of input, close the session once nothing is in flight.
    fn close_if_drained(&mut self) {
        if self.drain_waiters.is_empty() || !self.state.is_quiescent() {
            return;
        }
        self.teardown("end of input");
    }

    fn handle_inbound(&mut self, event: InboundEvent) -> Result<()> {
        let span = tracing::debug_span!(
            SPAN_INBOUND_EVENT,
            { FIELD_EVENT_TYPE } = event.kind(),
            { FIELD_EPOCH } = self.state.epoch(),
        );
        let _enter = span.enter();

        if self.state.phase() != SessionPhase::Active {
            tracing::debug!(phase = %self.state.phase(), "inbound event outside active session dropped");
            return Ok(());
        }

        let Some(signature) = self.extractor.extract(&event) else {
            return Ok(());
        };
        let Some(call_id) = signature.candidate_id.clone() else {
            tracing::warn!(
                tool_name = %signature.function_name,
                source = %signature.source,
                "tool call without identifier dropped"
            );
            return Ok(());
        };

        let registry = &mut self.state.registry;
        if !registry.admit(&call_id, &signature.function_name) {
            tracing::debug!(call_id = %call_id, source = %signature.source, "duplicate call signal");
            return Ok(());
        }

        match self.resolver.resolve(&signature) {
            ArgumentResolution::Deferred(reason) => {
                registry.revoke(&call_id);
                tracing::debug!(
                    call_id = %call_id,
                    source = %signature.source,
                    reason = %reason,
                    "call deferred until arguments are complete"
                );
                Ok(())
            }
            ArgumentResolution::Ready(arguments) => {
                tracing::debug!(call_id = %call_id, source = %signature.source, "call ready");
                self.dispatcher
                    .dispatch(registry, &self.state.scope, &call_id, arguments)
            }
        }
    }

    /// Log call-path errors; tear down on transport failures.
    fn absorb(&mut self, result: Result<()>) {
        let Err(e) = result else {
            return;
        };
        if e.is_transport_fatal() {
            tracing::error!(code = e.code(), error = %e, "transport failure");
            self.teardown(&e.message());
        } else {
            tracing::warn!(code = e.code(), error = %e, "call handling error");
        }
    }

    fn teardown(&mut self, reason: &str) {
        for done in self.drain_waiters.drain(..) {
            let _ = done.send(());
        }
        if self.state.phase() == SessionPhase::Idle && self.state.registry().is_empty() {
            tracing::debug!(reason, "teardown with no open session");
            return;
        }
        let span = tracing::info_span!(
            SPAN_SESSION_TEARDOWN,
            { FIELD_EPOCH } = self.state.epoch(),
        );
        let _enter = span.enter();

        let summary = self.state.teardown();
        tracing::info!(
            reason,
            cancelled_timers = summary.cancelled_timers,
            discarded_records = summary.discarded_records,
            "session torn down"
        );
        self.publish_phase();
    }

    fn emit(&self, event: OutboundEvent) -> Result<()> {
        self.outbound_tx
            .send(event)
            .map_err(|e| BridgeError::Channel(format!("outbound channel closed: {e}")))
    }

    fn publish_phase(&self) {
        self.phase_tx.send_replace(self.state.phase());
    }
}
