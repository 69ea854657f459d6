//! Per-session state owned by the session loop.

use tokio_util::sync::CancellationToken;

use super::messages::SessionPhase;
use crate::calls::{CallRegistry, CallState};

/// The epoch and cancellation root of the current session.
///
/// Every task spawned for a session holds a child of `token` and stamps its
/// messages with `epoch`.
#[derive(Debug, Clone)]
pub struct SessionScope {
    pub epoch: u64,
    pub token: CancellationToken,
}

impl SessionScope {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            token: CancellationToken::new(),
        }
    }
}

/// What a teardown discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownSummary {
    pub cancelled_timers: usize,
    pub discarded_records: usize,
}

/// All mutable session state. Nothing outside the session loop touches it.
#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
    transport_ready: bool,
    /// Outputs whose `resume_generation` has not been emitted yet.
    awaiting_resume: usize,
    pub(crate) scope: SessionScope,
    pub(crate) registry: CallRegistry,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            transport_ready: false,
            awaiting_resume: 0,
            scope: SessionScope::new(0),
            registry: CallRegistry::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.scope.epoch
    }

    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn transport_ready(&self) -> bool {
        self.transport_ready
    }

    /// `Idle -> Registering`. Returns `false` if a session is already open.
    pub fn begin(&mut self) -> bool {
        if self.phase != SessionPhase::Idle {
            return false;
        }
        self.phase = SessionPhase::Registering;
        true
    }

    pub fn mark_transport_ready(&mut self) {
        self.transport_ready = true;
    }

    /// Registration is due once a started session has a ready transport.
    pub fn registration_due(&self) -> bool {
        self.phase == SessionPhase::Registering && self.transport_ready
    }

    /// `Registering -> Active`.
    pub fn activate(&mut self) -> bool {
        if self.phase != SessionPhase::Registering {
            return false;
        }
        self.phase = SessionPhase::Active;
        true
    }

    /// A tool output was emitted; its resume is now scheduled.
    pub fn resume_scheduled(&mut self) {
        self.awaiting_resume += 1;
    }

    /// A scheduled resume was emitted.
    pub fn resume_sent(&mut self) {
        self.awaiting_resume = self.awaiting_resume.saturating_sub(1);
    }

    /// No call is executing and no resume is outstanding.
    pub fn is_quiescent(&self) -> bool {
        self.awaiting_resume == 0 && self.registry.count_in(CallState::Dispatched) == 0
    }

    /// Whether a message stamped with `epoch` still refers to live state.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.phase != SessionPhase::Idle && epoch == self.scope.epoch
    }

    /// Cancel every timer, drop every record, start a fresh epoch and go
    /// `Idle`.
    ///
    /// Timers are cancelled before the registry is cleared; anything a timer
    /// already posted carries the old epoch and is dropped on arrival.
    pub fn teardown(&mut self) -> TeardownSummary {
        let cancelled_timers = self.registry.cancel_all_timeouts();
        self.scope.token.cancel();
        let discarded_records = self.registry.len();
        self.registry.clear();

        self.scope = SessionScope::new(self.scope.epoch.wrapping_add(1));
        self.transport_ready = false;
        self.awaiting_resume = 0;
        self.phase = SessionPhase::Idle;

        TeardownSummary {
            cancelled_timers,
            discarded_records,
        }
    }
}
