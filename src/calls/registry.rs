//! Call identity ledger.
//!
//! A call id is admitted once per session. Records are never removed when a
//! call finishes; the ledger grows for the life of the session and is
//! cleared in bulk at teardown, so late or repeated announcements of a
//! finished call stay duplicates. The one exception is [`CallRegistry::revoke`],
//! which undoes an admission whose arguments turned out not to be ready.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, Result};

/// Lifecycle of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    /// Admitted, arguments not yet confirmed.
    Pending,
    /// Handed to the executor; timeout armed.
    Dispatched,
    /// Output emitted for an executor outcome.
    Completed,
    /// Output emitted for an expired timeout.
    TimedOut,
}

impl CallState {
    /// Whether `self -> next` is a legal step.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched)
                | (Self::Dispatched, Self::Completed)
                | (Self::Dispatched, Self::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cancellable handle for a call's dispatch timer.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
    token: CancellationToken,
}

impl TimeoutHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One admitted call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub call_id: String,
    pub function_name: String,
    /// Empty until dispatched.
    pub arguments: Map<String, Value>,
    pub state: CallState,
    pub created_at: DateTime<Utc>,
    pub timeout: Option<TimeoutHandle>,
}

impl CallRecord {
    fn new(call_id: String, function_name: String) -> Self {
        Self {
            call_id,
            function_name,
            arguments: Map::new(),
            state: CallState::Pending,
            created_at: Utc::now(),
            timeout: None,
        }
    }

    fn transition(&mut self, next: CallState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(BridgeError::InvalidTransition(format!(
                "call {}: {} -> {}",
                self.call_id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Move to `Dispatched` with the resolved arguments and an armed timer.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidTransition`] if the record is not `Pending` or
    /// `arguments` is empty.
    pub fn mark_dispatched(
        &mut self,
        arguments: Map<String, Value>,
        timeout: TimeoutHandle,
    ) -> Result<()> {
        if arguments.is_empty() {
            return Err(BridgeError::InvalidTransition(format!(
                "call {}: cannot dispatch with empty arguments",
                self.call_id
            )));
        }
        self.transition(CallState::Dispatched)?;
        self.arguments = arguments;
        self.timeout = Some(timeout);
        Ok(())
    }

    /// # Errors
    ///
    /// [`BridgeError::InvalidTransition`] unless the record is `Dispatched`.
    pub fn mark_completed(&mut self) -> Result<()> {
        self.transition(CallState::Completed)
    }

    /// # Errors
    ///
    /// [`BridgeError::InvalidTransition`] unless the record is `Dispatched`.
    pub fn mark_timed_out(&mut self) -> Result<()> {
        self.transition(CallState::TimedOut)
    }

    /// Cancel and drop the timer, if armed. Returns whether one was armed.
    pub fn cancel_timeout(&mut self) -> bool {
        match self.timeout.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }
}

/// Dedup ledger keyed by call id.
#[derive(Debug, Default)]
pub struct CallRegistry {
    records: HashMap<String, CallRecord>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `call_id`, creating a `Pending` record.
    ///
    /// Returns `false` (and changes nothing) if the id was already admitted.
    pub fn admit(&mut self, call_id: &str, function_name: &str) -> bool {
        if self.records.contains_key(call_id) {
            return false;
        }
        self.records.insert(
            call_id.to_owned(),
            CallRecord::new(call_id.to_owned(), function_name.to_owned()),
        );
        true
    }

    /// Undo an admission so a later announcement can be processed.
    ///
    /// Only `Pending` records can be revoked; returns whether one was.
    pub fn revoke(&mut self, call_id: &str) -> bool {
        match self.records.get(call_id) {
            Some(record) if record.state == CallState::Pending => {
                self.records.remove(call_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_admitted(&self, call_id: &str) -> bool {
        self.records.contains_key(call_id)
    }

    pub fn get(&self, call_id: &str) -> Option<&CallRecord> {
        self.records.get(call_id)
    }

    pub fn get_mut(&mut self, call_id: &str) -> Option<&mut CallRecord> {
        self.records.get_mut(call_id)
    }

    /// Cancel every armed timer. Returns how many were armed.
    pub fn cancel_all_timeouts(&mut self) -> usize {
        self.records
            .values_mut()
            .map(CallRecord::cancel_timeout)
            .filter(|armed| *armed)
            .count()
    }

    /// Drop every record. Timers should be cancelled first.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records in `state`.
    pub fn count_in(&self, state: CallState) -> usize {
        self.records.values().filter(|r| r.state == state).count()
    }
}
