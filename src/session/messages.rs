//! Messages consumed by the session loop.

use serde::{Deserialize, Serialize};

use crate::executor::ToolOutcome;

/// Lifecycle commands from the transport owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Open a session. Registration waits for [`SessionCommand::TransportReady`].
    Start,
    /// The transport can carry outbound events.
    TransportReady,
    /// Close the session.
    Stop,
    /// The transport died; close the session.
    TransportFailed { reason: String },
}

/// Messages posted back to the session loop by its own spawned tasks.
///
/// Each carries the epoch of the session that spawned it. A message from an
/// earlier epoch refers to state that no longer exists and is dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// The executor returned for a dispatched call.
    Executed {
        epoch: u64,
        call_id: String,
        outcome: ToolOutcome,
    },
    /// A dispatch timer expired.
    TimeoutElapsed { epoch: u64, call_id: String },
    /// The settle delay after a call's output has passed.
    SettleElapsed { epoch: u64, call_id: String },
}

impl SessionMessage {
    pub fn epoch(&self) -> u64 {
        match self {
            Self::Executed { epoch, .. }
            | Self::TimeoutElapsed { epoch, .. }
            | Self::SettleElapsed { epoch, .. } => *epoch,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::Executed { call_id, .. }
            | Self::TimeoutElapsed { call_id, .. }
            | Self::SettleElapsed { call_id, .. } => call_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Executed { .. } => "executed",
            Self::TimeoutElapsed { .. } => "timeout_elapsed",
            Self::SettleElapsed { .. } => "settle_elapsed",
        }
    }
}

/// Session phase, published on a watch channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Started; tool registration not yet sent.
    Registering,
    /// Tools registered; inbound events are processed.
    Active,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registering => "registering",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
