//! Error types for the voxlink bridge.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`BridgeError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// An inbound transport event could not be decoded.
    pub const EVENT_MALFORMED: &str = "EVENT_MALFORMED";

    /// A call record was asked to make a transition its lifecycle forbids.
    pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";

    /// A session channel was closed or rejected a message.
    pub const CHANNEL_CLOSED: &str = "CHANNEL_CLOSED";

    /// A tool backend request failed.
    pub const BACKEND_FAILED: &str = "BACKEND_FAILED";

    /// An operation exceeded its time bound.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Filesystem or stdio failure.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// An inbound transport event could not be decoded.
    #[error("[{}] {}", error_codes::EVENT_MALFORMED, .0)]
    MalformedEvent(String),

    /// A call record transition that violates the lifecycle ordering.
    #[error("[{}] {}", error_codes::INVALID_TRANSITION, .0)]
    InvalidTransition(String),

    /// Channel send/receive error.
    #[error("[{}] {}", error_codes::CHANNEL_CLOSED, .0)]
    Channel(String),

    /// Tool backend request error.
    #[error("[{}] {}", error_codes::BACKEND_FAILED, .0)]
    Backend(String),

    /// Operation timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    Timeout(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::MalformedEvent(_) => error_codes::EVENT_MALFORMED,
            Self::InvalidTransition(_) => error_codes::INVALID_TRANSITION,
            Self::Channel(_) => error_codes::CHANNEL_CLOSED,
            Self::Backend(_) => error_codes::BACKEND_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Config(m)
            | Self::MalformedEvent(m)
            | Self::InvalidTransition(m)
            | Self::Channel(m)
            | Self::Backend(m)
            | Self::Timeout(m) => m.clone(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Whether this error ends the current session.
    ///
    /// Only transport-level failures are fatal; everything on the call path
    /// degrades to a structured error output instead.
    pub fn is_transport_fatal(&self) -> bool {
        matches!(self, Self::Channel(_) | Self::Io(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BridgeError>;
