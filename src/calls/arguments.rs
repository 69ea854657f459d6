//! Argument readiness.
//!
//! Early announcements of a call often carry a partial or empty argument
//! string. Those are not errors: the candidate is deferred and a later, more
//! complete announcement for the same call gets another chance.

use serde_json::{Map, Value};

use super::signature::{CallSignature, RawArguments};

/// Why a candidate is not ready to dispatch yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferReason {
    /// No arguments on the event.
    Absent,
    /// The argument text is not (yet) valid JSON.
    Unparseable(String),
    /// The arguments are JSON but not an object.
    NotAnObject,
    /// The arguments are `{}`.
    Empty,
}

impl std::fmt::Display for DeferReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => f.write_str("arguments absent"),
            Self::Unparseable(e) => write!(f, "arguments unparseable: {e}"),
            Self::NotAnObject => f.write_str("arguments are not an object"),
            Self::Empty => f.write_str("arguments empty"),
        }
    }
}

/// Outcome of resolving a candidate's arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentResolution {
    Ready(Map<String, Value>),
    Deferred(DeferReason),
}

impl ArgumentResolution {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Decides whether a candidate's arguments are complete enough to dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentResolver;

impl ArgumentResolver {
    pub fn new() -> Self {
        Self
    }

    /// Only a non-empty JSON object is ready.
    pub fn resolve(&self, signature: &CallSignature) -> ArgumentResolution {
        match &signature.raw_arguments {
            RawArguments::Absent => ArgumentResolution::Deferred(DeferReason::Absent),
            RawArguments::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => ready_object(value),
                Err(e) => ArgumentResolution::Deferred(DeferReason::Unparseable(e.to_string())),
            },
            RawArguments::Structured(value) => ready_object(value.clone()),
        }
    }
}

fn ready_object(value: Value) -> ArgumentResolution {
    match value {
        Value::Object(map) if map.is_empty() => ArgumentResolution::Deferred(DeferReason::Empty),
        Value::Object(map) => ArgumentResolution::Ready(map),
        _ => ArgumentResolution::Deferred(DeferReason::NotAnObject),
    }
}
