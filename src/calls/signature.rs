//! Tool-call detection.
//!
//! The realtime endpoint announces one logical function call through several
//! redundant event shapes. [`DETECTION_RULES`] lists them as
//! `(matches, extract)` pairs in priority order; the
//! [`CallSignatureExtractor`] walks the list and returns the first candidate
//! that names a registered tool.
//!
//! The arguments-finalized event outranks everything else: it arrives before
//! the response is finalized, while the ids it carries are still valid for
//! submitting output. The finalized response is the fallback. The relative
//! order of the remaining shapes is not load-bearing.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::realtime::event::{
    ARGUMENTS_DONE, CONVERSATION_UPDATED, FUNCTION_CALL, FUNCTION_CALL_DONE, FUNCTION_CALL_ITEM,
    ITEM_DONE, InboundEvent, RESPONSE_DONE,
};
use crate::tools::ToolRegistry;

/// Fields that may carry the call identifier, in priority order.
pub const CALL_ID_FIELDS: [&str; 3] = ["call_id", "id", "item_id"];

/// Which event shape a candidate was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionSource {
    ArgumentsDone,
    ResponseDone,
    FunctionCall,
    FunctionCallDone,
    NestedResponse,
    ItemDone,
    ConversationUpdated,
}

impl DetectionSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArgumentsDone => "arguments_done",
            Self::ResponseDone => "response_done",
            Self::FunctionCall => "function_call",
            Self::FunctionCallDone => "function_call_done",
            Self::NestedResponse => "nested_response",
            Self::ItemDone => "item_done",
            Self::ConversationUpdated => "conversation_updated",
        }
    }
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments as found on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawArguments {
    /// A JSON document still to be parsed (possibly partial or empty).
    Text(String),
    /// Already-structured arguments.
    Structured(Value),
    /// No arguments field, or an explicit null.
    Absent,
}

impl RawArguments {
    fn from_field(field: Option<&Value>) -> Self {
        match field {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Structured(other.clone()),
        }
    }
}

/// A candidate tool call extracted from one event.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignature {
    pub source: DetectionSource,
    pub function_name: String,
    pub raw_arguments: RawArguments,
    /// First present of [`CALL_ID_FIELDS`].
    pub candidate_id: Option<String>,
}

/// One entry of the detection table.
pub struct DetectionRule {
    pub source: DetectionSource,
    /// Shape test on the event.
    pub matches: fn(&InboundEvent) -> bool,
    /// Pull a candidate out of a matching event. Receives the registered
    /// tool names for shapes that carry several entries.
    pub extract: fn(&InboundEvent, &BTreeSet<String>) -> Option<CallSignature>,
}

/// Detection rules in priority order.
pub static DETECTION_RULES: [DetectionRule; 7] = [
    DetectionRule {
        source: DetectionSource::ArgumentsDone,
        matches: |event| event.kind() == ARGUMENTS_DONE,
        extract: |event, _| signature_from(DetectionSource::ArgumentsDone, event.payload()),
    },
    DetectionRule {
        source: DetectionSource::ResponseDone,
        matches: |event| {
            event.kind() == RESPONSE_DONE
                && event
                    .field("response")
                    .and_then(|r| r.get("output"))
                    .is_some_and(Value::is_array)
        },
        // One candidate per event: only the first registered call in
        // `output` is reported. Later calls in the same response are picked
        // up from their own item-level events.
        extract: |event, known| {
            event
                .field("response")
                .and_then(|r| r.get("output"))
                .and_then(Value::as_array)?
                .iter()
                .filter(|entry| is_function_call(entry))
                .find(|entry| {
                    entry
                        .get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| known.contains(name))
                })
                .and_then(|entry| signature_from(DetectionSource::ResponseDone, entry))
        },
    },
    DetectionRule {
        source: DetectionSource::FunctionCall,
        matches: |event| event.kind() == FUNCTION_CALL,
        extract: |event, _| signature_from(DetectionSource::FunctionCall, event.payload()),
    },
    DetectionRule {
        source: DetectionSource::FunctionCallDone,
        matches: |event| {
            event.kind() == FUNCTION_CALL_DONE
                && event.field("function_call").is_some_and(Value::is_object)
        },
        extract: |event, _| {
            signature_from(DetectionSource::FunctionCallDone, event.field("function_call")?)
        },
    },
    DetectionRule {
        source: DetectionSource::NestedResponse,
        matches: |event| event.field("response").is_some_and(is_function_call),
        extract: |event, _| signature_from(DetectionSource::NestedResponse, event.field("response")?),
    },
    DetectionRule {
        source: DetectionSource::ItemDone,
        matches: |event| {
            event.kind() == ITEM_DONE && event.field("item").is_some_and(is_function_call)
        },
        extract: |event, _| signature_from(DetectionSource::ItemDone, event.field("item")?),
    },
    DetectionRule {
        source: DetectionSource::ConversationUpdated,
        matches: |event| {
            event.kind() == CONVERSATION_UPDATED
                && event
                    .field("item")
                    .is_some_and(|item| is_function_call(item) && item_is_settled(item))
        },
        extract: |event, _| {
            signature_from(DetectionSource::ConversationUpdated, event.field("item")?)
        },
    },
];

fn is_function_call(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some(FUNCTION_CALL_ITEM)
}

/// A conversation item is usable once marked complete or once it carries a
/// non-empty argument string; before that its arguments are still streaming.
fn item_is_settled(item: &Value) -> bool {
    item.get("status").and_then(Value::as_str) == Some("completed")
        || item
            .get("arguments")
            .and_then(Value::as_str)
            .is_some_and(|a| !a.is_empty())
}

fn candidate_id(call: &Value) -> Option<String> {
    CALL_ID_FIELDS.iter().find_map(|field| {
        call.get(*field)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
    })
}

fn signature_from(source: DetectionSource, call: &Value) -> Option<CallSignature> {
    let function_name = call
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())?
        .to_owned();
    Some(CallSignature {
        source,
        function_name,
        raw_arguments: RawArguments::from_field(call.get("arguments")),
        candidate_id: candidate_id(call),
    })
}

/// Extracts candidate tool calls from inbound events.
///
/// Pure: no state is read or written beyond the registered tool names.
#[derive(Debug, Clone)]
pub struct CallSignatureExtractor {
    known: BTreeSet<String>,
}

impl CallSignatureExtractor {
    /// Extractor recognising the given function names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Extractor recognising every tool in the registry.
    pub fn from_registry(registry: &ToolRegistry) -> Self {
        Self {
            known: registry.names(),
        }
    }

    /// Return the highest-priority candidate in `event` naming a registered
    /// tool, or `None` if the event carries no such call.
    pub fn extract(&self, event: &InboundEvent) -> Option<CallSignature> {
        DETECTION_RULES
            .iter()
            .filter(|rule| (rule.matches)(event))
            .find_map(|rule| {
                (rule.extract)(event, &self.known)
                    .filter(|sig| self.known.contains(&sig.function_name))
            })
    }
}
