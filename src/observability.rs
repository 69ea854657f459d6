/// Structured tracing span names and field keys.
///
/// Spans follow the hierarchy:
///
/// ```text
/// voxlink.inbound.event
///   └─> voxlink.call.dispatch
/// voxlink.call.result (timer / executor driven)
/// voxlink.session.teardown
/// ```
// Span names (hierarchical, dot-separated)
/// Span for processing one inbound transport event.
pub const SPAN_INBOUND_EVENT: &str = "voxlink.inbound.event";

/// Span for handing a ready call to the executor.
pub const SPAN_CALL_DISPATCH: &str = "voxlink.call.dispatch";

/// Span for turning an outcome into outbound events.
pub const SPAN_CALL_RESULT: &str = "voxlink.call.result";

/// Span for session teardown.
pub const SPAN_SESSION_TEARDOWN: &str = "voxlink.session.teardown";

// Field keys for span attributes
/// Inbound event type tag.
pub const FIELD_EVENT_TYPE: &str = "event_type";

/// Call identifier.
pub const FIELD_CALL_ID: &str = "call_id";

/// Tool (function) name.
pub const FIELD_TOOL_NAME: &str = "tool_name";

/// Session epoch counter.
pub const FIELD_EPOCH: &str = "epoch";
