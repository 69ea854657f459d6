//! Tool-call reconciliation.
//!
//! One logical call is announced by several redundant events. The pipeline
//! below collapses them into a single dispatch:
//!
//! 1. [`CallSignatureExtractor`] finds a candidate in an event.
//! 2. [`CallRegistry`] admits its call id once per session.
//! 3. [`ArgumentResolver`] decides whether the arguments are complete; if
//!    not, the admission is revoked and a later announcement may retry.
//! 4. [`Dispatcher`] submits the call and arms its timeout.
//! 5. [`ResultCoordinator`] emits the output and the delayed resume request.

pub mod arguments;
pub mod coordinator;
pub mod dispatcher;
pub mod registry;
pub mod signature;

pub use arguments::{ArgumentResolution, ArgumentResolver, DeferReason};
pub use coordinator::{CallOutcome, ResultCoordinator, TIMEOUT_REASON};
pub use dispatcher::Dispatcher;
pub use registry::{CallRecord, CallRegistry, CallState, TimeoutHandle};
pub use signature::{
    CallSignature, CallSignatureExtractor, DETECTION_RULES, DetectionRule, DetectionSource,
    RawArguments,
};
