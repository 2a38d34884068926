//! Event sink system for observability.
//!
//! Every component that wants to emit events takes an `Arc<dyn EventSink>`
//! explicitly in its constructor. There is deliberately no process-wide
//! singleton here: two orchestrators in the same process (e.g. in tests)
//! must never be able to observe each other's events.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
