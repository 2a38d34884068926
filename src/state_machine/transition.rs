//! Immutable record of one state-machine edit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Event, PipelineState};

/// One recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// State before the transition.
    pub from_state: PipelineState,
    /// State after the transition.
    pub to_state: PipelineState,
    /// The event that triggered it.
    pub event: Event,
    /// Human-readable reason.
    pub reason: String,
    /// Arbitrary context captured alongside the transition.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    /// When it happened (ISO 8601).
    pub timestamp: String,
}

impl Transition {
    /// Builds a new transition record, stamping the current time.
    #[must_use]
    pub fn new(
        from_state: PipelineState,
        to_state: PipelineState,
        event: Event,
        reason: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            from_state,
            to_state,
            event,
            reason: reason.into(),
            context,
            timestamp: crate::utils::iso_timestamp(),
        }
    }
}
