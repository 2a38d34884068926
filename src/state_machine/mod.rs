//! The pipeline's pushdown state machine.
//!
//! Modeled directly as a PDA rather than a plain finite state machine:
//! entering a nested activity (a stage run, a recovery attempt) pushes a
//! frame, and leaving it pops one. `RollbackToState` unwinds the stack in
//! one LIFO operation instead of replaying transition history.

mod snapshot;
mod stack;
mod transition;

pub use snapshot::Snapshot;
pub use stack::{Frame, Stack};
pub use transition::Transition;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::ArtemisError;
use crate::events::EventSink;
use std::sync::Arc;

/// The pipeline's top-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// No run has started yet.
    Idle,
    /// A run is being set up (board lookup, card load).
    Initializing,
    /// A run is in progress between stages.
    Running,
    /// A single stage is actively executing.
    StageRunning,
    /// The active stage's last attempt failed.
    StageFailed,
    /// A recovery workflow is being executed.
    Recovering,
    /// Running with one or more circuit breakers open.
    Degraded,
    /// Execution is suspended pending an external resume.
    Paused,
    /// Unwinding context after an unrecoverable failure.
    RollingBack,
    /// The run ended in failure.
    Failed,
    /// The run ended successfully.
    Completed,
    /// The run was aborted by an external signal.
    Aborted,
}

/// The events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// Begin a new run.
    Start,
    /// Initialization finished, enter the main loop.
    InitDone,
    /// A stage began executing.
    StageStart,
    /// A stage completed successfully.
    StageComplete,
    /// A stage was skipped.
    StageSkip,
    /// A stage is being retried after failure.
    StageRetry,
    /// A stage's attempt failed.
    StageFail,
    /// A stage exceeded its timeout.
    StageTimeout,
    /// Begin executing a recovery workflow.
    RecoveryStart,
    /// Recovery workflow succeeded.
    RecoverySuccess,
    /// Recovery workflow failed.
    RecoveryFail,
    /// A circuit breaker opened.
    CircuitOpen,
    /// A circuit breaker closed.
    CircuitClose,
    /// Begin rolling back context after unrecoverable failure.
    RollbackStart,
    /// Rollback finished.
    RollbackComplete,
    /// The run finished successfully.
    Complete,
    /// The run was paused.
    Pause,
    /// A paused run resumed.
    Resume,
    /// The run was aborted.
    Abort,
}

/// Per-stage lifecycle bookkeeping, independent of the top-level PDA
/// state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    /// Number of attempts made so far.
    #[serde(default)]
    pub attempts: u32,
    /// Timestamp of the most recent attempt start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Timestamp the stage most recently finished, successfully or not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Most recent failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Whether the stage's most recent attempt succeeded.
    #[serde(default)]
    pub succeeded: bool,
}

fn allowed_transitions() -> HashMap<(PipelineState, Event), PipelineState> {
    use Event::{
        Abort, CircuitClose, CircuitOpen, Complete, InitDone, Pause, RecoveryFail,
        RecoverySuccess, RecoveryStart, Resume, RollbackComplete, RollbackStart, Start,
        StageComplete, StageFail, StageRetry, StageSkip, StageStart, StageTimeout,
    };
    use PipelineState::{
        Aborted, Completed, Degraded, Failed, Idle, Initializing, Paused, Recovering,
        RollingBack, Running, StageFailed, StageRunning,
    };

    HashMap::from([
        ((Idle, Start), Initializing),
        ((Initializing, InitDone), Running),
        ((Running, StageStart), StageRunning),
        ((StageRunning, StageComplete), Running),
        ((StageRunning, StageSkip), Running),
        ((StageRunning, StageRetry), StageRunning),
        ((StageRunning, StageFail), StageFailed),
        ((StageRunning, StageTimeout), StageFailed),
        ((StageFailed, RecoveryStart), Recovering),
        ((StageFailed, RollbackStart), RollingBack),
        ((Recovering, RecoverySuccess), Running),
        ((Recovering, RecoveryFail), Failed),
        ((Running, CircuitOpen), Degraded),
        ((Degraded, CircuitClose), Running),
        ((Degraded, StageStart), StageRunning),
        ((RollingBack, RollbackComplete), Failed),
        ((Running, Complete), Completed),
        ((Running, Pause), Paused),
        ((Paused, Resume), Running),
        ((Running, Abort), Aborted),
        ((Degraded, Abort), Aborted),
        ((StageFailed, Abort), Aborted),
    ])
}

/// The pipeline's pushdown state machine.
///
/// Thread-safe: internal state lives behind a `RwLock` so a `StateMachine`
/// can be shared as `Arc<StateMachine>` between the orchestrator and the
/// supervisor executing concurrent developer stages.
pub struct StateMachine {
    inner: RwLock<Inner>,
    table: HashMap<(PipelineState, Event), PipelineState>,
    event_sink: Arc<dyn EventSink>,
}

struct Inner {
    current: PipelineState,
    stack: Stack,
    stages: HashMap<String, StageInfo>,
    transitions: Vec<Transition>,
    circuit_breakers_open: HashSet<String>,
    active_issues: Vec<String>,
    health_status: String,
}

impl StateMachine {
    /// Builds a new machine starting in `IDLE`.
    #[must_use]
    pub fn new(event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: PipelineState::Idle,
                stack: Stack::new(),
                stages: HashMap::new(),
                transitions: Vec::new(),
                circuit_breakers_open: HashSet::new(),
                active_issues: Vec::new(),
                health_status: "healthy".to_string(),
            }),
            table: allowed_transitions(),
            event_sink,
        }
    }

    /// Rehydrates a machine from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot, event_sink: Arc<dyn EventSink>) -> Self {
        let machine = Self::new(event_sink);
        {
            let mut inner = machine.inner.write();
            inner.current = snapshot.state;
            inner.stages = snapshot.stages.clone();
            inner.circuit_breakers_open = snapshot.circuit_breakers_open.clone();
            inner.active_issues = snapshot.active_issues.clone();
            inner.health_status = snapshot.health_status.clone();
        }
        machine
    }

    /// Returns the current top-level state.
    #[must_use]
    pub fn current_state(&self) -> PipelineState {
        self.inner.read().current
    }

    /// Applies an event, validating it against the allowed-transitions
    /// table.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::InvalidTransition` if `event` is not a
    /// legal move from the current state.
    pub fn transition(
        &self,
        event: Event,
        reason: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Result<PipelineState, ArtemisError> {
        let reason = reason.into();
        let mut inner = self.inner.write();
        let from = inner.current;

        let Some(&to) = self.table.get(&(from, event)) else {
            return Err(ArtemisError::InvalidTransition {
                from: format!("{from:?}"),
                to: format!("{event:?}"),
                event: format!("{event:?}"),
            });
        };

        inner.current = to;
        inner
            .transitions
            .push(Transition::new(from, to, event, reason.clone(), context));
        self.event_sink.try_emit(
            "state_transition",
            Some(serde_json::json!({ "from": from, "to": to, "event": event, "reason": reason })),
        );

        Ok(to)
    }

    /// Pushes a new frame capturing the current state and context.
    pub fn push(&self, context: HashMap<String, serde_json::Value>) {
        let mut inner = self.inner.write();
        let state = inner.current;
        inner.stack.push(state, context);
    }

    /// Pops the most recent frame.
    pub fn pop(&self) -> Option<Frame> {
        self.inner.write().stack.pop()
    }

    /// Rolls the stack back to the most recent frame in the given state.
    pub fn rollback_to_state(&self, target: PipelineState) -> bool {
        self.inner.write().stack.rollback_to_state(target)
    }

    /// Records the start of a stage attempt.
    pub fn record_stage_start(&self, stage_name: &str) {
        let mut inner = self.inner.write();
        let info = inner.stages.entry(stage_name.to_string()).or_default();
        info.attempts += 1;
        info.started_at = Some(crate::utils::iso_timestamp());
        info.finished_at = None;
    }

    /// Records the end of a stage attempt.
    pub fn record_stage_end(&self, stage_name: &str, succeeded: bool, error: Option<String>) {
        let mut inner = self.inner.write();
        let info = inner.stages.entry(stage_name.to_string()).or_default();
        info.finished_at = Some(crate::utils::iso_timestamp());
        info.succeeded = succeeded;
        info.last_error = error;
    }

    /// Returns a clone of the bookkeeping for a stage.
    #[must_use]
    pub fn stage_info(&self, stage_name: &str) -> Option<StageInfo> {
        self.inner.read().stages.get(stage_name).cloned()
    }

    /// Marks a stage's circuit breaker open or closed in the snapshot
    /// view (the authoritative breaker state lives in the supervisor;
    /// this mirrors it for persistence and health reporting).
    pub fn set_circuit_state(&self, stage_name: &str, open: bool) {
        let mut inner = self.inner.write();
        if open {
            inner.circuit_breakers_open.insert(stage_name.to_string());
            inner.health_status = "degraded".to_string();
        } else {
            inner.circuit_breakers_open.remove(stage_name);
            if inner.circuit_breakers_open.is_empty() {
                inner.health_status = "healthy".to_string();
            }
        }
    }

    /// Records that recovery is underway for an issue type.
    pub fn add_active_issue(&self, issue_type: &str) {
        self.inner.write().active_issues.push(issue_type.to_string());
    }

    /// Clears a resolved issue type.
    pub fn remove_active_issue(&self, issue_type: &str) {
        self.inner.write().active_issues.retain(|i| i != issue_type);
    }

    /// Takes a serializable snapshot of the current machine state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            state: inner.current,
            active_stage: inner.stack.peek().map(|f| format!("{:?}", f.state)),
            health_status: inner.health_status.clone(),
            active_issues: inner.active_issues.clone(),
            stages: inner.stages.clone(),
            circuit_breakers_open: inner.circuit_breakers_open.clone(),
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Returns the full transition history recorded so far.
    #[must_use]
    pub fn history(&self) -> Vec<Transition> {
        self.inner.read().transitions.clone()
    }
}
