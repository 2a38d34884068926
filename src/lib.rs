//! # Artemis
//!
//! An autonomous software-development pipeline orchestration kernel.
//!
//! Given a Kanban card describing a task, Artemis drives the work
//! through a fixed ordered sequence of stages — project analysis,
//! architecture, dependency validation, parallel development by
//! competing agents, code review, validation, integration, testing —
//! producing reviewed and tested artifacts. The crate provides:
//!
//! - **A pushdown state machine** modeling the pipeline's lifecycle,
//!   with atomic snapshot persistence.
//! - **A supervisor** wrapping every stage call with retry, backoff,
//!   timeout, and circuit breaking.
//! - **A recovery workflow engine** mapping typed failures to
//!   remediation action sequences.
//! - **Narrow interfaces** (and reference implementations) for the
//!   Kanban board, agent messenger, and artifact/recommendation store
//!   the core consumes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use artemis::prelude::*;
//!
//! let orchestrator = Orchestrator::new(board, messenger, rag, supervisor, recovery, state_machine, registry, event_sink);
//! let report = orchestrator.run_full_pipeline("card-123", 2, &CancellationToken::new()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod arbitration;
pub mod cancellation;
pub mod card;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod orchestrator;
pub mod recovery;
pub mod stage;
pub mod state_machine;
pub mod supervisor;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::arbitration::{select_winner, Scorecard, WorkerSubmission};
    pub use crate::cancellation::CancellationToken;
    pub use crate::card::{Card, Priority};
    pub use crate::config::Config;
    pub use crate::context::{Context, NS_DIAGNOSTICS, NS_RETRY, NS_SHARED_DATA};
    pub use crate::errors::{ArtemisError, DataConflictError, ErrorInfo};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::interfaces::{
        InMemoryRag, JsonFileKanbanBoard, KanbanBoard, MailboxMessenger, Message, Messenger,
        RagStore, Recommendations, SimilarArtifact,
    };
    pub use crate::orchestrator::{Orchestrator, Report, RunStatus, StageSnapshot};
    pub use crate::recovery::{
        default_workflows, Action, ActionRegistry, IssueType, RecoveryEngine, Workflow, WorkflowExecution,
    };
    pub use crate::stage::{stage_order, Stage, StageRegistry, StageResult, StageStatus};
    pub use crate::state_machine::{Event, PipelineState, Snapshot, StateMachine};
    pub use crate::supervisor::{RecoveryStrategy, RetryHistoryEntry, Supervisor};
    pub use crate::utils::{content_hash, generate_uuid, iso_timestamp, Timestamp};
}
