//! Test harness helpers for wiring a full orchestrator against the
//! in-memory reference implementations.

use std::sync::Arc;

use crate::card::{Card, Priority};
use crate::events::{EventSink, NoOpEventSink};
use crate::interfaces::{InMemoryRag, JsonFileKanbanBoard, MailboxMessenger};
use crate::orchestrator::Orchestrator;
use crate::recovery::{default_workflows, ActionRegistry, RecoveryEngine};
use crate::stage::StageRegistry;
use crate::state_machine::StateMachine;
use crate::supervisor::Supervisor;

/// Everything needed to drive a test pipeline run end to end, backed by
/// in-memory or tempfile-based reference implementations.
pub struct Harness {
    /// The orchestrator under test.
    pub orchestrator: Orchestrator,
    /// The board backing the orchestrator, for seeding/inspecting cards.
    pub board: Arc<JsonFileKanbanBoard>,
    /// The messenger backing the orchestrator, for draining broadcasts.
    pub messenger: Arc<MailboxMessenger>,
    /// The RAG store backing the orchestrator, for inspecting appended
    /// artifacts.
    pub rag: Arc<InMemoryRag>,
    /// The state machine backing the orchestrator.
    pub state_machine: Arc<StateMachine>,
}

/// Builds a harness with an empty stage registry; callers add stages
/// via [`StageRegistry::with_stage`] before constructing the
/// orchestrator if they need more than the default no-op coverage.
#[must_use]
pub fn harness_with_registry(board_path: &std::path::Path, registry: StageRegistry) -> Harness {
    let board = Arc::new(JsonFileKanbanBoard::load(board_path).expect("tempfile board path is always writable"));
    let messenger = Arc::new(MailboxMessenger::new());
    let rag = Arc::new(InMemoryRag::new());
    let event_sink: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
    let state_machine = Arc::new(StateMachine::new(event_sink.clone()));
    let supervisor = Arc::new(Supervisor::new(state_machine.clone(), event_sink.clone()));
    let recovery = Arc::new(
        RecoveryEngine::new(
            default_workflows(),
            Arc::new(ActionRegistry::with_builtins()),
            state_machine.clone(),
            event_sink.clone(),
        )
        .expect("default_workflows covers every issue type"),
    );

    let orchestrator = Orchestrator::new(
        board.clone(),
        messenger.clone(),
        rag.clone(),
        supervisor,
        recovery,
        state_machine.clone(),
        registry,
        event_sink,
    );

    Harness {
        orchestrator,
        board,
        messenger,
        rag,
        state_machine,
    }
}

/// Builds a card with the given id in the `"backlog"` column.
#[must_use]
pub fn sample_card(card_id: &str) -> Card {
    let mut card = Card::new(card_id, "Sample task", Priority::Medium);
    card.column = "backlog".to_string();
    card
}
