//! Thin CLI translation layer over `Orchestrator::run_full_pipeline`.
//!
//! Not the hard part: this binary wires the reference Kanban/messenger/
//! RAG implementations and a deterministic mock stage registry, then
//! translates the resulting `Report::status` to a process exit code.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use artemis::prelude::*;
use artemis::testing::mocks::ScriptedStage;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "artemis", about = "Autonomous software-development pipeline orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the full pipeline for one card.
    Run {
        /// The id of the card to run, as resolved on the Kanban board.
        card_id: String,
        /// Maximum development/code-review retry attempts.
        #[arg(long, default_value_t = 2)]
        max_retries: u32,
        /// Named configuration profile, reserved for future use.
        #[arg(long)]
        config_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Cli { command } = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Ok(ExitCode::from(e.exit_code() as u8));
        }
    };

    match command {
        Command::Run {
            card_id,
            max_retries,
            config_name: _,
        } => run(&config, &card_id, max_retries).await,
    }
}

async fn run(config: &Config, card_id: &str, max_retries: u32) -> anyhow::Result<ExitCode> {
    let board_path = config.repo_root.join(".artemis").join("board.json");
    let board = Arc::new(JsonFileKanbanBoard::load(&board_path).context("loading Kanban board")?);
    let messenger = Arc::new(MailboxMessenger::new());
    let rag = Arc::new(InMemoryRag::new());
    let event_sink: Arc<dyn EventSink> = Arc::new(LoggingEventSink::default());

    let snapshot_path = Snapshot::path_for(&config.state_dir, card_id);
    let state_machine = match Snapshot::read_best_effort(&snapshot_path) {
        Some(snapshot) => Arc::new(StateMachine::from_snapshot(&snapshot, event_sink.clone())),
        None => Arc::new(StateMachine::new(event_sink.clone())),
    };

    let supervisor = Arc::new(Supervisor::new(state_machine.clone(), event_sink.clone()));
    let recovery = Arc::new(
        RecoveryEngine::new(
            default_workflows(),
            Arc::new(ActionRegistry::with_builtins()),
            state_machine.clone(),
            event_sink.clone(),
        )
        .context("building recovery engine")?,
    );
    let registry = demo_stage_registry();

    let orchestrator = Orchestrator::new(board, messenger, rag, supervisor, recovery, state_machine, registry, event_sink)
        .with_state_dir(config.state_dir.clone());

    let cancellation = CancellationToken::new();
    let result = orchestrator.run_full_pipeline(card_id, max_retries, &cancellation).await;

    match result {
        Ok(report) => {
            persist_report(config, &report)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::from(exit_code_for_status(&report.status)))
        }
        Err(e) => {
            eprintln!("pipeline run failed: {e}");
            Ok(ExitCode::from(e.exit_code() as u8))
        }
    }
}

fn exit_code_for_status(status: &RunStatus) -> u8 {
    match status {
        RunStatus::CompletedSuccessfully => 0,
        RunStatus::FailedCodeReview => 2,
        RunStatus::FailedStage { .. } => 3,
        RunStatus::Aborted => 1,
    }
}

fn persist_report(config: &Config, report: &Report) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.report_dir).context("creating report directory")?;
    let path = config
        .report_dir
        .join(format!("pipeline_full_report_{}.json", report.card_id));
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, json).context("writing report artifact")?;
    Ok(())
}

/// Wires a stage registry backed by deterministic mock stage bodies.
///
/// Real deployments supply LLM-backed stage implementations; this
/// default keeps the binary runnable end to end without one.
fn demo_stage_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    for name in stage_order() {
        registry = registry.with_stage(Arc::new(ScriptedStage::new(*name, vec![StageResult::complete_empty()])));
    }
    registry
}
