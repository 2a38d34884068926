//! Maps a typed issue to a remediation sequence and runs it.

mod actions;

pub use actions::{ActionOutcome, ActionRegistry, ActionSignature};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::errors::ArtemisError;
use crate::events::EventSink;
use crate::state_machine::{Event as SmEvent, PipelineState, StateMachine};

/// The closed set of issue types the recovery engine can be asked to
/// remediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// A stage did not finish within its deadline.
    Timeout,
    /// A spawned process stopped responding but did not exit.
    HangingProcess,
    /// The host ran out of memory.
    MemoryExhausted,
    /// The host ran out of disk space.
    DiskFull,
    /// A network call failed.
    NetworkError,
    /// Generated code failed to compile.
    CompilationError,
    /// A test suite reported failures.
    TestFailure,
    /// A security scanner flagged a vulnerability.
    SecurityVulnerability,
    /// A linter reported errors.
    LintingError,
    /// A required dependency was not found.
    MissingDependency,
    /// Two dependencies require incompatible versions.
    VersionConflict,
    /// An import/module resolution failed.
    ImportError,
    /// The model provider's API returned an error.
    LlmApiError,
    /// The model provider's API timed out.
    LlmTimeout,
    /// The model provider rate-limited the request.
    LlmRateLimit,
    /// The model returned a response that failed validation.
    InvalidLlmResponse,
    /// The architecture stage produced an invalid design.
    ArchitectureInvalid,
    /// Code review rejected the submission.
    CodeReviewFailed,
    /// Integration detected a conflict merging work.
    IntegrationConflict,
    /// Validation rejected the build.
    ValidationFailed,
    /// Developer arbitration could not select a winner.
    ArbitrationDeadlock,
    /// Two developer workers produced conflicting artifacts.
    DeveloperConflict,
    /// The agent messenger failed to deliver a message.
    MessengerError,
    /// A card failed structural validation.
    InvalidCard,
    /// Persisted pipeline state failed to deserialize.
    CorruptedState,
    /// The RAG backend failed.
    RagError,
    /// A process outlived its expected lifetime with no owner.
    ZombieProcess,
    /// A file lock could not be acquired.
    FileLock,
    /// A filesystem operation was denied.
    PermissionDenied,
}

impl IssueType {
    /// All issue types, used to validate that every one has a
    /// registered workflow.
    #[must_use]
    pub fn all() -> &'static [IssueType] {
        use IssueType::{
            ArbitrationDeadlock, ArchitectureInvalid, CodeReviewFailed, CompilationError,
            CorruptedState, DeveloperConflict, DiskFull, FileLock, HangingProcess, ImportError,
            IntegrationConflict, InvalidCard, InvalidLlmResponse, LintingError, LlmApiError,
            LlmRateLimit, LlmTimeout, MemoryExhausted, MessengerError, MissingDependency,
            NetworkError, PermissionDenied, RagError, SecurityVulnerability, TestFailure, Timeout,
            ValidationFailed, VersionConflict, ZombieProcess,
        };
        &[
            Timeout,
            HangingProcess,
            MemoryExhausted,
            DiskFull,
            NetworkError,
            CompilationError,
            TestFailure,
            SecurityVulnerability,
            LintingError,
            MissingDependency,
            VersionConflict,
            ImportError,
            LlmApiError,
            LlmTimeout,
            LlmRateLimit,
            InvalidLlmResponse,
            ArchitectureInvalid,
            CodeReviewFailed,
            IntegrationConflict,
            ValidationFailed,
            ArbitrationDeadlock,
            DeveloperConflict,
            MessengerError,
            InvalidCard,
            CorruptedState,
            RagError,
            ZombieProcess,
            FileLock,
            PermissionDenied,
        ]
    }
}

/// One step in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Canonical action name, e.g. `"increase_timeout"`.
    pub name: String,
    /// Whether a failure should be retried.
    pub retry_on_failure: bool,
    /// Maximum retry attempts if `retry_on_failure` is set.
    pub max_retries: u32,
}

impl Action {
    /// Builds an action that is not retried on failure.
    #[must_use]
    pub fn once(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            retry_on_failure: false,
            max_retries: 0,
        }
    }

    /// Builds an action retried up to `max_retries` times on failure.
    #[must_use]
    pub fn retryable(name: impl Into<String>, max_retries: u32) -> Self {
        Self {
            name: name.into(),
            retry_on_failure: true,
            max_retries,
        }
    }
}

/// A named remediation sequence bound to exactly one issue type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name, for logging and reports.
    pub name: String,
    /// The issue type this workflow remediates.
    pub issue_type: IssueType,
    /// Ordered actions to run.
    pub actions: Vec<Action>,
    /// Pipeline state to transition to on success.
    pub success_state: PipelineState,
    /// Pipeline state to transition to on terminal failure.
    pub failure_state: PipelineState,
    /// Whether to roll the state machine's stack back to `RUNNING`
    /// before transitioning to `failure_state`.
    pub rollback_on_failure: bool,
}

/// A historical record of one workflow execution, suitable for
/// embedding in a pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// The workflow that ran.
    pub workflow_name: String,
    /// The issue type being remediated.
    pub issue_type: IssueType,
    /// Whether every action succeeded.
    pub success: bool,
    /// The last action attempted, for diagnostics.
    pub last_action: String,
    /// When the workflow ran.
    pub timestamp: String,
}

/// Builds the default workflow table covering every [`IssueType`].
///
/// Each workflow pairs an issue with the builtin actions that plausibly
/// address it; deployments with real process control should override
/// individual actions via [`ActionRegistry::with_handler`] rather than
/// replacing these workflows wholesale.
#[must_use]
pub fn default_workflows() -> Vec<Workflow> {
    use IssueType::{
        ArbitrationDeadlock, ArchitectureInvalid, CodeReviewFailed, CompilationError,
        CorruptedState, DeveloperConflict, DiskFull, FileLock, HangingProcess, ImportError,
        IntegrationConflict, InvalidCard, InvalidLlmResponse, LintingError, LlmApiError,
        LlmRateLimit, LlmTimeout, MemoryExhausted, MessengerError, MissingDependency,
        NetworkError, PermissionDenied, RagError, SecurityVulnerability, TestFailure, Timeout,
        ValidationFailed, VersionConflict, ZombieProcess,
    };
    use PipelineState::{Failed, Running};

    let retry_only = |issue_type, name: &str| Workflow {
        name: format!("{name}_retry"),
        issue_type,
        actions: vec![Action::retryable("retry_stage", 2)],
        success_state: Running,
        failure_state: Failed,
        rollback_on_failure: false,
    };

    vec![
        Workflow {
            name: "timeout_recovery".to_string(),
            issue_type: Timeout,
            actions: vec![Action::once("increase_timeout"), Action::retryable("retry_stage", 1)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        Workflow {
            name: "hanging_process_recovery".to_string(),
            issue_type: HangingProcess,
            actions: vec![Action::once("kill_hanging_process"), Action::once("restart_process")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "memory_exhausted_recovery".to_string(),
            issue_type: MemoryExhausted,
            actions: vec![Action::once("free_memory"), Action::once("restart_process")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "disk_full_recovery".to_string(),
            issue_type: DiskFull,
            actions: vec![Action::once("cleanup_temp_files")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "network_error_recovery".to_string(),
            issue_type: NetworkError,
            actions: vec![Action::once("wait_backoff"), Action::retryable("retry_stage", 2)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        retry_only(CompilationError, "compilation_error"),
        retry_only(TestFailure, "test_failure"),
        Workflow {
            name: "security_vulnerability_recovery".to_string(),
            issue_type: SecurityVulnerability,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        retry_only(LintingError, "linting_error"),
        Workflow {
            name: "missing_dependency_recovery".to_string(),
            issue_type: MissingDependency,
            actions: vec![Action::once("cleanup_temp_files"), Action::retryable("retry_stage", 1)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        retry_only(VersionConflict, "version_conflict"),
        retry_only(ImportError, "import_error"),
        Workflow {
            name: "llm_api_error_recovery".to_string(),
            issue_type: LlmApiError,
            actions: vec![Action::once("wait_backoff"), Action::retryable("retry_stage", 2)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        Workflow {
            name: "llm_timeout_recovery".to_string(),
            issue_type: LlmTimeout,
            actions: vec![Action::once("increase_timeout"), Action::retryable("retry_stage", 2)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        Workflow {
            name: "llm_rate_limit_recovery".to_string(),
            issue_type: LlmRateLimit,
            actions: vec![Action::once("wait_backoff"), Action::retryable("retry_stage", 3)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        retry_only(InvalidLlmResponse, "invalid_llm_response"),
        Workflow {
            name: "architecture_invalid_recovery".to_string(),
            issue_type: ArchitectureInvalid,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "code_review_failed_recovery".to_string(),
            issue_type: CodeReviewFailed,
            actions: vec![Action::retryable("retry_stage", 2)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        Workflow {
            name: "integration_conflict_recovery".to_string(),
            issue_type: IntegrationConflict,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        retry_only(ValidationFailed, "validation_failed"),
        Workflow {
            name: "arbitration_deadlock_recovery".to_string(),
            issue_type: ArbitrationDeadlock,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "developer_conflict_recovery".to_string(),
            issue_type: DeveloperConflict,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "messenger_error_recovery".to_string(),
            issue_type: MessengerError,
            actions: vec![Action::once("wait_backoff"), Action::retryable("retry_stage", 1)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        Workflow {
            name: "invalid_card_recovery".to_string(),
            issue_type: InvalidCard,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "corrupted_state_recovery".to_string(),
            issue_type: CorruptedState,
            actions: vec![Action::once("reset_circuit"), Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        retry_only(RagError, "rag_error"),
        Workflow {
            name: "zombie_process_recovery".to_string(),
            issue_type: ZombieProcess,
            actions: vec![Action::once("kill_hanging_process"), Action::once("free_memory")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
        Workflow {
            name: "file_lock_recovery".to_string(),
            issue_type: FileLock,
            actions: vec![Action::once("wait_backoff"), Action::retryable("retry_stage", 1)],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: false,
        },
        Workflow {
            name: "permission_denied_recovery".to_string(),
            issue_type: PermissionDenied,
            actions: vec![Action::once("retry_stage")],
            success_state: Running,
            failure_state: Failed,
            rollback_on_failure: true,
        },
    ]
}

/// Runs recovery workflows against the pipeline state machine.
pub struct RecoveryEngine {
    workflows: HashMap<IssueType, Workflow>,
    actions: Arc<ActionRegistry>,
    state_machine: Arc<StateMachine>,
    event_sink: Arc<dyn EventSink>,
    history: parking_lot::Mutex<Vec<WorkflowExecution>>,
}

impl RecoveryEngine {
    /// Builds the engine, validating that every `IssueType` has exactly
    /// one registered workflow.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::ConfigurationInvalid` naming the first
    /// issue type missing a workflow.
    pub fn new(
        workflows: Vec<Workflow>,
        actions: Arc<ActionRegistry>,
        state_machine: Arc<StateMachine>,
        event_sink: Arc<dyn EventSink>,
    ) -> Result<Self, ArtemisError> {
        let mut table = HashMap::new();
        for workflow in workflows {
            table.insert(workflow.issue_type, workflow);
        }

        for issue_type in IssueType::all() {
            if !table.contains_key(issue_type) {
                return Err(ArtemisError::ConfigurationInvalid(format!(
                    "no recovery workflow registered for issue type {issue_type:?}"
                )));
            }
        }

        Ok(Self {
            workflows: table,
            actions,
            state_machine,
            event_sink,
            history: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Executes the workflow registered for `issue_type`.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::InvalidTransition` if the state machine
    /// cannot enter `RECOVERING` from its current state, or
    /// `ArtemisError::WorkflowFailed` if the terminal action fails and
    /// the failure cannot be rolled back cleanly.
    pub async fn execute_workflow(&self, issue_type: IssueType, context: &Context) -> Result<bool, ArtemisError> {
        let workflow = self
            .workflows
            .get(&issue_type)
            .expect("validated at construction: every issue type has a workflow")
            .clone();

        self.state_machine
            .transition(SmEvent::RecoveryStart, format!("recovering from {issue_type:?}"), HashMap::new())?;
        self.state_machine.add_active_issue(&format!("{issue_type:?}"));

        let mut last_action = String::new();
        let mut all_succeeded = true;

        for action in &workflow.actions {
            last_action = action.name.clone();
            let mut attempts = 0u32;

            loop {
                let outcome = self.actions.run(&action.name, context).await;
                if outcome.ok {
                    break;
                }
                if action.retry_on_failure && attempts < action.max_retries {
                    attempts += 1;
                    continue;
                }
                all_succeeded = false;
                break;
            }

            if !all_succeeded {
                break;
            }
        }

        self.state_machine.remove_active_issue(&format!("{issue_type:?}"));

        let execution = WorkflowExecution {
            workflow_name: workflow.name.clone(),
            issue_type,
            success: all_succeeded,
            last_action: last_action.clone(),
            timestamp: crate::utils::iso_timestamp(),
        };

        if all_succeeded {
            self.state_machine
                .transition(SmEvent::RecoverySuccess, "recovery succeeded", HashMap::new())?;
            self.event_sink.try_emit(
                "recovery_success",
                Some(serde_json::json!({ "issue_type": issue_type })),
            );
        } else {
            if workflow.rollback_on_failure {
                self.state_machine.rollback_to_state(PipelineState::Running);
            }
            self.state_machine
                .transition(SmEvent::RecoveryFail, "recovery failed", HashMap::new())?;
            self.event_sink.try_emit(
                "recovery_fail",
                Some(serde_json::json!({ "issue_type": issue_type, "last_action": last_action })),
            );
        }

        self.history.lock().push(execution);

        if !all_succeeded {
            return Err(ArtemisError::WorkflowFailed {
                issue_type: format!("{issue_type:?}"),
                last_action,
            });
        }

        Ok(all_succeeded)
    }

    /// Returns the full history of workflow executions so far.
    #[must_use]
    pub fn history(&self) -> Vec<WorkflowExecution> {
        self.history.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventSink;

    fn default_workflow_for(issue_type: IssueType) -> Workflow {
        Workflow {
            name: format!("{issue_type:?}_default"),
            issue_type,
            actions: vec![Action::once("retry_stage")],
            success_state: PipelineState::Running,
            failure_state: PipelineState::Failed,
            rollback_on_failure: true,
        }
    }

    fn all_workflows() -> Vec<Workflow> {
        IssueType::all().iter().map(|t| default_workflow_for(*t)).collect()
    }

    #[test]
    fn test_missing_workflow_is_rejected() {
        let mut workflows = all_workflows();
        workflows.pop();

        let result = RecoveryEngine::new(
            workflows,
            Arc::new(ActionRegistry::with_builtins()),
            Arc::new(StateMachine::new(Arc::new(NoOpEventSink))),
            Arc::new(NoOpEventSink),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_successful_workflow_transitions_back_to_running() {
        let state_machine = Arc::new(StateMachine::new(Arc::new(NoOpEventSink)));
        state_machine.transition(SmEvent::Start, "begin", HashMap::new()).unwrap();
        state_machine.transition(SmEvent::InitDone, "ready", HashMap::new()).unwrap();
        state_machine.transition(SmEvent::StageStart, "stage", HashMap::new()).unwrap();
        state_machine.transition(SmEvent::StageFail, "failed", HashMap::new()).unwrap();

        let engine = RecoveryEngine::new(
            all_workflows(),
            Arc::new(ActionRegistry::with_builtins()),
            state_machine.clone(),
            Arc::new(NoOpEventSink),
        )
        .unwrap();

        let context = Context::new();
        let ok = engine.execute_workflow(IssueType::Timeout, &context).await.unwrap();
        assert!(ok);
        assert_eq!(state_machine.current_state(), PipelineState::Running);
    }
}
