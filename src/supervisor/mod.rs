//! Supervises a single stage's execution: retries with backoff, a
//! circuit breaker, a timeout, and optional budget/sandbox/learning
//! hooks.
//!
//! The orchestrator never calls a `Stage` directly; every call is routed
//! through a `Supervisor` so that retry, timeout, and circuit-breaker
//! policy live in exactly one place.

mod budget;
mod circuit_breaker;
mod learning;
mod retry;
mod sandbox;
mod stats;

pub use budget::BudgetTracker;
pub use circuit_breaker::CircuitBreaker;
pub use learning::{FailureEvent, LearningAdvisor, NoOpLearningAdvisor, WorkflowPlan};
pub use sandbox::{ResourceLimits, Sandbox};
pub use stats::{HealthReport, StageHealth, StageStats};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancellation::CancellationToken;
use crate::card::Card;
use crate::context::{Context, NS_RETRY};
use crate::errors::ArtemisError;
use crate::events::EventSink;
use crate::stage::{Stage, StageResult};
use crate::state_machine::StateMachine;

/// Per-stage retry, backoff, timeout, and circuit-breaker policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// Maximum retry attempts after the first, before surfacing a
    /// terminal failure.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay_seconds: f64,
    /// Multiplier applied to the delay on each subsequent retry.
    pub backoff_multiplier: f64,
    /// Wall-clock ceiling for a single attempt.
    pub timeout_seconds: u64,
    /// Consecutive failures before the circuit breaker opens.
    pub cb_threshold: u32,
    /// Seconds the breaker stays open before allowing a trial attempt.
    pub cb_timeout: u64,
}

impl Default for RecoveryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 5.0,
            backoff_multiplier: 2.0,
            timeout_seconds: 300,
            cb_threshold: 5,
            cb_timeout: 300,
        }
    }
}

/// One entry in a stage's retry history, appended to the context's
/// `retry` namespace on every failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryHistoryEntry {
    /// The stage being retried.
    pub stage: String,
    /// The attempt number that failed (1-indexed).
    pub attempt: u32,
    /// The failure reason reported by the stage.
    pub reason: String,
    /// When the attempt failed.
    pub timestamp: String,
}

struct StageRuntime {
    breaker: Mutex<CircuitBreaker>,
    stats: Mutex<StageStats>,
}

/// Supervises stage executions on behalf of the orchestrator.
pub struct Supervisor {
    strategies: HashMap<String, RecoveryStrategy>,
    default_strategy: RecoveryStrategy,
    runtimes: Mutex<HashMap<String, Arc<StageRuntime>>>,
    state_machine: Arc<StateMachine>,
    event_sink: Arc<dyn EventSink>,
    budget: Option<Arc<BudgetTracker>>,
    sandbox: Option<Arc<Sandbox>>,
    learning: Arc<dyn LearningAdvisor>,
}

impl Supervisor {
    /// Creates a supervisor with the default recovery strategy applied
    /// to every stage unless overridden.
    #[must_use]
    pub fn new(state_machine: Arc<StateMachine>, event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            strategies: HashMap::new(),
            default_strategy: RecoveryStrategy::default(),
            runtimes: Mutex::new(HashMap::new()),
            state_machine,
            event_sink,
            budget: None,
            sandbox: None,
            learning: Arc::new(NoOpLearningAdvisor),
        }
    }

    /// Overrides the recovery strategy for a specific stage.
    #[must_use]
    pub fn with_strategy(mut self, stage_name: impl Into<String>, strategy: RecoveryStrategy) -> Self {
        self.strategies.insert(stage_name.into(), strategy);
        self
    }

    /// Attaches a budget tracker; stages whose results include a
    /// `cost` field will have it charged against it.
    #[must_use]
    pub fn with_budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Attaches a sandbox for pre-execution scanning.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Arc<Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Attaches a learning advisor consulted on terminal failures.
    #[must_use]
    pub fn with_learning(mut self, advisor: Arc<dyn LearningAdvisor>) -> Self {
        self.learning = advisor;
        self
    }

    fn strategy_for(&self, stage_name: &str) -> RecoveryStrategy {
        self.strategies
            .get(stage_name)
            .cloned()
            .unwrap_or_else(|| self.default_strategy.clone())
    }

    fn runtime_for(&self, stage_name: &str, strategy: &RecoveryStrategy) -> Arc<StageRuntime> {
        self.runtimes
            .lock()
            .entry(stage_name.to_string())
            .or_insert_with(|| {
                Arc::new(StageRuntime {
                    breaker: Mutex::new(CircuitBreaker::new(strategy.cb_threshold, strategy.cb_timeout)),
                    stats: Mutex::new(StageStats::default()),
                })
            })
            .clone()
    }

    /// Runs `stage` under supervision: retries with backoff on failure,
    /// enforces a timeout, and consults the circuit breaker before every
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::Cancelled` if `cancellation` is already
    /// tripped, or `ArtemisError::StageTimedOut` if every retry attempt
    /// times out. A business-level stage failure that exhausts its
    /// retries is returned as `Ok` with `StageStatus::Fail` so the
    /// orchestrator can route it through recovery rather than treating
    /// it as an infrastructure error.
    pub async fn execute_with_supervision(
        &self,
        stage: Arc<dyn Stage>,
        card: &Card,
        context: &Context,
        cancellation: &CancellationToken,
    ) -> Result<StageResult, ArtemisError> {
        let stage_name = stage.name().to_string();
        let strategy = self.strategy_for(&stage_name);
        let runtime = self.runtime_for(&stage_name, &strategy);

        if cancellation.is_cancelled() {
            return Err(ArtemisError::Cancelled(stage_name));
        }

        if runtime.breaker.lock().is_open() {
            self.event_sink.try_emit(
                "circuit_open_skip",
                Some(serde_json::json!({ "stage": stage_name })),
            );
            return Ok(StageResult::skip("circuit_open"));
        }

        if let Some(sandbox) = &self.sandbox {
            let scan_content = format!("{}\n{}", card.title, card.description);
            sandbox.scan(&scan_content)?;
        }

        let timeout_seconds = self
            .sandbox
            .as_ref()
            .map_or(strategy.timeout_seconds, |s| s.max_seconds().min(strategy.timeout_seconds));

        let mut attempt = 0u32;
        loop {
            self.state_machine.record_stage_start(&stage_name);
            let started = Instant::now();

            let outcome = tokio::time::timeout(
                Duration::from_secs(timeout_seconds),
                stage.execute(card, context),
            )
            .await;

            let elapsed = started.elapsed().as_secs_f64();

            match outcome {
                Ok(result) if result.is_success() => {
                    if let Some(sandbox) = &self.sandbox {
                        let output_len = serde_json::to_vec(&result.data).map(|v| v.len()).unwrap_or(0);
                        sandbox.check_output_size(output_len)?;
                    }
                    if let Some(budget) = &self.budget {
                        if let Some(cost) = result.data.get("cost").and_then(serde_json::Value::as_f64) {
                            budget.charge(cost)?;
                        }
                    }

                    runtime.breaker.lock().record_success();
                    runtime.stats.lock().record(true, elapsed);
                    self.state_machine.record_stage_end(&stage_name, true, None);
                    self.sync_circuit_state(&stage_name, &runtime);
                    return Ok(result);
                }
                Ok(result) => {
                    let reason = result.reason.clone().unwrap_or_default();
                    runtime.breaker.lock().record_failure();
                    runtime.stats.lock().record(false, elapsed);
                    self.state_machine
                        .record_stage_end(&stage_name, false, Some(reason.clone()));
                    self.sync_circuit_state(&stage_name, &runtime);

                    if attempt >= strategy.max_retries {
                        self.consult_learning(&stage_name, &reason).await;
                        return Ok(result);
                    }

                    self.record_retry(context, &stage_name, attempt + 1, &reason);
                }
                Err(_elapsed) => {
                    runtime.breaker.lock().record_failure();
                    runtime.stats.lock().record(false, elapsed);
                    self.state_machine
                        .record_stage_end(&stage_name, false, Some("timeout".to_string()));
                    self.sync_circuit_state(&stage_name, &runtime);

                    if attempt >= strategy.max_retries {
                        self.consult_learning(&stage_name, "timeout").await;
                        return Err(ArtemisError::StageTimedOut(stage_name));
                    }

                    self.record_retry(context, &stage_name, attempt + 1, "timeout");
                }
            }

            if runtime.breaker.lock().is_open() {
                return Ok(StageResult::skip("circuit_open"));
            }

            let delay = retry::backoff_delay(attempt, strategy.retry_delay_seconds, strategy.backoff_multiplier);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn sync_circuit_state(&self, stage_name: &str, runtime: &StageRuntime) {
        self.state_machine.set_circuit_state(stage_name, runtime.breaker.lock().is_open());
    }

    async fn consult_learning(&self, stage_name: &str, reason: &str) {
        let event = FailureEvent {
            stage: stage_name.to_string(),
            error_kind: "stage_failure".to_string(),
            message: reason.to_string(),
        };
        if let Some(plan) = self.learning.propose(&event).await {
            self.event_sink.try_emit(
                "learning_plan_proposed",
                Some(serde_json::json!({ "stage": stage_name, "plan": plan.actions, "confidence": plan.confidence })),
            );
        }
    }

    fn record_retry(&self, context: &Context, stage_name: &str, attempt: u32, reason: &str) {
        let entry = RetryHistoryEntry {
            stage: stage_name.to_string(),
            attempt,
            reason: reason.to_string(),
            timestamp: crate::utils::iso_timestamp(),
        };
        if let Ok(value) = serde_json::to_value(&entry) {
            context.overwrite(NS_RETRY, stage_name, value);
        }
        self.event_sink.try_emit(
            "stage_retry",
            Some(serde_json::json!({ "stage": stage_name, "attempt": attempt, "reason": reason })),
        );
    }

    /// Produces a snapshot health report across every stage that has
    /// executed at least once.
    #[must_use]
    pub fn health_report(&self) -> HealthReport {
        let runtimes = self.runtimes.lock();
        let mut stages = HashMap::new();
        let mut any_open = false;
        let mut worst_failure_rate: f64 = 0.0;

        for (name, runtime) in runtimes.iter() {
            let failure_rate = runtime.stats.lock().failure_rate();
            let circuit_open = runtime.breaker.lock().is_open();
            any_open |= circuit_open;
            worst_failure_rate = worst_failure_rate.max(failure_rate);
            stages.insert(
                name.clone(),
                StageHealth {
                    failure_rate,
                    circuit_open,
                },
            );
        }

        let overall = if any_open || worst_failure_rate > 0.5 {
            "critical"
        } else if worst_failure_rate > 0.0 {
            "degraded"
        } else {
            "healthy"
        };

        HealthReport {
            overall: overall.to_string(),
            stages,
        }
    }

    /// Forces a stage's circuit breaker closed, used by the
    /// `reset_circuit` recovery action.
    pub fn reset_circuit(&self, stage_name: &str) {
        if let Some(runtime) = self.runtimes.lock().get(stage_name) {
            runtime.breaker.lock().force_close();
        }
        self.state_machine.set_circuit_state(stage_name, false);
    }
}
