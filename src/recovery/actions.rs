//! Recovery action handlers: the contract every workflow step follows.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{Context, NS_DIAGNOSTICS};

/// The result of running one action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Whether the action succeeded.
    pub ok: bool,
    /// A human-readable message, logged and attached to diagnostics.
    pub message: String,
}

impl ActionOutcome {
    /// Builds a success outcome.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    /// Builds a failure outcome.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// The contract every recovery action handler implements:
/// `Execute(context) -> (ok, message)`.
#[async_trait]
pub trait ActionSignature: Send + Sync {
    /// Runs the action against the shared context.
    async fn execute(&self, context: &Context) -> ActionOutcome;
}

struct LoggingAction {
    name: &'static str,
}

#[async_trait]
impl ActionSignature for LoggingAction {
    async fn execute(&self, context: &Context) -> ActionOutcome {
        context.overwrite(
            NS_DIAGNOSTICS,
            self.name,
            serde_json::json!({ "ran_at": crate::utils::iso_timestamp() }),
        );
        ActionOutcome::ok(format!("{} completed", self.name))
    }
}

/// Looks up and runs recovery action handlers by their canonical name.
///
/// Swappable: a deployment can register replacements for any builtin
/// name, or add new ones, without touching the recovery engine itself.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionSignature>>,
}

/// The canonical action names the core ships handlers for.
pub const BUILTIN_ACTION_NAMES: &[&str] = &[
    "increase_timeout",
    "kill_hanging_process",
    "free_memory",
    "cleanup_temp_files",
    "retry_stage",
    "restart_process",
    "wait_backoff",
    "reset_circuit",
];

impl ActionRegistry {
    /// Builds a registry with no handlers registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Builds a registry with the canonical builtin handlers, each of
    /// which records that it ran to the context's diagnostics namespace
    /// and reports success. Deployments that need real process control
    /// (killing a PID, freeing memory) should register replacements via
    /// [`ActionRegistry::with_handler`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_ACTION_NAMES {
            registry = registry.with_handler(*name, Arc::new(LoggingAction { name }));
        }
        registry
    }

    /// Registers (or replaces) a handler for `name`.
    #[must_use]
    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn ActionSignature>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Runs the handler registered for `name`.
    ///
    /// An unregistered name is treated as a failed action rather than a
    /// panic, so a misconfigured workflow fails its action loop instead
    /// of crashing the recovery engine.
    pub async fn run(&self, name: &str, context: &Context) -> ActionOutcome {
        match self.handlers.get(name) {
            Some(handler) => handler.execute(context).await,
            None => ActionOutcome::failed(format!("no handler registered for action '{name}'")),
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_action_succeeds() {
        let registry = ActionRegistry::with_builtins();
        let context = Context::new();
        let outcome = registry.run("retry_stage", &context).await;
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn test_unknown_action_fails() {
        let registry = ActionRegistry::with_builtins();
        let context = Context::new();
        let outcome = registry.run("not_a_real_action", &context).await;
        assert!(!outcome.ok);
    }

    #[tokio::test]
    async fn test_custom_handler_overrides_builtin() {
        struct AlwaysFails;

        #[async_trait]
        impl ActionSignature for AlwaysFails {
            async fn execute(&self, _context: &Context) -> ActionOutcome {
                ActionOutcome::failed("nope")
            }
        }

        let registry = ActionRegistry::with_builtins().with_handler("retry_stage", Arc::new(AlwaysFails));
        let context = Context::new();
        let outcome = registry.run("retry_stage", &context).await;
        assert!(!outcome.ok);
    }
}
