//! Name-to-implementation lookup used to compose a pipeline run.

use super::Stage;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps stage name to implementation.
///
/// This is the mechanism the design notes call for in place of inline
/// dynamic dispatch scattered through the orchestrator: composition
/// happens once, by name, at startup.
#[derive(Default)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage implementation under its own name.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.insert(stage.name().to_string(), stage);
        self
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    /// Returns true if every name in `names` has a registered
    /// implementation.
    #[must_use]
    pub fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.stages.contains_key(*n))
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::context::Context;
    use crate::stage::StageResult;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Noop(&'static str);

    #[async_trait]
    impl Stage for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self, _card: &Card, _context: &Context) -> StageResult {
            StageResult::complete_empty()
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = StageRegistry::new().with_stage(Arc::new(Noop("architecture")));
        assert!(registry.get("architecture").is_some());
        assert!(registry.get("testing").is_none());
    }

    #[test]
    fn test_has_all() {
        let registry = StageRegistry::new()
            .with_stage(Arc::new(Noop("a")))
            .with_stage(Arc::new(Noop("b")));

        assert!(registry.has_all(&["a", "b"]));
        assert!(!registry.has_all(&["a", "c"]));
    }
}
