//! The append-only namespaced store threaded between stages.

use crate::errors::DataConflictError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Namespace holding the most recent code-review retry metadata.
pub const NS_RETRY: &str = "retry";
/// Namespace holding cross-stage signals (e.g. `current_stage`).
pub const NS_SHARED_DATA: &str = "shared_data";
/// Namespace holding supervisor/state-machine diagnostic notes.
pub const NS_DIAGNOSTICS: &str = "diagnostics";

/// The mutable, JSON-serializable context threaded between stages.
///
/// Keys are namespaced: one namespace per stage name (written only by
/// that stage), plus the three reserved namespaces above. Within a
/// namespace, keys are append-only — [`Context::write`] rejects a
/// second write to the same key. [`Context::overwrite`] exists only for
/// the `retry` namespace, whose contents are documented as "the most
/// recent retry metadata" and are expected to change every attempt.
#[derive(Debug, Default)]
pub struct Context {
    namespaces: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl Context {
    /// Creates a new, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value, failing if the key already exists in the
    /// namespace.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if `key` is already present in
    /// `namespace`.
    pub fn write(
        &self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DataConflictError> {
        let namespace = namespace.into();
        let key = key.into();
        let mut namespaces = self.namespaces.write();
        let bucket = namespaces.entry(namespace.clone()).or_default();

        if bucket.contains_key(&key) {
            return Err(DataConflictError::new(namespace, key));
        }

        bucket.insert(key, value);
        Ok(())
    }

    /// Overwrites a value regardless of prior presence.
    ///
    /// Reserved for the `retry` namespace and for internal bookkeeping;
    /// stage implementations should prefer [`Context::write`].
    pub fn overwrite(
        &self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.namespaces
            .write()
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), value);
    }

    /// Reads a single value.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        self.namespaces.read().get(namespace).and_then(|b| b.get(key)).cloned()
    }

    /// Reads an entire namespace.
    #[must_use]
    pub fn namespace(&self, namespace: &str) -> HashMap<String, serde_json::Value> {
        self.namespaces.read().get(namespace).cloned().unwrap_or_default()
    }

    /// Returns true if the namespace has any entries.
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.read().get(namespace).is_some_and(|b| !b.is_empty())
    }

    /// Writes a stage's full result object under its own namespace,
    /// replacing any prior (e.g. a failed-attempt partial) result. This
    /// is the one place a namespace is wholesale replaced rather than
    /// merged: a re-executed stage's fresh result supersedes its own
    /// stale one.
    pub fn set_stage_result(&self, stage_name: &str, result: HashMap<String, serde_json::Value>) {
        self.namespaces.write().insert(stage_name.to_string(), result);
    }

    /// Reads a stage's result namespace.
    #[must_use]
    pub fn stage_result(&self, stage_name: &str) -> Option<HashMap<String, serde_json::Value>> {
        self.namespaces.read().get(stage_name).cloned()
    }

    /// Returns a snapshot of the full context, suitable for embedding in
    /// a report or persisting.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, HashMap<String, serde_json::Value>> {
        self.namespaces.read().clone()
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            namespaces: RwLock::new(self.namespaces.read().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_get() {
        let ctx = Context::new();
        ctx.write("architecture", "decision", serde_json::json!("microservices")).unwrap();
        assert_eq!(
            ctx.get("architecture", "decision"),
            Some(serde_json::json!("microservices"))
        );
    }

    #[test]
    fn test_write_conflict() {
        let ctx = Context::new();
        ctx.write("architecture", "decision", serde_json::json!(1)).unwrap();
        let result = ctx.write("architecture", "decision", serde_json::json!(2));
        assert!(result.is_err());
    }

    #[test]
    fn test_overwrite_allowed_for_retry_namespace() {
        let ctx = Context::new();
        ctx.overwrite(NS_RETRY, "retry_attempt", serde_json::json!(1));
        ctx.overwrite(NS_RETRY, "retry_attempt", serde_json::json!(2));
        assert_eq!(ctx.get(NS_RETRY, "retry_attempt"), Some(serde_json::json!(2)));
    }

    #[test]
    fn test_namespaces_are_independent() {
        let ctx = Context::new();
        ctx.write("development", "files_changed", serde_json::json!(3)).unwrap();
        ctx.write("code_review", "files_changed", serde_json::json!(1)).unwrap();

        assert_eq!(ctx.get("development", "files_changed"), Some(serde_json::json!(3)));
        assert_eq!(ctx.get("code_review", "files_changed"), Some(serde_json::json!(1)));
    }

    #[test]
    fn test_stage_result_round_trip() {
        let ctx = Context::new();
        let mut result = HashMap::new();
        result.insert("status".to_string(), serde_json::json!("COMPLETE"));
        ctx.set_stage_result("project_analysis", result.clone());

        assert_eq!(ctx.stage_result("project_analysis"), Some(result));
    }

    #[test]
    fn test_to_dict_snapshot() {
        let ctx = Context::new();
        ctx.write(NS_SHARED_DATA, "current_stage", serde_json::json!("architecture")).unwrap();
        let dict = ctx.to_dict();
        assert!(dict.contains_key(NS_SHARED_DATA));
    }
}
