//! Process configuration.
//!
//! `Config` is built once at process start from the environment and
//! validated eagerly so that `ConfigurationInvalid` can fail fast, before
//! any stage runs. It is never a lazily-initialized global:
//! callers construct one and pass it by reference to whatever needs it.

use crate::errors::ArtemisError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Default number of developer workers that run concurrently inside the
/// `development` stage.
pub const DEFAULT_MAX_PARALLEL_DEVELOPERS: usize = 2;

/// Process-wide configuration, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory relative paths are resolved against.
    pub repo_root: PathBuf,
    /// Path to the RAG store's backing file (for file-backed RAG impls).
    pub rag_db_path: PathBuf,
    /// Directory state-machine snapshots are written to.
    pub state_dir: PathBuf,
    /// Directory pipeline reports are written to.
    pub report_dir: PathBuf,
    /// Number of developer workers to run concurrently in `development`.
    pub max_parallel_developers: usize,
    /// Daily budget limit, in the budget tracker's unit (e.g. USD).
    pub daily_budget: Option<f64>,
    /// Monthly budget limit, in the same unit.
    pub monthly_budget: Option<f64>,
    /// Provider API keys, forwarded opaquely to external stage
    /// implementations. The core never reads or interprets these.
    pub provider_keys: HashMap<String, String>,
}

impl Config {
    /// Loads configuration from the process environment, applying the
    /// documented defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::ConfigurationInvalid` if `validate` rejects
    /// the resulting configuration.
    pub fn from_env() -> Result<Self, ArtemisError> {
        let repo_root = std::env::var("ARTEMIS_REPO_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let rag_db_path = std::env::var("ARTEMIS_RAG_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| repo_root.join(".artemis").join("rag.json"));

        let state_dir = std::env::var("ARTEMIS_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| repo_root.join(".artemis").join("state"));

        let report_dir = std::env::var("ARTEMIS_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| repo_root.join(".artemis").join("reports"));

        let max_parallel_developers = std::env::var("ARTEMIS_MAX_PARALLEL_DEVELOPERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_PARALLEL_DEVELOPERS);

        let daily_budget = std::env::var("ARTEMIS_DAILY_BUDGET")
            .ok()
            .and_then(|v| v.parse().ok());

        let monthly_budget = std::env::var("ARTEMIS_MONTHLY_BUDGET")
            .ok()
            .and_then(|v| v.parse().ok());

        let mut provider_keys = HashMap::new();
        for (key, value) in std::env::vars() {
            if let Some(provider) = key.strip_prefix("ARTEMIS_PROVIDER_KEY_") {
                provider_keys.insert(provider.to_lowercase(), value);
            }
        }

        let config = Self {
            repo_root,
            rag_db_path,
            state_dir,
            report_dir,
            max_parallel_developers,
            daily_budget,
            monthly_budget,
            provider_keys,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration, failing fast before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::ConfigurationInvalid` describing the first
    /// violation found.
    pub fn validate(&self) -> Result<(), ArtemisError> {
        if self.max_parallel_developers == 0 {
            return Err(ArtemisError::ConfigurationInvalid(
                "max_parallel_developers must be at least 1".to_string(),
            ));
        }

        if let Some(daily) = self.daily_budget {
            if daily < 0.0 {
                return Err(ArtemisError::ConfigurationInvalid(
                    "daily_budget must not be negative".to_string(),
                ));
            }
        }

        if let (Some(daily), Some(monthly)) = (self.daily_budget, self.monthly_budget) {
            if daily > monthly {
                return Err(ArtemisError::ConfigurationInvalid(
                    "daily_budget must not exceed monthly_budget".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let repo_root = PathBuf::from(".");
        Self {
            rag_db_path: repo_root.join(".artemis").join("rag.json"),
            state_dir: repo_root.join(".artemis").join("state"),
            report_dir: repo_root.join(".artemis").join("reports"),
            repo_root,
            max_parallel_developers: DEFAULT_MAX_PARALLEL_DEVELOPERS,
            daily_budget: None,
            monthly_budget: None,
            provider_keys: HashMap::new(),
        }
    }
}
