//! Optional pre-execution scanning and resource ceilings for stages that
//! run untrusted developer-generated content.

use crate::errors::ArtemisError;

/// Patterns that cause a pre-execution scan to block a stage outright.
///
/// Intentionally conservative: these are substrings, not a full static
/// analyzer, matched against the content a stage is about to execute or
/// persist.
const DEFAULT_DENYLIST: &[&str] = &["rm -rf /", "curl | sh", "eval(", ":(){ :|:& };:"];

/// Resource ceilings applied while a stage runs under the sandbox.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum wall-clock seconds a single attempt may run.
    pub max_seconds: u64,
    /// Maximum output bytes a stage may produce before being cut off.
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_seconds: 300,
            max_output_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Scans stage-bound content and enforces resource ceilings.
#[derive(Debug, Clone)]
pub struct Sandbox {
    denylist: Vec<String>,
    limits: ResourceLimits,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect(),
            limits: ResourceLimits::default(),
        }
    }
}

impl Sandbox {
    /// Creates a sandbox with the default denylist and resource limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Adds an extra denylist pattern.
    #[must_use]
    pub fn with_denied_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.denylist.push(pattern.into());
        self
    }

    /// Scans `content` for denylisted patterns before a stage is
    /// allowed to execute it.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::SandboxBlockedByScan` naming the matched
    /// pattern.
    pub fn scan(&self, content: &str) -> Result<(), ArtemisError> {
        for pattern in &self.denylist {
            if content.contains(pattern.as_str()) {
                return Err(ArtemisError::SandboxBlockedByScan(pattern.clone()));
            }
        }
        Ok(())
    }

    /// Checks produced output against the configured byte ceiling.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::SandboxResourceExceeded` if `output_len`
    /// exceeds the configured limit.
    pub fn check_output_size(&self, output_len: usize) -> Result<(), ArtemisError> {
        if output_len > self.limits.max_output_bytes {
            return Err(ArtemisError::SandboxResourceExceeded(format!(
                "output of {output_len} bytes exceeds limit of {}",
                self.limits.max_output_bytes
            )));
        }
        Ok(())
    }

    /// The configured wall-clock ceiling, used by the supervisor to size
    /// its per-attempt timeout.
    #[must_use]
    pub fn max_seconds(&self) -> u64 {
        self.limits.max_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_blocks_denylisted_content() {
        let sandbox = Sandbox::new();
        let err = sandbox.scan("run: rm -rf / --no-preserve-root").unwrap_err();
        assert!(matches!(err, ArtemisError::SandboxBlockedByScan(_)));
    }

    #[test]
    fn test_scan_allows_clean_content() {
        let sandbox = Sandbox::new();
        assert!(sandbox.scan("cargo build --release").is_ok());
    }

    #[test]
    fn test_output_size_enforced() {
        let sandbox = Sandbox::new().with_limits(ResourceLimits {
            max_seconds: 10,
            max_output_bytes: 10,
        });
        assert!(sandbox.check_output_size(5).is_ok());
        assert!(sandbox.check_output_size(50).is_err());
    }

    #[test]
    fn test_custom_denylist_pattern() {
        let sandbox = Sandbox::new().with_denied_pattern("DROP TABLE");
        assert!(sandbox.scan("DROP TABLE users;").is_err());
    }
}
