//! The fixed, canonical stage order the orchestrator runs.

/// Name of the project-analysis stage.
pub const STAGE_PROJECT_ANALYSIS: &str = "project_analysis";
/// Name of the architecture stage.
pub const STAGE_ARCHITECTURE: &str = "architecture";
/// Name of the dependency-validation stage.
pub const STAGE_DEPENDENCIES: &str = "dependencies";
/// Name of the development stage.
pub const STAGE_DEVELOPMENT: &str = "development";
/// Name of the code-review stage.
pub const STAGE_CODE_REVIEW: &str = "code_review";
/// Name of the validation stage.
pub const STAGE_VALIDATION: &str = "validation";
/// Name of the integration stage.
pub const STAGE_INTEGRATION: &str = "integration";
/// Name of the testing stage.
pub const STAGE_TESTING: &str = "testing";

/// Returns the fixed stage order the orchestrator follows for every run.
#[must_use]
pub fn stage_order() -> &'static [&'static str] {
    &[
        STAGE_PROJECT_ANALYSIS,
        STAGE_ARCHITECTURE,
        STAGE_DEPENDENCIES,
        STAGE_DEVELOPMENT,
        STAGE_CODE_REVIEW,
        STAGE_VALIDATION,
        STAGE_INTEGRATION,
        STAGE_TESTING,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed_and_complete() {
        let order = stage_order();
        assert_eq!(order.len(), 8);
        assert_eq!(order[0], STAGE_PROJECT_ANALYSIS);
        assert_eq!(order[3], STAGE_DEVELOPMENT);
        assert_eq!(order[4], STAGE_CODE_REVIEW);
        assert_eq!(order[7], STAGE_TESTING);
    }
}
