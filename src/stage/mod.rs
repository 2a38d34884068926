//! The stage interface and its supporting types.

mod names;
mod registry;
mod result;

pub use names::{stage_order, STAGE_ARCHITECTURE, STAGE_CODE_REVIEW, STAGE_DEPENDENCIES,
    STAGE_DEVELOPMENT, STAGE_INTEGRATION, STAGE_PROJECT_ANALYSIS, STAGE_TESTING, STAGE_VALIDATION};
pub use registry::StageRegistry;
pub use result::{StageResult, StageStatus};

use crate::card::Card;
use crate::context::Context;
use async_trait::async_trait;
use std::fmt::Debug;

/// A single unit of work in the pipeline.
///
/// Every stage exposes exactly one operation. A stage must be
/// idempotent under retry: calling `execute` twice with the same inputs
/// must either produce an equivalent result, or detect a prior partial
/// result already recorded under its own context namespace and advance
/// safely from there.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// The canonical name this stage writes its result under.
    fn name(&self) -> &str;

    /// Executes the stage against an immutable card and the shared,
    /// mutable context.
    async fn execute(&self, card: &Card, context: &Context) -> StageResult;
}
