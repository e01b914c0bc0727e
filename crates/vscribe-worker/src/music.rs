//! Background music collaborator.

use std::path::Path;

use async_trait::async_trait;

use crate::error::WorkerResult;

/// Produces a background music bed of the requested duration.
///
/// The pipeline requests one bed per narrated segment and layers it
/// under that segment's voice at a matched, ducked level; generation
/// itself (model, library lookup, licensing) is entirely the
/// implementor's business.
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn generate(&self, duration_secs: f64, output: &Path) -> WorkerResult<()>;
}
