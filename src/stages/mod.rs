//! Model-driven pipeline stages.
//!
//! Each stage follows the same path: build a completion request, call the
//! model provider, repair and validate the JSON output, and stamp the elapsed
//! time onto the result. Stage-specific post-processing (drink recall, brand
//! lock checks, query recomputation) happens after validation, in code,
//! never by re-prompting.

mod classify;
mod home;
mod itemize;
mod visual;

pub use classify::DishClassifier;
pub use home::HomeMealAnalyzer;
pub use itemize::RestaurantItemizer;
pub use visual::VisionAnalyzer;

use std::time::Instant;

use crate::error::StageError;
use crate::model::{CompletionRequest, ModelProvider};

/// Run one completion and measure it. Provider errors map onto
/// `StageError::Upstream` except parse failures, which are schema errors.
pub(crate) async fn timed_complete(
    provider: &dyn ModelProvider,
    request: CompletionRequest,
) -> Result<(String, u64), StageError> {
    let start = Instant::now();
    let raw = provider.complete(request).await?;
    Ok((raw, start.elapsed().as_millis() as u64))
}
