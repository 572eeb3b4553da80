use crate::image_store::ImageStoreError;
use crate::model::ModelError;
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    VisualContext,
    DishClassification,
    Itemization,
    NutritionLookup,
    HomeAnalysis,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::VisualContext => "visual_context",
            StageName::DishClassification => "dish_classification",
            StageName::Itemization => "itemization",
            StageName::NutritionLookup => "nutrition_lookup",
            StageName::HomeAnalysis => "home_analysis",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from running a single model-driven stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("model provider unavailable: {0}")]
    Upstream(String),

    #[error("model output failed schema validation: {0}")]
    Schema(String),
}

impl From<ModelError> for StageError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::ParseError(msg) => StageError::Schema(msg),
            other => StageError::Upstream(other.to_string()),
        }
    }
}

/// Fatal error for one pipeline run. Per-item nutrition failures are never
/// surfaced here; they degrade to unresolved markers instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: StageName,
        #[source]
        source: StageError,
    },

    #[error(transparent)]
    ImageStore(#[from] ImageStoreError),

    #[error("pipeline run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn stage(stage: StageName, source: StageError) -> Self {
        PipelineError::Stage { stage, source }
    }

    /// The furthest stage reached before failure, when one is known.
    pub fn failed_stage(&self) -> Option<StageName> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
