//! Visual context stage: photo in, item inventory plus scene cues out.

use std::sync::Arc;

use crate::error::StageError;
use crate::image_store::ImageRecord;
use crate::model::{CompletionRequest, ModelProvider};
use crate::salvage::parse_stage_output;
use crate::stages::timed_complete;
use crate::types::VisualContext;

pub struct VisionAnalyzer {
    provider: Arc<dyn ModelProvider>,
    prompt: String,
}

impl VisionAnalyzer {
    pub fn new(provider: Arc<dyn ModelProvider>, prompt: String) -> Self {
        Self { provider, prompt }
    }

    /// Analyze the photo. The store token is attached by the orchestrator
    /// once the stage succeeds; this stage never sees it.
    pub async fn analyze(&self, image: &ImageRecord) -> Result<VisualContext, StageError> {
        let request = CompletionRequest::new(&self.prompt, "Analyze this meal photo.")
            .with_image(image.bytes.clone(), &image.mime_type);

        let (raw, duration_ms) = timed_complete(self.provider.as_ref(), request).await?;
        let mut context: VisualContext = parse_stage_output(&raw)?;
        context.duration_ms = duration_ms;

        tracing::debug!(
            items = context.items.len(),
            cues = context.context.packaging_cues.len(),
            "visual context extracted"
        );
        Ok(context)
    }
}
