//! Home-cooked meal stage. Unlike the restaurant path, the output schema is
//! owned by the prompt; the pipeline treats it as an opaque payload and only
//! guarantees the duration bookkeeping field.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::StageError;
use crate::image_store::ImageRecord;
use crate::model::{CompletionRequest, ModelProvider};
use crate::salvage::salvage_json;
use crate::stages::timed_complete;
use crate::types::DishClassification;

pub struct HomeMealAnalyzer {
    provider: Arc<dyn ModelProvider>,
    prompt: String,
}

impl HomeMealAnalyzer {
    pub fn new(provider: Arc<dyn ModelProvider>, prompt: String) -> Self {
        Self { provider, prompt }
    }

    /// Estimate nutrition for a home-cooked meal directly from the model.
    pub async fn analyze(
        &self,
        classification: &DishClassification,
        image: Option<&ImageRecord>,
    ) -> Result<JsonValue, StageError> {
        let user_text = serde_json::to_string(classification)
            .map_err(|e| StageError::Schema(e.to_string()))?;

        let mut request =
            CompletionRequest::new(&self.prompt, user_text).with_max_tokens(1500);
        if let Some(image) = image {
            request = request.with_image(image.bytes.clone(), &image.mime_type);
        }

        let (raw, duration_ms) = timed_complete(self.provider.as_ref(), request).await?;
        let mut payload = salvage_json(&raw)?;

        match payload.as_object_mut() {
            Some(obj) => {
                obj.insert("_duration_ms".to_string(), JsonValue::from(duration_ms));
            }
            None => {
                return Err(StageError::Schema(
                    "home meal output is not a JSON object".to_string(),
                ));
            }
        }

        tracing::debug!("home meal analyzed");
        Ok(payload)
    }
}
