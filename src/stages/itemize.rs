//! Restaurant itemization stage: turn the classified dish into concrete,
//! lookup-ready menu items.

use std::sync::Arc;

use serde_json::json;

use crate::error::StageError;
use crate::image_store::ImageRecord;
use crate::model::{CompletionRequest, ModelProvider};
use crate::nutrition::normalize_brand;
use crate::salvage::parse_stage_output;
use crate::stages::timed_complete;
use crate::types::{DishClassification, ItemizedOrder, VisualContext};

pub struct RestaurantItemizer {
    provider: Arc<dyn ModelProvider>,
    prompt: String,
}

impl RestaurantItemizer {
    pub fn new(provider: Arc<dyn ModelProvider>, prompt: String) -> Self {
        Self { provider, prompt }
    }

    /// Itemize a restaurant meal. The classifier's non-empty brand is a lock:
    /// a differing itemizer brand is recorded as a conflict, never rewritten
    /// and never silently accepted.
    pub async fn itemize(
        &self,
        visual: &VisualContext,
        classification: &DishClassification,
        image: Option<&ImageRecord>,
    ) -> Result<ItemizedOrder, StageError> {
        let user_text = serde_json::to_string(&json!({
            "visual_context": visual,
            "dish_classification": classification,
        }))
        .map_err(|e| StageError::Schema(e.to_string()))?;

        let mut request =
            CompletionRequest::new(&self.prompt, user_text).with_max_tokens(1500);
        if let Some(image) = image {
            request = request.with_image(image.bytes.clone(), &image.mime_type);
        }

        let (raw, duration_ms) = timed_complete(self.provider.as_ref(), request).await?;
        let mut order: ItemizedOrder = parse_stage_output(&raw)?;
        order.duration_ms = duration_ms;

        // The joined query is derived state; recompute it so a model that
        // forgot or mangled it cannot desynchronize it from the items.
        order.nl_query = order
            .items
            .iter()
            .map(|item| item.nutritionix_query.trim())
            .filter(|q| !q.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        enforce_brand_lock(&mut order, classification);

        tracing::debug!(
            brand = %order.restaurant_name,
            items = order.items.len(),
            conflict = order.validation.detected_conflict,
            "order itemized"
        );
        Ok(order)
    }
}

fn enforce_brand_lock(order: &mut ItemizedOrder, classification: &DishClassification) {
    let Some(locked) = classification.brand_lock() else {
        return;
    };

    if order.restaurant_name.trim().is_empty() {
        // An omitted brand is not a disagreement.
        order.restaurant_name = locked.to_string();
        return;
    }

    if normalize_brand(&order.restaurant_name) != normalize_brand(locked) {
        order.validation.detected_conflict = true;
        let note = format!(
            "itemizer brand '{}' differs from locked brand '{}'",
            order.restaurant_name, locked
        );
        tracing::warn!(%note, "brand lock conflict");
        if order.validation.notes.is_empty() {
            order.validation.notes = note;
        } else {
            order.validation.notes = format!("{}; {}", order.validation.notes, note);
        }
    }
}
