//! Dish classification stage: restaurant vs home, brand detection, and the
//! component breakdown the itemizer works from.

use std::sync::Arc;

use crate::error::StageError;
use crate::image_store::ImageRecord;
use crate::model::{CompletionRequest, ModelProvider};
use crate::salvage::parse_stage_output;
use crate::stages::timed_complete;
use crate::types::{Component, DishClassification, SizeHint, VisualContext};

pub struct DishClassifier {
    provider: Arc<dyn ModelProvider>,
    prompt: String,
}

impl DishClassifier {
    pub fn new(provider: Arc<dyn ModelProvider>, prompt: String) -> Self {
        Self { provider, prompt }
    }

    /// Classify the meal from the visual context. The photo is re-attached
    /// when available so branding visible in the image can inform the call.
    pub async fn classify(
        &self,
        visual: &VisualContext,
        image: Option<&ImageRecord>,
    ) -> Result<DishClassification, StageError> {
        let user_text = serde_json::to_string(visual)
            .map_err(|e| StageError::Schema(e.to_string()))?;

        let mut request = CompletionRequest::new(&self.prompt, user_text);
        if let Some(image) = image {
            request = request.with_image(image.bytes.clone(), &image.mime_type);
        }

        let (raw, duration_ms) = timed_complete(self.provider.as_ref(), request).await?;
        let mut classification: DishClassification = parse_stage_output(&raw)?;
        classification.duration_ms = duration_ms;

        recall_missed_drink(&mut classification, visual);

        tracing::debug!(
            source = ?classification.source,
            brand = %classification.restaurant_name,
            "dish classified"
        );
        Ok(classification)
    }
}

/// Models regularly drop the drink from combo meals even when the vision
/// stage recorded a branded cup. When the classifier returns no drinks but
/// the packaging cues show one, synthesize a soft drink component from the
/// cue text rather than re-prompting.
fn recall_missed_drink(classification: &mut DishClassification, visual: &VisualContext) {
    if !classification.components.drinks.is_empty() {
        return;
    }

    let cue = visual
        .context
        .packaging_cues
        .iter()
        .find(|cue| is_drink_cue(cue));
    let Some(cue) = cue else { return };

    let ounces = parse_ounces(cue);
    let size_hint = match ounces {
        Some(oz) if oz <= 12 => SizeHint::S,
        Some(oz) if oz <= 21 => SizeHint::M,
        Some(_) => SizeHint::L,
        None => SizeHint::Unknown,
    };

    tracing::debug!(cue = %cue, "recalling drink missed by classifier");
    classification.components.drinks.push(Component {
        name: "soft drink".to_string(),
        size_hint,
        volume_estimate: ounces.map(|oz| format!("{} fl oz", oz)),
    });
}

fn is_drink_cue(cue: &str) -> bool {
    let cue = cue.to_lowercase();
    ["cup", "drink", "soda", "beverage", "fountain"]
        .iter()
        .any(|kw| cue.contains(kw))
}

/// First number immediately followed by an "oz" / "fl oz" marker.
fn parse_ounces(cue: &str) -> Option<u32> {
    let lower = cue.to_lowercase();
    let oz_at = lower.find("oz")?;
    let digits: String = lower[..oz_at]
        .trim_end()
        .trim_end_matches("fl")
        .trim_end()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}
