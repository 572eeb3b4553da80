//! Stage prompt templates.
//!
//! Prompt wording is swappable; the only contract the pipeline depends on is
//! each stage's JSON output schema. The built-in templates state those
//! schemas and nothing the code relies on beyond them.

/// Prompt templates for the four stages. Construct with `Default` and
/// override individual templates to experiment with wording.
#[derive(Debug, Clone)]
pub struct StagePrompts {
    pub visual_context: String,
    pub dish_classifier: String,
    pub restaurant_itemizer: String,
    pub home_meal: String,
}

impl Default for StagePrompts {
    fn default() -> Self {
        Self {
            visual_context: VISUAL_CONTEXT_PROMPT.to_string(),
            dish_classifier: DISH_CLASSIFIER_PROMPT.to_string(),
            restaurant_itemizer: RESTAURANT_ITEMIZER_PROMPT.to_string(),
            home_meal: HOME_MEAL_PROMPT.to_string(),
        }
    }
}

const VISUAL_CONTEXT_PROMPT: &str = r#"You are the Visual Context analyzer. Look at the food photo and return ONLY a single JSON object, no prose, no code fences:
{
  "items": [{"name": string, "estimated_quantity": string, "size_hint": "XS"|"S"|"M"|"L"|"XL"|"UNKNOWN", "physical_description": string}],
  "context": {"environment": string, "background_elements": [string], "packaging_cues": [string], "notable_cues": [string]}
}
Count visible pieces carefully. Record branded cups, bags, printed box counts, and fl oz markings in packaging_cues."#;

const DISH_CLASSIFIER_PROMPT: &str = r#"You are the Dish Classifier. Given the visual context JSON (and the photo when attached), return ONLY a single JSON object:
{
  "source": "RESTAURANT"|"HOME",
  "restaurant_type": "FAST_FOOD"|"SIT_DOWN"|"UNKNOWN",
  "restaurant_name": string,
  "dish_name": string,
  "components": {
    "main":  [{"name": string, "size_hint": "XS"|"S"|"M"|"L"|"XL"|"UNKNOWN"}],
    "sides": [{"name": string, "size_hint": "..."}],
    "drinks": [{"name": string, "size_hint": "...", "volume_estimate": string}],
    "extras": [{"name": string, "size_hint": "..."}]
  }
}
Set restaurant_name ONLY when the brand is clearly indicated by packaging or logos; otherwise leave it empty."#;

const RESTAURANT_ITEMIZER_PROMPT: &str = r#"You are the Restaurant Meal Itemizer. Given the visual context and dish classification JSON (and the photo when attached), return ONLY a single JSON object:
{
  "restaurant_name": string,
  "nl_query": string,
  "items": [{"item_name": string, "quantity": number, "size": string, "portion_detail": string, "description": string, "confidence": number, "mapped_from_component": "main"|"sides"|"drinks"|"extras", "nutritionix_query": string}],
  "validation": {"brand_lock": true, "detected_conflict": boolean, "notes": string}
}
restaurant_name must match the classified brand exactly; if cues contradict it, keep the locked brand rules and set validation.detected_conflict=true with a brief note. nutritionix_query must include brand + menu name + size/count, never quantities. nl_query is all nutritionix_query values joined by "; "."#;

const HOME_MEAL_PROMPT: &str = r#"You are the Home-Cooked Meal analyzer. Given the dish classification JSON (and the photo when attached), estimate per-item calories and macros. Return ONLY a single JSON object with an "items" array and a "confidence" number between 0 and 1. Every item needs quantity and portion_detail."#;
