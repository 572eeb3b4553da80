//! JSON contracts for every pipeline stage.
//!
//! These shapes are load-bearing: each stage must accept and emit exactly
//! these field sets, including the `_duration_ms` bookkeeping field on every
//! stage output and the `_image_token` attached to the first stage's output.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::nutrition::FoodCandidate;

/// Apparent portion size of an item in the photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeHint {
    Xs,
    S,
    M,
    L,
    Xl,
    #[default]
    Unknown,
}

impl SizeHint {
    /// Human word used when composing database queries ("M" -> "Medium").
    pub fn as_query_word(&self) -> Option<&'static str> {
        match self {
            SizeHint::Xs => Some("XS"),
            SizeHint::S => Some("Small"),
            SizeHint::M => Some("Medium"),
            SizeHint::L => Some("Large"),
            SizeHint::Xl => Some("XL"),
            SizeHint::Unknown => None,
        }
    }
}

/// One food item spotted in the photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualItem {
    pub name: String,
    #[serde(default)]
    pub estimated_quantity: String,
    #[serde(default)]
    pub size_hint: SizeHint,
    #[serde(default)]
    pub physical_description: String,
}

/// Scene-level cues from the photo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualSceneContext {
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub background_elements: Vec<String>,
    #[serde(default)]
    pub packaging_cues: Vec<String>,
    #[serde(default)]
    pub notable_cues: Vec<String>,
}

/// Output of the vision analysis stage. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualContext {
    pub items: Vec<VisualItem>,
    #[serde(default)]
    pub context: VisualSceneContext,
    #[serde(rename = "_duration_ms", default)]
    pub duration_ms: u64,
    #[serde(rename = "_image_token", default, skip_serializing_if = "Option::is_none")]
    pub image_token: Option<String>,
}

/// Where the meal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MealSource {
    Restaurant,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestaurantType {
    FastFood,
    SitDown,
    #[default]
    Unknown,
}

/// One component of the classified dish. `volume_estimate` is populated for
/// drinks only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub size_hint: SizeHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_estimate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DishComponents {
    #[serde(default)]
    pub main: Vec<Component>,
    #[serde(default)]
    pub sides: Vec<Component>,
    #[serde(default)]
    pub drinks: Vec<Component>,
    #[serde(default)]
    pub extras: Vec<Component>,
}

/// Output of the dish classification stage.
///
/// A non-empty `restaurant_name` is a brand lock: downstream stages must not
/// override it, and a different brand from the itemizer is a recorded
/// conflict, not a silent correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishClassification {
    pub source: MealSource,
    #[serde(default)]
    pub restaurant_type: RestaurantType,
    #[serde(default)]
    pub restaurant_name: String,
    #[serde(default)]
    pub dish_name: String,
    #[serde(default)]
    pub components: DishComponents,
    #[serde(rename = "_duration_ms", default)]
    pub duration_ms: u64,
}

impl DishClassification {
    /// The locked brand, if the classifier committed to one.
    pub fn brand_lock(&self) -> Option<&str> {
        let name = self.restaurant_name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// One line of the itemized order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub portion_detail: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub mapped_from_component: String,
    #[serde(default)]
    pub nutritionix_query: String,
}

fn default_quantity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderValidation {
    #[serde(default = "default_true")]
    pub brand_lock: bool,
    #[serde(default)]
    pub detected_conflict: bool,
    #[serde(default)]
    pub notes: String,
}

fn default_true() -> bool {
    true
}

impl Default for OrderValidation {
    fn default() -> Self {
        Self {
            brand_lock: true,
            detected_conflict: false,
            notes: String::new(),
        }
    }
}

/// Output of the restaurant itemizer stage. `nl_query` is the semicolon join
/// of per-item `nutritionix_query` values, never including quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemizedOrder {
    #[serde(default)]
    pub restaurant_name: String,
    #[serde(default)]
    pub nl_query: String,
    #[serde(default, alias = "itemizer_items")]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub validation: OrderValidation,
    #[serde(rename = "_duration_ms", default)]
    pub duration_ms: u64,
}

/// Nutrition lookup outcome for one order item. `macros` is an opaque
/// per-serving payload from the provider; `None` marks an unresolved item.
/// Quantity is carried alongside and is never multiplied into `macros`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub item_name: String,
    pub quantity: f64,
    #[serde(default)]
    pub description: String,
    pub macros: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutritionix_match: Option<FoodCandidate>,
}

/// Aggregate nutrition result for one order, in input item order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroResult {
    #[serde(default)]
    pub restaurant_name: String,
    pub results: Vec<ResolvedItem>,
    #[serde(rename = "_duration_ms", default)]
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_hint_roundtrip() {
        let json = serde_json::to_string(&SizeHint::Xl).unwrap();
        assert_eq!(json, "\"XL\"");
        let back: SizeHint = serde_json::from_str("\"UNKNOWN\"").unwrap();
        assert_eq!(back, SizeHint::Unknown);
    }

    #[test]
    fn meal_source_is_total() {
        for raw in ["\"RESTAURANT\"", "\"HOME\""] {
            let src: MealSource = serde_json::from_str(raw).unwrap();
            assert!(matches!(src, MealSource::Restaurant | MealSource::Home));
        }
        assert!(serde_json::from_str::<MealSource>("\"STREET\"").is_err());
        assert!(serde_json::from_str::<MealSource>("\"\"").is_err());
    }

    #[test]
    fn visual_context_accepts_minimal_payload() {
        let ctx: VisualContext =
            serde_json::from_str(r#"{"items":[{"name":"fries"}]}"#).unwrap();
        assert_eq!(ctx.items[0].name, "fries");
        assert_eq!(ctx.items[0].size_hint, SizeHint::Unknown);
        assert!(ctx.image_token.is_none());
    }

    #[test]
    fn duration_field_uses_underscore_name() {
        let order = ItemizedOrder {
            restaurant_name: "Acme Burgers".into(),
            nl_query: String::new(),
            items: vec![],
            validation: OrderValidation::default(),
            duration_ms: 42,
        };
        let v = serde_json::to_value(&order).unwrap();
        assert_eq!(v["_duration_ms"], 42);
    }

    #[test]
    fn itemizer_items_alias_is_accepted() {
        let order: ItemizedOrder = serde_json::from_str(
            r#"{"restaurant_name":"X","itemizer_items":[{"item_name":"Fries"}]}"#,
        )
        .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 1.0);
    }
}
