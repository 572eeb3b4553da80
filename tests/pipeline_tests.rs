//! End-to-end pipeline runs against fake model and nutrition providers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use mealscan::nutrition::MockNutritionProvider;
use mealscan::{
    CacheKey, Config, FakeModelProvider, ImageStore, InstantResults, MacroCache, ModelConfig,
    ModelProvider, NutritionProvider, NutritionixConfig, PipelineError, PipelineOrchestrator,
    RetentionPolicy,
};
use mealscan::error::StageName;
use mealscan::prompts::StagePrompts;

const VISUAL_RESPONSE: &str = r#"{
    "items": [
        {"name": "burger", "estimated_quantity": "1", "size_hint": "M", "physical_description": "sesame bun"},
        {"name": "fries", "estimated_quantity": "1 serving", "size_hint": "M", "physical_description": "golden fries in branded sleeve"}
    ],
    "context": {
        "environment": "fast food tray",
        "packaging_cues": ["Acme Burgers fry sleeve"]
    }
}"#;

const CLASSIFY_RESTAURANT: &str = r#"{
    "source": "RESTAURANT",
    "restaurant_type": "FAST_FOOD",
    "restaurant_name": "Acme Burgers",
    "dish_name": "burger combo",
    "components": {
        "main": [{"name": "cheeseburger", "size_hint": "M"}],
        "sides": [{"name": "fries", "size_hint": "M"}]
    }
}"#;

const ITEMIZE_RESPONSE: &str = r#"{
    "restaurant_name": "Acme Burgers",
    "items": [
        {"item_name": "Fries", "quantity": 1, "size": "M", "confidence": 0.9,
         "mapped_from_component": "sides", "nutritionix_query": ""}
    ],
    "validation": {"brand_lock": true, "detected_conflict": false, "notes": ""}
}"#;

const CLASSIFY_HOME: &str = r#"{
    "source": "HOME",
    "dish_name": "pasta with tomato sauce",
    "components": {"main": [{"name": "pasta", "size_hint": "M"}]}
}"#;

const HOME_RESPONSE: &str = r#"{
    "items": [{"name": "pasta", "calories": 420, "quantity": 1, "portion_detail": "1 bowl"}],
    "confidence": 0.7
}"#;

fn fake_model(classify_response: &str) -> Arc<FakeModelProvider> {
    let fake = FakeModelProvider::new();
    fake.add_response("visual context analyzer", VISUAL_RESPONSE);
    fake.add_response("dish classifier", classify_response);
    fake.add_response("restaurant meal itemizer", ITEMIZE_RESPONSE);
    fake.add_response("home-cooked meal analyzer", HOME_RESPONSE);
    Arc::new(fake)
}

fn fries_instant() -> InstantResults {
    serde_json::from_value(json!({
        "branded": [{
            "food_name": "Fries",
            "brand_name": "Acme Burgers",
            "nix_item_id": "fries-m",
            "nf_calories": 320.0
        }],
        "common": []
    }))
    .unwrap()
}

struct Harness {
    model: Arc<FakeModelProvider>,
    nutrition: Arc<MockNutritionProvider>,
    store: Arc<ImageStore>,
    cache: Arc<MacroCache>,
    pipeline: PipelineOrchestrator,
}

fn harness(classify_response: &str) -> Harness {
    let model = fake_model(classify_response);
    let nutrition = Arc::new(MockNutritionProvider::new());
    let store = Arc::new(ImageStore::new(RetentionPolicy::KeepForever));
    let cache = Arc::new(MacroCache::new());
    let pipeline = PipelineOrchestrator::new(
        Arc::clone(&model) as Arc<dyn ModelProvider>,
        Arc::clone(&nutrition) as Arc<dyn NutritionProvider>,
        Arc::clone(&store),
        Arc::clone(&cache),
        StagePrompts::default(),
    );
    Harness {
        model,
        nutrition,
        store,
        cache,
        pipeline,
    }
}

fn photo() -> Vec<u8> {
    vec![0xff, 0xd8, 0xff, 0xe0]
}

#[tokio::test]
async fn restaurant_flow_resolves_macros_with_one_instant_call() {
    let h = harness(CLASSIFY_RESTAURANT);
    h.nutrition.add_instant("Acme Burgers Fries, M", fries_instant());

    let result = h
        .pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    let order = result.order.as_ref().unwrap();
    assert_eq!(order.restaurant_name, "Acme Burgers");
    assert!(!order.validation.detected_conflict);

    let macros = result.macros.as_ref().unwrap();
    assert_eq!(macros.results.len(), 1);
    let resolved = &macros.results[0];
    assert_eq!(resolved.item_name, "Fries");
    assert_eq!(resolved.macros.as_ref().unwrap()["nf_calories"], 320.0);

    // The first, most specific query variant matched; nothing else was sent.
    assert_eq!(
        h.nutrition.instant_calls(),
        vec!["Acme Burgers Fries, M".to_string()]
    );
    assert!(h.nutrition.natural_calls().is_empty());

    // The payload is cached under the normalized key.
    let key = CacheKey::new("acme burgers", "fries", "");
    assert!(h.cache.get(&key).is_some());

    assert!(result.home_analysis.is_none());
}

#[tokio::test]
async fn home_flow_makes_no_nutrition_calls() {
    let h = harness(CLASSIFY_HOME);

    let result = h
        .pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    let analysis = result.home_analysis.as_ref().unwrap();
    assert_eq!(analysis["items"][0]["calories"], 420);
    assert!(analysis["_duration_ms"].is_u64());

    assert!(result.order.is_none());
    assert!(result.macros.is_none());
    assert!(h.nutrition.instant_calls().is_empty());
    assert!(h.nutrition.natural_calls().is_empty());
}

#[tokio::test]
async fn unresolved_item_still_completes_the_run() {
    // No nutrition responses configured at all: every lookup comes back empty.
    let h = harness(CLASSIFY_RESTAURANT);

    let result = h
        .pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    let macros = result.macros.as_ref().unwrap();
    assert_eq!(macros.results.len(), 1);
    assert!(macros.results[0].macros.is_none());
    assert_eq!(macros.results[0].item_name, "Fries");
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let h = harness(CLASSIFY_RESTAURANT);
    h.nutrition.add_instant("Acme Burgers Fries, M", fries_instant());

    let cancel = CancellationToken::new();
    let first = h.pipeline.analyze(photo(), "image/jpeg", &cancel).await.unwrap();
    let second = h.pipeline.analyze(photo(), "image/jpeg", &cancel).await.unwrap();

    // At most one external lookup per key across both runs.
    assert_eq!(h.nutrition.instant_calls().len(), 1);
    assert_eq!(
        first.macros.as_ref().unwrap().results[0].macros,
        second.macros.as_ref().unwrap().results[0].macros
    );
}

#[tokio::test]
async fn image_token_resolves_to_the_stored_photo() {
    let h = harness(CLASSIFY_RESTAURANT);
    h.nutrition.add_instant("Acme Burgers Fries, M", fries_instant());

    let result = h
        .pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    let token = result.visual.image_token.as_deref().unwrap();
    assert_eq!(token, result.image_token);
    let record = h.store.get(token).unwrap();
    assert_eq!(record.bytes, photo());
    assert_eq!(record.mime_type, "image/jpeg");
}

#[tokio::test]
async fn timings_are_recorded_per_stage() {
    let h = harness(CLASSIFY_RESTAURANT);
    h.nutrition.add_instant("Acme Burgers Fries, M", fries_instant());

    let result = h
        .pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    for stage in [
        StageName::VisualContext,
        StageName::DishClassification,
        StageName::Itemization,
        StageName::NutritionLookup,
    ] {
        assert!(
            result.steps_sec.contains_key(stage.as_str()),
            "missing timing for {}",
            stage
        );
    }
    assert!(!result.steps_sec.contains_key(StageName::HomeAnalysis.as_str()));
    assert!(result.total_sec >= 0.0);
}

#[tokio::test]
async fn malformed_stage_output_fails_the_run_naming_the_stage() {
    let model = FakeModelProvider::new();
    model.add_response("visual context analyzer", VISUAL_RESPONSE);
    model.add_response("dish classifier", "I really couldn't say what this is.");
    let model = Arc::new(model);

    let nutrition = Arc::new(MockNutritionProvider::new());
    let pipeline = PipelineOrchestrator::new(
        model,
        nutrition,
        Arc::new(ImageStore::new(RetentionPolicy::KeepForever)),
        Arc::new(MacroCache::new()),
        StagePrompts::default(),
    );

    let err = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.failed_stage(), Some(StageName::DishClassification));
}

#[tokio::test]
async fn invalid_source_value_is_a_schema_error() {
    let model = FakeModelProvider::new();
    model.add_response("visual context analyzer", VISUAL_RESPONSE);
    model.add_response("dish classifier", r#"{"source": "STREET", "components": {}}"#);
    let model = Arc::new(model);

    let pipeline = PipelineOrchestrator::new(
        model,
        Arc::new(MockNutritionProvider::new()),
        Arc::new(ImageStore::new(RetentionPolicy::KeepForever)),
        Arc::new(MacroCache::new()),
        StagePrompts::default(),
    );

    let err = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.failed_stage(), Some(StageName::DishClassification));
}

#[tokio::test]
async fn cancelled_token_aborts_before_any_stage() {
    let h = harness(CLASSIFY_RESTAURANT);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .pipeline
        .analyze(photo(), "image/jpeg", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(h.model.call_count(), 0);
}

#[tokio::test]
async fn brand_conflict_is_flagged_and_lock_drives_lookup() {
    let model = FakeModelProvider::new();
    model.add_response("visual context analyzer", VISUAL_RESPONSE);
    model.add_response("dish classifier", CLASSIFY_RESTAURANT);
    model.add_response(
        "restaurant meal itemizer",
        r#"{
            "restaurant_name": "Zeta Diner",
            "items": [{"item_name": "Fries", "size": "M", "nutritionix_query": ""}]
        }"#,
    );
    let model = Arc::new(model);

    let nutrition = Arc::new(MockNutritionProvider::new());
    nutrition.add_instant("Acme Burgers Fries, M", fries_instant());

    let pipeline = PipelineOrchestrator::new(
        model,
        Arc::clone(&nutrition) as Arc<dyn NutritionProvider>,
        Arc::new(ImageStore::new(RetentionPolicy::KeepForever)),
        Arc::new(MacroCache::new()),
        StagePrompts::default(),
    );

    let result = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    let order = result.order.as_ref().unwrap();
    assert!(order.validation.detected_conflict);
    assert_eq!(order.restaurant_name, "Zeta Diner");

    // The locked classifier brand, not the conflicting itemizer brand, drives
    // the nutrition lookup.
    let macros = result.macros.as_ref().unwrap();
    assert_eq!(macros.restaurant_name, "Acme Burgers");
    assert_eq!(
        nutrition.instant_calls(),
        vec!["Acme Burgers Fries, M".to_string()]
    );
}

#[tokio::test]
async fn quantity_rides_alongside_per_serving_macros() {
    let model = FakeModelProvider::new();
    model.add_response("visual context analyzer", VISUAL_RESPONSE);
    model.add_response("dish classifier", CLASSIFY_RESTAURANT);
    model.add_response(
        "restaurant meal itemizer",
        r#"{
            "restaurant_name": "Acme Burgers",
            "items": [{"item_name": "Fries", "quantity": 3, "size": "M", "nutritionix_query": ""}]
        }"#,
    );
    let model = Arc::new(model);

    let nutrition = Arc::new(MockNutritionProvider::new());
    nutrition.add_instant("Acme Burgers Fries, M", fries_instant());

    let pipeline = PipelineOrchestrator::new(
        model,
        nutrition,
        Arc::new(ImageStore::new(RetentionPolicy::KeepForever)),
        Arc::new(MacroCache::new()),
        StagePrompts::default(),
    );

    let result = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    let resolved = &result.macros.as_ref().unwrap().results[0];
    assert_eq!(resolved.quantity, 3.0);
    // The payload stays per-serving; scaling is the caller's job.
    assert_eq!(resolved.macros.as_ref().unwrap()["nf_calories"], 320.0);
}

fn test_config(lookup_concurrency: usize, image_ttl: Option<Duration>) -> Config {
    Config {
        model: ModelConfig {
            api_key: "test-key".to_string(),
            vision_model: "test-vision".to_string(),
            text_model: "test-text".to_string(),
            base_url: "http://localhost".to_string(),
            timeout: Duration::from_secs(5),
        },
        nutritionix: NutritionixConfig {
            app_id: "test-app".to_string(),
            api_key: "test-key".to_string(),
            base_url: "http://localhost".to_string(),
            timeout: Duration::from_secs(5),
        },
        lookup_concurrency,
        image_ttl,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn config_concurrency_bounds_the_lookup_pool() {
    let model = fake_model(CLASSIFY_RESTAURANT);
    model.add_response(
        "restaurant meal itemizer",
        r#"{
            "restaurant_name": "Acme Burgers",
            "items": [
                {"item_name": "item0"}, {"item_name": "item1"}, {"item_name": "item2"},
                {"item_name": "item3"}, {"item_name": "item4"}, {"item_name": "item5"}
            ]
        }"#,
    );
    let nutrition =
        Arc::new(MockNutritionProvider::new().with_delay(Duration::from_millis(15)));

    let pipeline = PipelineOrchestrator::from_config(
        &test_config(2, None),
        model,
        Arc::clone(&nutrition) as Arc<dyn NutritionProvider>,
        StagePrompts::default(),
    );

    let result = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.macros.as_ref().unwrap().results.len(), 6);
    assert!(
        nutrition.max_in_flight() <= 2,
        "observed {} in-flight lookups",
        nutrition.max_in_flight()
    );
}

#[tokio::test]
async fn config_ttl_expires_stored_images() {
    let pipeline = PipelineOrchestrator::from_config(
        &test_config(8, Some(Duration::from_millis(1))),
        fake_model(CLASSIFY_HOME),
        Arc::new(MockNutritionProvider::new()),
        StagePrompts::default(),
    );

    let result = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(pipeline.image_store().get(&result.image_token).is_err());
}

#[tokio::test]
async fn failed_vision_run_stores_no_image() {
    // No responses configured at all: the vision stage fails upstream.
    let model = Arc::new(FakeModelProvider::new());
    let store = Arc::new(ImageStore::new(RetentionPolicy::KeepForever));
    let pipeline = PipelineOrchestrator::new(
        model,
        Arc::new(MockNutritionProvider::new()),
        Arc::clone(&store),
        Arc::new(MacroCache::new()),
        StagePrompts::default(),
    );

    let err = pipeline
        .analyze(photo(), "image/jpeg", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.failed_stage(), Some(StageName::VisualContext));
    assert!(store.is_empty());
}
