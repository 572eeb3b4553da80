//! Pipeline orchestrator.
//!
//! One run threads a photo through the model stages and, for restaurant
//! meals, the nutrition resolver. The run is fail-fast: a stage failure
//! aborts it and partial outputs are discarded. Per-item nutrition failures
//! are not stage failures; they degrade inside the resolver.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{PipelineError, StageName};
use crate::image_store::{ImageRecord, ImageStore, RetentionPolicy};
use crate::model::ModelProvider;
use crate::nutrition::{MacroCache, NutritionProvider, NutritionResolver, ResolverConfig};
use crate::prompts::StagePrompts;
use crate::stages::{DishClassifier, HomeMealAnalyzer, RestaurantItemizer, VisionAnalyzer};
use crate::types::{DishClassification, ItemizedOrder, MacroResult, MealSource, VisualContext};

/// Everything a completed run produced. Exactly one of `order`/`macros`
/// (restaurant path) or `home_analysis` (home path) is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub image_token: String,
    pub visual: VisualContext,
    pub classification: DishClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<ItemizedOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<MacroResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_analysis: Option<JsonValue>,
    /// Seconds spent in each completed stage, keyed by stage name.
    pub steps_sec: BTreeMap<String, f64>,
    pub total_sec: f64,
}

pub struct PipelineOrchestrator {
    image_store: Arc<ImageStore>,
    vision: VisionAnalyzer,
    classifier: DishClassifier,
    itemizer: RestaurantItemizer,
    home: HomeMealAnalyzer,
    resolver: NutritionResolver,
}

impl PipelineOrchestrator {
    pub fn new(
        model_provider: Arc<dyn ModelProvider>,
        nutrition_provider: Arc<dyn NutritionProvider>,
        image_store: Arc<ImageStore>,
        cache: Arc<MacroCache>,
        prompts: StagePrompts,
    ) -> Self {
        Self::with_resolver_config(
            model_provider,
            nutrition_provider,
            image_store,
            cache,
            prompts,
            ResolverConfig::default(),
        )
    }

    /// Build from environment-driven configuration: image retention from
    /// `image_ttl` and the lookup pool bound from `lookup_concurrency`.
    /// Providers stay injectable so tests run against fakes.
    pub fn from_config(
        config: &Config,
        model_provider: Arc<dyn ModelProvider>,
        nutrition_provider: Arc<dyn NutritionProvider>,
        prompts: StagePrompts,
    ) -> Self {
        let retention = match config.image_ttl {
            Some(ttl) => RetentionPolicy::ExpireAfter(ttl),
            None => RetentionPolicy::KeepForever,
        };
        Self::with_resolver_config(
            model_provider,
            nutrition_provider,
            Arc::new(ImageStore::new(retention)),
            Arc::new(MacroCache::new()),
            prompts,
            ResolverConfig {
                max_concurrency: config.lookup_concurrency,
                ..ResolverConfig::default()
            },
        )
    }

    pub fn with_resolver_config(
        model_provider: Arc<dyn ModelProvider>,
        nutrition_provider: Arc<dyn NutritionProvider>,
        image_store: Arc<ImageStore>,
        cache: Arc<MacroCache>,
        prompts: StagePrompts,
        resolver_config: ResolverConfig,
    ) -> Self {
        Self {
            image_store,
            vision: VisionAnalyzer::new(Arc::clone(&model_provider), prompts.visual_context),
            classifier: DishClassifier::new(Arc::clone(&model_provider), prompts.dish_classifier),
            itemizer: RestaurantItemizer::new(
                Arc::clone(&model_provider),
                prompts.restaurant_itemizer,
            ),
            home: HomeMealAnalyzer::new(model_provider, prompts.home_meal),
            resolver: NutritionResolver::with_config(nutrition_provider, cache, resolver_config),
        }
    }

    /// The store backing this orchestrator's image tokens.
    pub fn image_store(&self) -> &Arc<ImageStore> {
        &self.image_store
    }

    /// Run the full pipeline on one photo.
    ///
    /// Cancellation is checked between stages and propagated into the
    /// resolver; a cancelled run returns `PipelineError::Cancelled` with no
    /// partial result.
    pub async fn analyze(
        &self,
        image_bytes: Vec<u8>,
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();
        let mut steps_sec = BTreeMap::new();

        let record = Arc::new(ImageRecord {
            bytes: image_bytes,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
        });

        check_cancelled(cancel)?;
        let mut visual = self
            .vision
            .analyze(&record)
            .await
            .map_err(|e| PipelineError::stage(StageName::VisualContext, e))?;
        // The image is committed to the store only once vision succeeds, so
        // failed runs leave no entry behind.
        let token = self.image_store.put_record(Arc::clone(&record));
        visual.image_token = Some(token.clone());
        steps_sec.insert(
            StageName::VisualContext.as_str().to_string(),
            visual.duration_ms as f64 / 1000.0,
        );
        tracing::info!(stage = %StageName::VisualContext, items = visual.items.len(), "stage complete");

        check_cancelled(cancel)?;
        let classification = self
            .classifier
            .classify(&visual, Some(&record))
            .await
            .map_err(|e| PipelineError::stage(StageName::DishClassification, e))?;
        steps_sec.insert(
            StageName::DishClassification.as_str().to_string(),
            classification.duration_ms as f64 / 1000.0,
        );
        tracing::info!(
            stage = %StageName::DishClassification,
            source = ?classification.source,
            "stage complete"
        );

        check_cancelled(cancel)?;
        let mut result = PipelineResult {
            image_token: token,
            visual,
            classification,
            order: None,
            macros: None,
            home_analysis: None,
            steps_sec,
            total_sec: 0.0,
        };

        match result.classification.source {
            MealSource::Restaurant => {
                let order = self
                    .itemizer
                    .itemize(&result.visual, &result.classification, Some(&record))
                    .await
                    .map_err(|e| PipelineError::stage(StageName::Itemization, e))?;
                result.steps_sec.insert(
                    StageName::Itemization.as_str().to_string(),
                    order.duration_ms as f64 / 1000.0,
                );
                tracing::info!(stage = %StageName::Itemization, items = order.items.len(), "stage complete");

                check_cancelled(cancel)?;
                let macros = self
                    .resolver
                    .resolve_order(&order, result.classification.brand_lock(), cancel)
                    .await;
                check_cancelled(cancel)?;
                result.steps_sec.insert(
                    StageName::NutritionLookup.as_str().to_string(),
                    macros.duration_ms as f64 / 1000.0,
                );
                tracing::info!(
                    stage = %StageName::NutritionLookup,
                    resolved = macros.results.iter().filter(|r| r.macros.is_some()).count(),
                    total = macros.results.len(),
                    "stage complete"
                );

                result.order = Some(order);
                result.macros = Some(macros);
            }
            MealSource::Home => {
                let analysis = self
                    .home
                    .analyze(&result.classification, Some(&record))
                    .await
                    .map_err(|e| PipelineError::stage(StageName::HomeAnalysis, e))?;
                let duration_ms = analysis
                    .get("_duration_ms")
                    .and_then(JsonValue::as_u64)
                    .unwrap_or(0);
                result.steps_sec.insert(
                    StageName::HomeAnalysis.as_str().to_string(),
                    duration_ms as f64 / 1000.0,
                );
                tracing::info!(stage = %StageName::HomeAnalysis, "stage complete");

                result.home_analysis = Some(analysis);
            }
        }

        result.total_sec = start.elapsed().as_secs_f64();
        Ok(result)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}
