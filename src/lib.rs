//! Photo-to-nutrition analysis pipeline.
//!
//! An image flows through three model-driven stages (visual context, dish
//! classification, restaurant itemization) and then through a nutrition
//! database resolver that scores candidate matches under bounded concurrency.
//! Model and nutrition providers are traits so the whole pipeline runs against
//! fakes in tests.

pub mod config;
pub mod error;
pub mod image_store;
pub mod model;
pub mod nutrition;
pub mod pipeline;
pub mod prompts;
pub mod salvage;
pub mod stages;
pub mod types;

pub use config::{Config, ConfigError, ModelConfig, NutritionixConfig};
pub use error::{PipelineError, StageError, StageName};
pub use image_store::{ImageRecord, ImageStore, ImageStoreError, RetentionPolicy};
pub use model::{CompletionRequest, FakeModelProvider, ModelError, ModelProvider, OpenAiProvider};
pub use nutrition::{
    CacheKey, FoodCandidate, InstantResults, MacroCache, NutritionError, NutritionProvider,
    NutritionResolver, NutritionixClient, ResolverConfig,
};
pub use pipeline::{PipelineOrchestrator, PipelineResult};
pub use types::{
    Component, DishClassification, DishComponents, ItemizedOrder, MacroResult, MealSource,
    OrderItem, OrderValidation, ResolvedItem, RestaurantType, SizeHint, VisualContext, VisualItem,
    VisualSceneContext,
};
