//! Nutrition resolution: normalized candidate queries, scoring, caching, and
//! bounded-concurrency lookups against the nutrition database.

mod cache;
mod normalize;
mod nutritionix;
mod provider;
mod query;
mod resolver;
mod scoring;

pub use cache::{CacheKey, MacroCache};
pub use normalize::{is_generic_brand, normalize_brand, normalize_name};
pub use nutritionix::NutritionixClient;
pub use provider::{
    FoodCandidate, InstantResults, MockNutritionProvider, NutritionError, NutritionProvider,
};
pub use query::candidate_queries;
pub use resolver::{NutritionResolver, ResolverConfig};
pub use scoring::{score_candidate, ACCEPT_THRESHOLD};
