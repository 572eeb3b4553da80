//! Nutrition database provider trait and test double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Error type for nutrition database operations.
#[derive(Debug, Error)]
pub enum NutritionError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited")]
    RateLimited,

    #[error("no matching food found")]
    NotFound,
}

impl NutritionError {
    /// Transient errors are retried once per query variant.
    pub fn is_transient(&self) -> bool {
        match self {
            NutritionError::RequestFailed(_) | NutritionError::RateLimited => true,
            NutritionError::ApiError { status, .. } => *status >= 500,
            NutritionError::NotFound => false,
        }
    }
}

/// One candidate from the instant/autocomplete endpoint. Nutrient fields
/// beyond the identifying ones are opaque and ride along via `flatten`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodCandidate {
    pub food_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nix_item_id: Option<String>,
    #[serde(flatten)]
    pub nutrients: Map<String, JsonValue>,
}

impl FoodCandidate {
    /// The opaque per-serving macro payload carried by this candidate.
    pub fn macro_payload(&self) -> JsonValue {
        let mut obj = self.nutrients.clone();
        obj.insert("food_name".to_string(), JsonValue::from(self.food_name.clone()));
        if let Some(brand) = &self.brand_name {
            obj.insert("brand_name".to_string(), JsonValue::from(brand.clone()));
        }
        JsonValue::Object(obj)
    }
}

/// Response from the instant endpoint: branded and common candidate lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstantResults {
    #[serde(default)]
    pub branded: Vec<FoodCandidate>,
    #[serde(default)]
    pub common: Vec<FoodCandidate>,
}

impl InstantResults {
    /// Branded candidates first; scoring handles brand constraints.
    pub fn iter_all(&self) -> impl Iterator<Item = &FoodCandidate> {
        self.branded.iter().chain(self.common.iter())
    }
}

/// Trait for nutrition database providers.
///
/// Implementations should be stateless and thread-safe; the resolver issues
/// calls from many concurrent per-item tasks.
#[async_trait]
pub trait NutritionProvider: Send + Sync {
    /// Fast multi-candidate autocomplete lookup by free text.
    async fn instant_search(&self, query: &str) -> Result<InstantResults, NutritionError>;

    /// Natural-language single-query nutrient parser. Returns one opaque
    /// nutrient payload or `NotFound`.
    async fn natural_nutrients(&self, query: &str) -> Result<JsonValue, NutritionError>;
}

/// Mock nutrition provider for testing.
///
/// Responses are keyed by exact query text. Supports injected transient
/// failures, artificial latency, and an in-flight gauge for concurrency
/// assertions.
#[derive(Default)]
pub struct MockNutritionProvider {
    instant: Mutex<HashMap<String, InstantResults>>,
    natural: Mutex<HashMap<String, JsonValue>>,
    /// Remaining transient failures to inject, per instant query.
    instant_failures: Mutex<HashMap<String, usize>>,
    instant_calls: Mutex<Vec<String>>,
    natural_calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockNutritionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add latency to every call so concurrency overlaps are observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_instant(&self, query: &str, results: InstantResults) {
        self.instant.lock().unwrap().insert(query.to_string(), results);
    }

    pub fn add_natural(&self, query: &str, payload: JsonValue) {
        self.natural.lock().unwrap().insert(query.to_string(), payload);
    }

    /// Make the next `times` instant calls for `query` fail transiently.
    pub fn fail_instant_times(&self, query: &str, times: usize) {
        self.instant_failures
            .lock()
            .unwrap()
            .insert(query.to_string(), times);
    }

    pub fn instant_calls(&self) -> Vec<String> {
        self.instant_calls.lock().unwrap().clone()
    }

    pub fn natural_calls(&self) -> Vec<String> {
        self.natural_calls.lock().unwrap().clone()
    }

    /// Highest number of concurrently in-flight calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    async fn track_call(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        InFlightGuard { counter: &self.in_flight }
    }
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NutritionProvider for MockNutritionProvider {
    async fn instant_search(&self, query: &str) -> Result<InstantResults, NutritionError> {
        let _guard = self.track_call().await;
        self.instant_calls.lock().unwrap().push(query.to_string());

        {
            let mut failures = self.instant_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(query) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(NutritionError::RequestFailed("injected timeout".to_string()));
                }
            }
        }

        Ok(self
            .instant.lock().unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn natural_nutrients(&self, query: &str) -> Result<JsonValue, NutritionError> {
        let _guard = self.track_call().await;
        self.natural_calls.lock().unwrap().push(query.to_string());

        self.natural.lock().unwrap()
            .get(query)
            .cloned()
            .ok_or(NutritionError::NotFound)
    }
}
