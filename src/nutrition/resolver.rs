//! Nutrition resolution engine.
//!
//! Every item in an itemized order is resolved independently: cache check,
//! then query variants tried in specificity order against the instant
//! endpoint with a natural-language fallback. Item tasks run under a bounded
//! worker pool and cancel cooperatively; a single item's failure degrades to
//! an unresolved marker instead of aborting its siblings.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_LOOKUP_CONCURRENCY;
use crate::nutrition::cache::{CacheKey, MacroCache};
use crate::nutrition::normalize::{is_generic_brand, normalize_brand};
use crate::nutrition::provider::{
    FoodCandidate, InstantResults, NutritionError, NutritionProvider,
};
use crate::nutrition::query::candidate_queries;
use crate::nutrition::scoring::{score_candidate, ACCEPT_THRESHOLD};
use crate::types::{ItemizedOrder, MacroResult, OrderItem, ResolvedItem};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Concurrency ceiling for per-item lookups within one run.
    pub max_concurrency: usize,
    /// Minimum candidate score for acceptance.
    pub accept_threshold: i32,
    /// Retries per query variant for transient provider errors.
    pub transient_retries: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            accept_threshold: ACCEPT_THRESHOLD,
            transient_retries: 1,
        }
    }
}

/// Resolves itemized orders into macro payloads.
pub struct NutritionResolver {
    provider: Arc<dyn NutritionProvider>,
    cache: Arc<MacroCache>,
    config: ResolverConfig,
}

impl NutritionResolver {
    pub fn new(provider: Arc<dyn NutritionProvider>, cache: Arc<MacroCache>) -> Self {
        Self::with_config(provider, cache, ResolverConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn NutritionProvider>,
        cache: Arc<MacroCache>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            config,
        }
    }

    /// Resolve every item in the order. `brand` overrides the order's own
    /// restaurant name when the upstream classifier locked a brand.
    ///
    /// Results are returned in input item order regardless of completion
    /// order. All units complete (or degrade to unresolved) before the
    /// aggregate result is returned; cancellation frees pool slots
    /// immediately and marks remaining items unresolved.
    pub async fn resolve_order(
        &self,
        order: &ItemizedOrder,
        brand: Option<&str>,
        cancel: &CancellationToken,
    ) -> MacroResult {
        let start = Instant::now();
        let brand_display = brand
            .unwrap_or(&order.restaurant_name)
            .trim()
            .to_string();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, item) in order.items.iter().cloned().enumerate() {
            let provider = Arc::clone(&self.provider);
            let cache = Arc::clone(&self.cache);
            let config = self.config.clone();
            let brand_display = brand_display.clone();
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit,
                    _ = cancel.cancelled() => {
                        return (index, unresolved(&item));
                    }
                };
                // A closed semaphore can't happen here; degrade anyway.
                let _permit = match permit {
                    Ok(p) => p,
                    Err(_) => return (index, unresolved(&item)),
                };

                let resolved = tokio::select! {
                    resolved = resolve_item(provider.as_ref(), &cache, &config, &brand_display, &item) => resolved,
                    _ = cancel.cancelled() => unresolved(&item),
                };
                (index, resolved)
            });
        }

        let mut slots: Vec<Option<ResolvedItem>> = order.items.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, resolved)) => slots[index] = Some(resolved),
                Err(e) => tracing::warn!(error = %e, "nutrition lookup task failed"),
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| unresolved(&order.items[i])))
            .collect();

        MacroResult {
            restaurant_name: brand_display,
            results,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

fn unresolved(item: &OrderItem) -> ResolvedItem {
    ResolvedItem {
        item_name: item.item_name.clone(),
        quantity: item.quantity,
        description: item.description.clone(),
        macros: None,
        nutritionix_match: None,
    }
}

/// Retry transient failures up to `retries` extra attempts. Non-transient
/// errors (including `NotFound`) surface immediately.
async fn with_retry<T, F, Fut>(retries: usize, mut op: F) -> Result<T, NutritionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NutritionError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < retries => {
                tracing::debug!(error = %e, attempt, "transient nutrition error, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pick the best instant candidate at or above the threshold. Candidates are
/// scanned branded-first in response order; ties keep the earliest.
fn select_candidate(
    brand: Option<&str>,
    item: &OrderItem,
    results: &InstantResults,
    threshold: i32,
) -> Option<(FoodCandidate, i32)> {
    let mut best: Option<(FoodCandidate, i32)> = None;
    for candidate in results.iter_all() {
        let score = score_candidate(brand, &item.item_name, &item.description, candidate);
        if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((candidate.clone(), score));
        }
    }
    best.filter(|(_, score)| *score >= threshold)
}

/// A natural-language payload naming a different brand than the lock is a
/// false attribution and must be discarded.
fn contradicts_brand(brand: Option<&str>, payload: &JsonValue) -> bool {
    let Some(want) = brand else { return false };
    payload
        .get("brand_name")
        .and_then(|v| v.as_str())
        .map(|have| {
            let have = normalize_brand(have);
            !have.is_empty() && have != want
        })
        .unwrap_or(false)
}

async fn resolve_item(
    provider: &dyn NutritionProvider,
    cache: &MacroCache,
    config: &ResolverConfig,
    brand_display: &str,
    item: &OrderItem,
) -> ResolvedItem {
    let key = CacheKey::new(brand_display, &item.item_name, &item.description);
    if let Some(hit) = cache.get(&key) {
        tracing::debug!(item = %item.item_name, "macro cache hit");
        return ResolvedItem {
            macros: Some(hit),
            ..unresolved(item)
        };
    }

    let brand_norm = normalize_brand(brand_display);
    let scoring_brand = if is_generic_brand(&brand_norm) {
        None
    } else {
        Some(brand_norm.as_str())
    };
    let query_brand = scoring_brand.map(|_| brand_display);

    for query in candidate_queries(query_brand, item) {
        match with_retry(config.transient_retries, || provider.instant_search(&query)).await {
            Ok(results) => {
                if let Some((candidate, score)) =
                    select_candidate(scoring_brand, item, &results, config.accept_threshold)
                {
                    tracing::debug!(
                        item = %item.item_name,
                        query = %query,
                        score,
                        "instant candidate accepted"
                    );
                    let payload = candidate.macro_payload();
                    cache.insert(key, payload.clone());
                    return ResolvedItem {
                        macros: Some(payload),
                        nutritionix_match: Some(candidate),
                        ..unresolved(item)
                    };
                }
            }
            Err(e) => {
                tracing::debug!(item = %item.item_name, query = %query, error = %e, "instant lookup failed");
            }
        }

        match with_retry(config.transient_retries, || provider.natural_nutrients(&query)).await {
            Ok(payload) => {
                if contradicts_brand(scoring_brand, &payload) {
                    tracing::debug!(item = %item.item_name, query = %query, "natural payload contradicts brand lock");
                    continue;
                }
                tracing::debug!(item = %item.item_name, query = %query, "natural nutrients accepted");
                cache.insert(key, payload.clone());
                return ResolvedItem {
                    macros: Some(payload),
                    ..unresolved(item)
                };
            }
            Err(NutritionError::NotFound) => {}
            Err(e) => {
                tracing::debug!(item = %item.item_name, query = %query, error = %e, "natural lookup failed");
            }
        }
    }

    tracing::warn!(item = %item.item_name, "no acceptable nutrition candidate, marking unresolved");
    unresolved(item)
}
