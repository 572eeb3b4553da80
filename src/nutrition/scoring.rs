//! Candidate scoring against the target order item.

use std::collections::HashSet;

use crate::nutrition::normalize::{normalize_brand, normalize_name};
use crate::nutrition::provider::FoodCandidate;

/// Minimum score for a candidate to be accepted. Candidates below this are
/// rejected and the next query variant is tried.
pub const ACCEPT_THRESHOLD: i32 = 7;

fn tokens(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Score one candidate for the target item.
///
/// Priority order: exact normalized brand match, exact normalized name match,
/// substring/token name overlap, then unbranded generic preference when no
/// brand is requested. A candidate whose brand contradicts the requested one
/// is penalized below any plausible acceptance.
///
/// `brand` must already be normalized and non-generic (`None` when the order
/// has no usable brand).
pub fn score_candidate(
    brand: Option<&str>,
    item_name: &str,
    description: &str,
    candidate: &FoodCandidate,
) -> i32 {
    let mut score = 0;

    let candidate_brand = candidate
        .brand_name
        .as_deref()
        .map(normalize_brand)
        .filter(|b| !b.is_empty());

    match (brand, candidate_brand.as_deref()) {
        (Some(want), Some(have)) if want == have => score += 8,
        (Some(want), Some(have)) if have.contains(want) || want.contains(have) => score += 4,
        (Some(_), Some(_)) => score -= 10,
        (Some(_), None) => {}
        // No brand requested: reward unbranded generic matches to avoid
        // false brand attribution.
        (None, None) => score += 2,
        (None, Some(_)) => {}
    }

    let target = normalize_name(item_name);
    let found = normalize_name(&candidate.food_name);
    if !target.is_empty() {
        if found == target {
            score += 6;
        } else if found.contains(&target) || target.contains(&found) {
            score += 3;
        }
    }

    let target_tokens = tokens(&target);
    let found_tokens = tokens(&found);
    score += target_tokens.intersection(&found_tokens).count() as i32;

    if !description.is_empty() {
        let desc_tokens = tokens(description);
        if desc_tokens.intersection(&found_tokens).next().is_some() {
            score += 1;
        }
    }

    score
}
