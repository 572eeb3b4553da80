//! Candidate query generation.
//!
//! Each order item produces an ordered list of query variants, most to least
//! specific. Quantity is never part of the query text; it is applied as a
//! post-lookup multiplier so identical queries for different quantities share
//! one cache entry.

use crate::nutrition::normalize::is_generic_brand;
use crate::types::OrderItem;

/// Generate query variants for one item, in strict specificity order:
///
/// 1. the itemizer's deterministic `nutritionix_query`, when present
/// 2. `"<brand> <item_name>, <size|description>"`
/// 3. `"<brand> <item_name>"`
/// 4. `"<item_name>, <description>"`
/// 5. `"<item_name>"`
///
/// Brand variants are skipped for generic brands; duplicates are dropped
/// while preserving order.
pub fn candidate_queries(brand: Option<&str>, item: &OrderItem) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    let mut add = |q: String| {
        let q = q.trim().to_string();
        if !q.is_empty() && !queries.contains(&q) {
            queries.push(q);
        }
    };

    let name = item.item_name.trim();
    let size = item.size.trim();
    let description = item.description.trim();
    let brand = brand
        .map(str::trim)
        .filter(|b| !b.is_empty() && !is_generic_brand(b));

    let deterministic = item.nutritionix_query.trim();
    if !deterministic.is_empty() {
        add(deterministic.to_string());
    }

    if name.is_empty() {
        return queries;
    }

    if let Some(brand) = brand {
        let qualifier = if !size.is_empty() { size } else { description };
        if !qualifier.is_empty() {
            add(format!("{} {}, {}", brand, name, qualifier));
        }
        add(format!("{} {}", brand, name));
    }

    if !description.is_empty() {
        add(format!("{}, {}", name, description));
    }
    add(name.to_string());

    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, size: &str, description: &str, nix_query: &str) -> OrderItem {
        OrderItem {
            item_name: name.to_string(),
            quantity: 1.0,
            size: size.to_string(),
            portion_detail: String::new(),
            description: description.to_string(),
            confidence: 0.9,
            mapped_from_component: "sides".to_string(),
            nutritionix_query: nix_query.to_string(),
        }
    }

    #[test]
    fn branded_item_with_size() {
        let queries = candidate_queries(Some("Acme Burgers"), &item("Fries", "M", "", ""));
        assert_eq!(
            queries,
            vec![
                "Acme Burgers Fries, M".to_string(),
                "Acme Burgers Fries".to_string(),
                "Fries".to_string(),
            ]
        );
    }

    #[test]
    fn description_used_when_size_missing() {
        let queries = candidate_queries(
            Some("Acme Burgers"),
            &item("Fries", "", "crinkle cut", ""),
        );
        assert_eq!(queries[0], "Acme Burgers Fries, crinkle cut");
        assert_eq!(queries[1], "Acme Burgers Fries");
        assert_eq!(queries[2], "Fries, crinkle cut");
        assert_eq!(queries[3], "Fries");
    }

    #[test]
    fn deterministic_query_comes_first() {
        let queries = candidate_queries(
            Some("Acme Burgers"),
            &item("Fries", "M", "", "Acme Burgers World Famous Fries Medium"),
        );
        assert_eq!(queries[0], "Acme Burgers World Famous Fries Medium");
        assert_eq!(queries[1], "Acme Burgers Fries, M");
    }

    #[test]
    fn generic_brand_is_skipped() {
        let queries = candidate_queries(Some("Home"), &item("pasta", "", "with tomato sauce", ""));
        assert_eq!(
            queries,
            vec!["pasta, with tomato sauce".to_string(), "pasta".to_string()]
        );
    }

    #[test]
    fn quantity_never_appears() {
        let mut order_item = item("Fries", "M", "", "");
        order_item.quantity = 3.0;
        for q in candidate_queries(Some("Acme Burgers"), &order_item) {
            assert!(!q.contains('3'));
        }
    }

    #[test]
    fn empty_name_without_deterministic_yields_nothing() {
        assert!(candidate_queries(Some("Acme"), &item("", "", "", "")).is_empty());
    }
}
