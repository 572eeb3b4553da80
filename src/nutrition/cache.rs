//! Process-wide macro cache.
//!
//! Keyed by the normalized `(brand, name, description)` triple so identical
//! lookups across runs and quantities share one entry. Values are per-serving
//! payloads; quantity scaling happens downstream, never here.

use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use crate::nutrition::normalize::{normalize_brand, normalize_name};

/// Normalized cache key. Quantity is deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub brand: String,
    pub name: String,
    pub description: String,
}

impl CacheKey {
    pub fn new(brand: &str, name: &str, description: &str) -> Self {
        Self {
            brand: normalize_brand(brand),
            name: normalize_name(name),
            description: normalize_name(description),
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<CacheKey, JsonValue>,
    insertion_order: VecDeque<CacheKey>,
}

/// Concurrent macro cache shared by all pipeline runs. Unbounded by default;
/// an optional entry cap evicts oldest-inserted entries first. Writes to the
/// same key are last-writer-wins.
#[derive(Debug, Default)]
pub struct MacroCache {
    inner: RwLock<CacheInner>,
    max_entries: Option<usize>,
}

impl MacroCache {
    /// Unbounded cache, cleared only on restart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache bounded to `max_entries`, evicting oldest-inserted first.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            max_entries: Some(max_entries),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<JsonValue> {
        self.inner.read().unwrap().map.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, payload: JsonValue) {
        let mut inner = self.inner.write().unwrap();
        if inner.map.insert(key.clone(), payload).is_none() {
            inner.insertion_order.push_back(key);
        }
        if let Some(max) = self.max_entries {
            while inner.map.len() > max {
                match inner.insertion_order.pop_front() {
                    Some(oldest) => {
                        inner.map.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_normalized() {
        let a = CacheKey::new("Acme Burgers", "Fries", "");
        assert_eq!(a.brand, "acme burgers");
        assert_eq!(a.name, "fries");
        assert_eq!(a.description, "");

        let b = CacheKey::new("ACME  BURGERS, Inc.", "  FRIES ", "");
        assert_eq!(a, b);
    }

    #[test]
    fn keys_ignore_quantity_by_construction() {
        // Two items differing only in quantity build the same key.
        let a = CacheKey::new("Acme Burgers", "Fries", "golden");
        let b = CacheKey::new("Acme Burgers", "Fries", "golden");
        assert_eq!(a, b);
    }

    #[test]
    fn insert_then_get_is_identical() {
        let cache = MacroCache::new();
        let key = CacheKey::new("Acme Burgers", "Fries", "");
        let payload = json!({"nf_calories": 320.0, "food_name": "Fries"});
        cache.insert(key.clone(), payload.clone());
        assert_eq!(cache.get(&key), Some(payload));
    }

    #[test]
    fn last_writer_wins() {
        let cache = MacroCache::new();
        let key = CacheKey::new("a", "b", "c");
        cache.insert(key.clone(), json!(1));
        cache.insert(key.clone(), json!(2));
        assert_eq!(cache.get(&key), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn bounded_cache_evicts_oldest() {
        let cache = MacroCache::with_max_entries(2);
        let k1 = CacheKey::new("b1", "n1", "");
        let k2 = CacheKey::new("b2", "n2", "");
        let k3 = CacheKey::new("b3", "n3", "");
        cache.insert(k1.clone(), json!(1));
        cache.insert(k2.clone(), json!(2));
        cache.insert(k3.clone(), json!(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
    }
}
