//! Query memoization.
//!
//! Keys are order-insensitive structural hashes of both input documents
//! plus the query kind and the resolver identity. Invalidation is by
//! resolver identity alone: loading a new ontology yields a new resolver
//! id and therefore fresh entries. Reads dominate; writes are
//! insert-or-ignore (all writers compute equivalent values).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use serde_json::Value;

use crate::decision::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum QueryKind {
    Subtype,
    Meet,
    Join,
    Canonicalize,
}

#[derive(Debug, Clone)]
pub(crate) enum CachedAnswer {
    Decision(Decision),
    Schema(Value),
}

type CacheKey = (u64, u64, QueryKind, String);

#[derive(Default)]
pub(crate) struct QueryCache {
    map: RwLock<HashMap<CacheKey, CachedAnswer>>,
}

impl QueryCache {
    pub fn get(&self, key: &CacheKey) -> Option<CachedAnswer> {
        self.map.read().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, answer: CachedAnswer) {
        if let Ok(mut map) = self.map.write() {
            // Last write wins; concurrent writers computed the same value.
            map.insert(key, answer);
        }
    }
}

/// Order-insensitive structural hash of a JSON document.
///
/// `serde_json`'s map type iterates keys in sorted order, so hashing in
/// iteration order is already canonical; the walk just has to distinguish
/// value kinds and container boundaries.
pub(crate) fn structural_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_value(value, &mut hasher);
    hasher.finish()
}

fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            2u8.hash(hasher);
            n.to_string().hash(hasher);
        }
        Value::String(s) => {
            3u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            5u8.hash(hasher);
            map.len().hash(hasher);
            for (k, v) in map {
                k.hash(hasher);
                hash_value(v, hasher);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structural_hash_is_stable() {
        let a = json!({ "type": "string", "minLength": 2 });
        let b = json!({ "minLength": 2, "type": "string" });
        // serde_json sorts object keys, so key order in the source text
        // cannot influence the hash.
        assert_eq!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn test_structural_hash_distinguishes_values() {
        assert_ne!(
            structural_hash(&json!({ "minimum": 1 })),
            structural_hash(&json!({ "minimum": 2 }))
        );
        assert_ne!(structural_hash(&json!([1, 2])), structural_hash(&json!([2, 1])));
        assert_ne!(structural_hash(&json!("1")), structural_hash(&json!(1)));
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = QueryCache::default();
        let key = (1u64, 2u64, QueryKind::Subtype, "null".to_string());
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), CachedAnswer::Decision(Decision::Yes));
        match cache.get(&key) {
            Some(CachedAnswer::Decision(Decision::Yes)) => {}
            other => panic!("unexpected cache answer: {:?}", other),
        }
    }
}
