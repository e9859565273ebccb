// fieldforge-providers/src/cache.rs
// ============================================================================
// Module: LLM Response Cache
// Description: TTL-bounded cache keyed by a deterministic request fingerprint.
// Purpose: Avoid re-paying for an identical LLM call within a run.
// Dependencies: fieldforge-core, sha2
// ============================================================================

//! ## Overview
//! The cache key is `sha256(model||prompt||evidence_refs_sorted)` — sorting
//! the evidence ref ids before hashing means two calls carrying the same
//! evidence set in a different order still hit the same cache entry.
//! Expired entries return a miss rather than being eagerly evicted; nothing
//! sweeps the map, so a cache never actively reclaimed just stops answering
//! hits for stale entries.

use std::collections::BTreeMap;

use fieldforge_core::model::hashing::sha256_hex;
use fieldforge_core::model::time::Timestamp;

/// Computes the deterministic cache key for an LLM request.
#[must_use]
pub fn cache_key(model: &str, prompt: &str, evidence_ref_ids: &[String]) -> String {
    let mut sorted = evidence_ref_ids.to_vec();
    sorted.sort_unstable();
    let joined = sorted.join(",");
    let mut payload = String::with_capacity(model.len() + prompt.len() + joined.len() + 2);
    payload.push_str(model);
    payload.push('|');
    payload.push_str(prompt);
    payload.push('|');
    payload.push_str(&joined);
    sha256_hex(payload.as_bytes())
}

/// One cached response with its expiry timestamp.
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    response: serde_json::Value,
    expires_at: Timestamp,
}

/// A TTL-bounded cache of LLM responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: BTreeMap<String, Entry>,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `response` under `key`, expiring at `expires_at`.
    pub fn put(&mut self, key: String, response: serde_json::Value, expires_at: Timestamp) {
        self.entries.insert(key, Entry { response, expires_at });
    }

    /// Looks up `key` at `now`, returning `None` on a miss or an expired entry.
    #[must_use]
    pub fn get(&self, key: &str, now: &Timestamp) -> Option<&serde_json::Value> {
        self.entries.get(key).filter(|entry| *now < entry.expires_at).map(|entry| &entry.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> Timestamp {
        Timestamp::parse(value).expect("valid")
    }

    #[test]
    fn cache_key_is_order_independent_over_evidence_refs() {
        let a = cache_key("fast", "prompt", &["ev_2".to_string(), "ev_1".to_string()]);
        let b = cache_key("fast", "prompt", &["ev_1".to_string(), "ev_2".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_changes_with_model() {
        let a = cache_key("fast", "prompt", &[]);
        let b = cache_key("reasoning", "prompt", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn expired_entry_returns_miss() {
        let mut cache = ResponseCache::new();
        cache.put("key".to_string(), serde_json::json!({"dpi": 26000}), ts("2026-07-28T00:00:00Z"));
        assert!(cache.get("key", &ts("2026-07-27T00:00:00Z")).is_some());
        assert!(cache.get("key", &ts("2026-07-29T00:00:00Z")).is_none());
    }

    #[test]
    fn missing_key_is_a_miss() {
        let cache = ResponseCache::new();
        assert!(cache.get("absent", &ts("2026-07-28T00:00:00Z")).is_none());
    }

    proptest::proptest! {
        /// `cache_key` only depends on the *set* of evidence ref ids, never
        /// their call-site order, for arbitrary models/prompts/ref lists.
        #[test]
        fn cache_key_is_order_independent_over_arbitrary_refs(
            model in "[a-z]{1,8}",
            prompt in ".{0,32}",
            refs in proptest::collection::vec("ev_[0-9]{1,3}", 0..6),
        ) {
            let original = cache_key(&model, &prompt, &refs);
            let reversed: Vec<String> = refs.iter().rev().cloned().collect();
            proptest::prop_assert_eq!(original, cache_key(&model, &prompt, &reversed));
        }
    }
}
