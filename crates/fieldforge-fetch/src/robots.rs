// fieldforge-fetch/src/robots.rs
// ============================================================================
// Module: Robots / Fetch Policy
// Description: Per-host allow/deny decisions with a short-TTL cache.
// Purpose: Gate fetch admission without re-probing robots.txt on every URL.
// Dependencies: fieldforge-core, time
// ============================================================================

//! ## Overview
//! A host's robots decision is probed out-of-band (by whatever HTTP client
//! the caller wires up) and recorded here; [`RobotsCache::allowed`] only ever
//! reads the cache. A host absent from the cache resolves to allow, matching
//! "missing robots.txt resolves to allow". Entries older than the
//! configured TTL are treated as stale and must be re-probed before being
//! trusted again.

use std::collections::BTreeMap;

use fieldforge_core::interfaces::RobotsPolicy;
use fieldforge_core::model::time::Timestamp;

/// One cached robots decision for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheEntry {
    allowed: bool,
    cached_at: Timestamp,
}

/// A short-TTL cache of per-host robots decisions.
#[derive(Debug, Clone)]
pub struct RobotsCache {
    ttl: time::Duration,
    entries: BTreeMap<String, CacheEntry>,
}

impl RobotsCache {
    /// Creates an empty cache with the given time-to-live.
    #[must_use]
    pub fn new(ttl: time::Duration) -> Self {
        Self { ttl, entries: BTreeMap::new() }
    }

    /// Returns `true` when `host` has no cached entry, or its entry is older
    /// than the configured TTL, and therefore needs a fresh probe.
    #[must_use]
    pub fn is_stale(&self, host: &str, now: &Timestamp) -> bool {
        match self.entries.get(host) {
            None => true,
            Some(entry) => now.since(&entry.cached_at) > self.ttl,
        }
    }

    /// Records a freshly probed decision for `host`.
    pub fn record(&mut self, host: &str, allowed: bool, now: &Timestamp) {
        self.entries.insert(host.to_string(), CacheEntry { allowed, cached_at: *now });
    }

    /// Returns the cached decision for `host`, defaulting to allow when
    /// absent ("missing robots" resolves to allow).
    #[must_use]
    pub fn allowed(&self, host: &str) -> bool {
        self.entries.get(host).is_none_or(|entry| entry.allowed)
    }
}

impl RobotsPolicy for RobotsCache {
    fn allowed(&self, host: &str, _user_agent: &str) -> bool {
        self.allowed(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: i64) -> Timestamp {
        let base = time::OffsetDateTime::parse("2026-07-28T00:00:00Z", &time::format_description::well_known::Rfc3339)
            .expect("valid base timestamp");
        Timestamp::from_offset(base + time::Duration::seconds(seconds))
    }

    #[test]
    fn missing_host_defaults_to_allow() {
        let cache = RobotsCache::new(time::Duration::minutes(10));
        assert!(cache.allowed("example.test"));
    }

    #[test]
    fn records_and_reads_back_decision() {
        let mut cache = RobotsCache::new(time::Duration::minutes(10));
        cache.record("blocked.test", false, &ts(0));
        assert!(!cache.allowed("blocked.test"));
    }

    #[test]
    fn entry_is_stale_after_ttl_elapses() {
        let mut cache = RobotsCache::new(time::Duration::minutes(10));
        cache.record("example.test", true, &ts(0));
        assert!(!cache.is_stale("example.test", &ts(300)));
        assert!(cache.is_stale("example.test", &ts(601)));
    }

    #[test]
    fn missing_entry_is_always_stale() {
        let cache = RobotsCache::new(time::Duration::minutes(10));
        assert!(cache.is_stale("never-seen.test", &ts(0)));
    }
}
