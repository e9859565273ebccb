// fieldforge-fetch/src/fetchers.rs
// ============================================================================
// Module: Replay & Dry-Run Fetchers
// Description: Non-network Fetcher implementations for offline reruns and tests.
// Purpose: Satisfy FetcherMode::Replay / FetcherMode::Dryrun without
//          any live HTTP or browser-automation dependency (out of core scope).
// Dependencies: fieldforge-core
// ============================================================================

//! ## Overview
//! A storage-backed fetcher and a zero-I/O canned fetcher. [`ReplayFetcher`]
//! reads a prior run's retained `raw/pages/<host__index>/page.html` artifact
//! back out of a [`Storage`]; unknown URLs return `status=404`.
//! [`DryRunFetcher`] never touches storage or network at all — it answers
//! every URL with an empty, deterministic page, for
//! `benchmark-scale`/`benchmark-golden` runs and unit tests that only need
//! the scheduler's admission/fallback plumbing exercised.
//!
//! A live HTTP fetcher lives in [`crate::http`]; dynamic-JS (browser
//! automation) fetchers are not implemented here at all — that stays an
//! external collaborator behind the same [`Fetcher`] trait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fieldforge_core::interfaces::FetchError;
use fieldforge_core::interfaces::FetchOutcome;
use fieldforge_core::interfaces::FetchTelemetry;
use fieldforge_core::interfaces::Fetcher;
use fieldforge_core::interfaces::Storage;

// ============================================================================
// SECTION: Replay Fetcher
// ============================================================================

/// Replays a previously fetched page from a prior run's retained artifacts.
///
/// Object keys follow : `<run_prefix>/raw/pages/<host>__<index>/page.html`.
/// Since a run may have fetched the same host more than once, [`ReplayFetcher`]
/// probes indices starting at zero and returns the first hit; callers that
/// need a specific attempt should fetch directly through [`Storage`] instead.
pub struct ReplayFetcher<'a, S: Storage> {
    /// Backing object store.
    storage: &'a S,
    /// Object-key prefix for this run's retained artifacts, e.g.
    /// `specs/outputs/mouse/mouse-razer-viper-v3-pro/runs/run_1`.
    run_prefix: String,
    /// Highest page index probed per host before declaring a replay miss.
    max_index: u32,
}

impl<'a, S: Storage> ReplayFetcher<'a, S> {
    /// Creates a replay fetcher scoped to `run_prefix` within `storage`.
    #[must_use]
    pub fn new(storage: &'a S, run_prefix: impl Into<String>) -> Self {
        Self { storage, run_prefix: run_prefix.into(), max_index: 8 }
    }

    fn page_key(&self, host: &str, index: u32) -> String {
        format!("{}/raw/pages/{host}__{index}/page.html", self.run_prefix)
    }
}

impl<S: Storage> Fetcher for ReplayFetcher<'_, S> {
    fn fetch(&self, _url: &str, host: &str) -> Result<FetchOutcome, FetchError> {
        for index in 0..self.max_index {
            match self.storage.read_text(&self.page_key(host, index)) {
                Ok(html) => {
                    return Ok(FetchOutcome {
                        status: 200,
                        blocked_by_robots: false,
                        title: None,
                        html: Some(html),
                        telemetry: FetchTelemetry {
                            retry_count: 0,
                            degraded_from_mode: None,
                            degraded_reason: None,
                        },
                    });
                }
                Err(fieldforge_core::interfaces::StorageError::NotFound(_)) => continue,
                Err(_) => return Err(FetchError::Generic),
            }
        }
        Ok(FetchOutcome {
            status: 404,
            blocked_by_robots: false,
            title: None,
            html: None,
            telemetry: FetchTelemetry { retry_count: 0, degraded_from_mode: None, degraded_reason: None },
        })
    }
}

// ============================================================================
// SECTION: Dry-Run Fetcher
// ============================================================================

/// Answers every URL with an empty page and never touches storage or network.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunFetcher;

impl DryRunFetcher {
    /// Creates a dry-run fetcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Fetcher for DryRunFetcher {
    fn fetch(&self, _url: &str, _host: &str) -> Result<FetchOutcome, FetchError> {
        Ok(FetchOutcome {
            status: 200,
            blocked_by_robots: false,
            title: Some(String::new()),
            html: Some(String::new()),
            telemetry: FetchTelemetry { retry_count: 0, degraded_from_mode: None, degraded_reason: None },
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::DryRunFetcher;
    use super::ReplayFetcher;
    use fieldforge_core::interfaces::Fetcher;

    struct FakeStorage {
        pages: std::collections::BTreeMap<String, String>,
    }

    impl fieldforge_core::interfaces::Storage for FakeStorage {
        fn read_object(&self, key: &str) -> Result<Vec<u8>, fieldforge_core::interfaces::StorageError> {
            self.read_text(key).map(String::into_bytes)
        }

        fn read_text(&self, key: &str) -> Result<String, fieldforge_core::interfaces::StorageError> {
            self.pages
                .get(key)
                .cloned()
                .ok_or_else(|| fieldforge_core::interfaces::StorageError::NotFound(key.to_string()))
        }

        fn read_json_or_null(
            &self,
            _key: &str,
        ) -> Result<Option<serde_json::Value>, fieldforge_core::interfaces::StorageError> {
            Ok(None)
        }

        fn write_object(&self, _key: &str, _bytes: &[u8]) -> Result<(), fieldforge_core::interfaces::StorageError> {
            Ok(())
        }

        fn list_keys(&self, _prefix: &str) -> Result<Vec<String>, fieldforge_core::interfaces::StorageError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn replay_fetcher_returns_retained_page_for_known_host() {
        let mut pages = std::collections::BTreeMap::new();
        pages.insert("run/raw/pages/razer.com__0/page.html".to_string(), "<html>ok</html>".to_string());
        let storage = FakeStorage { pages };
        let fetcher = ReplayFetcher::new(&storage, "run");
        let outcome = fetcher.fetch("https://razer.com/viper-v3-pro", "razer.com").expect("fetch ok");
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.html.as_deref(), Some("<html>ok</html>"));
    }

    #[test]
    fn replay_fetcher_returns_404_for_unknown_host() {
        let storage = FakeStorage { pages: std::collections::BTreeMap::new() };
        let fetcher = ReplayFetcher::new(&storage, "run");
        let outcome = fetcher.fetch("https://unknown.example/x", "unknown.example").expect("fetch ok");
        assert_eq!(outcome.status, 404);
        assert!(outcome.html.is_none());
    }

    #[test]
    fn dry_run_fetcher_never_fails() {
        let fetcher = DryRunFetcher::new();
        let outcome = fetcher.fetch("https://anything.example/x", "anything.example").expect("fetch ok");
        assert_eq!(outcome.status, 200);
    }
}
