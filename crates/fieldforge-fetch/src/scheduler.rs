// fieldforge-fetch/src/scheduler.rs
// ============================================================================
// Module: Fetch Scheduler
// Description: Host throttling, retry, and mode-fallback orchestration.
// Purpose: Turn an admitted URL into a fetch outcome without ever double-hammering a host.
// Dependencies: fieldforge-core, time
// ============================================================================

//! ## Overview
//! The scheduler owns per-host next-earliest-fetch timestamps and the
//! primary → fallback fetcher chain. It never decides *whether* to fetch
//! (that is budget + robots, composed by the caller via [`admit`]) — only
//! *how*, given an admitted URL.

use std::collections::BTreeMap;

use fieldforge_core::interfaces::FetchError;
use fieldforge_core::interfaces::FetchOutcome;
use fieldforge_core::interfaces::FetchTelemetry;
use fieldforge_core::interfaces::Fetcher;
use fieldforge_core::model::time::Timestamp;

// ============================================================================
// SECTION: Admission
// ============================================================================

/// Why a fetch was or was not admitted this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// All three gates passed; the fetch may proceed.
    Admit,
    /// Robots policy denies this host.
    DenyRobots,
    /// The product's budget has no remaining fetch capacity.
    DenyBudget,
    /// The per-host delay has not yet elapsed.
    DenyThrottle,
}

/// Combines the three independent fetch-admission gates: robots
/// allowed AND budget allows AND per-host delay elapsed. Robots is checked
/// first since a robots-blocked URL should never be charged against budget
/// or throttle state.
#[must_use]
pub fn admit(robots_allowed: bool, budget_allows: bool, throttle_elapsed: bool) -> Admission {
    if !robots_allowed {
        Admission::DenyRobots
    } else if !budget_allows {
        Admission::DenyBudget
    } else if !throttle_elapsed {
        Admission::DenyThrottle
    } else {
        Admission::Admit
    }
}

// ============================================================================
// SECTION: Host Throttle
// ============================================================================

/// Tracks the next-earliest-fetch timestamp for each host.
#[derive(Debug, Clone)]
pub struct HostThrottle {
    per_host_delay: time::Duration,
    next_earliest: BTreeMap<String, Timestamp>,
}

impl HostThrottle {
    /// Creates a throttle enforcing `per_host_delay` between fetches to the
    /// same host.
    #[must_use]
    pub fn new(per_host_delay: time::Duration) -> Self {
        Self { per_host_delay, next_earliest: BTreeMap::new() }
    }

    /// Returns whether `host` may be fetched at `now`.
    #[must_use]
    pub fn elapsed(&self, host: &str, now: &Timestamp) -> bool {
        self.next_earliest.get(host).is_none_or(|earliest| *now >= *earliest)
    }

    /// Records a fetch to `host` at `now`, pushing its next-earliest-fetch
    /// timestamp forward by the configured delay.
    pub fn record_fetch(&mut self, host: &str, now: &Timestamp) {
        let base = time::OffsetDateTime::parse(&now.to_rfc3339(), &time::format_description::well_known::Rfc3339)
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
        let next = Timestamp::from_offset(base + self.per_host_delay);
        self.next_earliest.insert(host.to_string(), next);
    }
}

// ============================================================================
// SECTION: Fetcher Mode & Fallback Chain
// ============================================================================

/// The fetcher implementation a dispatch attempt ran under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FetcherMode {
    /// JS-capable dynamic browser automation.
    Dynamic,
    /// Playwright-backed fallback automation.
    Playwright,
    /// Plain HTTP GET.
    Http,
    /// Replays a prior run's retained artifacts.
    Replay,
    /// No network access; produces synthetic/empty results.
    Dryrun,
}

impl FetcherMode {
    /// Returns the mode's wire name, used in fallback telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Playwright => "playwright",
            Self::Http => "http",
            Self::Replay => "replay",
            Self::Dryrun => "dryrun",
        }
    }
}

/// Builds the mode-fallback chain starting at `primary`: `dynamic` falls
/// back to `playwright` then `http`; any other primary mode has no fallback
///.
#[must_use]
pub fn fallback_chain(primary: FetcherMode) -> Vec<FetcherMode> {
    match primary {
        FetcherMode::Dynamic => vec![FetcherMode::Dynamic, FetcherMode::Playwright, FetcherMode::Http],
        other => vec![other],
    }
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Dispatches fetches through a primary-with-fallback fetcher chain and a
/// bounded per-mode retry budget.
pub struct FetchScheduler<'a> {
    fetchers: BTreeMap<FetcherMode, &'a dyn Fetcher>,
    retry_budget: u32,
}

impl<'a> FetchScheduler<'a> {
    /// Creates a scheduler over the given mode → fetcher map, retrying a
    /// transient failure on the primary mode up to `retry_budget` times
    /// before considering fallback.
    #[must_use]
    pub fn new(fetchers: BTreeMap<FetcherMode, &'a dyn Fetcher>, retry_budget: u32) -> Self {
        Self { fetchers, retry_budget }
    }

    /// Dispatches `url` against `host` starting at `primary`. Robots-blocked
    /// callers should construct the 451 outcome directly rather than calling
    /// this (the scheduler has no robots awareness of its own — admission is
    /// the caller's job via [`admit`]).
    ///
    /// # Errors
    ///
    /// Returns the last classified [`FetchError`] when every mode in the
    /// fallback chain fails, or immediately on [`FetchError::RateLimited`]
    /// (429 never triggers fallback and always re-raises).
    pub fn dispatch(&self, url: &str, host: &str, primary: FetcherMode) -> Result<FetchOutcome, FetchError> {
        let chain = fallback_chain(primary);
        let mut retry_count = 0_u32;
        let mut degraded_from_mode: Option<String> = None;
        let mut degraded_reason: Option<String> = None;
        let mut last_err = FetchError::NoResult;

        for (index, mode) in chain.iter().enumerate() {
            let Some(fetcher) = self.fetchers.get(mode) else { continue };
            let mut attempts_left = if index == 0 { self.retry_budget } else { 0 };
            loop {
                match fetcher.fetch(url, host) {
                    Ok(mut outcome) => {
                        outcome.telemetry.retry_count = retry_count;
                        outcome.telemetry.degraded_from_mode = degraded_from_mode;
                        outcome.telemetry.degraded_reason = degraded_reason;
                        return Ok(outcome);
                    }
                    Err(FetchError::RateLimited) => return Err(FetchError::RateLimited),
                    Err(err) => {
                        last_err = err;
                        if attempts_left > 0 {
                            attempts_left -= 1;
                            retry_count += 1;
                            continue;
                        }
                        if err.triggers_mode_fallback() && index + 1 < chain.len() {
                            degraded_from_mode = Some(mode.as_str().to_string());
                            degraded_reason = Some(err.to_string());
                        }
                        break;
                    }
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubFetcher {
        responses: std::cell::RefCell<Vec<Result<FetchOutcome, FetchError>>>,
    }

    impl Fetcher for StubFetcher {
        fn fetch(&self, _url: &str, _host: &str) -> Result<FetchOutcome, FetchError> {
            self.responses.borrow_mut().remove(0)
        }
    }

    fn outcome() -> FetchOutcome {
        FetchOutcome {
            status: 200,
            blocked_by_robots: false,
            title: Some("ok".to_string()),
            html: Some("<html></html>".to_string()),
            telemetry: FetchTelemetry { retry_count: 0, degraded_from_mode: None, degraded_reason: None },
        }
    }

    #[test]
    fn admit_denies_robots_before_anything_else() {
        assert_eq!(admit(false, false, false), Admission::DenyRobots);
    }

    #[test]
    fn admit_checks_budget_before_throttle() {
        assert_eq!(admit(true, false, false), Admission::DenyBudget);
    }

    #[test]
    fn admit_allows_when_all_gates_pass() {
        assert_eq!(admit(true, true, true), Admission::Admit);
    }

    #[test]
    fn host_throttle_blocks_until_delay_elapses() {
        let mut throttle = HostThrottle::new(time::Duration::seconds(60));
        let t0 = Timestamp::parse("2026-07-28T00:00:00Z").expect("valid");
        assert!(throttle.elapsed("example.test", &t0));
        throttle.record_fetch("example.test", &t0);
        let t30 = Timestamp::parse("2026-07-28T00:00:30Z").expect("valid");
        assert!(!throttle.elapsed("example.test", &t30));
        let t61 = Timestamp::parse("2026-07-28T00:01:01Z").expect("valid");
        assert!(throttle.elapsed("example.test", &t61));
    }

    #[test]
    fn dynamic_falls_back_through_playwright_to_http_on_classified_error() {
        let dynamic = StubFetcher { responses: std::cell::RefCell::new(vec![Err(FetchError::Forbidden)]) };
        let playwright = StubFetcher { responses: std::cell::RefCell::new(vec![Err(FetchError::ServerError)]) };
        let http = StubFetcher { responses: std::cell::RefCell::new(vec![Ok(outcome())]) };
        let mut fetchers: BTreeMap<FetcherMode, &dyn Fetcher> = BTreeMap::new();
        fetchers.insert(FetcherMode::Dynamic, &dynamic);
        fetchers.insert(FetcherMode::Playwright, &playwright);
        fetchers.insert(FetcherMode::Http, &http);
        let scheduler = FetchScheduler::new(fetchers, 0);
        let result = scheduler.dispatch("https://example.test/a", "example.test", FetcherMode::Dynamic).expect("eventually succeeds");
        assert_eq!(result.telemetry.degraded_from_mode, Some("playwright".to_string()));
    }

    #[test]
    fn rate_limited_never_falls_back() {
        let dynamic = StubFetcher { responses: std::cell::RefCell::new(vec![Err(FetchError::RateLimited)]) };
        let mut fetchers: BTreeMap<FetcherMode, &dyn Fetcher> = BTreeMap::new();
        fetchers.insert(FetcherMode::Dynamic, &dynamic);
        let scheduler = FetchScheduler::new(fetchers, 3);
        let result = scheduler.dispatch("https://example.test/a", "example.test", FetcherMode::Dynamic);
        assert_eq!(result, Err(FetchError::RateLimited));
    }

    #[test]
    fn retries_primary_mode_before_falling_back() {
        let dynamic = StubFetcher {
            responses: std::cell::RefCell::new(vec![Err(FetchError::ServerError), Ok(outcome())]),
        };
        let mut fetchers: BTreeMap<FetcherMode, &dyn Fetcher> = BTreeMap::new();
        fetchers.insert(FetcherMode::Dynamic, &dynamic);
        let scheduler = FetchScheduler::new(fetchers, 1);
        let result = scheduler.dispatch("https://example.test/a", "example.test", FetcherMode::Dynamic).expect("retried successfully");
        assert_eq!(result.telemetry.retry_count, 1);
        assert_eq!(result.telemetry.degraded_from_mode, None);
    }
}
