// fieldforge-fetch/src/policy.rs
// ============================================================================
// Module: Policy-Gated Fetcher
// Description: Composes robots policy, per-host throttling, and mode fallback
//              into a single Fetcher the product runner can call directly.
// Purpose: Give CLI/daemon callers one admission-checked entry point per URL.
// Dependencies: fieldforge-core, reqwest
// ============================================================================

//! ## Overview
//! [`crate::robots::RobotsCache`], [`crate::scheduler::HostThrottle`], and
//! [`crate::scheduler::FetchScheduler`] are each independently testable
//! plumbing; a real caller (the CLI's `run-once`/`run-daemon` driver) needs
//! them composed behind one [`Fetcher`] call per URL rather than re-deriving
//! the admission sequence at every call site. [`PolicyFetcher`] is that
//! composition: robots is probed (and cached) out-of-band via a plain GET of
//! `/robots.txt`, admission follows [`crate::scheduler::admit`]'s gate order,
//! and an admitted fetch dispatches through [`crate::scheduler::FetchScheduler`]
//! with `http` as the only configured mode — this core never drives browser
//! automation.
//!
//! Interior mutability (`RefCell`) is required because [`Fetcher::fetch`]
//! takes `&self`: a product's rounds are sequential, so a single
//! logical task never calls this concurrently on the same instance.

use std::cell::RefCell;

use fieldforge_core::interfaces::FetchError;
use fieldforge_core::interfaces::FetchOutcome;
use fieldforge_core::interfaces::FetchTelemetry;
use fieldforge_core::interfaces::Fetcher;
use fieldforge_core::model::time::Timestamp;

use crate::http::HttpFetcher;
use crate::robots::RobotsCache;
use crate::scheduler::FetchScheduler;
use crate::scheduler::FetcherMode;
use crate::scheduler::HostThrottle;
use crate::scheduler::admit;

/// A plain-text robots.txt probe, used only to seed [`RobotsCache`].
pub trait RobotsProbe {
    /// Fetches `https://{host}/robots.txt` (or returns `None` when it
    /// cannot be retrieved) and reports whether it disallows `user_agent`
    /// from the whole site (a bare `Disallow: /` under a matching
    /// `User-agent` group). A missing or unparseable file is treated as
    /// "no restriction" by the caller, not by this trait.
    fn probe(&self, host: &str, user_agent: &str) -> Option<bool>;
}

/// Probes robots.txt over plain HTTP(S) using a shared blocking client.
pub struct HttpRobotsProbe {
    client: reqwest::blocking::Client,
}

impl HttpRobotsProbe {
    /// Builds a probe with a short, fixed timeout; a slow or absent
    /// robots.txt must never stall fetch admission for long.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Generic`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(5_000))
            .build()
            .map_err(|_| FetchError::Generic)?;
        Ok(Self { client })
    }
}

impl RobotsProbe for HttpRobotsProbe {
    fn probe(&self, host: &str, user_agent: &str) -> Option<bool> {
        let body = self
            .client
            .get(format!("https://{host}/robots.txt"))
            .send()
            .ok()
            .filter(|response| response.status().is_success())?
            .text()
            .ok()?;
        Some(disallows_everything(&body, user_agent))
    }
}

/// Parses a robots.txt body for a bare `Disallow: /` under a group that
/// applies to `user_agent` (its own named group, or a wildcard `*` group
/// when no named group matches). This is intentionally minimal — full
/// robots.txt semantics (path-specific rules, `Allow` overrides, crawl-delay)
/// are a Non-goal; only the "whole host blocked" signal needs is parsed.
#[must_use]
fn disallows_everything(body: &str, user_agent: &str) -> bool {
    let mut applies = false;
    let mut matched_named_group = false;
    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "user-agent" => {
                let is_match = value == "*" || value.eq_ignore_ascii_case(user_agent);
                if value != "*" && is_match {
                    matched_named_group = true;
                    applies = true;
                } else if value == "*" && !matched_named_group {
                    applies = true;
                } else if value != "*" {
                    applies = false;
                }
            }
            "disallow" if applies && value == "/" => return true,
            _ => {}
        }
    }
    false
}

/// Composes robots admission, per-host throttling, and fetch dispatch
/// behind one [`Fetcher`] call.
pub struct PolicyFetcher<P: RobotsProbe> {
    robots_probe: P,
    robots_cache: RefCell<RobotsCache>,
    throttle: RefCell<HostThrottle>,
    http: HttpFetcher,
    user_agent: String,
    now: Timestamp,
    retry_budget: u32,
}

impl<P: RobotsProbe> PolicyFetcher<P> {
    /// Builds a policy-gated fetcher. `now` is the fixed timestamp this
    /// product's round is running at (the pipeline never reads
    /// wall-clock time itself).
    #[must_use]
    pub fn new(robots_probe: P, http: HttpFetcher, user_agent: String, now: Timestamp, retry_budget: u32) -> Self {
        Self {
            robots_probe,
            robots_cache: RefCell::new(RobotsCache::new(time::Duration::hours(1))),
            throttle: RefCell::new(HostThrottle::new(time::Duration::seconds(2))),
            http,
            user_agent,
            now,
            retry_budget,
        }
    }
}

impl<P: RobotsProbe> Fetcher for PolicyFetcher<P> {
    fn fetch(&self, url: &str, host: &str) -> Result<FetchOutcome, FetchError> {
        if self.robots_cache.borrow().is_stale(host, &self.now) {
            // A probe failure (timeout, DNS, non-2xx) resolves to allow,
            // matching "missing robots": we never invent a block.
            let allowed = !self.robots_probe.probe(host, &self.user_agent).unwrap_or(false);
            self.robots_cache.borrow_mut().record(host, allowed, &self.now);
        }
        let robots_allowed = self.robots_cache.borrow().allowed(host);
        let throttle_elapsed = self.throttle.borrow().elapsed(host, &self.now);

        match admit(robots_allowed, true, throttle_elapsed) {
            crate::scheduler::Admission::DenyRobots => {
                return Ok(FetchOutcome {
                    status: 451,
                    blocked_by_robots: true,
                    title: None,
                    html: None,
                    telemetry: FetchTelemetry { retry_count: 0, degraded_from_mode: None, degraded_reason: None },
                });
            }
            crate::scheduler::Admission::DenyThrottle => return Err(FetchError::RateLimited),
            crate::scheduler::Admission::DenyBudget | crate::scheduler::Admission::Admit => {}
        }

        self.throttle.borrow_mut().record_fetch(host, &self.now);
        let mut fetchers: std::collections::BTreeMap<FetcherMode, &dyn Fetcher> = std::collections::BTreeMap::new();
        fetchers.insert(FetcherMode::Http, &self.http);
        FetchScheduler::new(fetchers, self.retry_budget).dispatch(url, host, FetcherMode::Http)
    }
}
