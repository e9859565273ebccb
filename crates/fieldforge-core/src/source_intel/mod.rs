// fieldforge-core/src/source_intel/mod.rs
// ============================================================================
// Module: Source Intel
// Description: Per-domain statistics aggregation and promotion/demotion suggestions.
// Purpose: Let a category's approved-domain set evolve from observed outcomes.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Source intel never mutates the approved-domain set itself; it aggregates
//! per-domain hit/miss counts across runs and, once a domain has crossed a
//! minimum-attempts floor, suggests promotion or demotion against explicit,
//! externally configured per-level thresholds.

use std::collections::BTreeMap;

/// Promotion/demotion thresholds for one category, externalized as config
/// rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceIntelThresholds {
    /// Minimum number of attempts before a domain is eligible for either
    /// suggestion.
    pub min_attempts: u32,
    /// Accept-rate at or above which an unapproved domain is suggested for
    /// promotion.
    pub promote_accept_rate: f64,
    /// Accept-rate at or below which an approved domain is suggested for
    /// demotion.
    pub demote_accept_rate: f64,
}

impl Default for SourceIntelThresholds {
    fn default() -> Self {
        Self {
            min_attempts: 5,
            promote_accept_rate: 0.85,
            demote_accept_rate: 0.35,
        }
    }
}

/// Running hit/miss statistics for one root domain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DomainStats {
    /// Candidates accepted by the auditor/consensus from this domain.
    pub accepted: u32,
    /// Candidates rejected (verification failure, conflict loss, etc.).
    pub rejected: u32,
    /// Whether this domain is currently in the category's approved set.
    pub approved: bool,
}

impl DomainStats {
    /// Total attempts observed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.accepted + self.rejected
    }

    /// Accept rate, `0.0` with no attempts.
    #[must_use]
    pub fn accept_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.0
        } else {
            f64::from(self.accepted) / f64::from(attempts)
        }
    }
}

/// Aggregates per-domain statistics across product runs for one category.
#[derive(Debug, Clone, Default)]
pub struct SourceIntel {
    domains: BTreeMap<String, DomainStats>,
}

impl SourceIntel {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one candidate outcome for `domain`.
    pub fn record(&mut self, domain: &str, accepted: bool, currently_approved: bool) {
        let entry = self.domains.entry(domain.to_string()).or_default();
        entry.approved = currently_approved;
        if accepted {
            entry.accepted += 1;
        } else {
            entry.rejected += 1;
        }
    }

    /// Returns the stats recorded for `domain`, if any.
    #[must_use]
    pub fn stats_for(&self, domain: &str) -> Option<&DomainStats> {
        self.domains.get(domain)
    }
}

/// A suggested change to a category's approved-domain set.
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    /// Domain should be added to the approved set.
    Promote {
        /// Root domain being suggested.
        domain: String,
        /// Observed accept rate driving the suggestion.
        accept_rate: f64,
    },
    /// Domain should be removed from the approved set.
    Demote {
        /// Root domain being suggested.
        domain: String,
        /// Observed accept rate driving the suggestion.
        accept_rate: f64,
    },
}

/// Emits promotion/demotion suggestions for every domain that has crossed
/// `thresholds.min_attempts`, honoring the minimum-attempts floor.
#[must_use]
pub fn suggest(intel: &SourceIntel, thresholds: &SourceIntelThresholds) -> Vec<Suggestion> {
    let mut out = Vec::new();
    for (domain, stats) in &intel.domains {
        if stats.attempts() < thresholds.min_attempts {
            continue;
        }
        let rate = stats.accept_rate();
        if !stats.approved && rate >= thresholds.promote_accept_rate {
            out.push(Suggestion::Promote { domain: domain.clone(), accept_rate: rate });
        } else if stats.approved && rate <= thresholds.demote_accept_rate {
            out.push(Suggestion::Demote { domain: domain.clone(), accept_rate: rate });
        }
    }
    out
}
