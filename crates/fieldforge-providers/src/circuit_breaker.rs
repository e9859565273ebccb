// fieldforge-providers/src/circuit_breaker.rs
// ============================================================================
// Module: Cortex Circuit Breaker
// Description: Trips after N consecutive sidecar failures, closes after a cooldown.
// Purpose: Stop hammering a dead sidecar executor while still degrading gracefully.
// Dependencies: fieldforge-core
// ============================================================================

//! ## Overview
//! While open, every task falls back to direct (non-sidecar) execution with
//! `fallback_reason=circuit_open`. The breaker never blocks — callers ask
//! [`CircuitBreaker::should_use_sidecar`] before dispatch and record the
//! outcome afterward; there is no internal clock, so `now` is always
//! caller-supplied (the pipeline never reads wall-clock time itself).

use fieldforge_core::model::time::Timestamp;

/// Number of consecutive sidecar failures before the breaker trips.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// How long the breaker stays open once tripped.
pub const DEFAULT_OPEN_DURATION: time::Duration = time::Duration::seconds(60);

/// Why a task fell back to direct execution instead of the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The breaker is currently open.
    CircuitOpen,
    /// The sidecar was never available this run.
    NonSidecar,
}

/// A point-in-time read of the breaker's state, safe to expose without
/// holding whatever lock guards the live breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    /// Whether the breaker is currently open.
    pub open: bool,
    /// When the breaker will next allow the sidecar, if open.
    pub open_until: Option<Timestamp>,
    /// Current consecutive-failure count.
    pub consecutive_failures: u32,
}

/// Tracks consecutive sidecar failures and the open/closed state they imply.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_duration: time::Duration,
    consecutive_failures: u32,
    open_until: Option<Timestamp>,
    sidecar_available_at_start: bool,
}

impl CircuitBreaker {
    /// Creates a breaker. `sidecar_available_at_start` models "if sidecar is
    /// unavailable at start, every task gets `fallback_non_sidecar`".
    #[must_use]
    pub fn new(failure_threshold: u32, open_duration: time::Duration, sidecar_available_at_start: bool) -> Self {
        Self {
            failure_threshold,
            open_duration,
            consecutive_failures: 0,
            open_until: None,
            sidecar_available_at_start,
        }
    }

    /// Creates a breaker using the default failure threshold and open duration.
    #[must_use]
    pub fn with_defaults(sidecar_available_at_start: bool) -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_DURATION, sidecar_available_at_start)
    }

    /// Returns whether the sidecar should be attempted at `now`, or the
    /// reason it should not.
    #[must_use]
    pub fn should_use_sidecar(&self, now: &Timestamp) -> Result<(), FallbackReason> {
        if !self.sidecar_available_at_start {
            return Err(FallbackReason::NonSidecar);
        }
        match self.open_until {
            Some(open_until) if *now < open_until => Err(FallbackReason::CircuitOpen),
            _ => Ok(()),
        }
    }

    /// Records a successful sidecar call, resetting the failure count and
    /// closing the breaker.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    /// Records a failed sidecar call at `now`, tripping the breaker once
    /// `consecutive_failures` reaches the threshold.
    pub fn record_failure(&mut self, now: &Timestamp) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_threshold {
            let base = time::OffsetDateTime::parse(&now.to_rfc3339(), &time::format_description::well_known::Rfc3339)
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
            self.open_until = Some(Timestamp::from_offset(base + self.open_duration));
        }
    }

    /// Returns a lock-free snapshot of the breaker's current state.
    #[must_use]
    pub fn snapshot(&self, now: &Timestamp) -> CircuitBreakerSnapshot {
        let open = self.open_until.is_some_and(|open_until| *now < open_until);
        CircuitBreakerSnapshot { open, open_until: self.open_until, consecutive_failures: self.consecutive_failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> Timestamp {
        Timestamp::parse(value).expect("valid")
    }

    #[test]
    fn unavailable_sidecar_always_falls_back_non_sidecar() {
        let breaker = CircuitBreaker::with_defaults(false);
        assert_eq!(breaker.should_use_sidecar(&ts("2026-07-28T00:00:00Z")), Err(FallbackReason::NonSidecar));
    }

    #[test]
    fn trips_after_threshold_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(3, time::Duration::seconds(60), true);
        let now = ts("2026-07-28T00:00:00Z");
        breaker.record_failure(&now);
        breaker.record_failure(&now);
        assert_eq!(breaker.should_use_sidecar(&now), Ok(()));
        breaker.record_failure(&now);
        assert_eq!(breaker.should_use_sidecar(&now), Err(FallbackReason::CircuitOpen));
    }

    #[test]
    fn closes_again_after_open_duration_elapses() {
        let mut breaker = CircuitBreaker::new(1, time::Duration::seconds(60), true);
        let start = ts("2026-07-28T00:00:00Z");
        breaker.record_failure(&start);
        assert_eq!(breaker.should_use_sidecar(&start), Err(FallbackReason::CircuitOpen));
        let later = ts("2026-07-28T00:01:01Z");
        assert_eq!(breaker.should_use_sidecar(&later), Ok(()));
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(3, time::Duration::seconds(60), true);
        let now = ts("2026-07-28T00:00:00Z");
        breaker.record_failure(&now);
        breaker.record_failure(&now);
        breaker.record_success();
        let snapshot = breaker.snapshot(&now);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(!snapshot.open);
    }
}
