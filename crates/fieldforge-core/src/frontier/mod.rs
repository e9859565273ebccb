// fieldforge-core/src/frontier/mod.rs
// ============================================================================
// Module: Frontier Scheduler
// Description: Chooses the next round's deepening tier and decides when to stop.
// Purpose: Bound how many rounds a product run takes.
// Dependencies: crate::model::identifiers
// ============================================================================

//! ## Overview
//! The frontier scheduler never fetches or extracts anything itself; it
//! consumes the running tallies a round summary already carries
//! (`missing_required_fields`, `critical_fields_below_pass_target`, and two
//! no-progress counters) and answers two questions: how deep should the next
//! round dig, and should there even be a next round.

use crate::model::identifiers::FieldKey;

// ============================================================================
// SECTION: Mode & Tier
// ============================================================================

/// Research aggressiveness mode for a product run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cap deepening at tier2 (lab/review) regardless of no-progress streak.
    Standard,
    /// Escalate to tier3 (retailer) once critical fields stall.
    UberAggressive,
}

/// How deep the next round should search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeepeningTier {
    /// Manufacturer-only.
    Tier1,
    /// Manufacturer + lab/review.
    Tier2,
    /// Manufacturer + lab/review + retailer.
    Tier3,
}

/// A minimal round summary the frontier scheduler reasons over.
#[derive(Debug, Clone, Default)]
pub struct RoundSummary {
    /// Required fields still `unk` after this round.
    pub missing_required_fields: Vec<FieldKey>,
    /// Critical fields below their confidence pass target after this round.
    pub critical_fields_below_pass_target: Vec<FieldKey>,
    /// Whether this round yielded at least one new high-confidence field.
    pub had_new_high_yield_field: bool,
    /// Whether this round yielded at least one new field at all.
    pub had_new_field: bool,
}

/// Why a product run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every required field is present and no critical field is below target.
    RequiredAndCriticalSatisfied,
    /// Two consecutive rounds produced neither new high-yield nor new fields.
    DiminishingReturns,
    /// The deepening frontier is exhausted and nothing new was found.
    RequiredSearchExhaustedNoNewFields,
    /// A budget ceiling was hit.
    BudgetExhausted,
}

/// Minimum consecutive no-progress rounds before escalating deepening tier
/// or declaring diminishing returns.
pub const NO_PROGRESS_THRESHOLD: u32 = 2;

/// Resolves the deepening tier for the next round.
///
/// `uber_aggressive` mode escalates to [`DeepeningTier::Tier3`] once critical
/// fields remain unresolved after [`NO_PROGRESS_THRESHOLD`] stagnant rounds;
/// standard mode never exceeds [`DeepeningTier::Tier2`].
#[must_use]
pub fn resolve_deepening_tier(
    round: u32,
    mode: Mode,
    previous_summary: Option<&RoundSummary>,
    no_progress_rounds: u32,
) -> DeepeningTier {
    if round == 0 {
        return DeepeningTier::Tier1;
    }
    let critical_missing = previous_summary.is_some_and(|s| !s.critical_fields_below_pass_target.is_empty());
    match mode {
        Mode::UberAggressive if critical_missing && no_progress_rounds >= NO_PROGRESS_THRESHOLD => DeepeningTier::Tier3,
        Mode::UberAggressive => DeepeningTier::Tier2,
        Mode::Standard => DeepeningTier::Tier2,
    }
}

/// Decides whether to stop a product run after `round`, and why.
///
/// Returns `None` to continue into another round.
#[must_use]
pub fn uber_stop_decision(
    summary: &RoundSummary,
    round: u32,
    no_new_high_yield_rounds: u32,
    no_new_fields_rounds: u32,
) -> Option<StopReason> {
    if summary.missing_required_fields.is_empty() && summary.critical_fields_below_pass_target.is_empty() {
        return Some(StopReason::RequiredAndCriticalSatisfied);
    }
    if no_new_high_yield_rounds >= NO_PROGRESS_THRESHOLD && no_new_fields_rounds >= NO_PROGRESS_THRESHOLD {
        return Some(StopReason::DiminishingReturns);
    }
    let _ = round;
    None
}

/// Updates the two no-progress counters after a round, per whether it
/// yielded a new high-yield field / any new field at all.
#[must_use]
pub fn advance_no_progress_counters(summary: &RoundSummary, no_new_high_yield_rounds: u32, no_new_fields_rounds: u32) -> (u32, u32) {
    let high_yield = if summary.had_new_high_yield_field { 0 } else { no_new_high_yield_rounds + 1 };
    let any_field = if summary.had_new_field { 0 } else { no_new_fields_rounds + 1 };
    (high_yield, any_field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_round_always_starts_at_tier1() {
        let tier = resolve_deepening_tier(0, Mode::UberAggressive, None, 0);
        assert_eq!(tier, DeepeningTier::Tier1);
    }

    #[test]
    fn standard_mode_never_exceeds_tier2() {
        let summary = RoundSummary {
            critical_fields_below_pass_target: vec![FieldKey::new("sensor")],
            ..Default::default()
        };
        let tier = resolve_deepening_tier(3, Mode::Standard, Some(&summary), 5);
        assert_eq!(tier, DeepeningTier::Tier2);
    }

    #[test]
    fn uber_aggressive_escalates_to_tier3_after_stagnation() {
        let summary = RoundSummary {
            critical_fields_below_pass_target: vec![FieldKey::new("sensor")],
            ..Default::default()
        };
        let tier = resolve_deepening_tier(3, Mode::UberAggressive, Some(&summary), 2);
        assert_eq!(tier, DeepeningTier::Tier3);
    }

    #[test]
    fn uber_aggressive_stays_tier2_before_stagnation_threshold() {
        let summary = RoundSummary {
            critical_fields_below_pass_target: vec![FieldKey::new("sensor")],
            ..Default::default()
        };
        let tier = resolve_deepening_tier(3, Mode::UberAggressive, Some(&summary), 1);
        assert_eq!(tier, DeepeningTier::Tier2);
    }

    #[test]
    fn stops_when_required_and_critical_satisfied() {
        let summary = RoundSummary::default();
        let decision = uber_stop_decision(&summary, 1, 0, 0);
        assert_eq!(decision, Some(StopReason::RequiredAndCriticalSatisfied));
    }

    #[test]
    fn stops_on_diminishing_returns() {
        let summary = RoundSummary {
            missing_required_fields: vec![FieldKey::new("dpi")],
            ..Default::default()
        };
        let decision = uber_stop_decision(&summary, 4, 2, 2);
        assert_eq!(decision, Some(StopReason::DiminishingReturns));
    }

    #[test]
    fn continues_when_progress_is_still_being_made() {
        let summary = RoundSummary {
            missing_required_fields: vec![FieldKey::new("dpi")],
            ..Default::default()
        };
        let decision = uber_stop_decision(&summary, 1, 0, 0);
        assert_eq!(decision, None);
    }

    #[test]
    fn no_progress_counters_reset_on_new_field() {
        let summary = RoundSummary {
            had_new_field: true,
            ..Default::default()
        };
        let (high_yield, any_field) = advance_no_progress_counters(&summary, 3, 3);
        assert_eq!(high_yield, 4);
        assert_eq!(any_field, 0);
    }
}
