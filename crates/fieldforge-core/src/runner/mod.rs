// fieldforge-core/src/runner/mod.rs
// ============================================================================
// Module: Round Orchestrator / Product Runner
// Description: Top-level state machine composing gate, budget, consensus, constraints.
// Purpose: Drive one product through its rounds to a stop decision.
// Dependencies: crate::{budget, constraint, consensus, frontier, identity, model}
// ============================================================================

//! ## Overview
//! The runner never fetches or extracts anything itself — those live in
//! `fieldforge-fetch`/`fieldforge-providers` behind the capability traits in
//! [`crate::interfaces`]. What it owns is the state transition sequence
//! `GATE → PLAN → FETCH → EXTRACT → VERIFY → MERGE → CONSENSUS → CONSTRAIN →
//! DECIDE → (PLAN|STOP)` and the budget check before `PLAN` and before each
//! `FETCH` admission.

use std::collections::BTreeMap;

use crate::budget::BudgetCounters;
use crate::budget::BudgetSet;
use crate::constraint::FieldBag;
use crate::constraint::Implication;
use crate::consensus;
use crate::frontier::Mode;
use crate::frontier::RoundSummary;
use crate::frontier::StopReason as FrontierStopReason;
use crate::frontier;
use crate::identity::CatalogIndex;
use crate::identity::GateDecision;
use crate::identity::RejectReason;
use crate::model::candidate::Candidate;
use crate::model::contradiction::Contradiction;
use crate::model::field_value::FieldValue;
use crate::model::identifiers::FieldKey;
use crate::model::identifiers::Identity;
use crate::model::record::ProductRecord;
use crate::model::rule::Contract;
use crate::model::rule::RequiredLevel;
use crate::model::unknown_reason::UnknownReason;

/// The runner's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Validating identity against the catalog.
    Gate,
    /// Planning URLs/queries for the next round.
    Plan,
    /// Fetching planned URLs.
    Fetch,
    /// Running deterministic (and, if needed, LLM) extraction.
    Extract,
    /// Auditing extracted candidates' citations.
    Verify,
    /// Classifying per-field agreement.
    Merge,
    /// Resolving winning values and provenance.
    Consensus,
    /// Evaluating cross-field and compound-range constraints.
    Constrain,
    /// Deciding whether to stop or plan another round.
    Decide,
    /// Terminal: no further rounds.
    Stopped,
}

/// Final disposition of a product run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every required field is present and every critical field passes.
    Complete,
    /// Two consecutive rounds made no new progress.
    DiminishingReturns,
    /// The search frontier is exhausted with required fields still missing.
    RequiredSearchExhaustedNoNewFields,
    /// A budget ceiling was hit before the round could complete.
    BudgetExhausted,
    /// The run was cancelled by an external signal.
    SignalTerminated,
}

/// Fatal failure that blocks a product before any run artifacts exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// The identity gate rejected this product; never affects other products.
    IdentityRejected(RejectReason),
}

/// Per-round tallies the runner accumulates to hand to the frontier scheduler.
#[derive(Debug, Clone, Default)]
struct ProgressCounters {
    no_new_high_yield_rounds: u32,
    no_new_fields_rounds: u32,
}

/// Drives one product's rounds to completion.
///
/// Owns the mutable [`ProductRecord`], budget counters, and round number;
/// each call into [`ProductRunner::submit_round`] advances it through
/// `EXTRACT..DECIDE` for one round's already-collected candidates.
pub struct ProductRunner {
    state: State,
    record: ProductRecord,
    round: u32,
    mode: Mode,
    budget_limits: BudgetSet,
    budget: BudgetCounters,
    constraints: Vec<Implication>,
    progress: ProgressCounters,
    contradictions: Vec<Contradiction>,
    approved_domain_floors: consensus::ApprovedDomainFloors,
}

impl ProductRunner {
    /// Runs the identity gate and, on acceptance, returns a runner parked at
    /// [`State::Plan`]. The gate is evaluated exactly once per product and
    /// never re-run mid-run (identity is never overwritten).
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::IdentityRejected`] when the gate rejects
    /// `identity`; the caller must not create any run artifacts for it.
    pub fn gate(
        identity: Identity,
        catalog: &CatalogIndex,
        budget_limits: BudgetSet,
        mode: Mode,
        constraints: Vec<Implication>,
    ) -> Result<Self, RunnerError> {
        Self::gate_with_floors(
            identity,
            catalog,
            budget_limits,
            mode,
            constraints,
            consensus::ApprovedDomainFloors::default(),
        )
    }

    /// Same as [`Self::gate`], but with an explicit per-level
    /// distinct-approved-domain floor table rather than the default one.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::IdentityRejected`] when the gate rejects
    /// `identity`; the caller must not create any run artifacts for it.
    pub fn gate_with_floors(
        identity: Identity,
        catalog: &CatalogIndex,
        budget_limits: BudgetSet,
        mode: Mode,
        constraints: Vec<Implication>,
        approved_domain_floors: consensus::ApprovedDomainFloors,
    ) -> Result<Self, RunnerError> {
        let decision: GateDecision = crate::identity::validate(&identity, catalog);
        if !decision.valid {
            return Err(RunnerError::IdentityRejected(
                decision.reason.unwrap_or(RejectReason::NoMatch),
            ));
        }
        let category = identity.category.clone();
        Ok(Self {
            state: State::Plan,
            record: ProductRecord::new(category, identity),
            round: 0,
            mode,
            budget_limits,
            budget: BudgetCounters::new(),
            constraints,
            progress: ProgressCounters::default(),
            contradictions: Vec::new(),
            approved_domain_floors,
        })
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Current round number (0-indexed; incremented after each `DECIDE`).
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Read-only access to the accumulated record.
    #[must_use]
    pub const fn record(&self) -> &ProductRecord {
        &self.record
    }

    /// Contradictions accumulated across all rounds so far.
    #[must_use]
    pub fn contradictions(&self) -> &[Contradiction] {
        &self.contradictions
    }

    /// Checks budget admission before planning the next round (budget
    /// is checked before `PLAN` and before each `FETCH` admission).
    #[must_use]
    pub fn can_plan(&self) -> bool {
        self.budget.can_query(&self.budget_limits)
    }

    /// Checks budget admission for one more URL fetch within the round.
    #[must_use]
    pub fn can_fetch(&self) -> bool {
        self.budget.can_fetch_url(&self.budget_limits)
    }

    /// Mutable access to budget counters, for the caller's fetch/LLM loop to
    /// record usage against (`fieldforge-fetch`/`fieldforge-providers` own
    /// the actual I/O; the runner only owns the ceiling checks).
    pub fn budget_mut(&mut self) -> &mut BudgetCounters {
        &mut self.budget
    }

    /// Advances `Gate`-accepted runner through `EXTRACT..DECIDE` for one
    /// round, given every field's surviving, audited candidates plus the
    /// rule contract and required level needed to resolve them.
    ///
    /// Returns the round's [`StopReason`] once the runner reaches
    /// [`State::Stopped`], or `None` to continue into another round.
    #[must_use]
    pub fn submit_round(
        &mut self,
        candidates_by_field: BTreeMap<FieldKey, Vec<Candidate>>,
        rules: &BTreeMap<FieldKey, (Contract, RequiredLevel)>,
    ) -> Option<StopReason> {
        self.state = State::Verify;
        // Verification already ran upstream (`fieldforge-core::auditor`); this
        // stage only consumes its survivors.
        self.state = State::Merge;
        // Merge classification is folded into `consensus::resolve` below.
        self.state = State::Consensus;

        let mut had_new_field = false;
        let mut had_new_high_yield_field = false;
        for (field, candidates) in candidates_by_field {
            let Some((contract, required_level)) = rules.get(&field) else {
                continue;
            };
            let was_known = self.record.fields.get(&field).is_some_and(|v| !v.is_unknown());
            let resolved = consensus::resolve(candidates, contract, *required_level, &self.approved_domain_floors);
            let value = match resolved {
                Some(provenance) => {
                    if !was_known {
                        had_new_field = true;
                        if provenance.confidence >= 0.8 {
                            had_new_high_yield_field = true;
                        }
                    }
                    let value = provenance.value.clone();
                    self.record.provenance.insert(field.clone(), provenance);
                    value
                }
                None => FieldValue::unknown(UnknownReason::MissingEvidence),
            };
            self.record.fields.insert(field, value);
        }

        self.state = State::Constrain;
        let bag = FieldBag::new(self.record.fields.clone());
        let round_contradictions = crate::constraint::check_all(&self.constraints, &bag);
        self.contradictions.extend(round_contradictions.iter().cloned());

        self.state = State::Decide;
        let missing_required: Vec<FieldKey> = rules
            .iter()
            .filter(|(_, (_, level))| *level == RequiredLevel::Required)
            .filter(|(field, _)| self.record.fields.get(*field).is_none_or(FieldValue::is_unknown))
            .map(|(field, _)| field.clone())
            .collect();
        let critical_below_target: Vec<FieldKey> = rules
            .iter()
            .filter(|(_, (_, level))| *level == RequiredLevel::Critical)
            .filter(|(field, _)| {
                self.record
                    .provenance
                    .get(*field)
                    .is_none_or(|p| p.confidence < 0.8)
            })
            .map(|(field, _)| field.clone())
            .collect();

        let summary = RoundSummary {
            missing_required_fields: missing_required,
            critical_fields_below_pass_target: critical_below_target,
            had_new_high_yield_field,
            had_new_field,
        };

        let (no_high_yield, no_fields) = frontier::advance_no_progress_counters(
            &summary,
            self.progress.no_new_high_yield_rounds,
            self.progress.no_new_fields_rounds,
        );
        self.progress.no_new_high_yield_rounds = no_high_yield;
        self.progress.no_new_fields_rounds = no_fields;

        self.round += 1;

        let stop = if self.can_plan() {
            match frontier::uber_stop_decision(&summary, self.round, no_high_yield, no_fields) {
                Some(FrontierStopReason::RequiredAndCriticalSatisfied) => Some(StopReason::Complete),
                Some(FrontierStopReason::DiminishingReturns) => Some(StopReason::DiminishingReturns),
                Some(FrontierStopReason::RequiredSearchExhaustedNoNewFields) => {
                    Some(StopReason::RequiredSearchExhaustedNoNewFields)
                }
                Some(FrontierStopReason::BudgetExhausted) => Some(StopReason::BudgetExhausted),
                None => None,
            }
        } else {
            Some(StopReason::BudgetExhausted)
        };

        if stop.is_some() {
            self.state = State::Stopped;
            self.record.finalize_summary(rules, self.budget.cost_usd());
        } else {
            self.state = State::Plan;
        }
        stop
    }

    /// Marks the runner stopped by an external signal (graceful drain).
    pub fn terminate_on_signal(&mut self) {
        self.state = State::Stopped;
    }
}
