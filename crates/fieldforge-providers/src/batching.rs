// fieldforge-providers/src/batching.rs
// ============================================================================
// Module: LLM Field Batching
// Description: Groups fields into at most 7 batches by difficulty and model route.
// Purpose: Keep each LLM call small and routed to the cheapest model that can answer it.
// Dependencies: fieldforge-core
// ============================================================================

//! ## Overview
//! Batching never exceeds [`MAX_BATCHES`]; batches are built by grouping
//! fields that already share a difficulty tier (a simple proxy for
//! co-extraction affinity — fields of the same difficulty tend to come from
//! the same page region). Any batch containing a `hard`/`instrumented` field,
//! or explicitly forced high, routes to the reasoning model; everything else
//! routes to the fast model.

use fieldforge_core::model::identifiers::FieldKey;
use fieldforge_core::model::rule::Difficulty;

/// Maximum number of LLM batches per round.
pub const MAX_BATCHES: usize = 7;

/// Which model tier a batch should route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Cheap, fast model for easy/medium batches.
    Fast,
    /// Slower, higher-reasoning model for hard/instrumented/forced-high batches.
    Reasoning,
}

/// One batch of fields to send in a single LLM call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Fields in this batch.
    pub fields: Vec<FieldKey>,
    /// Model route this batch should use.
    pub route: Route,
}

/// One field awaiting batching, with its compiled difficulty and whether the
/// runtime has forced it onto the high-tier route regardless of difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingField<'a> {
    /// Field key.
    pub field: &'a FieldKey,
    /// Compiled difficulty.
    pub difficulty: Difficulty,
    /// Whether the runtime has forced this field onto the reasoning route.
    pub forced_high: bool,
}

fn route_for(difficulty: Difficulty, forced_high: bool) -> Route {
    if forced_high || matches!(difficulty, Difficulty::Hard | Difficulty::Instrumented) {
        Route::Reasoning
    } else {
        Route::Fast
    }
}

/// Groups `fields` into at most [`MAX_BATCHES`] batches, first by route
/// (fast vs. reasoning), then packing each route's fields evenly across the
/// batches still available to it.
#[must_use]
pub fn build_batches(fields: &[PendingField<'_>]) -> Vec<Batch> {
    let mut fast: Vec<FieldKey> = Vec::new();
    let mut reasoning: Vec<FieldKey> = Vec::new();
    for pending in fields {
        match route_for(pending.difficulty, pending.forced_high) {
            Route::Fast => fast.push(pending.field.clone()),
            Route::Reasoning => reasoning.push(pending.field.clone()),
        }
    }

    let mut batches = Vec::new();
    batches.extend(pack_route(fast, Route::Fast, MAX_BATCHES));
    let remaining = MAX_BATCHES.saturating_sub(batches.len());
    batches.extend(pack_route(reasoning, Route::Reasoning, remaining.max(1)));
    batches
}

fn pack_route(fields: Vec<FieldKey>, route: Route, max_batches: usize) -> Vec<Batch> {
    if fields.is_empty() {
        return Vec::new();
    }
    let batch_count = max_batches.max(1).min(fields.len());
    let mut batches: Vec<Vec<FieldKey>> = vec![Vec::new(); batch_count];
    for (index, field) in fields.into_iter().enumerate() {
        batches[index % batch_count].push(field);
    }
    batches.into_iter().filter(|b| !b.is_empty()).map(|fields| Batch { fields, route }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> FieldKey {
        FieldKey::new(name)
    }

    #[test]
    fn easy_and_medium_fields_route_fast() {
        let dpi = field("dpi");
        let sensor = field("sensor");
        let pending = vec![
            PendingField { field: &dpi, difficulty: Difficulty::Easy, forced_high: false },
            PendingField { field: &sensor, difficulty: Difficulty::Medium, forced_high: false },
        ];
        let batches = build_batches(&pending);
        assert!(batches.iter().all(|b| b.route == Route::Fast));
    }

    #[test]
    fn hard_field_routes_reasoning() {
        let weight = field("weight");
        let pending = vec![PendingField { field: &weight, difficulty: Difficulty::Hard, forced_high: false }];
        let batches = build_batches(&pending);
        assert_eq!(batches[0].route, Route::Reasoning);
    }

    #[test]
    fn forced_high_overrides_easy_difficulty() {
        let dpi = field("dpi");
        let pending = vec![PendingField { field: &dpi, difficulty: Difficulty::Easy, forced_high: true }];
        let batches = build_batches(&pending);
        assert_eq!(batches[0].route, Route::Reasoning);
    }

    #[test]
    fn never_exceeds_max_batches() {
        let keys: Vec<FieldKey> = (0..40).map(|i| field(&format!("field_{i}"))).collect();
        let pending: Vec<PendingField<'_>> =
            keys.iter().map(|field| PendingField { field, difficulty: Difficulty::Easy, forced_high: false }).collect();
        let batches = build_batches(&pending);
        assert!(batches.len() <= MAX_BATCHES);
    }

    #[test]
    fn every_field_appears_exactly_once() {
        let dpi = field("dpi");
        let sensor = field("sensor");
        let weight = field("weight");
        let pending = vec![
            PendingField { field: &dpi, difficulty: Difficulty::Easy, forced_high: false },
            PendingField { field: &sensor, difficulty: Difficulty::Medium, forced_high: false },
            PendingField { field: &weight, difficulty: Difficulty::Hard, forced_high: false },
        ];
        let batches = build_batches(&pending);
        let mut seen: Vec<FieldKey> = batches.iter().flat_map(|b| b.fields.clone()).collect();
        seen.sort();
        assert_eq!(seen, vec![field("dpi"), field("sensor"), field("weight")]);
    }
}
