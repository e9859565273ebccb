// fieldforge-core/src/drift/mod.rs
// ============================================================================
// Module: Drift Scheduler
// Description: Baselines per-product source content hashes and reconciles re-runs.
// Purpose: Catch stale published records without re-scanning everything.
// Dependencies: crate::model::identifiers
// ============================================================================

//! ## Overview
//! Drift detection never touches the network itself — it compares content
//! hashes the fetch scheduler already recorded. [`scan_and_enqueue`] seeds or
//! checks a baseline per source; [`reconcile`] decides what a drift-triggered
//! re-extraction does to an already-published record.

use std::collections::BTreeMap;

use crate::model::identifiers::ProductId;
use crate::model::identifiers::SourceId;

// ============================================================================
// SECTION: Baselines
// ============================================================================

/// Content-hash baseline for one source page backing a published product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBaseline {
    /// Hash of the raw fetched page content.
    pub page_content_hash: String,
    /// Hash of the extracted, normalized text.
    pub text_hash: String,
}

/// Per-product baselines keyed by source.
#[derive(Debug, Clone, Default)]
pub struct BaselineStore {
    baselines: BTreeMap<(ProductId, SourceId), SourceBaseline>,
}

impl BaselineStore {
    /// Creates an empty baseline store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded baseline, if one exists.
    #[must_use]
    pub fn get(&self, product_id: &ProductId, source_id: &SourceId) -> Option<&SourceBaseline> {
        self.baselines.get(&(product_id.clone(), source_id.clone()))
    }

    /// Overwrites the baseline for a product/source pair.
    pub fn set(&mut self, product_id: ProductId, source_id: SourceId, baseline: SourceBaseline) {
        self.baselines.insert((product_id, source_id), baseline);
    }
}

/// What a drift scan found for one source observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No baseline existed yet; one was seeded and no action is needed.
    Seeded,
    /// The baseline matches; nothing changed.
    Unchanged,
    /// The baseline's content or text hash changed since last observed.
    Drifted,
}

/// The hint attached to a drifted product when it is enqueued for
/// re-extraction.
pub const DRIFT_REEXTRACT_HINT: &str = "drift_reextract";

/// Scans one observed source against its stored baseline, seeding it on
/// first sight, and returns both the outcome and whether the product should
/// be enqueued for re-extraction.
pub fn scan_and_enqueue(
    store: &mut BaselineStore,
    product_id: &ProductId,
    source_id: &SourceId,
    observed: SourceBaseline,
) -> ScanOutcome {
    match store.get(product_id, source_id) {
        None => {
            store.set(product_id.clone(), source_id.clone(), observed);
            ScanOutcome::Seeded
        }
        Some(baseline) if *baseline == observed => ScanOutcome::Unchanged,
        Some(_) => {
            store.set(product_id.clone(), source_id.clone(), observed);
            ScanOutcome::Drifted
        }
    }
}

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// The disposition of a drift-triggered re-extraction against the currently
/// published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No value diff and every evidence ref carries a non-empty snippet hash:
    /// safe to republish without human review.
    AutoRepublished,
    /// A value changed: hold for manual review rather than overwrite.
    QueuedForReview,
    /// Missing or invalid snippet hashes: do not trust either record.
    Quarantined,
}

/// One field's comparison between the published and freshly re-extracted
/// record.
#[derive(Debug, Clone)]
pub struct FieldComparison {
    /// Whether the published and new values differ.
    pub value_changed: bool,
    /// Whether every evidence ref backing the new value carries a non-empty
    /// snippet hash.
    pub evidence_hashes_valid: bool,
}

/// Reconciles a re-extraction against the published record. Auto-republish
/// requires every field's value to be unchanged AND every evidence ref to
/// have a non-empty `snippet_hash`.
#[must_use]
pub fn reconcile(comparisons: &[FieldComparison]) -> ReconcileOutcome {
    if comparisons.iter().any(|c| !c.evidence_hashes_valid) {
        return ReconcileOutcome::Quarantined;
    }
    if comparisons.iter().any(|c| c.value_changed) {
        return ReconcileOutcome::QueuedForReview;
    }
    ReconcileOutcome::AutoRepublished
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(page: &str, text: &str) -> SourceBaseline {
        SourceBaseline {
            page_content_hash: page.to_string(),
            text_hash: text.to_string(),
        }
    }

    #[test]
    fn first_scan_seeds_baseline() {
        let mut store = BaselineStore::new();
        let product = ProductId::new("mouse-razer-viper-v3-pro");
        let source = SourceId::new("razer.com/viper-v3-pro");
        let outcome = scan_and_enqueue(&mut store, &product, &source, baseline("sha:aaa", "sha:txt_a"));
        assert_eq!(outcome, ScanOutcome::Seeded);
        assert_eq!(store.get(&product, &source), Some(&baseline("sha:aaa", "sha:txt_a")));
    }

    #[test]
    fn unchanged_content_hash_reports_unchanged() {
        let mut store = BaselineStore::new();
        let product = ProductId::new("mouse-razer-viper-v3-pro");
        let source = SourceId::new("razer.com/viper-v3-pro");
        scan_and_enqueue(&mut store, &product, &source, baseline("sha:aaa", "sha:txt_a"));
        let outcome = scan_and_enqueue(&mut store, &product, &source, baseline("sha:aaa", "sha:txt_a"));
        assert_eq!(outcome, ScanOutcome::Unchanged);
    }

    #[test]
    fn changed_content_hash_reports_drifted_and_updates_baseline() {
        let mut store = BaselineStore::new();
        let product = ProductId::new("mouse-razer-viper-v3-pro");
        let source = SourceId::new("razer.com/viper-v3-pro");
        scan_and_enqueue(&mut store, &product, &source, baseline("sha:aaa", "sha:txt_a"));
        let outcome = scan_and_enqueue(&mut store, &product, &source, baseline("sha:bbb", "sha:txt_b"));
        assert_eq!(outcome, ScanOutcome::Drifted);
        assert_eq!(store.get(&product, &source), Some(&baseline("sha:bbb", "sha:txt_b")));
    }

    #[test]
    fn reconcile_auto_republishes_when_unchanged_and_valid() {
        let comparisons = vec![FieldComparison { value_changed: false, evidence_hashes_valid: true }];
        assert_eq!(reconcile(&comparisons), ReconcileOutcome::AutoRepublished);
    }

    #[test]
    fn reconcile_queues_for_review_on_value_diff() {
        let comparisons = vec![FieldComparison { value_changed: true, evidence_hashes_valid: true }];
        assert_eq!(reconcile(&comparisons), ReconcileOutcome::QueuedForReview);
    }

    #[test]
    fn reconcile_quarantines_on_invalid_hashes_even_without_value_diff() {
        let comparisons = vec![FieldComparison { value_changed: false, evidence_hashes_valid: false }];
        assert_eq!(reconcile(&comparisons), ReconcileOutcome::Quarantined);
    }
}
