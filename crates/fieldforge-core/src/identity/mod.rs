// fieldforge-core/src/identity/mod.rs
// ============================================================================
// Module: Identity Gate & Catalog Index
// Description: Validates (brand, model, variant) against a canonical catalog.
// Purpose: Reject fabricated identities before any research spend.
// Dependencies: crate::model::identifiers
// ============================================================================

//! ## Overview
//! The Identity Gate is the first stage of every round: it
//! never mutates identity, only accepts or rejects a proposed one against a
//! canonical catalog (or, failing that, an active-filtering fallback list).

use crate::model::identifiers::Brand;
use crate::model::identifiers::Identity;
use crate::model::identifiers::Model;
use crate::model::identifiers::ProductId;
use crate::model::identifiers::Variant;

/// Why an identity was rejected by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `variant` occurs as a word-boundary substring of `model`.
    VariantIsModelSubstring,
    /// The canonical catalog has an empty-variant row for `(brand, model)`,
    /// but a non-empty variant was proposed.
    CanonicalWithoutVariantExists,
    /// No canonical or active-filtering row matches `(brand, model, variant)`.
    NoMatch,
}

impl RejectReason {
    /// Returns the wire token for this rejection reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VariantIsModelSubstring => "variant_is_model_substring",
            Self::CanonicalWithoutVariantExists => "canonical_without_variant_exists",
            Self::NoMatch => "no_match",
        }
    }
}

/// Outcome of validating one identity against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    /// Whether the identity was accepted.
    pub valid: bool,
    /// Rejection reason, when `valid` is `false`.
    pub reason: Option<RejectReason>,
    /// The canonical product id, when accepted.
    pub canonical_product_id: Option<ProductId>,
}

impl GateDecision {
    fn accept(product_id: ProductId) -> Self {
        Self {
            valid: true,
            reason: None,
            canonical_product_id: Some(product_id),
        }
    }

    fn reject(reason: RejectReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            canonical_product_id: None,
        }
    }
}

/// One catalog row: a canonical `(brand, model, variant)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// Canonical brand.
    pub brand: Brand,
    /// Canonical model.
    pub model: Model,
    /// Canonical variant, empty when the catalog has none for this model.
    pub variant: Variant,
}

/// An indexed canonical product catalog, or an active-filtering fallback.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    rows: Vec<CatalogRow>,
}

impl CatalogIndex {
    /// Builds an index from catalog rows.
    #[must_use]
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self { rows }
    }

    /// Returns `true` when the catalog has no rows at all (the gate falls
    /// back to active-filtering rules in that case, rule 4).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn exact_match(&self, identity: &Identity) -> bool {
        self.rows.iter().any(|row| {
            row.brand == identity.brand && row.model == identity.model && row.variant == identity.variant
        })
    }

    fn empty_variant_row_exists(&self, brand: &Brand, model: &Model) -> bool {
        self.rows
            .iter()
            .any(|row| row.brand == *brand && row.model == *model && row.variant.as_str().is_empty())
    }
}

/// Returns whether `needle` occurs in `haystack` on a word boundary — i.e.
/// not as part of a larger alphanumeric run.
#[must_use]
pub fn is_word_boundary_substring(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    let bytes = haystack_lower.as_bytes();
    let mut start = 0;
    while let Some(offset) = haystack_lower[start..].find(&needle_lower) {
        let match_start = start + offset;
        let match_end = match_start + needle_lower.len();
        let before_ok = match_start == 0 || !is_word_char(bytes[match_start - 1]);
        let after_ok = match_end == bytes.len() || !is_word_char(bytes[match_end]);
        if before_ok && after_ok {
            return true;
        }
        start = match_start + 1;
        if start >= haystack_lower.len() {
            break;
        }
    }
    false
}

fn is_word_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

/// Validates an identity tuple against the catalog's rejection rules, in order.
#[must_use]
pub fn validate(identity: &Identity, catalog: &CatalogIndex) -> GateDecision {
    // Rule 2: a fabricated variant that is a substring of the model is
    // rejected before anything else is checked, catalog or no catalog.
    if !identity.variant.as_str().is_empty()
        && is_word_boundary_substring(identity.model.as_str(), identity.variant.as_str())
    {
        return GateDecision::reject(RejectReason::VariantIsModelSubstring);
    }

    // Rule 1: exact canonical match accepts immediately.
    if catalog.exact_match(identity) {
        return GateDecision::accept(identity.product_id());
    }

    // Rule 3: non-empty variant while the catalog has an empty-variant row
    // for the same (brand, model).
    if !identity.variant.as_str().is_empty()
        && catalog.empty_variant_row_exists(&identity.brand, &identity.model)
    {
        return GateDecision::reject(RejectReason::CanonicalWithoutVariantExists);
    }

    // Rule 4: no catalog available at all — fall back to accepting on the
    // same word-boundary/empty-variant rules alone (active-filtering mode).
    if catalog.is_empty() {
        return GateDecision::accept(identity.product_id());
    }

    GateDecision::reject(RejectReason::NoMatch)
}
