// fieldforge-core/src/consensus/mod.rs
// ============================================================================
// Module: Consensus Engine
// Description: Reduces per-field candidate agreement into published provenance.
// Purpose: Pick a winning value, score agreement, and gate on distinct sources.
// Dependencies: crate::model::{candidate, evidence, provenance, rule, tier}, crate::merger
// ============================================================================

//! ## Overview
//! Consensus runs last, after the critic and merger have classified each
//! field's agreement shape. It enforces the distinct-approved-
//! domain floor for required/critical fields, applies the selection policy
//! on conflicts, reduces `list_union` fields, and emits [`Provenance`].

use std::collections::BTreeSet;

use crate::merger::Agreement;
use crate::model::candidate::Candidate;
use crate::model::evidence::EvidenceRef;
use crate::model::field_value::FieldValue;
use crate::model::provenance::AgreementLabel;
use crate::model::provenance::Provenance;
use crate::model::rule::Contract;
use crate::model::rule::RequiredLevel;
use crate::model::unknown_reason::UnknownReason;

/// Maximum evidence refs attached to a field's published provenance.
pub const MAX_EVIDENCE_REFS: usize = 5;

/// Minimum distinct approved root domains required to resolve a field,
/// keyed by [`RequiredLevel`]. A level absent from the table (or mapped to
/// `0`) is not gated at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedDomainFloors {
    floors: std::collections::BTreeMap<RequiredLevel, usize>,
}

impl Default for ApprovedDomainFloors {
    /// `required` needs 2 distinct approved domains, `critical` needs 3;
    /// `expected`/`sometimes`/`deep` are ungated.
    fn default() -> Self {
        let mut floors = std::collections::BTreeMap::new();
        floors.insert(RequiredLevel::Required, 2);
        floors.insert(RequiredLevel::Critical, 3);
        Self { floors }
    }
}

impl ApprovedDomainFloors {
    /// Builds a floor table from explicit per-level overrides, leaving any
    /// level not present ungated.
    #[must_use]
    pub fn new(floors: std::collections::BTreeMap<RequiredLevel, usize>) -> Self {
        Self { floors }
    }

    /// Returns the distinct-approved-domain floor for `level`, `0` when the
    /// level is not gated.
    #[must_use]
    pub fn floor_for(&self, level: RequiredLevel) -> usize {
        self.floors.get(&level).copied().unwrap_or(0)
    }
}

fn distinct_approved_domains(candidates: &[Candidate]) -> usize {
    candidates
        .iter()
        .filter(|c| c.source.approved_domain)
        .map(|c| c.source.root_domain.clone())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Resolves one field's candidates into a final [`Provenance`], or `None`
/// when the field cannot be resolved at all (caller should then emit `unk`
/// with [`UnknownReason::MissingEvidence`]).
///
/// `required_level` and `floors` together govern the distinct-approved-
/// domain floor (step 1); `contract` governs list-union reduction (step 3).
#[must_use]
pub fn resolve(
    candidates: Vec<Candidate>,
    contract: &Contract,
    required_level: RequiredLevel,
    floors: &ApprovedDomainFloors,
) -> Option<Provenance> {
    if candidates.is_empty() {
        return None;
    }

    let floor = floors.floor_for(required_level);
    if floor > 0 && distinct_approved_domains(&candidates) < floor {
        return None;
    }

    let agreement = crate::merger::classify(candidates, contract);
    let winners = agreement.candidates().to_vec();

    let value = if contract.list_union {
        reduce_list_union(&winners)
    } else {
        select_winner(&winners).value.clone()
    };

    let agreement_score = agreement_score(&winners, &value);
    let agreement_label = agreement_label_for(&agreement);
    let confidence = select_winner(&winners).confidence.min(1.0).max(0.0) * agreement_score;
    let evidence = evidence_refs_for(&winners);

    Some(Provenance {
        value,
        evidence,
        confidence,
        agreement_label,
        agreement_score,
        needs_review: agreement.needs_review(),
    })
}

fn agreement_label_for(agreement: &Agreement) -> AgreementLabel {
    match agreement {
        Agreement::Unanimous { .. } => AgreementLabel::Unanimous,
        Agreement::WithinTolerance { .. } => AgreementLabel::WithinTolerance,
        Agreement::SourceDependent { .. } => AgreementLabel::SourceDependent,
        Agreement::Conflict { .. } => AgreementLabel::Conflict,
    }
}

/// Default selection policy: ascending tier rank, then method rank (via
/// `value_key` stability), then descending confidence, then recency is left
/// to caller ordering (candidates are expected pre-sorted newest-last by the
/// merge stage).
fn select_winner(candidates: &[Candidate]) -> &Candidate {
    candidates
        .iter()
        .min_by(|a, b| {
            a.source
                .tier
                .cmp(&b.source.tier)
                .then(b.confidence.total_cmp(&a.confidence))
        })
        .expect("resolve guarantees candidates is non-empty")
}

/// Unions numeric/string list values across candidates: numeric lists sort
/// descending and dedupe; string lists dedupe while preserving first-seen
/// order.
fn reduce_list_union(candidates: &[Candidate]) -> FieldValue {
    let mut numeric: Vec<f64> = Vec::new();
    let mut textual: Vec<String> = Vec::new();
    let mut saw_numeric = false;
    let mut saw_textual = false;

    for candidate in candidates {
        if let FieldValue::List(items) = &candidate.value {
            for item in items {
                match item {
                    FieldValue::Number(n) => {
                        saw_numeric = true;
                        if !numeric.contains(n) {
                            numeric.push(*n);
                        }
                    }
                    FieldValue::Text(s) => {
                        saw_textual = true;
                        if !textual.contains(s) {
                            textual.push(s.clone());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if saw_numeric && !saw_textual {
        numeric.sort_by(|a, b| b.total_cmp(a));
        FieldValue::List(numeric.into_iter().map(FieldValue::Number).collect())
    } else {
        FieldValue::List(textual.into_iter().map(FieldValue::Text).collect())
    }
}

/// Share of contributing candidates whose value matches the winning value
///.
fn agreement_score(candidates: &[Candidate], winning_value: &FieldValue) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    let winning_key = value_key(winning_value);
    let agreeing = candidates.iter().filter(|c| c.value_key() == winning_key).count();
    #[allow(clippy::cast_precision_loss)]
    let score = agreeing as f64 / candidates.len() as f64;
    score
}

fn value_key(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => format!("n:{n}"),
        FieldValue::Text(s) => format!("s:{s}"),
        FieldValue::Bool(b) => format!("b:{b}"),
        FieldValue::List(items) => format!("l:{items:?}"),
        FieldValue::Object(map) => format!("o:{map:?}"),
        FieldValue::Unknown { .. } => "unk".to_string(),
    }
}

/// Selects up to [`MAX_EVIDENCE_REFS`] evidence refs, preferring distinct
/// sources over multiple refs from the same one.
fn evidence_refs_for(candidates: &[Candidate]) -> Vec<EvidenceRef> {
    let mut seen_sources = BTreeSet::new();
    let mut refs = Vec::new();
    for candidate in candidates {
        if refs.len() >= MAX_EVIDENCE_REFS {
            break;
        }
        let snippet_id = match candidate.evidence_refs.first() {
            Some(id) => id.clone(),
            None => continue,
        };
        let source_key = candidate.source.root_domain.clone();
        if seen_sources.contains(&source_key) {
            continue;
        }
        seen_sources.insert(source_key);
        refs.push(EvidenceRef {
            id: format!("ev_{}", refs.len()),
            url: candidate.source.host.clone(),
            source_id: crate::model::identifiers::SourceId::new(candidate.source.host.clone()),
            tier: candidate.source.tier,
            snippet_id,
            snippet_hash: candidate.snippet_hash.clone(),
            quote: candidate.quote.clone(),
            quote_span: candidate.quote_span,
            method: candidate.method,
        });
    }
    refs
}

/// Builds the `unk` value/provenance pair for a field that could not be
/// resolved at all, tagged with `reason`.
#[must_use]
pub fn unresolved(reason: UnknownReason) -> FieldValue {
    FieldValue::unknown(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candidate::CandidateSource;
    use crate::model::evidence::Method;
    use crate::model::identifiers::FieldKey;
    use crate::model::rule::DataType;
    use crate::model::rule::Shape;
    use crate::model::tier::Tier;

    fn contract() -> Contract {
        Contract {
            data_type: DataType::Number,
            shape: Shape::Scalar,
            unit: None,
            r#enum: Vec::new(),
            aliases: std::collections::BTreeMap::new(),
            range: None,
            source_dependent: false,
            preserve_all: false,
            selection_policy: None,
            list_union: false,
            tolerance_epsilon: None,
        }
    }

    fn candidate(value: f64, tier: Tier, domain: &str, confidence: f64) -> Candidate {
        Candidate {
            field: FieldKey::new("dpi"),
            value: FieldValue::Number(value),
            method: Method::SpecTableMatch,
            source: CandidateSource {
                host: domain.to_string(),
                root_domain: domain.to_string(),
                tier,
                tier_name: tier.name().to_string(),
                approved_domain: true,
            },
            confidence,
            evidence_refs: vec![crate::model::identifiers::SnippetId::new("sn_1")],
            snippet_hash: "sha256:aaaa".to_string(),
            quote: "26000".to_string(),
            quote_span: None,
        }
    }

    #[test]
    fn refuses_required_field_with_fewer_than_two_approved_domains() {
        let candidates = vec![candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9)];
        let provenance = resolve(candidates, &contract(), RequiredLevel::Required, &ApprovedDomainFloors::default());
        assert!(provenance.is_none());
    }

    #[test]
    fn resolves_required_field_with_two_distinct_approved_domains() {
        let candidates = vec![
            candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9),
            candidate(26000.0, Tier::LabOrReview, "rtings.com", 0.8),
        ];
        let provenance = resolve(candidates, &contract(), RequiredLevel::Required, &ApprovedDomainFloors::default())
            .expect("two distinct approved domains satisfy the floor");
        assert_eq!(provenance.value.as_number(), Some(26000.0));
        assert_eq!(provenance.agreement_label, AgreementLabel::Unanimous);
        assert!((provenance.agreement_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn critical_field_needs_its_own_higher_floor() {
        let candidates = vec![
            candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9),
            candidate(26000.0, Tier::LabOrReview, "rtings.com", 0.8),
        ];
        // Default floors give `critical` a floor of 3; two domains isn't enough.
        let provenance = resolve(candidates, &contract(), RequiredLevel::Critical, &ApprovedDomainFloors::default());
        assert!(provenance.is_none());
    }

    #[test]
    fn ungated_level_resolves_with_a_single_approved_domain() {
        let candidates = vec![candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9)];
        let provenance =
            resolve(candidates, &contract(), RequiredLevel::Sometimes, &ApprovedDomainFloors::default())
                .expect("sometimes-level fields are ungated by default");
        assert_eq!(provenance.value.as_number(), Some(26000.0));
    }

    #[test]
    fn overridden_floor_table_is_honored() {
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert(RequiredLevel::Required, 1);
        let floors = ApprovedDomainFloors::new(overrides);
        let candidates = vec![candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9)];
        let provenance = resolve(candidates, &contract(), RequiredLevel::Required, &floors)
            .expect("a custom floor of 1 is satisfied by a single approved domain");
        assert_eq!(provenance.value.as_number(), Some(26000.0));
    }

    #[test]
    fn prefers_manufacturer_tier_on_conflict() {
        let candidates = vec![
            candidate(26000.0, Tier::Manufacturer, "razer.com", 0.7),
            candidate(20000.0, Tier::Retailer, "amazon.com", 0.95),
        ];
        let provenance = resolve(candidates, &contract(), RequiredLevel::Expected, &ApprovedDomainFloors::default()).expect("resolves");
        assert_eq!(provenance.value.as_number(), Some(26000.0));
        assert_eq!(provenance.agreement_label, AgreementLabel::Conflict);
    }

    #[test]
    fn list_union_sorts_numeric_descending_and_dedupes() {
        let mut a = candidate(0.0, Tier::Manufacturer, "razer.com", 0.9);
        a.value = FieldValue::List(vec![FieldValue::Number(1000.0), FieldValue::Number(400.0)]);
        let mut b = candidate(0.0, Tier::LabOrReview, "rtings.com", 0.8);
        b.value = FieldValue::List(vec![FieldValue::Number(400.0), FieldValue::Number(8000.0)]);

        let mut list_contract = contract();
        list_contract.list_union = true;
        let provenance = resolve(vec![a, b], &list_contract, RequiredLevel::Expected, &ApprovedDomainFloors::default()).expect("resolves");
        match provenance.value {
            FieldValue::List(items) => {
                let nums: Vec<f64> = items.iter().filter_map(FieldValue::as_number).collect();
                assert_eq!(nums, vec![8000.0, 1000.0, 400.0]);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn caps_evidence_refs_and_prefers_distinct_sources() {
        let candidates = vec![
            candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9),
            candidate(26000.0, Tier::Manufacturer, "razer.com", 0.9),
            candidate(26000.0, Tier::LabOrReview, "rtings.com", 0.8),
        ];
        let provenance = resolve(candidates, &contract(), RequiredLevel::Expected, &ApprovedDomainFloors::default()).expect("resolves");
        assert_eq!(provenance.evidence.len(), 2);
    }
}
