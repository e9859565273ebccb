// fieldforge-core/src/merger/mod.rs
// ============================================================================
// Module: Candidate Merger
// Description: Classifies the final agreement shape of a field's candidates.
// Purpose: Decide unanimous vs. tolerance vs. source-dependent vs. conflict.
// Dependencies: crate::model::{candidate, rule}
// ============================================================================

//! ## Overview
//! The merger runs after the critic has normalized every candidate's value
//! (units, enums, ranges resolved). It classifies how a field's surviving
//! candidates agree, which in turn drives what the Consensus Engine
//! is allowed to do with them.

use crate::model::candidate::Candidate;
use crate::model::rule::Contract;

/// Default numeric tolerance for `within_tolerance` agreement, 5%. A
/// field's [`Contract::tolerance_epsilon`] overrides this when set.
pub const DEFAULT_TOLERANCE_EPSILON: f64 = 0.05;

/// The agreement classification for one field's surviving candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum Agreement {
    /// Every candidate agrees exactly after normalization.
    Unanimous {
        /// The agreeing candidates.
        candidates: Vec<Candidate>,
    },
    /// Numeric candidates agree within the field's tolerance epsilon.
    WithinTolerance {
        /// The candidates within tolerance of each other.
        candidates: Vec<Candidate>,
    },
    /// The rule marks this field `source_dependent`; every value is kept,
    /// labeled by source, and flagged for review.
    SourceDependent {
        /// All candidates, one per source, retained unreduced.
        candidates: Vec<Candidate>,
    },
    /// Candidates disagree outside tolerance; a selection policy must choose.
    Conflict {
        /// The disagreeing candidates.
        candidates: Vec<Candidate>,
        /// Whether the top two candidates' scores are close enough to force review.
        needs_review: bool,
    },
}

impl Agreement {
    /// Returns whether this classification requires `needs_review = true`
    /// on the resulting provenance.
    #[must_use]
    pub fn needs_review(&self) -> bool {
        match self {
            Self::Unanimous { .. } => false,
            Self::WithinTolerance { .. } => false,
            Self::SourceDependent { .. } => true,
            Self::Conflict { needs_review, .. } => *needs_review,
        }
    }

    /// Returns the candidates carried by this classification.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Self::Unanimous { candidates }
            | Self::WithinTolerance { candidates }
            | Self::SourceDependent { candidates }
            | Self::Conflict { candidates, .. } => candidates,
        }
    }
}

/// A candidate's selection score for conflict resolution, lower tier rank
/// and method rank sorting first.
fn selection_score(candidate: &Candidate, method_rank: impl Fn(&Candidate) -> u8) -> (u8, u8, i64) {
    let tier_rank = candidate.source.tier.rank();
    let method = method_rank(candidate);
    // Confidence is the finest-grained tiebreaker; invert and scale so a
    // higher confidence sorts first alongside the ascending tier/method ranks.
    let confidence_key = ((1.0 - candidate.confidence) * 1_000_000.0) as i64;
    (tier_rank, method, confidence_key)
}

fn default_method_rank(candidate: &Candidate) -> u8 {
    use crate::model::evidence::Method;
    match candidate.method {
        Method::SpecTableMatch => 0,
        Method::JsonLd | Method::Microdata | Method::Rdfa | Method::Opengraph => 1,
        Method::NetworkJson => 2,
        Method::ParseTemplate => 3,
        Method::PdfKv | Method::PdfTable => 4,
        Method::LlmExtract => 5,
        Method::ComponentDb => 6,
    }
}

/// Classifies `candidates` (all already normalized and distinct by value
/// when numeric epsilon is applied) under `contract`'s agreement rules.
///
/// `candidates` must be non-empty.
#[must_use]
pub fn classify(candidates: Vec<Candidate>, contract: &Contract) -> Agreement {
    debug_assert!(!candidates.is_empty(), "classify requires at least one candidate");

    if contract.source_dependent {
        return Agreement::SourceDependent { candidates };
    }

    let first_key = candidates[0].value_key();
    if candidates.iter().all(|c| c.value_key() == first_key) {
        return Agreement::Unanimous { candidates };
    }

    if let Some(numbers) = all_numeric(&candidates) {
        let epsilon = contract.tolerance_epsilon.unwrap_or(DEFAULT_TOLERANCE_EPSILON);
        if within_epsilon(&numbers, epsilon) {
            return Agreement::WithinTolerance { candidates };
        }
    }

    let mut scored: Vec<&Candidate> = candidates.iter().collect();
    scored.sort_by_key(|c| selection_score(c, default_method_rank));
    let needs_review = scored.len() >= 2 && score_gap_is_small(scored[0], scored[1]);

    Agreement::Conflict { candidates, needs_review }
}

fn all_numeric(candidates: &[Candidate]) -> Option<Vec<f64>> {
    candidates.iter().map(|c| c.value.as_number()).collect()
}

fn within_epsilon(values: &[f64], epsilon: f64) -> bool {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == 0.0 {
        return max == 0.0;
    }
    (max - min).abs() / min.abs() <= epsilon
}

/// Two candidates' selection scores are "close" when their confidence gap
/// is small and neither tier nor method rank separates them.
fn score_gap_is_small(best: &Candidate, runner_up: &Candidate) -> bool {
    best.source.tier == runner_up.source.tier
        && default_method_rank(best) == default_method_rank(runner_up)
        && (best.confidence - runner_up.confidence).abs() < 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candidate::CandidateSource;
    use crate::model::evidence::Method;
    use crate::model::field_value::FieldValue;
    use crate::model::identifiers::FieldKey;
    use crate::model::rule::DataType;
    use crate::model::rule::Shape;
    use crate::model::tier::Tier;

    fn contract(source_dependent: bool) -> Contract {
        Contract {
            data_type: DataType::Number,
            shape: Shape::Scalar,
            unit: None,
            r#enum: Vec::new(),
            aliases: std::collections::BTreeMap::new(),
            range: None,
            source_dependent,
            preserve_all: false,
            selection_policy: None,
            list_union: false,
            tolerance_epsilon: None,
        }
    }

    fn candidate(value: f64, tier: Tier, method: Method, confidence: f64) -> Candidate {
        Candidate {
            field: FieldKey::new("weight_g"),
            value: FieldValue::Number(value),
            method,
            source: CandidateSource {
                host: "example.test".to_string(),
                root_domain: "example.test".to_string(),
                tier,
                tier_name: tier.name().to_string(),
                approved_domain: true,
            },
            confidence,
            evidence_refs: Vec::new(),
            snippet_hash: String::new(),
            quote: String::new(),
            quote_span: None,
        }
    }

    #[test]
    fn classifies_unanimous_when_all_values_match() {
        let candidates = vec![
            candidate(63.0, Tier::Manufacturer, Method::SpecTableMatch, 0.9),
            candidate(63.0, Tier::Retailer, Method::ParseTemplate, 0.8),
        ];
        let agreement = classify(candidates, &contract(false));
        assert!(matches!(agreement, Agreement::Unanimous { .. }));
        assert!(!agreement.needs_review());
    }

    #[test]
    fn classifies_within_tolerance_for_close_numeric_values() {
        let candidates = vec![
            candidate(63.0, Tier::Manufacturer, Method::SpecTableMatch, 0.9),
            candidate(64.5, Tier::Retailer, Method::ParseTemplate, 0.8),
        ];
        let agreement = classify(candidates, &contract(false));
        assert!(matches!(agreement, Agreement::WithinTolerance { .. }));
    }

    #[test]
    fn narrower_field_tolerance_overrides_the_default_epsilon() {
        let mut narrow = contract(false);
        narrow.tolerance_epsilon = Some(0.01);
        let candidates = vec![
            candidate(63.0, Tier::Manufacturer, Method::SpecTableMatch, 0.9),
            candidate(64.5, Tier::Retailer, Method::ParseTemplate, 0.8),
        ];
        let agreement = classify(candidates, &narrow);
        assert!(matches!(agreement, Agreement::Conflict { .. }));
    }

    #[test]
    fn classifies_source_dependent_when_contract_marks_it() {
        let candidates = vec![
            candidate(63.0, Tier::Manufacturer, Method::SpecTableMatch, 0.9),
            candidate(70.0, Tier::Retailer, Method::ParseTemplate, 0.8),
        ];
        let agreement = classify(candidates, &contract(true));
        assert!(matches!(agreement, Agreement::SourceDependent { .. }));
        assert!(agreement.needs_review());
    }

    #[test]
    fn classifies_conflict_when_values_differ_beyond_tolerance() {
        let candidates = vec![
            candidate(63.0, Tier::Manufacturer, Method::SpecTableMatch, 0.9),
            candidate(110.0, Tier::Retailer, Method::ParseTemplate, 0.8),
        ];
        let agreement = classify(candidates, &contract(false));
        assert!(matches!(agreement, Agreement::Conflict { .. }));
    }

    #[test]
    fn conflict_needs_review_when_top_two_scores_are_close() {
        let candidates = vec![
            candidate(63.0, Tier::Manufacturer, Method::SpecTableMatch, 0.85),
            candidate(110.0, Tier::Manufacturer, Method::SpecTableMatch, 0.8),
        ];
        let agreement = classify(candidates, &contract(false));
        assert!(agreement.needs_review());
    }
}
