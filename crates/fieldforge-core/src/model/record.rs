// fieldforge-core/src/model/record.rs
// ============================================================================
// Module: Canonical Product Record
// Description: The published, per-product normalized record and its summary.
// Purpose: The top-level artifact written to `latest/` and `published/`.
// Dependencies: serde, crate::model::*
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::Category;
use crate::model::identifiers::FieldKey;
use crate::model::identifiers::Identity;
use crate::model::identifiers::ProductId;
use crate::model::provenance::Provenance;
use crate::model::rule::Contract;
use crate::model::rule::RequiredLevel;
use crate::model::unknown_reason::UnknownReason;

/// Confidence floor a field must clear to count as "passing" in the summary
/// rollup; not configurable per field yet.
const PASS_TARGET: f64 = 0.8;

/// Per-field reasoning recorded for the published summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReasoning {
    /// Why this field is `unk`, when it is.
    pub unknown_reason: UnknownReason,
}

/// LLM cost rollup for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LlmCostSummary {
    /// Total LLM cost in USD for this run.
    pub cost_usd_run: f64,
}

/// Publication-readiness summary for a product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Whether this record passes all required-field and critical-field gates.
    pub validated: bool,
    /// Overall confidence rollup across all fields.
    pub confidence: f64,
    /// Share of all known fields with a non-`unk` value.
    pub coverage_overall: f64,
    /// Share of `required` fields with a non-`unk` value.
    pub completeness_required: f64,
    /// Required fields still `unk`.
    pub missing_required_fields: Vec<FieldKey>,
    /// Critical fields whose confidence is below the pass target.
    pub critical_fields_below_pass_target: Vec<FieldKey>,
    /// Fields (any required level) below the pass target.
    pub fields_below_pass_target: Vec<FieldKey>,
    /// LLM cost rollup.
    pub llm: LlmCostSummary,
    /// Per-field reasoning for fields currently `unk`.
    pub field_reasoning: BTreeMap<FieldKey, FieldReasoning>,
}

/// The canonical, published per-product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Stable product identity slug.
    pub product_id: ProductId,
    /// Product category.
    pub category: Category,
    /// Locked identity tuple; never overwritten by a run.
    pub identity: Identity,
    /// Field values, keyed by field key.
    pub fields: BTreeMap<FieldKey, crate::model::field_value::FieldValue>,
    /// Per-field provenance for fields present in `fields`.
    pub provenance: BTreeMap<FieldKey, Provenance>,
    /// Publication-readiness summary.
    pub summary: Summary,
}

impl ProductRecord {
    /// Builds an empty record for `identity`, with no fields populated yet.
    #[must_use]
    pub fn new(category: Category, identity: Identity) -> Self {
        let product_id = identity.product_id();
        Self {
            product_id,
            category,
            identity,
            fields: BTreeMap::new(),
            provenance: BTreeMap::new(),
            summary: Summary {
                validated: false,
                confidence: 0.0,
                coverage_overall: 0.0,
                completeness_required: 0.0,
                missing_required_fields: Vec::new(),
                critical_fields_below_pass_target: Vec::new(),
                fields_below_pass_target: Vec::new(),
                llm: LlmCostSummary::default(),
                field_reasoning: BTreeMap::new(),
            },
        }
    }

    /// Recomputes [`Summary`] from the current `fields`/`provenance` maps
    /// against `rules`, record shape. Called whenever the runner
    /// reaches [`crate::runner::State::Stopped`]; a record whose run
    /// is still in progress carries a stale summary rather than none, since
    /// requires a full round summary or an explicitly incomplete round,
    /// never a partial write.
    pub fn finalize_summary(
        &mut self,
        rules: &std::collections::BTreeMap<FieldKey, (Contract, RequiredLevel)>,
        cost_usd_run: f64,
    ) {
        let mut known = 0usize;
        let mut required_total = 0usize;
        let mut required_known = 0usize;
        let mut missing_required_fields = Vec::new();
        let mut critical_fields_below_pass_target = Vec::new();
        let mut fields_below_pass_target = Vec::new();
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;
        let mut field_reasoning = BTreeMap::new();

        for (field, (_, level)) in rules {
            let value = self.fields.get(field);
            let is_known = value.is_some_and(|v| !v.is_unknown());
            if is_known {
                known += 1;
            } else if let Some(reason) = value.and_then(crate::model::field_value::FieldValue::unknown_reason) {
                field_reasoning.insert(field.clone(), FieldReasoning { unknown_reason: reason });
            }
            if *level == RequiredLevel::Required {
                required_total += 1;
                if is_known {
                    required_known += 1;
                } else {
                    missing_required_fields.push(field.clone());
                }
            }

            let confidence = self.provenance.get(field).map(|p| p.confidence);
            if let Some(confidence) = confidence {
                confidence_sum += confidence;
                confidence_count += 1;
                if confidence < PASS_TARGET {
                    fields_below_pass_target.push(field.clone());
                    if *level == RequiredLevel::Critical {
                        critical_fields_below_pass_target.push(field.clone());
                    }
                }
            } else if *level == RequiredLevel::Critical {
                critical_fields_below_pass_target.push(field.clone());
            }
        }

        self.summary = Summary {
            validated: missing_required_fields.is_empty() && critical_fields_below_pass_target.is_empty(),
            confidence: if confidence_count == 0 { 0.0 } else { confidence_sum / confidence_count as f64 },
            coverage_overall: if rules.is_empty() { 0.0 } else { known as f64 / rules.len() as f64 },
            completeness_required: if required_total == 0 { 1.0 } else { required_known as f64 / required_total as f64 },
            missing_required_fields,
            critical_fields_below_pass_target,
            fields_below_pass_target,
            llm: LlmCostSummary { cost_usd_run },
            field_reasoning,
        };
    }
}
