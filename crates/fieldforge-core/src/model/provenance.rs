// fieldforge-core/src/model/provenance.rs
// ============================================================================
// Module: Field Provenance
// Description: The winning value plus its supporting evidence and agreement.
// Purpose: Record, per field, why consensus picked what it picked.
// Dependencies: serde, crate::model::{evidence, field_value}
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::model::evidence::EvidenceRef;
use crate::model::field_value::FieldValue;

/// How candidates for a field agreed (or didn't) after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementLabel {
    /// All methods agree after normalization.
    Unanimous,
    /// Numeric values agree within the field's tolerance epsilon.
    WithinTolerance,
    /// The rule marks this field `source_dependent`; all values retained.
    SourceDependent,
    /// Candidates disagree and a selection policy had to choose.
    Conflict,
}

/// The published record for one field: its value, evidence, and agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// The winning (or `unk`) value.
    pub value: FieldValue,
    /// Evidence supporting `value`, distinct sources preferred.
    pub evidence: Vec<EvidenceRef>,
    /// Final confidence in `[0, 1]`.
    pub confidence: f64,
    /// Agreement classification.
    pub agreement_label: AgreementLabel,
    /// Share of contributing sources that supported the winning value.
    pub agreement_score: f64,
    /// Whether a human should review this field before full trust.
    pub needs_review: bool,
}
