// fieldforge-core/src/model/rule.rs
// ============================================================================
// Module: Field Rule
// Description: Per-field compiled contract consumed by every pipeline stage.
// Purpose: Describe a field's type, range, enum, evidence, and selection policy.
// Dependencies: serde, crate::model::{identifiers, tier}
// ============================================================================

//! ## Overview
//! A [`FieldRule`] is the unit `fieldforge-rules` compiles from a category's
//! authored spreadsheet/RON source. Everything downstream — critic,
//! merger, consensus, constraint solver — reads rules, never raw schemas.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::FieldKey;
use crate::model::tier::Tier;

/// How strongly a field's presence is required for publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    /// Absence blocks publication outright.
    Required,
    /// Absence blocks publication even if all `required` fields pass.
    Critical,
    /// Expected but not publication-blocking.
    Expected,
    /// Present on some products only.
    Sometimes,
    /// Only pursued during deep/aggressive research tiers.
    Deep,
}

/// How hard a field is to extract, driving LLM batch routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Reliable deterministic extraction from structured surfaces.
    Easy,
    /// Usually needs LLM assistance or light disambiguation.
    Medium,
    /// Ambiguous phrasing, unit juggling, or cross-source reconciliation.
    Hard,
    /// Requires instrumented measurement (lab-derived) and cannot be parsed
    /// from prose alone.
    Instrumented,
}

/// The scalar/list/kv shape a field's contract stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// A single scalar value.
    Scalar,
    /// An ordered list of scalar values.
    List,
    /// A nested key/value object.
    Kv,
}

/// The underlying data type a field's contract stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Numeric value, always stored unit-normalized.
    Number,
    /// String value.
    String,
    /// List value.
    List,
    /// Boolean value.
    Bool,
}

/// An inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
}

impl Range {
    /// Returns `true` when `value` lies within `[min, max]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Intersects two ranges, returning `None` when they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min <= max { Some(Range { min, max }) } else { None }
    }
}

/// A field's type, shape, unit, enum, and range contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Underlying data type.
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Scalar, list, or kv shape.
    pub shape: Shape,
    /// Canonical unit (e.g. `"g"`, `"mm"`, `"Hz"`), when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Allowed canonical enum values, when applicable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#enum: Vec<String>,
    /// Alias → canonical-enum-value map, case-folded/punctuation-squashed
    /// keys at lookup time.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
    /// Numeric range, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    /// Whether the rule marks this field's value as source-dependent (kept
    /// per-source rather than reduced to one winner).
    #[serde(default)]
    pub source_dependent: bool,
    /// Whether all distinct source values should be preserved.
    #[serde(default)]
    pub preserve_all: bool,
    /// Name of the selection-policy to apply on conflict, if not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_policy: Option<String>,
    /// Whether list values should be unioned/deduplicated across sources.
    #[serde(default)]
    pub list_union: bool,
    /// Relative numeric tolerance for `within_tolerance` agreement on this
    /// field, overriding the merger's default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_epsilon: Option<f64>,
}

/// Parse-template reference for deterministic extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRef {
    /// Parse template identifier.
    pub template: String,
}

/// A field's evidence policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePolicy {
    /// Whether evidence is required at all for this field.
    pub required: bool,
    /// Minimum number of evidence refs a winning value must carry.
    pub min_evidence_refs: u32,
    /// Tiers preferred, in order, during selection.
    pub tier_preference: Vec<Tier>,
    /// Whether consensus requires evidence from `K` distinct sources.
    pub distinct_sources_required: bool,
}

/// A compiled, versioned rule for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field this rule governs.
    pub field: FieldKey,
    /// Semver string of this rule's version.
    pub version: String,
    /// Required level.
    pub required_level: RequiredLevel,
    /// Extraction difficulty.
    pub difficulty: Difficulty,
    /// Type/shape/unit/enum/range contract.
    pub contract: Contract,
    /// Parse-template reference.
    pub parse: ParseRef,
    /// Evidence policy.
    pub evidence: EvidencePolicy,
}
