// fieldforge-core/src/model/unknown_reason.rs
// ============================================================================
// Module: Unknown Reason Codes
// Description: Typed reasons explaining why a field value is the `unk` sentinel.
// Purpose: Keep every `unk` field auditable rather than silently absent.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every field value is either a canonical value backed by evidence, or the
//! explicit `unk` sentinel carrying one of these reason codes. The
//! system must never emit a bare absence.

use serde::Deserialize;
use serde::Serialize;

/// Why a field is `unk` instead of holding a canonical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    /// A parse template matched nothing or malformed input.
    ParseFailure,
    /// A numeric/enum value fell outside the field's allowed range.
    OutOfRange,
    /// A numeric value fell outside the compound range (rule ∩ component db).
    CompoundRangeConflict,
    /// No surviving candidate carried enough evidence to satisfy the rule.
    MissingEvidence,
    /// The candidate's quote does not occur in its snippet's normalized text.
    ValueNotInSnippet,
    /// A referenced snippet's hash no longer matches its stored content.
    SnippetHashMismatch,
    /// The rule marks the field `source_dependent` and it was not resolved.
    SourceDependentUnresolved,
}

impl UnknownReason {
    /// Returns the wire token for this reason, matching the `snake_case` form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseFailure => "parse_failure",
            Self::OutOfRange => "out_of_range",
            Self::CompoundRangeConflict => "compound_range_conflict",
            Self::MissingEvidence => "missing_evidence",
            Self::ValueNotInSnippet => "value_not_in_snippet",
            Self::SnippetHashMismatch => "snippet_hash_mismatch",
            Self::SourceDependentUnresolved => "source_dependent_unresolved",
        }
    }
}
