// fieldforge-core/src/model/contradiction.rs
// ============================================================================
// Module: Contradiction
// Description: Cross-field and compound-range constraint violations.
// Purpose: Surface constraint failures distinctly from per-field unknowns.
// Dependencies: serde, crate::model::identifiers
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::FieldKey;

/// How serious a contradiction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Forces the affected fields' review color to red.
    Error,
    /// Surfaced for review but does not force red confidence.
    Warn,
}

/// A constraint violation emitted by the Constraint Solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    /// Machine-readable contradiction code, e.g. `"compound_range_conflict"`.
    pub code: String,
    /// Severity.
    pub severity: Severity,
    /// Fields implicated in this contradiction.
    pub fields: Vec<FieldKey>,
}

impl Contradiction {
    /// Builds the `compound_range_conflict` contradiction for one field,
    /// always at `Error` severity (forces red regardless of
    /// per-source confidence).
    #[must_use]
    pub fn compound_range_conflict(field: FieldKey) -> Self {
        Self {
            code: "compound_range_conflict".to_string(),
            severity: Severity::Error,
            fields: vec![field],
        }
    }

    /// Returns `true` when this contradiction forces a red confidence color.
    #[must_use]
    pub fn forces_red(&self) -> bool {
        self.severity == Severity::Error
    }
}
