// fieldforge-core/src/constraint/mod.rs
// ============================================================================
// Module: Constraint Solver
// Description: Cross-field implications and compound-range conflicts.
// Purpose: Surface contradictions that no single field's rule can see.
// Dependencies: ret-logic, crate::model::{contradiction, field_value, identifiers, rule}
// ============================================================================

//! ## Overview
//! Two independent checks feed [`Contradiction`]s into a round summary:
//! cross-field implications (`wireless ⇒ battery_hours not n/a`), expressed
//! as a [`ret_logic::Requirement<FieldKey>`] tri-state tree evaluated against
//! a [`FieldBag`] snapshot, and the compound-range check already expressed by
//! [`crate::model::rule::Range::intersect`] — this module is what calls it
//! per numeric field and turns a violation into a `compound_range_conflict`.

use std::collections::BTreeMap;

use ret_logic::LogicMode;
use ret_logic::Requirement;
use ret_logic::TriState;
use ret_logic::TriStateConditionEval;

use crate::model::contradiction::Contradiction;
use crate::model::field_value::FieldValue;
use crate::model::identifiers::FieldKey;
use crate::model::rule::Range;

// ============================================================================
// SECTION: Field Snapshot
// ============================================================================

/// A read-only snapshot of a product's current field values, keyed by field,
/// used as the tri-state evidence source for cross-field requirements.
#[derive(Debug, Clone, Default)]
pub struct FieldBag {
    values: BTreeMap<FieldKey, FieldValue>,
}

impl FieldBag {
    /// Builds a snapshot from a field map.
    #[must_use]
    pub fn new(values: BTreeMap<FieldKey, FieldValue>) -> Self {
        Self { values }
    }

    /// Tri-state status of `field`: `True` when present and non-`unk` and
    /// not the literal string `"n/a"`, `False` when present and `"n/a"`,
    /// `Unknown` when absent or `unk`.
    #[must_use]
    pub fn status_for(&self, field: &FieldKey) -> TriState {
        match self.values.get(field) {
            None => TriState::Unknown,
            Some(value) if value.is_unknown() => TriState::Unknown,
            Some(FieldValue::Text(text)) if text.eq_ignore_ascii_case("n/a") => TriState::False,
            Some(FieldValue::Bool(flag)) => TriState::from(*flag),
            Some(_) => TriState::True,
        }
    }
}

#[doc(hidden)]
pub struct FieldBagReader<'a> {
    bag: &'a FieldBag,
}

impl TriStateConditionEval for FieldKey {
    type Reader<'a> = FieldBagReader<'a>;

    fn eval_row_tristate(&self, reader: &Self::Reader<'_>, _row: usize) -> TriState {
        reader.bag.status_for(self)
    }
}

// ============================================================================
// SECTION: Cross-Field Constraints
// ============================================================================

/// A compiled cross-field implication: `antecedent ⇒ consequent`. Stored as `Not(antecedent) Or
/// consequent`, which is `True`/`Unknown` unless the antecedent holds and the
/// consequent is known `False`.
#[derive(Debug, Clone)]
pub struct Implication {
    /// Contradiction code emitted when this implication is violated.
    pub code: String,
    /// Fields implicated when this constraint is violated.
    pub fields: Vec<FieldKey>,
    requirement: Requirement<FieldKey>,
}

impl Implication {
    /// Builds `antecedent ⇒ consequent`, reporting `code` against `fields`
    /// when violated.
    #[must_use]
    pub fn new(code: impl Into<String>, antecedent: FieldKey, consequent: FieldKey) -> Self {
        let fields = vec![antecedent.clone(), consequent.clone()];
        let requirement = ret_logic::convenience::any(vec![
            ret_logic::convenience::not(Requirement::Predicate(antecedent)),
            Requirement::Predicate(consequent),
        ]);
        Self {
            code: code.into(),
            fields,
            requirement,
        }
    }

    /// Evaluates this implication against `bag`, returning a [`Contradiction`]
    /// at `Warn` severity when it is definitely violated (`False`).
    /// `Unknown` and `True` never produce a contradiction — insufficient
    /// evidence is not itself a contradiction.
    #[must_use]
    pub fn check(&self, bag: &FieldBag) -> Option<Contradiction> {
        let reader = FieldBagReader { bag };
        let result = self.requirement.eval_tristate(&reader, 0, &LogicMode::Kleene);
        if result == TriState::False {
            Some(Contradiction {
                code: self.code.clone(),
                severity: crate::model::contradiction::Severity::Warn,
                fields: self.fields.clone(),
            })
        } else {
            None
        }
    }
}

// ============================================================================
// SECTION: Compound Range Check
// ============================================================================

/// Checks `value` against the intersection of a field rule's declared range
/// and a component-database range, //. Returns
/// `Some(Contradiction)` (always `Error` severity, forcing red confidence)
/// when the intersection is non-trivial and `value` falls outside it.
#[must_use]
pub fn check_compound_range(field: FieldKey, value: f64, rule_range: Range, component_range: Option<Range>) -> Option<Contradiction> {
    let compound = match component_range {
        Some(component_range) => rule_range.intersect(&component_range)?,
        None => rule_range,
    };
    if compound.contains(value) {
        None
    } else {
        Some(Contradiction::compound_range_conflict(field))
    }
}

/// Runs every implication in `constraints` against `bag`, returning all
/// violated ones.
#[must_use]
pub fn check_all(constraints: &[Implication], bag: &FieldBag) -> Vec<Contradiction> {
    constraints.iter().filter_map(|implication| implication.check(bag)).collect()
}
