// fieldforge-core/src/critic/mod.rs
// ============================================================================
// Module: Deterministic Critic & Normalizer
// Description: Unit coercion, enum/alias resolution, and range checking.
// Purpose: Turn provisional merged values into canonical, in-range values.
// Dependencies: crate::model::rule
// ============================================================================

//! ## Overview
//! The critic runs once per field, after merge, on whatever raw numeric or
//! textual token the upstream extractors produced. It never touches evidence
//! or provenance — its output is a canonical value (or an `unk` with a typed
//! reason) that the merger and consensus engine consume downstream.

use crate::model::rule::Contract;
use crate::model::rule::Range;
use crate::model::unknown_reason::UnknownReason;

// ============================================================================
// SECTION: Numeric Parsing & Unit Coercion
// ============================================================================

/// Parses a raw numeric token, handling a trailing `k`/`K` thousands suffix
/// and decimal-comma input (`"26,5"` → `26.5`) when no decimal point is
/// present.
#[must_use]
pub fn parse_numeric_token(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (body, multiplier) = match trimmed.strip_suffix(['k', 'K']) {
        Some(rest) => (rest.trim(), 1000.0),
        None => (trimmed, 1.0),
    };
    let normalized = if body.contains('.') || !body.contains(',') {
        body.replace(',', "")
    } else {
        body.replace('.', "").replace(',', ".")
    };
    normalized.parse::<f64>().ok().map(|value| value * multiplier)
}

/// A unit family the critic knows how to coerce between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFamily {
    /// Mass: canonical unit `g`.
    Mass,
    /// Length: canonical unit `mm`.
    Length,
    /// Frequency: canonical unit `Hz`.
    Frequency,
}

impl UnitFamily {
    /// Resolves the family a unit string belongs to, if any is known.
    #[must_use]
    pub fn for_unit(unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "g" | "oz" | "lb" | "lbs" => Some(Self::Mass),
            "mm" | "cm" | "in" | "inch" => Some(Self::Length),
            "hz" | "khz" => Some(Self::Frequency),
            _ => None,
        }
    }
}

/// Converts `value`, expressed in `from_unit`, into its family's canonical
/// unit (`g`, `mm`, or `Hz`). Returns `None` for an unrecognized unit.
#[must_use]
pub fn to_canonical_unit(value: f64, from_unit: &str) -> Option<f64> {
    match from_unit.to_ascii_lowercase().as_str() {
        "g" => Some(value),
        "oz" => Some(value * 28.349_523_125),
        "lb" | "lbs" => Some(value * 453.592_37),
        "mm" => Some(value),
        "cm" => Some(value * 10.0),
        "in" | "inch" => Some(value * 25.4),
        "hz" => Some(value),
        "khz" => Some(value * 1000.0),
        _ => None,
    }
}

// ============================================================================
// SECTION: Enum Alias Resolution
// ============================================================================

/// Case-folds and squashes punctuation/whitespace for alias-key comparison.
#[must_use]
pub fn fold_alias_key(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Resolves `raw` to a contract's canonical enum value, checking
/// `contract.aliases` first (case/punctuation-folded), then the enum list
/// itself folded the same way.
#[must_use]
pub fn resolve_enum_value(raw: &str, contract: &Contract) -> Option<String> {
    let folded = fold_alias_key(raw);
    for (alias, canonical) in &contract.aliases {
        if fold_alias_key(alias) == folded {
            return Some(canonical.clone());
        }
    }
    for canonical in &contract.r#enum {
        if fold_alias_key(canonical) == folded {
            return Some(canonical.clone());
        }
    }
    None
}

/// A small built-in table of component-identifier aliases folded the same
/// way as enum aliases. Category rule packs may extend this via
/// `contract.aliases`; this table covers identifiers common across sensors.
const COMPONENT_ALIASES: &[(&str, &str)] = &[
    ("pixartpaw3395", "PixArt PAW3395"),
    ("pixartpaw3399", "PixArt PAW3399"),
    ("pixartpmw3360", "PixArt PMW3360"),
    ("focuspro35k", "Focus Pro 35K"),
];

/// Canonicalizes a component identifier (e.g. sensor name) via the built-in
/// alias table, independent of any per-category contract.
#[must_use]
pub fn canonicalize_component_alias(raw: &str) -> Option<String> {
    let folded = fold_alias_key(raw);
    COMPONENT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, canonical)| (*canonical).to_string())
}

// ============================================================================
// SECTION: Range Checking
// ============================================================================

/// Outcome of checking a numeric value against a field's range contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeOutcome {
    /// Value lies within the effective range.
    InRange,
    /// Value lies outside a plain rule range (no component range narrowed it).
    OutOfRange,
    /// Value lies outside the compound (rule ∩ component) range.
    CompoundRangeConflict,
}

/// Intersects a rule's declared range with a component database's observed
/// range, per `compute_compound_range`.
#[must_use]
pub fn compute_compound_range(rule_range: Range, component_range: Range) -> Option<Range> {
    rule_range.intersect(&component_range)
}

/// Checks `value` against `rule_range`, narrowed by `component_range` when
/// present. A value outside a non-trivial compound range is reported as
/// [`RangeOutcome::CompoundRangeConflict`] rather than a plain `OutOfRange`,
/// since that case also forces the field's review color to red.
#[must_use]
pub fn check_range(value: f64, rule_range: Option<Range>, component_range: Option<Range>) -> RangeOutcome {
    match (rule_range, component_range) {
        (Some(rule_range), Some(component_range)) => {
            match compute_compound_range(rule_range, component_range) {
                Some(compound) if compound.contains(value) => RangeOutcome::InRange,
                Some(_) => RangeOutcome::CompoundRangeConflict,
                None => {
                    if rule_range.contains(value) {
                        RangeOutcome::InRange
                    } else {
                        RangeOutcome::OutOfRange
                    }
                }
            }
        }
        (Some(rule_range), None) => {
            if rule_range.contains(value) {
                RangeOutcome::InRange
            } else {
                RangeOutcome::OutOfRange
            }
        }
        (None, _) => RangeOutcome::InRange,
    }
}

/// Returns the [`UnknownReason`] a failed [`RangeOutcome`] maps to, when any.
#[must_use]
pub fn range_outcome_reason(outcome: RangeOutcome) -> Option<UnknownReason> {
    match outcome {
        RangeOutcome::InRange => None,
        RangeOutcome::OutOfRange => Some(UnknownReason::OutOfRange),
        RangeOutcome::CompoundRangeConflict => Some(UnknownReason::CompoundRangeConflict),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::model::rule::DataType;
    use crate::model::rule::Shape;

    fn contract(aliases: &[(&str, &str)], enum_values: &[&str]) -> Contract {
        Contract {
            data_type: DataType::String,
            shape: Shape::Scalar,
            unit: None,
            r#enum: enum_values.iter().map(|s| (*s).to_string()).collect(),
            aliases: aliases
                .iter()
                .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
                .collect(),
            range: None,
            source_dependent: false,
            preserve_all: false,
            selection_policy: None,
            list_union: false,
        }
    }

    #[test]
    fn parses_k_suffix_as_thousands() {
        assert_eq!(parse_numeric_token("26k"), Some(26000.0));
        assert_eq!(parse_numeric_token("26K"), Some(26000.0));
    }

    #[test]
    fn parses_decimal_comma_without_decimal_point() {
        assert_eq!(parse_numeric_token("63,5"), Some(63.5));
    }

    #[test]
    fn parses_thousands_comma_with_decimal_point_present() {
        assert_eq!(parse_numeric_token("1,234.5"), Some(1234.5));
    }

    #[test]
    fn converts_ounces_to_grams() {
        let grams = to_canonical_unit(2.0, "oz").expect("known unit");
        assert!((grams - 56.699_046_25).abs() < 1e-6);
    }

    #[test]
    fn converts_inches_to_millimeters() {
        assert_eq!(to_canonical_unit(1.0, "in"), Some(25.4));
    }

    #[test]
    fn converts_khz_to_hz() {
        assert_eq!(to_canonical_unit(8.0, "kHz"), Some(8000.0));
    }

    #[test]
    fn resolves_alias_case_and_punctuation_insensitively() {
        let contract = contract(&[("wireless 2.4ghz", "wireless")], &["wireless", "wired"]);
        assert_eq!(
            resolve_enum_value("Wireless-2.4GHz", &contract),
            Some("wireless".to_string())
        );
    }

    #[test]
    fn resolves_enum_value_directly_when_no_alias_matches() {
        let contract = contract(&[], &["wireless", "wired"]);
        assert_eq!(resolve_enum_value("WIRED", &contract), Some("wired".to_string()));
    }

    #[test]
    fn canonicalizes_known_component_alias() {
        assert_eq!(
            canonicalize_component_alias("pixart paw 3395"),
            Some("PixArt PAW3395".to_string())
        );
    }

    #[test]
    fn range_check_in_range_with_no_component_range() {
        let rule_range = Range { min: 0.0, max: 30000.0 };
        assert_eq!(check_range(26000.0, Some(rule_range), None), RangeOutcome::InRange);
    }

    #[test]
    fn range_check_flags_compound_conflict_when_outside_intersection() {
        let rule_range = Range { min: 0.0, max: 30000.0 };
        let component_range = Range { min: 100.0, max: 26000.0 };
        let outcome = check_range(28000.0, Some(rule_range), Some(component_range));
        assert_eq!(outcome, RangeOutcome::CompoundRangeConflict);
        assert_eq!(
            range_outcome_reason(outcome),
            Some(UnknownReason::CompoundRangeConflict)
        );
    }

    #[test]
    fn range_check_in_range_within_intersection() {
        let rule_range = Range { min: 0.0, max: 30000.0 };
        let component_range = Range { min: 100.0, max: 26000.0 };
        assert_eq!(
            check_range(20000.0, Some(rule_range), Some(component_range)),
            RangeOutcome::InRange
        );
    }

    proptest::proptest! {
        /// Converting a positive magnitude out of and back into the same unit
        /// (via the inverse factor) round-trips within a tight tolerance, for
        /// every unit family the critic coerces.
        #[test]
        fn mass_unit_round_trips(value in 0.01_f64..10_000.0) {
            let grams = to_canonical_unit(value, "oz").expect("known unit");
            let back = grams / 28.349_523_125;
            proptest::prop_assert!((back - value).abs() / value < 1e-9);
        }

        #[test]
        fn length_unit_round_trips(value in 0.01_f64..10_000.0) {
            let mm = to_canonical_unit(value, "in").expect("known unit");
            let back = mm / 25.4;
            proptest::prop_assert!((back - value).abs() / value < 1e-9);
        }

        #[test]
        fn frequency_unit_round_trips(value in 0.01_f64..10_000.0) {
            let hz = to_canonical_unit(value, "kHz").expect("known unit");
            let back = hz / 1000.0;
            proptest::prop_assert!((back - value).abs() / value < 1e-9);
        }
    }
}
