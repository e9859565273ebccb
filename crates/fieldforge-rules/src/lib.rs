// fieldforge-rules/src/lib.rs
// ============================================================================
// Module: Rule Engine
// Description: Loads compiled per-category field rules, migration plans, and parse templates.
// Purpose: The single source of truth every pipeline stage reads rules from.
// Dependencies: fieldforge-core, serde, serde_json, thiserror
// ============================================================================

//! # fieldforge-rules
//!
//! A category's rules are compiled ahead of time, outside the core — this
//! crate does not bootstrap schemas from untyped sources — into a
//! [`RuleSet`]: the JSON shape `<helper_files_root>/<category>/_generated/field_rules.json`
//! and `key_migrations.json` describe on disk. This crate is the typed
//! reader and the version/migration logic over that compiled artifact.

use std::collections::BTreeMap;

use fieldforge_core::model::identifiers::FieldKey;
use fieldforge_core::model::rule::FieldRule;
use fieldforge_core::model::rule::RequiredLevel;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Rule Set
// ============================================================================

/// A compiled, versioned rule set for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Category this rule set governs, e.g. `"mouse"`.
    pub category: String,
    /// Semver string for the whole rule set.
    pub version: String,
    /// Field order the rule engine was compiled with; downstream "for each
    /// field" iteration follows this list rather than reflecting over a map
    /// (reflection becomes a driven field-order list).
    pub field_order: Vec<FieldKey>,
    /// Per-field compiled rules.
    pub fields: BTreeMap<FieldKey, FieldRule>,
    /// Minimum distinct approved root domains required to resolve a field,
    /// keyed by [`RequiredLevel`]. A level absent from the map is ungated.
    /// Empty on disk falls back to `fieldforge_core::consensus::ApprovedDomainFloors::default`.
    #[serde(default)]
    pub approved_domain_floors: BTreeMap<RequiredLevel, usize>,
}

/// Errors the rule engine can report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleEngineError {
    /// `field_order` references a field absent from `fields`.
    #[error("field_order references unknown field `{0}`")]
    UnknownFieldInOrder(String),
}

impl RuleSet {
    /// Validates internal consistency: every field in `field_order` must
    /// have a corresponding entry in `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleEngineError::UnknownFieldInOrder`] on the first
    /// inconsistency found.
    pub fn validate(&self) -> Result<(), RuleEngineError> {
        for field in &self.field_order {
            if !self.fields.contains_key(field) {
                return Err(RuleEngineError::UnknownFieldInOrder(field.as_str().to_string()));
            }
        }
        Ok(())
    }

    /// Returns the compiled rule for `field`, if one exists.
    #[must_use]
    pub fn get_rule(&self, field: &FieldKey) -> Option<&FieldRule> {
        self.fields.get(field)
    }

    /// Returns every field whose contract names an explicit selection
    /// policy (conflict tie-break override).
    #[must_use]
    pub fn get_selection_policy_fields(&self) -> Vec<&FieldKey> {
        self.field_order
            .iter()
            .filter(|field| self.fields.get(*field).is_some_and(|rule| rule.contract.selection_policy.is_some()))
            .collect()
    }

    /// Returns this rule set's distinct-approved-domain floor table, falling
    /// back to `fieldforge_core::consensus::ApprovedDomainFloors::default`
    /// when the rule set does not configure one of its own.
    #[must_use]
    pub fn approved_domain_floors(&self) -> fieldforge_core::consensus::ApprovedDomainFloors {
        if self.approved_domain_floors.is_empty() {
            fieldforge_core::consensus::ApprovedDomainFloors::default()
        } else {
            fieldforge_core::consensus::ApprovedDomainFloors::new(self.approved_domain_floors.clone())
        }
    }

    /// Returns every field whose contract unions list values across sources.
    #[must_use]
    pub fn get_list_union_fields(&self) -> Vec<&FieldKey> {
        self.field_order
            .iter()
            .filter(|field| self.fields.get(*field).is_some_and(|rule| rule.contract.list_union))
            .collect()
    }

    /// Returns every distinct parse-template id referenced by this rule set.
    #[must_use]
    pub fn get_all_parse_templates(&self) -> Vec<&str> {
        let mut templates: Vec<&str> = self.fields.values().map(|rule| rule.parse.template.as_str()).collect();
        templates.sort_unstable();
        templates.dedup();
        templates
    }
}

// ============================================================================
// SECTION: Candidate Normalization
// ============================================================================

/// Outcome of normalizing a raw candidate value against a field's rule.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// The value normalized successfully.
    Ok {
        /// The normalized numeric or textual token.
        normalized: String,
    },
    /// Normalization failed with a reason code.
    Failed {
        /// Why normalization failed (`"parse_failure"`, `"out_of_range"`, …).
        reason_code: String,
    },
}

/// Normalizes `raw_value` against `rule`'s contract: numeric parsing + range
/// check for number fields, enum/alias resolution for string fields with an
/// enum, otherwise pass-through.
#[must_use]
pub fn normalize_candidate(rule: &FieldRule, raw_value: &str) -> NormalizeOutcome {
    use fieldforge_core::model::rule::DataType;

    match rule.contract.data_type {
        DataType::Number => match fieldforge_core::critic::parse_numeric_token(raw_value) {
            Some(value) => match rule.contract.range {
                Some(range) if !range.contains(value) => {
                    NormalizeOutcome::Failed { reason_code: "out_of_range".to_string() }
                }
                _ => NormalizeOutcome::Ok { normalized: format_number(value) },
            },
            None => NormalizeOutcome::Failed { reason_code: "parse_failure".to_string() },
        },
        DataType::String if !rule.contract.r#enum.is_empty() => {
            match fieldforge_core::critic::resolve_enum_value(raw_value, &rule.contract) {
                Some(canonical) => NormalizeOutcome::Ok { normalized: canonical },
                None => NormalizeOutcome::Failed { reason_code: "parse_failure".to_string() },
            }
        }
        _ => NormalizeOutcome::Ok { normalized: raw_value.trim().to_string() },
    }
}

fn format_number(value: f64) -> String {
    if (value.fract()).abs() < f64::EPSILON {
        #[allow(clippy::cast_possible_truncation, reason = "already range-checked as a whole number")]
        let whole = value as i64;
        whole.to_string()
    } else {
        value.to_string()
    }
}

// ============================================================================
// SECTION: Version Classification
// ============================================================================

/// Semver-style bump classification between two rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    /// No field added or removed; contract-internal tweak only.
    Patch,
    /// At least one field added, none removed.
    Minor,
    /// At least one field removed (breaking for any consumer keyed on it).
    Major,
}

/// The field-level diff between two rule sets, plus the bump it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChange {
    /// The implied semver bump.
    pub bump: VersionBump,
    /// Fields present in `next` but not `prev`.
    pub added: Vec<FieldKey>,
    /// Fields present in `prev` but not `next`.
    pub removed: Vec<FieldKey>,
}

/// Classifies the change between two rule sets: removing any field is
/// always `major`; adding one with nothing removed is `minor`; otherwise
/// `patch`.
#[must_use]
pub fn classify_version_change(prev: &RuleSet, next: &RuleSet) -> VersionChange {
    let added: Vec<FieldKey> = next.field_order.iter().filter(|f| !prev.fields.contains_key(*f)).cloned().collect();
    let removed: Vec<FieldKey> = prev.field_order.iter().filter(|f| !next.fields.contains_key(*f)).cloned().collect();
    let bump = if !removed.is_empty() {
        VersionBump::Major
    } else if !added.is_empty() {
        VersionBump::Minor
    } else {
        VersionBump::Patch
    };
    VersionChange { bump, added, removed }
}

// ============================================================================
// SECTION: Key Migrations
// ============================================================================

/// One migration step in a category's migration plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Migration {
    /// Renames `from` to `to`, dropping the old key.
    Rename {
        /// Old field key.
        from: FieldKey,
        /// New field key.
        to: FieldKey,
    },
    /// Merges `sources` into `into`, preferring non-empty operands and
    /// unifying list values.
    Merge {
        /// Fields to merge from, in preference order.
        sources: Vec<FieldKey>,
        /// Destination field key.
        into: FieldKey,
    },
    /// Splits `from` into `targets` by a caller-supplied rule (the plan only
    /// records intent; the split function itself is rule-specific and
    /// supplied by the caller).
    Split {
        /// Source field key.
        from: FieldKey,
        /// Destination field keys.
        targets: Vec<FieldKey>,
    },
    /// Marks `field` deprecated: moved under `_deprecated` rather than dropped.
    Deprecate {
        /// Field key to deprecate.
        field: FieldKey,
    },
}

/// An ordered migration plan for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MigrationPlan {
    /// Migrations to apply in order.
    pub steps: Vec<Migration>,
}

/// A record's raw field map, keyed by string (pre-typed-`FieldValue`) so
/// migrations can move values without knowing their shape.
pub type RawFields = BTreeMap<String, serde_json::Value>;

/// Applies `plan` to `record`, implementing `rename | merge | split |
/// deprecate`. Idempotent: applying the same plan twice produces the
/// same result as applying it once, because every step either no-ops when
/// its source keys are already gone or moves values into already-canonical
/// locations.
#[must_use]
pub fn apply_key_migrations(record: &RawFields, plan: &MigrationPlan) -> RawFields {
    let mut out = record.clone();
    for step in &plan.steps {
        match step {
            Migration::Rename { from, to } => {
                if let Some(value) = out.remove(from.as_str()) {
                    out.entry(to.as_str().to_string()).or_insert(value);
                }
            }
            Migration::Merge { sources, into } => {
                let mut merged: Option<serde_json::Value> = out.get(into.as_str()).cloned();
                for source in sources {
                    let Some(candidate) = out.remove(source.as_str()) else { continue };
                    merged = Some(merge_prefer_nonempty(merged, candidate));
                }
                if let Some(value) = merged {
                    out.insert(into.as_str().to_string(), value);
                }
            }
            Migration::Split { from, targets } => {
                if out.contains_key(from.as_str()) {
                    let value = out.get(from.as_str()).cloned().unwrap_or(serde_json::Value::Null);
                    for target in targets {
                        out.entry(target.as_str().to_string()).or_insert_with(|| value.clone());
                    }
                    out.remove(from.as_str());
                }
            }
            Migration::Deprecate { field } => {
                if let Some(value) = out.remove(field.as_str()) {
                    let bucket = out.entry("_deprecated".to_string()).or_insert_with(|| serde_json::json!({}));
                    if let serde_json::Value::Object(map) = bucket {
                        map.insert(field.as_str().to_string(), value);
                    }
                }
            }
        }
    }
    out
}

fn merge_prefer_nonempty(existing: Option<serde_json::Value>, incoming: serde_json::Value) -> serde_json::Value {
    match existing {
        None => incoming,
        Some(serde_json::Value::Array(mut existing_list)) => {
            if let serde_json::Value::Array(incoming_list) = incoming {
                for item in incoming_list {
                    if !existing_list.contains(&item) {
                        existing_list.push(item);
                    }
                }
            }
            serde_json::Value::Array(existing_list)
        }
        Some(serde_json::Value::Null) => incoming,
        Some(existing_value) if is_empty_value(&existing_value) => incoming,
        Some(existing_value) => existing_value,
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::Null) || matches!(value, serde_json::Value::String(s) if s.is_empty())
}
