// fieldforge-core/src/model/field_value.rs
// ============================================================================
// Module: Field Value
// Description: Canonical typed value stored for a product field, or `unk`.
// Purpose: Represent the published shape of every field.
// Dependencies: serde, serde_json, crate::model::unknown_reason
// ============================================================================

//! ## Overview
//! A [`FieldValue`] is either a canonical value in one of the contract's
//! shapes (scalar, list, nested object) or the explicit `unk` sentinel with a
//! typed [`UnknownReason`]. Downstream consumers must never see a bare
//! absence — every field key present in a record's `fields` map resolves to
//! one of these variants.

use serde::Deserialize;
use serde::Serialize;

use crate::model::unknown_reason::UnknownReason;

/// A field's canonical value, or the `unk` sentinel with its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A numeric value, already unit-normalized.
    Number(f64),
    /// A string value, already enum/alias-normalized when applicable.
    Text(String),
    /// A boolean value.
    Bool(bool),
    /// An ordered list of scalar values (numeric lists sorted descending,
    /// deduplicated, per the `list_union` contract).
    List(Vec<FieldValue>),
    /// A nested key/value object (`contract.shape == kv`).
    Object(std::collections::BTreeMap<String, FieldValue>),
    /// The explicit unknown sentinel with its typed reason.
    Unknown {
        /// Literal sentinel token, always `"unk"`.
        unk: UnkToken,
        /// Why this field could not be resolved.
        unknown_reason_required: UnknownReason,
    },
}

/// Marker type that always serializes to the literal string `"unk"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnkToken;

impl Serialize for UnkToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("unk")
    }
}

impl<'de> Deserialize<'de> for UnkToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == "unk" {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected literal \"unk\", got {text:?}"
            )))
        }
    }
}

impl FieldValue {
    /// Builds the `unk` sentinel carrying `reason`.
    #[must_use]
    pub const fn unknown(reason: UnknownReason) -> Self {
        Self::Unknown {
            unk: UnkToken,
            unknown_reason_required: reason,
        }
    }

    /// Returns `true` when this value is the `unk` sentinel.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// Returns the unknown reason, if this value is `unk`.
    #[must_use]
    pub const fn unknown_reason(&self) -> Option<UnknownReason> {
        match self {
            Self::Unknown {
                unknown_reason_required,
                ..
            } => Some(*unknown_reason_required),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is a [`FieldValue::Number`].
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text value, if this is a [`FieldValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_round_trips_through_json() {
        let value = FieldValue::unknown(UnknownReason::OutOfRange);
        let json = serde_json::to_value(&value).expect("serialize");
        assert_eq!(json["unk"], "unk");
        assert_eq!(json["unknown_reason_required"], "out_of_range");
        let back: FieldValue = serde_json::from_value(json).expect("deserialize");
        assert!(back.is_unknown());
        assert_eq!(back.unknown_reason(), Some(UnknownReason::OutOfRange));
    }

    #[test]
    fn number_round_trips() {
        let value = FieldValue::Number(26000.0);
        let json = serde_json::to_value(&value).expect("serialize");
        let back: FieldValue = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.as_number(), Some(26000.0));
    }
}
