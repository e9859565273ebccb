// fieldforge-core/src/model/time.rs
// ============================================================================
// Module: Field Forge Time Model
// Description: Canonical RFC3339 timestamp representation.
// Purpose: Provide deterministic, replayable time values across fieldforge records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! fieldforge never reads wall-clock time from inside the pipeline; timestamps
//! are supplied by the caller (typically a `Runtime` capability) so that
//! replaying the same retained artifacts is deterministic. All timestamps are
//! RFC3339 UTC strings on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical RFC3339 UTC timestamp.
///
/// # Invariants
/// - Always serializes and parses as RFC3339.
/// - The pipeline never constructs one from wall-clock time; callers supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "rfc3339_micros")] OffsetDateTime);

/// Error returned when a timestamp string is not valid RFC3339.
#[derive(Debug, Error)]
#[error("invalid rfc3339 timestamp: {0}")]
pub struct TimestampError(String);

impl Timestamp {
    /// Parses an RFC3339 string into a timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when `value` is not valid RFC3339.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        OffsetDateTime::parse(value, &Rfc3339)
            .map(Self)
            .map_err(|err| TimestampError(err.to_string()))
    }

    /// Wraps an already-parsed [`OffsetDateTime`].
    #[must_use]
    pub const fn from_offset(value: OffsetDateTime) -> Self {
        Self(value)
    }

    /// Returns the RFC3339 string form.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_default()
    }

    /// Returns the duration elapsed since `earlier`, zero if `self` precedes it.
    #[must_use]
    pub fn since(&self, earlier: &Timestamp) -> time::Duration {
        let delta = self.0 - earlier.0;
        if delta.is_negative() {
            time::Duration::ZERO
        } else {
            delta
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

mod rfc3339_micros {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    /// Serializes an [`OffsetDateTime`] as an RFC3339 string.
    ///
    /// # Errors
    ///
    /// Returns a serde error when formatting fails.
    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value.format(&Rfc3339).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    /// Deserializes an RFC3339 string into an [`OffsetDateTime`].
    ///
    /// # Errors
    ///
    /// Returns a serde error when the string is not valid RFC3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_rfc3339() {
        let ts = Timestamp::parse("2026-07-28T12:00:00Z").expect("valid");
        assert_eq!(ts.to_rfc3339(), "2026-07-28T12:00:00Z");
    }

    #[test]
    fn rejects_non_rfc3339() {
        assert!(Timestamp::parse("not-a-date").is_err());
    }

    #[test]
    fn since_clamps_to_zero_when_reversed() {
        let earlier = Timestamp::parse("2026-07-28T12:00:00Z").expect("valid");
        let later = Timestamp::parse("2026-07-28T12:05:00Z").expect("valid");
        assert_eq!(earlier.since(&later), time::Duration::ZERO);
        assert!(later.since(&earlier) > time::Duration::ZERO);
    }
}
