// fieldforge-core/src/events.rs
// ============================================================================
// Module: Run Events
// Description: Typed NDJSON event records emitted during a product run.
// Purpose: Serve as the observability layer in place of a text logger.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The teacher workspace has no tracing/log dependency; it observes itself
//! through structured records rather than log lines. `fieldforge` follows
//! the same shape: every notable pipeline transition emits a [`RunEvent`],
//! which [`encode_ndjson`] renders as one JSON object per line for
//! `logs/events.jsonl.gz`. This module only shapes and serializes the
//! records — writing them to storage is the caller's job.

use serde::Serialize;

use crate::model::identifiers::FieldKey;
use crate::model::identifiers::ProductId;
use crate::model::time::Timestamp;
use crate::runner::StopReason;

/// One notable transition during a product's run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// A fetch was admitted and is about to execute.
    SourceFetchStarted {
        /// Product this event belongs to.
        product_id: ProductId,
        /// Round number.
        round: u32,
        /// URL being fetched.
        url: String,
        /// When the fetch began.
        at: Timestamp,
    },
    /// A fetched source finished extraction and auditing.
    SourceProcessed {
        /// Product this event belongs to.
        product_id: ProductId,
        /// Round number.
        round: u32,
        /// URL that was processed.
        url: String,
        /// Candidates that survived the auditor for this source.
        candidates_accepted: u32,
        /// When processing finished.
        at: Timestamp,
    },
    /// A round finished, with the fields it resolved and why it did or
    /// did not stop.
    RoundSummary {
        /// Product this event belongs to.
        product_id: ProductId,
        /// Round number just completed.
        round: u32,
        /// Fields resolved to a non-`unk` value this round.
        fields_resolved: Vec<FieldKey>,
        /// Present once the run stops.
        stop_reason: Option<StopReason>,
        /// When the round finished.
        at: Timestamp,
    },
}

/// Serializes `events` as NDJSON: one compact JSON object per line, in
/// order, with a trailing newline on the last line (ndjson for
/// append-only logs).
///
/// # Errors
///
/// Returns a `serde_json::Error` if any event fails to serialize; this
/// should never happen for well-formed [`RunEvent`] values.
pub fn encode_ndjson(events: &[RunEvent]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    for event in events {
        serde_json::to_writer(&mut buf, event)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_ndjson_writes_one_line_per_event() {
        let events = vec![
            RunEvent::SourceFetchStarted {
                product_id: ProductId::new("mouse-razer-viper-v3-pro"),
                round: 0,
                url: "https://razer.com/viper".to_string(),
                at: Timestamp::parse("2026-07-28T00:00:00Z").expect("valid"),
            },
            RunEvent::RoundSummary {
                product_id: ProductId::new("mouse-razer-viper-v3-pro"),
                round: 0,
                fields_resolved: vec![FieldKey::new("sensor")],
                stop_reason: Some(StopReason::Complete),
                at: Timestamp::parse("2026-07-28T00:00:01Z").expect("valid"),
            },
        ];
        let encoded = encode_ndjson(&events).expect("encodes");
        let text = String::from_utf8(encoded).expect("utf8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().expect("first line").contains("source_fetch_started"));
    }
}
