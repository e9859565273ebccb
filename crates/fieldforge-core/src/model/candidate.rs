// fieldforge-core/src/model/candidate.rs
// ============================================================================
// Module: Candidate
// Description: A proposed field value from one source, pending verification.
// Purpose: Carry everything consensus and the auditor need per proposal.
// Dependencies: serde, crate::model::{evidence, field_value, identifiers, tier}
// ============================================================================

//! ## Overview
//! A [`Candidate`] is what the Deterministic Extractor, the LLM Extractor, and
//! component-prior backfill all produce. The Candidate
//! Merger and Consensus Engine operate purely over lists of these.

use serde::Deserialize;
use serde::Serialize;

use crate::model::evidence::Method;
use crate::model::field_value::FieldValue;
use crate::model::identifiers::FieldKey;
use crate::model::identifiers::SnippetId;
use crate::model::tier::Tier;

/// The root domain and tier context a candidate was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSource {
    /// Fully qualified host, e.g. `www.razer.com`.
    pub host: String,
    /// Registrable root domain, e.g. `razer.com`.
    pub root_domain: String,
    /// Tier for this host.
    pub tier: Tier,
    /// Human-readable tier name (e.g. `"manufacturer"`).
    pub tier_name: String,
    /// Whether `root_domain` is in the category's approved-domain set.
    pub approved_domain: bool,
}

/// A proposed `(field, value)` extracted from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Field this candidate proposes a value for.
    pub field: FieldKey,
    /// The proposed value, already provisionally normalized by its producer.
    pub value: FieldValue,
    /// How the value was derived.
    pub method: Method,
    /// Source context.
    pub source: CandidateSource,
    /// Producer-assigned confidence in `[0, 1]`.
    pub confidence: f64,
    /// Snippets cited as evidence for this candidate.
    pub evidence_refs: Vec<SnippetId>,
    /// Snippet hash at extraction time, for auditor re-verification.
    pub snippet_hash: String,
    /// The literal quote supporting `value`.
    pub quote: String,
    /// Byte span of `quote` within its snippet, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_span: Option<(usize, usize)>,
}

impl Candidate {
    /// Returns `value` as a plain comparable string, for agreement grouping.
    #[must_use]
    pub fn value_key(&self) -> String {
        match &self.value {
            FieldValue::Number(n) => format!("n:{n}"),
            FieldValue::Text(s) => format!("s:{s}"),
            FieldValue::Bool(b) => format!("b:{b}"),
            FieldValue::List(items) => {
                let mut buf = String::from("l:[");
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        buf.push(',');
                    }
                    buf.push_str(&format!("{item:?}"));
                }
                buf.push(']');
                buf
            }
            FieldValue::Object(map) => format!("o:{map:?}"),
            FieldValue::Unknown { .. } => "unk".to_string(),
        }
    }
}
