// fieldforge-core/src/auditor/mod.rs
// ============================================================================
// Module: Evidence Auditor / Verifier
// Description: Re-verifies each candidate's citations against live snippets.
// Purpose: Ensure nothing reaches consensus without a checkable quote.
// Dependencies: crate::model::{candidate, snippet, identifiers}
// ============================================================================

//! ## Overview
//! The auditor never trusts a candidate's snippet hash or quote at face
//! value: it looks the snippet up by id, recomputes its hash, and confirms
//! the quote occurs in its text. Numeric candidates get one repair pass
//! before rejection. Once every candidate for a field has a verdict,
//! [`resolve_field`] folds them into the field-level outcome.

use std::collections::BTreeMap;

use crate::model::candidate::Candidate;
use crate::model::field_value::FieldValue;
use crate::model::identifiers::SnippetId;
use crate::model::snippet::Snippet;

/// Why a single candidate failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// `evidence_refs` was empty.
    MissingEvidenceRefs,
    /// A cited snippet id has no corresponding retained snippet.
    SnippetNotFound(SnippetId),
    /// The cited snippet's current hash no longer matches the candidate's.
    SnippetHashMismatch(SnippetId),
    /// `quote` does not occur in the cited snippet's normalized text.
    ValueNotInSnippet(SnippetId),
}

impl VerificationError {
    /// Returns the wire token for this verification failure.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingEvidenceRefs => "missing_evidence_refs",
            Self::SnippetNotFound(_) => "snippet_not_found",
            Self::SnippetHashMismatch(_) => "snippet_hash_mismatch",
            Self::ValueNotInSnippet(_) => "value_not_in_snippet",
        }
    }
}

/// Verifies one candidate against the retained snippet set, repairing a
/// numeric quote in place when the value occurs as a bare token.
///
/// # Errors
/// Returns the first verification failure encountered, in the order:
/// missing refs, snippet lookup, hash match, quote containment.
pub fn verify_candidate(
    candidate: &mut Candidate,
    snippets: &BTreeMap<SnippetId, Snippet>,
) -> Result<(), VerificationError> {
    if candidate.evidence_refs.is_empty() {
        return Err(VerificationError::MissingEvidenceRefs);
    }

    for snippet_id in candidate.evidence_refs.clone() {
        let snippet = snippets
            .get(&snippet_id)
            .ok_or_else(|| VerificationError::SnippetNotFound(snippet_id.clone()))?;

        if !snippet.hash_matches() || snippet.snippet_hash != candidate.snippet_hash {
            return Err(VerificationError::SnippetHashMismatch(snippet_id.clone()));
        }

        if snippet.normalized_text.contains(&candidate.quote) {
            continue;
        }

        if let Some(repaired) = repair_numeric_quote(candidate, &snippet.normalized_text) {
            candidate.quote = repaired.0;
            candidate.quote_span = Some(repaired.1);
            continue;
        }

        return Err(VerificationError::ValueNotInSnippet(snippet_id.clone()));
    }

    Ok(())
}

/// If `candidate.value` is numeric and occurs as a bare token in `text`,
/// returns the repaired quote text and its byte span.
fn repair_numeric_quote(candidate: &Candidate, text: &str) -> Option<(String, (usize, usize))> {
    let FieldValue::Number(value) = candidate.value else {
        return None;
    };
    let as_integer = format_number_token(value);
    for token in [as_integer.as_str(), value.to_string().as_str()] {
        if let Some(start) = find_token(text, token) {
            return Some((token.to_string(), (start, start + token.len())));
        }
    }
    None
}

/// Formats `value` without a trailing `.0` when it is a whole number, since
/// source text almost always spells integers without a decimal point.
fn format_number_token(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Finds `token` in `text` on a word boundary (reusing the identity gate's
/// containment rule so `"26000"` does not match inside `"260000"`).
fn find_token(text: &str, token: &str) -> Option<usize> {
    if token.is_empty() {
        return None;
    }
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find(token) {
        let match_start = start + offset;
        let match_end = match_start + token.len();
        let before_ok = match_start == 0 || !bytes[match_start - 1].is_ascii_alphanumeric();
        let after_ok = match_end == bytes.len() || !bytes[match_end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(match_start);
        }
        start = match_start + 1;
        if start >= text.len() {
            break;
        }
    }
    None
}

/// Field-level outcome once every candidate has a per-candidate verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldVerdict {
    /// No candidate passed verification.
    NoSupportedCandidates,
    /// Every candidate that passed verification agreed on one value.
    Accept {
        /// The agreed-upon candidates.
        candidates: Vec<Candidate>,
    },
    /// At least two verified candidates disagree on the value.
    Conflict {
        /// Machine-readable conflict reason.
        reason: &'static str,
        /// The disagreeing, verified candidates.
        candidates: Vec<Candidate>,
    },
}

/// Folds a field's already-verified candidates (those for which
/// [`verify_candidate`] returned `Ok`) into a field-level verdict.
#[must_use]
pub fn resolve_field(verified: Vec<Candidate>) -> FieldVerdict {
    if verified.is_empty() {
        return FieldVerdict::NoSupportedCandidates;
    }
    let first_key = verified[0].value_key();
    let all_agree = verified.iter().all(|c| c.value_key() == first_key);
    if all_agree {
        FieldVerdict::Accept { candidates: verified }
    } else {
        FieldVerdict::Conflict {
            reason: "multiple_supported_values",
            candidates: verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::evidence::Method;
    use crate::model::identifiers::FieldKey;
    use crate::model::identifiers::SourceId;
    use crate::model::snippet::SnippetType;
    use crate::model::tier::Tier;
    use crate::model::time::Timestamp;

    fn snippet_map(text: &str) -> (BTreeMap<SnippetId, Snippet>, Snippet) {
        let snippet = Snippet::new(
            SnippetType::Text,
            text,
            SourceId::new("src-1"),
            "https://example.test/a",
            Timestamp::parse("2026-07-28T00:00:00Z").expect("valid"),
        );
        let mut map = BTreeMap::new();
        map.insert(snippet.id.clone(), snippet.clone());
        (map, snippet)
    }

    fn candidate(value: FieldValue, quote: &str, snippet: &Snippet) -> Candidate {
        Candidate {
            field: FieldKey::new("dpi"),
            value,
            method: Method::ParseTemplate,
            source: crate::model::candidate::CandidateSource {
                host: "example.test".to_string(),
                root_domain: "example.test".to_string(),
                tier: Tier::Manufacturer,
                tier_name: "manufacturer".to_string(),
                approved_domain: true,
            },
            confidence: 0.9,
            evidence_refs: vec![snippet.id.clone()],
            snippet_hash: snippet.snippet_hash.clone(),
            quote: quote.to_string(),
            quote_span: None,
        }
    }

    #[test]
    fn rejects_candidate_with_no_evidence_refs() {
        let (_map, snippet) = snippet_map("DPI: 26000");
        let mut c = candidate(FieldValue::Number(26000.0), "26000", &snippet);
        c.evidence_refs.clear();
        let map = BTreeMap::new();
        assert_eq!(
            verify_candidate(&mut c, &map),
            Err(VerificationError::MissingEvidenceRefs)
        );
    }

    #[test]
    fn rejects_candidate_whose_snippet_is_missing() {
        let (_map, snippet) = snippet_map("DPI: 26000");
        let mut c = candidate(FieldValue::Number(26000.0), "26000", &snippet);
        let empty = BTreeMap::new();
        assert_eq!(
            verify_candidate(&mut c, &empty),
            Err(VerificationError::SnippetNotFound(snippet.id.clone()))
        );
    }

    #[test]
    fn rejects_candidate_with_stale_snippet_hash() {
        let (map, snippet) = snippet_map("DPI: 26000");
        let mut c = candidate(FieldValue::Number(26000.0), "26000", &snippet);
        c.snippet_hash = "sha256:deadbeef".to_string();
        assert_eq!(
            verify_candidate(&mut c, &map),
            Err(VerificationError::SnippetHashMismatch(snippet.id.clone()))
        );
    }

    #[test]
    fn repairs_numeric_quote_when_token_present() {
        let (map, snippet) = snippet_map("Sensor DPI up to 26000 max");
        let mut c = candidate(FieldValue::Number(26000.0), "wrong quote", &snippet);
        assert_eq!(verify_candidate(&mut c, &map), Ok(()));
        assert_eq!(c.quote, "26000");
        assert!(c.quote_span.is_some());
    }

    #[test]
    fn rejects_when_quote_absent_and_not_numeric() {
        let (map, snippet) = snippet_map("Sensor: Focus Pro 35K");
        let mut c = candidate(FieldValue::Text("HERO 2".to_string()), "HERO 2", &snippet);
        assert_eq!(
            verify_candidate(&mut c, &map),
            Err(VerificationError::ValueNotInSnippet(snippet.id.clone()))
        );
    }

    #[test]
    fn resolves_field_accept_when_all_verified_agree() {
        let (_map, snippet) = snippet_map("DPI: 26000");
        let a = candidate(FieldValue::Number(26000.0), "26000", &snippet);
        let b = candidate(FieldValue::Number(26000.0), "26000", &snippet);
        match resolve_field(vec![a, b]) {
            FieldVerdict::Accept { candidates } => assert_eq!(candidates.len(), 2),
            other => panic!("expected Accept, got {other:?}"),
        }
    }

    #[test]
    fn resolves_field_conflict_when_values_differ() {
        let (_map, snippet) = snippet_map("DPI: 26000 or 28000 depending on model");
        let a = candidate(FieldValue::Number(26000.0), "26000", &snippet);
        let b = candidate(FieldValue::Number(28000.0), "28000", &snippet);
        match resolve_field(vec![a, b]) {
            FieldVerdict::Conflict { reason, candidates } => {
                assert_eq!(reason, "multiple_supported_values");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn resolves_field_no_supported_candidates_when_empty() {
        assert_eq!(resolve_field(vec![]), FieldVerdict::NoSupportedCandidates);
    }
}
