// fieldforge-fetch/src/evidence_pack.rs
// ============================================================================
// Module: Evidence Pack Builder
// Description: Bounds and hashes retained page artifacts into citable snippets.
// Purpose: Give the LLM extractor and auditor a stable, bounded, redacted evidence surface.
// Dependencies: fieldforge-core
// ============================================================================

//! ## Overview
//! The pack is the only thing downstream stages (LLM extractor, auditor)
//! ever see of a fetched page. Every snippet's id and hash are derived
//! purely from its `normalized_text`, so re-running the builder over the
//! same retained artifacts reproduces byte-identical ids. Deterministic
//! candidates get their own `deterministic_candidate` snippet whose text is
//! the literal value, bound by a fingerprint so the auditor can cite a
//! parser's own output as evidence.

use fieldforge_core::model::hashing::candidate_fingerprint;
use fieldforge_core::model::identifiers::SourceId;
use fieldforge_core::model::snippet::Snippet;
use fieldforge_core::model::snippet::SnippetType;
use fieldforge_core::model::time::Timestamp;

use crate::extractor::RawCandidate;

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Key names whose values are redacted throughout the pack and any captured
/// network POST bodies.
const SECRET_KEY_MARKERS: &[&str] = &["authorization", "cookie", "api_key", "apikey", "token"];

/// Returns `true` when `key` looks like a secret-bearing field name.
#[must_use]
pub fn is_secret_key(key: &str) -> bool {
    let folded = key.to_ascii_lowercase();
    SECRET_KEY_MARKERS.iter().any(|marker| folded.contains(marker))
}

/// Redacts occurrences of `"<key>: <value>"`/`"<key>=<value>"` pairs whose
/// key matches [`is_secret_key`] within free text, replacing the value with
/// `"[REDACTED]"`.
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    text.lines()
        .map(|line| {
            for separator in [':', '='] {
                if let Some((key, _value)) = line.split_once(separator)
                    && is_secret_key(key)
                {
                    return format!("{key}{separator} [REDACTED]");
                }
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// SECTION: Pack
// ============================================================================

/// A bounded, ordered set of evidence snippets for one page.
#[derive(Debug, Clone, Default)]
pub struct EvidencePack {
    /// Snippets in deterministic order (by id).
    pub snippets: Vec<Snippet>,
    /// Candidate fingerprint → snippet id, for deterministic-candidate binding.
    pub candidate_bindings: Vec<(String, String)>,
    /// Total character count retained, after truncation.
    pub total_chars: usize,
}

/// Builds a bounded evidence pack from retained text windows, applying
/// `max_chars` as a hard cap on total retained text. Snippets are
/// sorted by id for deterministic ordering.
#[must_use]
pub fn build_evidence_pack(
    windows: &[(SnippetType, String)],
    source_id: &SourceId,
    url: &str,
    retrieved_at: Timestamp,
    max_chars: usize,
) -> EvidencePack {
    let mut snippets = Vec::new();
    let mut total_chars = 0usize;
    for (snippet_type, raw_text) in windows {
        let redacted = redact_secrets(raw_text);
        let remaining = max_chars.saturating_sub(total_chars);
        if remaining == 0 {
            break;
        }
        let bounded: String = redacted.chars().take(remaining).collect();
        if bounded.is_empty() {
            continue;
        }
        total_chars += bounded.chars().count();
        snippets.push(Snippet::new(*snippet_type, bounded, source_id.clone(), url, retrieved_at));
    }
    snippets.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    EvidencePack { snippets, candidate_bindings: Vec::new(), total_chars }
}

/// Binds `candidates` to a `deterministic_candidate` snippet each, appending
/// the new snippets and bindings to `pack`. The snippet's literal
/// text is the candidate's raw value, so the auditor's substring check
/// always succeeds for deterministic candidates.
pub fn bind_deterministic_candidates(
    pack: &mut EvidencePack,
    candidates: &[RawCandidate],
    source_id: &SourceId,
    url: &str,
    retrieved_at: Timestamp,
) {
    for candidate in candidates {
        let fingerprint = candidate_fingerprint(&candidate.field, &candidate.value, method_name(candidate), &candidate.key_path);
        let snippet = Snippet::new(SnippetType::DeterministicCandidate, candidate.value.clone(), source_id.clone(), url, retrieved_at);
        pack.candidate_bindings.push((fingerprint, snippet.id.as_str().to_string()));
        pack.snippets.push(snippet);
    }
    pack.snippets.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    pack.snippets.dedup_by(|a, b| a.id == b.id);
}

fn method_name(candidate: &RawCandidate) -> &'static str {
    use fieldforge_core::model::evidence::Method;
    match candidate.method {
        Method::ParseTemplate => "parse_template",
        Method::SpecTableMatch => "spec_table_match",
        Method::JsonLd => "json_ld",
        Method::Microdata => "microdata",
        Method::Rdfa => "rdfa",
        Method::Opengraph => "opengraph",
        Method::NetworkJson => "network_json",
        Method::LlmExtract => "llm_extract",
        Method::ComponentDb => "component_db",
        Method::PdfKv => "pdf_kv",
        Method::PdfTable => "pdf_table",
    }
}
