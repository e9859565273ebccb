// fieldforge-core/src/model/snippet.rs
// ============================================================================
// Module: Evidence Snippet
// Description: A bounded, hashed unit of retained page content.
// Purpose: Back every non-`unk` field value with a verifiable quote source.
// Dependencies: serde, crate::model::{hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! Snippets are the atoms of the evidence pack: each carries a stable
//! id derived from its content hash, so two independent runs over the same
//! retained raw artifacts produce byte-identical snippet ids.

use serde::Deserialize;
use serde::Serialize;

use crate::model::hashing::hash_snippet_text;
use crate::model::hashing::snippet_id_for;
use crate::model::identifiers::SnippetId;
use crate::model::identifiers::SourceId;
use crate::model::time::Timestamp;

/// The structural origin of a snippet's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetType {
    /// Free-form text window.
    Text,
    /// An HTML table row/cell region.
    Table,
    /// A definition-list term/definition pair.
    Definition,
    /// A label/value key pair.
    Kv,
    /// A label-value text window found near a field hint.
    Window,
    /// A JSON-LD `Product` node.
    JsonLdProduct,
    /// A microdata `Product` item.
    MicrodataProduct,
    /// An RDFa `Product` node.
    RdfaProduct,
    /// An OpenGraph `product` meta block.
    OpengraphProduct,
    /// The literal evidence value for a deterministic candidate.
    DeterministicCandidate,
}

/// A bounded, content-hashed unit of retained page evidence.
///
/// # Invariants
/// - `snippet_hash == sha256(normalized_text)` always; re-verification must
///   recompute and compare, never trust a stored hash blindly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Stable snippet id, `sn_<short hash>`.
    pub id: SnippetId,
    /// Structural origin of this snippet.
    #[serde(rename = "type")]
    pub snippet_type: SnippetType,
    /// Canonical normalized text whose hash must match `snippet_hash`.
    pub normalized_text: String,
    /// `sha256:<hex>` digest of `normalized_text`.
    pub snippet_hash: String,
    /// Retained source page this snippet came from.
    pub source_id: SourceId,
    /// Source URL.
    pub url: String,
    /// Field keys this snippet is hinted to support, if known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_hints: Vec<String>,
    /// When this snippet was retrieved.
    pub retrieved_at: Timestamp,
}

impl Snippet {
    /// Builds a snippet, deriving `id` and `snippet_hash` from `normalized_text`.
    #[must_use]
    pub fn new(
        snippet_type: SnippetType,
        normalized_text: impl Into<String>,
        source_id: SourceId,
        url: impl Into<String>,
        retrieved_at: Timestamp,
    ) -> Self {
        let normalized_text = normalized_text.into();
        let id = SnippetId::new(snippet_id_for(&normalized_text));
        let snippet_hash = hash_snippet_text(&normalized_text);
        Self {
            id,
            snippet_type,
            normalized_text,
            snippet_hash,
            source_id,
            url: url.into(),
            field_hints: Vec::new(),
            retrieved_at,
        }
    }

    /// Re-derives the current hash of `normalized_text` and compares it to
    /// the stored `snippet_hash`.
    #[must_use]
    pub fn hash_matches(&self) -> bool {
        hash_snippet_text(&self.normalized_text) == self.snippet_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> Timestamp {
        Timestamp::parse("2026-07-28T00:00:00Z").expect("valid")
    }

    #[test]
    fn new_derives_consistent_hash() {
        let snippet = Snippet::new(
            SnippetType::Text,
            "DPI: 26000",
            SourceId::new("src-1"),
            "https://example.test/a",
            ts(),
        );
        assert!(snippet.hash_matches());
    }

    #[test]
    fn tampering_with_text_breaks_hash_match() {
        let mut snippet = Snippet::new(
            SnippetType::Text,
            "DPI: 26000",
            SourceId::new("src-1"),
            "https://example.test/a",
            ts(),
        );
        snippet.normalized_text = "DPI: 28000".to_string();
        assert!(!snippet.hash_matches());
    }

    #[test]
    fn same_text_yields_same_id_across_constructions() {
        let a = Snippet::new(
            SnippetType::Text,
            "Sensor: Focus Pro 35K",
            SourceId::new("src-1"),
            "https://example.test/a",
            ts(),
        );
        let b = Snippet::new(
            SnippetType::Text,
            "Sensor: Focus Pro 35K",
            SourceId::new("src-2"),
            "https://example.test/b",
            ts(),
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a.snippet_hash, b.snippet_hash);
    }
}
