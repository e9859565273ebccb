// fieldforge-core/src/model/evidence.rs
// ============================================================================
// Module: Evidence Reference
// Description: A candidate's citation into a retained snippet.
// Purpose: Back every non-`unk` field with at least one verifiable citation.
// Dependencies: serde, crate::model::{identifiers, tier}
// ============================================================================

//! ## Overview
//! An [`EvidenceRef`] is the unit the Evidence Auditor verifies and the
//! unit Consensus counts toward a field's `min_evidence_refs`.

use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::SnippetId;
use crate::model::identifiers::SourceId;
use crate::model::tier::Tier;

/// How a candidate value was derived from its snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Matched a regex/keyword/JSON-path parse template.
    ParseTemplate,
    /// Matched a row in an identity-gated spec table.
    SpecTableMatch,
    /// Read from an embedded JSON-LD `Product` node.
    JsonLd,
    /// Read from an embedded microdata `Product` item.
    Microdata,
    /// Read from an embedded RDFa `Product` node.
    Rdfa,
    /// Read from an OpenGraph `product` meta block.
    Opengraph,
    /// Read from captured network JSON (e.g. a GraphQL response).
    NetworkJson,
    /// Produced by the LLM extractor.
    LlmExtract,
    /// Backfilled from the component database's prior value.
    ComponentDb,
    /// Read from a PDF key/value pair.
    PdfKv,
    /// Read from a PDF table cell.
    PdfTable,
}

/// A citation from a candidate value into a specific retained snippet.
///
/// # Invariants
/// - `sha256(snippet.normalized_text) == snippet_hash` must hold at
///   verification time, not just at extraction time.
/// - `quote` must occur within the snippet's `normalized_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Evidence reference id, unique within its evidence pack.
    pub id: String,
    /// Source page URL.
    pub url: String,
    /// Retained source id.
    pub source_id: SourceId,
    /// Source tier at extraction time.
    pub tier: Tier,
    /// Snippet this reference cites.
    pub snippet_id: SnippetId,
    /// Snippet hash at the time this reference was created.
    pub snippet_hash: String,
    /// The literal quoted text supporting the candidate's value.
    pub quote: String,
    /// Byte span of `quote` within the snippet's normalized text, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_span: Option<(usize, usize)>,
    /// How the value was derived.
    pub method: Method,
}
