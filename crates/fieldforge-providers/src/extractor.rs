// fieldforge-providers/src/extractor.rs
// ============================================================================
// Module: LLM Extractor
// Description: Orchestrates a batch's call through cache, circuit breaker, and schema fallback.
// Purpose: Compose batching/cache/circuit_breaker into the single call describes.
// Dependencies: fieldforge-core, serde_json
// ============================================================================

//! ## Overview
//! One [`extract_batch`] call covers the whole per-batch policy: check cache
//! → decide sidecar vs. direct via the circuit breaker → call the provider,
//! retrying once without `json_schema` if the provider rejects it → cache the
//! result → parse `(field, value, evidence_refs, snippet_hash, quote)`
//! candidate tuples out of the response.

use fieldforge_core::interfaces::LlmError;
use fieldforge_core::interfaces::LlmProvider;
use fieldforge_core::interfaces::LlmRequest;
use fieldforge_core::model::time::Timestamp;

use crate::batching::Batch;
use crate::batching::Route;
use crate::cache::ResponseCache;
use crate::cache::cache_key;
use crate::circuit_breaker::CircuitBreaker;
use crate::circuit_breaker::FallbackReason;

// ============================================================================
// SECTION: Candidate Parsing
// ============================================================================

/// One candidate tuple parsed out of an LLM JSON response.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCandidate {
    /// Field this candidate targets.
    pub field: String,
    /// Raw value as returned by the model.
    pub value: serde_json::Value,
    /// Evidence reference ids the model cited.
    pub evidence_refs: Vec<String>,
    /// Snippet hash the model claims its quote came from.
    pub snippet_hash: String,
    /// Literal quoted text.
    pub quote: String,
}

/// Parses `{"candidates": [{"field", "value", "evidence_refs", "snippet_hash", "quote"}]}`
/// out of a response value, skipping malformed entries rather than failing
/// the whole batch.
#[must_use]
pub fn parse_candidates(response: &serde_json::Value) -> Vec<LlmCandidate> {
    let Some(candidates) = response.get("candidates").and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };
    candidates.iter().filter_map(parse_one_candidate).collect()
}

fn parse_one_candidate(raw: &serde_json::Value) -> Option<LlmCandidate> {
    let field = raw.get("field")?.as_str()?.to_string();
    let value = raw.get("value")?.clone();
    let evidence_refs = raw
        .get("evidence_refs")
        .and_then(serde_json::Value::as_array)
        .map(|refs| refs.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let snippet_hash = raw.get("snippet_hash").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
    let quote = raw.get("quote").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
    Some(LlmCandidate { field, value, evidence_refs, snippet_hash, quote })
}

/// Extracts the first fenced ```json ...``` (or bare ```` ``` ````) block
/// from `text` and parses it, the fallback path once `json_schema` has been
/// dropped and the provider free-forms a markdown-wrapped response.
#[must_use]
pub fn parse_fenced_json(text: &str) -> Option<serde_json::Value> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let end = after_open.find("```")?;
    serde_json::from_str(after_open[..end].trim()).ok()
}

// ============================================================================
// SECTION: Batch Extraction
// ============================================================================

/// Outcome of running one batch through the extractor pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Candidates parsed from the (possibly cached) response.
    pub candidates: Vec<LlmCandidate>,
    /// Whether this batch was served from cache.
    pub from_cache: bool,
    /// Fallback reason, when the sidecar was bypassed in favor of direct
    /// execution.
    pub fallback_reason: Option<FallbackReason>,
}

/// Selects the model identifier for a batch's route.
#[must_use]
pub fn model_for_route(route: Route, fast_model: &str, reasoning_model: &str) -> String {
    match route {
        Route::Fast => fast_model.to_string(),
        Route::Reasoning => reasoning_model.to_string(),
    }
}

/// Runs one batch through cache → circuit breaker → provider call, retrying
/// once without `json_schema` on [`LlmError::JsonSchemaRejected`].
///
/// # Errors
///
/// Returns the provider's [`LlmError`] when every retry is exhausted.
pub fn extract_batch(
    batch: &Batch,
    prompt: &str,
    model: &str,
    sidecar: &dyn LlmProvider,
    direct: &dyn LlmProvider,
    cache: &mut ResponseCache,
    breaker: &mut CircuitBreaker,
    now: &Timestamp,
    cache_ttl: time::Duration,
) -> Result<BatchOutcome, LlmError> {
    let evidence_ref_ids: Vec<String> = batch.fields.iter().map(|f| f.as_str().to_string()).collect();
    let key = cache_key(model, prompt, &evidence_ref_ids);

    if let Some(cached) = cache.get(&key, now) {
        return Ok(BatchOutcome { candidates: parse_candidates(cached), from_cache: true, fallback_reason: None });
    }

    let reasoning_mode = matches!(batch.route, Route::Reasoning);
    let request = LlmRequest {
        model: model.to_string(),
        system: "Extract the requested product fields as strict JSON.".to_string(),
        user: prompt.to_string(),
        json_schema: true,
        reasoning_mode,
    };

    let fallback_reason = breaker.should_use_sidecar(now).err();
    let provider: &dyn LlmProvider = if fallback_reason.is_some() { direct } else { sidecar };

    let response = match provider.call(&request) {
        Ok(value) => {
            if fallback_reason.is_none() {
                breaker.record_success();
            }
            value
        }
        Err(LlmError::JsonSchemaRejected) => {
            let mut retry = request;
            retry.json_schema = false;
            provider.call(&retry).inspect_err(|_| {
                if fallback_reason.is_none() {
                    breaker.record_failure(now);
                }
            })?
        }
        Err(err) => {
            if fallback_reason.is_none() {
                breaker.record_failure(now);
            }
            return Err(err);
        }
    };

    let base = time::OffsetDateTime::parse(&now.to_rfc3339(), &time::format_description::well_known::Rfc3339)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    let expires_at = Timestamp::from_offset(base + cache_ttl);
    cache.put(key, response.clone(), expires_at);

    Ok(BatchOutcome { candidates: parse_candidates(&response), from_cache: false, fallback_reason })
}
