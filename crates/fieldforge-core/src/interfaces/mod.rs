// fieldforge-core/src/interfaces/mod.rs
// ============================================================================
// Module: Capability Interfaces
// Description: Backend-agnostic traits the Product Runner depends on.
// Purpose: Let fieldforge-core stay pure decision logic; I/O lives in other crates.
// Dependencies: crate::model
// ============================================================================

//! ## Overview
//! Every ambient-global duck type (`process.env`, a storage SDK client, an
//! HTTP fetcher) becomes a narrow capability trait here. `fieldforge-store`
//! implements [`Storage`]; `fieldforge-fetch` implements [`Fetcher`] and
//! [`RobotsPolicy`]; `fieldforge-providers` implements [`LlmProvider`]. Tests
//! in this crate use in-memory fakes.

use crate::model::identifiers::Category;
use crate::model::identifiers::ProductId;

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Error returned by a [`Storage`] operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The requested key does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
    /// The backend reported an I/O or transport failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Object-store capability used for every on-disk artifact the pipeline produces.
pub trait Storage {
    /// Reads raw bytes for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the key is absent or the backend fails.
    fn read_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Reads `key` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the key is absent, not valid UTF-8, or
    /// the backend fails.
    fn read_text(&self, key: &str) -> Result<String, StorageError>;

    /// Reads `key` as parsed JSON, returning `Ok(None)` when the key is
    /// absent (distinct from a read error).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails or the stored bytes
    /// are not valid JSON.
    fn read_json_or_null(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Writes `bytes` to `key`, replacing any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails.
    fn write_object(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Lists every key under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Resolves the input object key for `category`/`product_id`.
    fn resolve_input_key(&self, category: &Category, product_id: &ProductId) -> String {
        format!("specs/inputs/{}/products/{}.json", category.as_str(), product_id.as_str())
    }

    /// Resolves the latest-output object key for `category`/`product_id`/`artifact`.
    fn resolve_output_key(&self, category: &Category, product_id: &ProductId, artifact: &str) -> String {
        format!("specs/outputs/{}/{}/latest/{artifact}", category.as_str(), product_id.as_str())
    }
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Classified fetch failure driving mode fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// HTTP 403 Forbidden.
    #[error("forbidden")]
    Forbidden,
    /// HTTP 5xx.
    #[error("server error")]
    ServerError,
    /// Navigation/browser-automation timeout.
    #[error("navigation timeout")]
    NavigationTimeout,
    /// No content could be produced at all.
    #[error("no result")]
    NoResult,
    /// HTTP 429 Too Many Requests — never triggers mode fallback.
    #[error("rate limited")]
    RateLimited,
    /// Catch-all transient fetch failure.
    #[error("generic fetch error")]
    Generic,
}

impl FetchError {
    /// Whether this error classifies as a mode-fallback trigger (429
    /// is excluded; everything else escalates fetcher mode).
    #[must_use]
    pub const fn triggers_mode_fallback(self) -> bool {
        !matches!(self, Self::RateLimited)
    }
}

/// One fetcher's telemetry for a single fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTelemetry {
    /// Number of retries performed before returning.
    pub retry_count: u32,
    /// Fetcher mode this attempt degraded from, if any.
    pub degraded_from_mode: Option<String>,
    /// Why this attempt degraded mode, if it did.
    pub degraded_reason: Option<String>,
}

/// The result of one fetch attempt, or a robots-blocked / error status.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// HTTP-style status code; `451` marks robots-blocked, `404` marks a
    /// replay miss.
    pub status: u16,
    /// Whether this fetch was blocked by robots policy rather than attempted.
    pub blocked_by_robots: bool,
    /// Raw page title, when available.
    pub title: Option<String>,
    /// Raw page HTML, when available.
    pub html: Option<String>,
    /// Fetch telemetry for this attempt.
    pub telemetry: FetchTelemetry,
}

/// URL-fetch capability, implemented per fetcher mode (dynamic/http/replay/dryrun).
pub trait Fetcher {
    /// Fetches `url` against `host`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on a classified failure.
    fn fetch(&self, url: &str, host: &str) -> Result<FetchOutcome, FetchError>;
}

// ============================================================================
// SECTION: Robots Policy
// ============================================================================

/// Per-host allow/deny decision (missing robots resolves to allow).
pub trait RobotsPolicy {
    /// Returns whether `user_agent` may fetch from `host`.
    fn allowed(&self, host: &str, user_agent: &str) -> bool;
}

// ============================================================================
// SECTION: LLM Provider
// ============================================================================

/// Error returned by an [`LlmProvider`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// The provider rejected `json_schema`; caller should retry once without it.
    #[error("json_schema rejected by provider")]
    JsonSchemaRejected,
    /// The provider call failed for any other reason.
    #[error("provider call failed: {0}")]
    CallFailed(String),
}

/// One request to an LLM provider adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Model identifier to route to.
    pub model: String,
    /// System prompt.
    pub system: String,
    /// User prompt (batched evidence pack + field list).
    pub user: String,
    /// Whether to request strict JSON-schema-constrained output.
    pub json_schema: bool,
    /// Reasoning-mode hint for reasoning-tier models.
    pub reasoning_mode: bool,
}

/// Provider adapter capability.
pub trait LlmProvider {
    /// Issues one LLM call and returns its parsed JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on provider or parse failure.
    fn call(&self, request: &LlmRequest) -> Result<serde_json::Value, LlmError>;
}
