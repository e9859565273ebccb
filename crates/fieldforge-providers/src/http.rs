// fieldforge-providers/src/http.rs
// ============================================================================
// Module: HTTP LLM Provider Adapter
// Description: Reference blocking-HTTP implementation of the LlmProvider capability.
// Purpose: Issue one bounded chat-completion request per LlmRequest.
// Dependencies: fieldforge-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! A `reqwest::blocking::Client` built once with a timeout and a fixed user
//! agent, redirects disabled, responses size-bounded. This one POSTs a
//! single chat-completion-shaped JSON body to a configured endpoint and
//! returns the parsed JSON payload, honoring [`LlmRequest::json_schema`] by
//! attaching (or omitting) a `response_format` field. When the provider
//! rejects `json_schema`, the caller (batch extraction,
//! `crate::extractor::extract_batch`) retries once with it disabled and
//! falls back to [`parse_fenced_json`](crate::extractor::parse_fenced_json);
//! this adapter only classifies the rejection, it does not retry itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use fieldforge_core::interfaces::LlmError;
use fieldforge_core::interfaces::LlmProvider;
use fieldforge_core::interfaces::LlmRequest;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP LLM provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProviderConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Bearer API key, resolved by the CLI `OPENAI_API_KEY` /
    /// `DEEPSEEK_API_KEY` fallback.
    pub api_key: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response body size accepted, in bytes.
    pub max_response_bytes: usize,
}

impl HttpProviderConfig {
    /// Default timeout for provider calls.
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    /// Default maximum response size: generous enough for a batch of field
    /// candidates, small enough to fail closed against a runaway stream.
    pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Blocking-HTTP implementation of [`LlmProvider`].
pub struct HttpLlmProvider {
    /// Adapter configuration.
    config: HttpProviderConfig,
    /// Shared HTTP client, built once at construction.
    client: Client,
}

impl HttpLlmProvider {
    /// Builds a provider bound to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::CallFailed`] when the HTTP client cannot be built.
    pub fn new(config: HttpProviderConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(|err| LlmError::CallFailed(format!("http client build failed: {err}")))?;
        Ok(Self { config, client })
    }
}

impl LlmProvider for HttpLlmProvider {
    fn call(&self, request: &LlmRequest) -> Result<Value, LlmError> {
        let mut body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        });
        if request.json_schema {
            body["response_format"] = json!({"type": "json_object"});
        }
        if request.reasoning_mode {
            body["reasoning"] = json!({"effort": "high"});
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|err| LlmError::CallFailed(format!("request failed: {err}")))?;

        let status = response.status();
        if status.as_u16() == 422 || status.as_u16() == 400 {
            // Providers that reject `response_format` typically answer with a
            // 400/422; the caller retries once without `json_schema`.
            return Err(LlmError::JsonSchemaRejected);
        }
        if !status.is_success() {
            return Err(LlmError::CallFailed(format!("provider returned status {status}")));
        }

        let bytes = response
            .bytes()
            .map_err(|err| LlmError::CallFailed(format!("failed to read response body: {err}")))?;
        if bytes.len() > self.config.max_response_bytes {
            return Err(LlmError::CallFailed(format!(
                "response exceeds size limit: {} bytes (max {})",
                bytes.len(),
                self.config.max_response_bytes
            )));
        }

        serde_json::from_slice(&bytes)
            .map_err(|err| LlmError::CallFailed(format!("response is not valid json: {err}")))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::HttpLlmProvider;
    use super::HttpProviderConfig;

    #[test]
    fn builds_client_with_default_config() {
        let config = HttpProviderConfig {
            endpoint: "https://api.example.invalid/v1/chat/completions".to_string(),
            api_key: "test-key".to_string(),
            timeout_ms: HttpProviderConfig::DEFAULT_TIMEOUT_MS,
            max_response_bytes: HttpProviderConfig::DEFAULT_MAX_RESPONSE_BYTES,
        };
        assert!(HttpLlmProvider::new(config).is_ok());
    }
}
