// fieldforge-fetch/src/http.rs
// ============================================================================
// Module: HTTP Fetcher
// Description: Reference blocking-HTTP implementation of the Fetcher capability.
// Purpose: Serve FetcherMode::Http fetches without browser automation.
// Dependencies: fieldforge-core, reqwest
// ============================================================================

//! ## Overview
//! Mirrors the shape of `fieldforge-providers::http::HttpLlmProvider`: a
//! `reqwest::blocking::Client` built once with a timeout and a fixed user
//! agent, bounded redirects, responses size-bounded. This is the `http`
//! fetcher mode only — "dynamic JS-capable" browser automation stays an
//! external collaborator behind the same [`Fetcher`] trait, served instead by
//! [`crate::fetchers::DryRunFetcher`]/[`crate::fetchers::ReplayFetcher`] in
//! tests and offline reruns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use fieldforge_core::interfaces::FetchError;
use fieldforge_core::interfaces::FetchOutcome;
use fieldforge_core::interfaces::FetchTelemetry;
use fieldforge_core::interfaces::Fetcher;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP fetcher adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFetcherConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User-Agent header sent with every request (checked against robots
    /// policy upstream by [`crate::robots::RobotsCache`]).
    pub user_agent: String,
    /// Maximum response body size accepted, in bytes.
    pub max_response_bytes: usize,
}

impl HttpFetcherConfig {
    /// Default timeout for fetch calls.
    pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
    /// Default maximum page size accepted.
    pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Blocking-HTTP implementation of [`Fetcher`] for `FetcherMode::Http`.
pub struct HttpFetcher {
    /// Shared HTTP client, built once at construction.
    client: Client,
    /// Maximum response body size accepted, in bytes.
    max_response_bytes: usize,
}

impl HttpFetcher {
    /// Builds a fetcher bound to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Generic`] when the HTTP client cannot be built.
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::limited(5))
            .user_agent(config.user_agent)
            .build()
            .map_err(|_| FetchError::Generic)?;
        Ok(Self { client, max_response_bytes: config.max_response_bytes })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, _host: &str) -> Result<FetchOutcome, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::Generic)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::Generic);
        }
        let response = self.client.get(parsed).send().map_err(classify_request_error)?;
        let status = response.status();
        if status.as_u16() == 403 {
            return Err(FetchError::Forbidden);
        }
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError);
        }
        if !status.is_success() {
            return Err(FetchError::Generic);
        }
        let status_code = status.as_u16();
        let bytes = response.bytes().map_err(classify_request_error)?;
        if bytes.len() > self.max_response_bytes {
            return Err(FetchError::Generic);
        }
        let html = String::from_utf8_lossy(&bytes).into_owned();
        let title = extract_title(&html);
        Ok(FetchOutcome {
            status: status_code,
            blocked_by_robots: false,
            title,
            html: Some(html),
            telemetry: FetchTelemetry { retry_count: 0, degraded_from_mode: None, degraded_reason: None },
        })
    }
}

/// Classifies a transport-level `reqwest` failure into fallback taxonomy.
fn classify_request_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::NavigationTimeout
    } else if err.status().map(|status| status.as_u16()) == Some(429) {
        FetchError::RateLimited
    } else {
        FetchError::Generic
    }
}

/// Extracts a page's `<title>` text without a full HTML parser.
fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = lower[start..].find("</title>")? + start;
    Some(html[start..end].trim().to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::HttpFetcher;
    use super::HttpFetcherConfig;
    use super::extract_title;

    #[test]
    fn builds_client_with_default_config() {
        let config = HttpFetcherConfig {
            timeout_ms: HttpFetcherConfig::DEFAULT_TIMEOUT_MS,
            user_agent: "fieldforge/0.1".to_string(),
            max_response_bytes: HttpFetcherConfig::DEFAULT_MAX_RESPONSE_BYTES,
        };
        assert!(HttpFetcher::new(config).is_ok());
    }

    #[test]
    fn extract_title_finds_title_text() {
        let html = "<html><head><TITLE>Viper V3 Pro</TITLE></head></html>";
        assert_eq!(extract_title(html), Some("Viper V3 Pro".to_string()));
    }

    #[test]
    fn extract_title_is_none_without_a_title_tag() {
        assert_eq!(extract_title("<html></html>"), None);
    }

    #[test]
    fn fetch_rejects_non_http_scheme() {
        use fieldforge_core::interfaces::FetchError;
        use fieldforge_core::interfaces::Fetcher;

        let fetcher = HttpFetcher::new(HttpFetcherConfig {
            timeout_ms: HttpFetcherConfig::DEFAULT_TIMEOUT_MS,
            user_agent: "fieldforge/0.1".to_string(),
            max_response_bytes: HttpFetcherConfig::DEFAULT_MAX_RESPONSE_BYTES,
        })
        .expect("client builds");
        let result = fetcher.fetch("file:///etc/passwd", "localhost");
        assert_eq!(result.err(), Some(FetchError::Generic));
    }
}
