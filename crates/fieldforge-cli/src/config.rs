// fieldforge-cli/src/config.rs
// ============================================================================
// Module: Daemon Configuration
// Description: Environment-sourced configuration for the fieldforge CLI/daemon.
// Purpose: Resolve run-profile defaults and provider credentials, failing closed.
// Dependencies: fieldforge-core, thiserror
// ============================================================================

//! ## Overview
//! Configuration is resolved once at process start, every fallible step
//! returns a typed [`ConfigError`], and an invalid combination (LLM enabled
//! with no provider key) fails closed rather than silently disabling the
//! feature. `fieldforge` has no config file — every knob is an environment
//! variable.

use std::env;
use std::path::PathBuf;

use fieldforge_core::budget::BudgetSet;
use thiserror::Error;

/// Environment variable naming the run profile.
pub const RUN_PROFILE_ENV: &str = "RUN_PROFILE";
/// Environment variable toggling the article-extractor-v2 deterministic path.
pub const ARTICLE_EXTRACTOR_V2_ENV: &str = "ARTICLE_EXTRACTOR_V2";
/// Environment variable naming the preferred PDF backend (accepted, unused
/// by this core: PDF backend subprocesses are a Non-goal).
pub const PDF_PREFERRED_BACKEND_ENV: &str = "PDF_PREFERRED_BACKEND";
/// Environment variable carrying the primary LLM provider key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable carrying the fallback LLM provider key.
pub const DEEPSEEK_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
/// Environment variable that, when `true`/`1`, requires a resolvable LLM key.
pub const LLM_ENABLED_ENV: &str = "FIELDFORGE_LLM_ENABLED";
/// Environment variable naming the chat-completions endpoint for the HTTP provider.
pub const LLM_ENDPOINT_ENV: &str = "FIELDFORGE_LLM_ENDPOINT";
/// Environment variable naming the on-disk root for compiled rule helper files.
pub const HELPER_FILES_ROOT_ENV: &str = "FIELDFORGE_HELPER_FILES_ROOT";
/// Environment variable naming the `SQLite` object store path.
pub const STORE_PATH_ENV: &str = "FIELDFORGE_STORE_PATH";
/// Environment variable naming the daemon's product concurrency.
pub const DAEMON_CONCURRENCY_ENV: &str = "FIELDFORGE_DAEMON_CONCURRENCY";

/// Default chat-completions endpoint used when none is configured.
const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default helper-files root when none is configured.
const DEFAULT_HELPER_FILES_ROOT: &str = "./helper_files";
/// Default object store path when none is configured.
const DEFAULT_STORE_PATH: &str = "./fieldforge.sqlite3";
/// Default per-product concurrency for `run-daemon`.
const DEFAULT_DAEMON_CONCURRENCY: usize = 4;

/// A run profile, selecting default budgets for a product run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunProfile {
    /// Minimal budget: cheap, shallow runs for smoke-testing rule changes.
    Fast,
    /// The default production budget.
    Standard,
    /// A generous budget for deep backfills or hard-to-resolve products.
    Thorough,
}

impl RunProfile {
    /// Parses a run profile from its environment-variable spelling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRunProfile`] for any value other than
    /// `fast`, `standard`, or `thorough` (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "standard" => Ok(Self::Standard),
            "thorough" => Ok(Self::Thorough),
            other => Err(ConfigError::InvalidRunProfile(other.to_string())),
        }
    }

    /// Returns the default per-product [`BudgetSet`] for this profile.
    #[must_use]
    pub fn budget_defaults(self) -> BudgetSet {
        match self {
            Self::Fast => BudgetSet {
                max_urls_per_product: 4,
                max_queries_per_product: 2,
                max_time_per_product_ms: 30_000,
                max_llm_calls_per_product: 2,
                max_high_tier_calls_per_product: 0,
                max_cost_per_product_usd: 0.05,
            },
            Self::Standard => BudgetSet {
                max_urls_per_product: 12,
                max_queries_per_product: 6,
                max_time_per_product_ms: 120_000,
                max_llm_calls_per_product: 7,
                max_high_tier_calls_per_product: 3,
                max_cost_per_product_usd: 0.50,
            },
            Self::Thorough => BudgetSet {
                max_urls_per_product: 30,
                max_queries_per_product: 15,
                max_time_per_product_ms: 600_000,
                max_llm_calls_per_product: 20,
                max_high_tier_calls_per_product: 10,
                max_cost_per_product_usd: 2.00,
            },
        }
    }
}

/// Resolved LLM provider credentials, `OPENAI_API_KEY` /
/// `DEEPSEEK_API_KEY` fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmCredentials {
    /// The resolved bearer key.
    pub api_key: String,
    /// Which environment variable supplied it, for diagnostics.
    pub source_env: &'static str,
}

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected run profile.
    pub run_profile: RunProfile,
    /// Default budget for the selected profile.
    pub budget_defaults: BudgetSet,
    /// Whether the article-extractor-v2 deterministic extraction path is enabled.
    pub article_extractor_v2: bool,
    /// Preferred PDF backend identifier (accepted for forward-compatibility only).
    pub pdf_preferred_backend: String,
    /// Whether the LLM extractor is expected to be reachable this run.
    pub llm_enabled: bool,
    /// Resolved LLM credentials, present whenever `llm_enabled` is true.
    pub llm_credentials: Option<LlmCredentials>,
    /// Chat-completions endpoint for the reference HTTP provider.
    pub llm_endpoint: String,
    /// Root directory for compiled rule helper files.
    pub helper_files_root: PathBuf,
    /// Path to the `SQLite` object store.
    pub store_path: PathBuf,
    /// Maximum products the daemon runs concurrently.
    pub daemon_concurrency: usize,
}

/// Configuration resolution failures (CLI exit code `2`).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `RUN_PROFILE` was set to an unrecognized value.
    #[error("invalid RUN_PROFILE value: `{0}`")]
    InvalidRunProfile(String),
    /// The LLM extractor is enabled but neither provider key is set.
    #[error("LLM extraction enabled but neither {OPENAI_API_KEY_ENV} nor {DEEPSEEK_API_KEY_ENV} is set")]
    MissingLlmKey,
    /// An environment variable held a value of the wrong shape.
    #[error("environment variable `{var}` has invalid value `{value}`")]
    InvalidEnvValue {
        /// The offending variable's name.
        var: &'static str,
        /// The offending value.
        value: String,
    },
}

impl Config {
    /// Resolves configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `RUN_PROFILE` is unrecognized, a numeric
    /// override fails to parse, or the LLM extractor is enabled without a
    /// resolvable provider key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_profile = match env::var(RUN_PROFILE_ENV) {
            Ok(raw) => RunProfile::parse(&raw)?,
            Err(_) => RunProfile::Standard,
        };

        let article_extractor_v2 = parse_bool_env(ARTICLE_EXTRACTOR_V2_ENV, true)?;
        let pdf_preferred_backend =
            env::var(PDF_PREFERRED_BACKEND_ENV).unwrap_or_else(|_| "none".to_string());

        let llm_enabled = parse_bool_env(LLM_ENABLED_ENV, true)?;
        let llm_credentials = resolve_llm_credentials();
        if llm_enabled && llm_credentials.is_none() {
            return Err(ConfigError::MissingLlmKey);
        }

        let llm_endpoint =
            env::var(LLM_ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_LLM_ENDPOINT.to_string());
        let helper_files_root = env::var(HELPER_FILES_ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_HELPER_FILES_ROOT));
        let store_path = env::var(STORE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));
        let daemon_concurrency = match env::var(DAEMON_CONCURRENCY_ENV) {
            Ok(raw) => raw.parse::<usize>().map_err(|_| ConfigError::InvalidEnvValue {
                var: DAEMON_CONCURRENCY_ENV,
                value: raw,
            })?,
            Err(_) => DEFAULT_DAEMON_CONCURRENCY,
        };

        Ok(Self {
            budget_defaults: run_profile.budget_defaults(),
            run_profile,
            article_extractor_v2,
            pdf_preferred_backend,
            llm_enabled,
            llm_credentials,
            llm_endpoint,
            helper_files_root,
            store_path,
            daemon_concurrency,
        })
    }
}

/// Resolves `OPENAI_API_KEY`, falling back to `DEEPSEEK_API_KEY`.
fn resolve_llm_credentials() -> Option<LlmCredentials> {
    if let Ok(api_key) = env::var(OPENAI_API_KEY_ENV) {
        if !api_key.trim().is_empty() {
            return Some(LlmCredentials { api_key, source_env: OPENAI_API_KEY_ENV });
        }
    }
    if let Ok(api_key) = env::var(DEEPSEEK_API_KEY_ENV) {
        if !api_key.trim().is_empty() {
            return Some(LlmCredentials { api_key, source_env: DEEPSEEK_API_KEY_ENV });
        }
    }
    None
}

/// Parses a boolean-shaped environment variable (`true`/`false`/`1`/`0`),
/// returning `default_when_absent` when the variable is unset.
fn parse_bool_env(var: &'static str, default_when_absent: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default_when_absent),
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidEnvValue { var, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_profile_parses_case_insensitively() {
        assert_eq!(RunProfile::parse("Standard"), Ok(RunProfile::Standard));
        assert_eq!(RunProfile::parse("THOROUGH"), Ok(RunProfile::Thorough));
    }

    #[test]
    fn run_profile_rejects_unknown_value() {
        assert_eq!(
            RunProfile::parse("turbo"),
            Err(ConfigError::InvalidRunProfile("turbo".to_string()))
        );
    }

    #[test]
    fn fast_profile_budget_is_cheaper_than_thorough() {
        let fast = RunProfile::Fast.budget_defaults();
        let thorough = RunProfile::Thorough.budget_defaults();
        assert!(fast.max_urls_per_product < thorough.max_urls_per_product);
        assert!(fast.max_cost_per_product_usd < thorough.max_cost_per_product_usd);
    }

    #[test]
    fn parse_bool_env_defaults_when_var_absent() {
        let result = parse_bool_env("FIELDFORGE_TEST_BOOL_UNSET", true);
        assert_eq!(result, Ok(true));
    }
}
