// fieldforge-providers/src/lib.rs
// ============================================================================
// Module: LLM Extractor
// Description: Field batching, model routing, response caching, circuit breaker.
// Purpose: Call an LLM provider only when deterministic extraction falls short.
// Dependencies: fieldforge-core, serde, serde_json, sha2, thiserror
// ============================================================================

//! # fieldforge-providers
//!
//! A registry of named provider adapters with routing/fallback and a cache
//! layer in front of the network call. Routing here is by field batch
//! difficulty rather than by named providers, and the cache/circuit-breaker
//! wrap a sidecar executor ("cortex") rather than a second LLM vendor.

pub mod batching;
pub mod cache;
pub mod circuit_breaker;
pub mod extractor;
pub mod http;
