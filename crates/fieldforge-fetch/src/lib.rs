// fieldforge-fetch/src/lib.rs
// ============================================================================
// Module: Fetch & Extraction
// Description: Robots policy, fetch scheduling, deterministic extraction, evidence packs.
// Purpose: Turn an admitted URL into retained evidence without any LLM involvement.
// Dependencies: fieldforge-core, reqwest, serde, serde_json, sha2, thiserror, url
// ============================================================================

//! # fieldforge-fetch
//!
//! Implements the Robots/Fetch Policy, Fetch Scheduler, Deterministic
//! Extractor, and Evidence Pack Builder: a host-policy-gated, error-typed
//! source abstraction wired up as a host-throttled, mode-falling-back fetch
//! abstraction.

pub mod evidence_pack;
pub mod extractor;
pub mod fetchers;
pub mod http;
pub mod policy;
pub mod robots;
pub mod scheduler;
