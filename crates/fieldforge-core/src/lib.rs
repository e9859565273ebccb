// fieldforge-core/src/lib.rs
// ============================================================================
// Module: Field Forge Core
// Description: Data model and pure decision logic for the per-product research loop.
// Purpose: Root crate tying together identity, budget, extraction-adjacent pipeline stages.
// Dependencies: ret-logic, serde, serde_json, sha2, thiserror, time, unicode-normalization
// ============================================================================

//! # fieldforge-core
//!
//! The core, I/O-free pipeline: identity gating, budget enforcement,
//! evidence auditing, critic normalization, candidate
//! merging, consensus, cross-field constraint solving, round-frontier
//! decisions, drift reconciliation, learning gates, source intel, and the
//! top-level product-run state machine. Fetching, LLM calls, and storage are
//! capability traits in [`interfaces`]; their concrete implementations live
//! in `fieldforge-fetch`, `fieldforge-providers`, and `fieldforge-store`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auditor;
pub mod budget;
pub mod consensus;
pub mod constraint;
pub mod critic;
pub mod drift;
pub mod events;
pub mod frontier;
pub mod identity;
pub mod interfaces;
pub mod learning;
pub mod merger;
pub mod model;
pub mod runner;
pub mod source_intel;
