// fieldforge-cli/src/lib.rs
// ============================================================================
// Module: CLI Support Library
// Description: Config resolution and helper-file loading shared by the binary.
// Purpose: Keep `main.rs` a thin command dispatcher over testable logic.
// Dependencies: fieldforge-core, fieldforge-rules, serde, serde_json, thiserror
// ============================================================================

//! # fieldforge-cli
//!
//! Environment/config resolution and on-disk bundle loading live in a
//! library so they can be unit-tested directly, while `src/main.rs` only
//! parses arguments and dispatches.

pub mod config;
pub mod helpers;
pub mod pipeline;
