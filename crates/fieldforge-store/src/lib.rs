// fieldforge-store/src/lib.rs
// ============================================================================
// Module: Object Store
// Description: SQLite-backed implementation of the Storage capability.
// Purpose: Durable persistence for object-key namespace (inputs, per-run
//          artifacts, latest outputs, published history, reports).
// Dependencies: fieldforge-core, rusqlite, serde_json, thiserror
// ============================================================================

//! # fieldforge-store
//!
//! A `SQLite`-WAL-backed store opened with secure-defaults pragmas behind a
//! mutex-guarded connection. `fieldforge` persists opaque byte blobs keyed by
//! the flat object-key strings the daemon's output namespace defines
//! (`specs/inputs/...`, `specs/outputs/.../latest/...`, …), since the
//! [`fieldforge_core::interfaces::Storage`] capability is a key/value object
//! store rather than a versioned run-state store.

pub mod store;

pub use store::SqliteStorage;
pub use store::SqliteStorageConfig;
pub use store::SqliteStorageError;
