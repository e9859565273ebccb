// fieldforge-core/src/model/hashing.rs
// ============================================================================
// Module: Field Forge Content Hashing
// Description: Canonical JSON hashing and snippet-hash helpers.
// Purpose: Provide deterministic `sha256:<hex>` digests for snippets and logs.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Snippet hashes and canonical-record hashes both use SHA-256 over either
//! raw normalized text or RFC 8785 (JCS) canonical JSON bytes, so two
//! independent runs over the same retained raw artifacts produce identical
//! digests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes with SHA-256, returning `sha256:<lowercase-hex>`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    format!("sha256:{}", hex_encode(&digest))
}

/// Hashes the normalized text of a snippet, stable-hash invariant.
#[must_use]
pub fn hash_snippet_text(normalized_text: &str) -> String {
    sha256_hex(normalized_text.as_bytes())
}

/// Hashes a serializable value using RFC 8785 canonical JSON.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))?;
    Ok(sha256_hex(&bytes))
}

/// Computes the candidate fingerprint `sha256(field||value||method||key_path)`
/// used to bind a deterministic candidate to its evidence snippet.
#[must_use]
pub fn candidate_fingerprint(field: &str, value: &str, method: &str, key_path: &str) -> String {
    let mut joined = String::with_capacity(field.len() + value.len() + method.len() + key_path.len());
    joined.push_str(field);
    joined.push_str(value);
    joined.push_str(method);
    joined.push_str(key_path);
    sha256_hex(joined.as_bytes())
}

/// Derives the `sn_<short hash>` snippet id from its normalized text.
#[must_use]
pub fn snippet_id_for(normalized_text: &str) -> String {
    let digest = hash_snippet_text(normalized_text);
    let short = digest.strip_prefix("sha256:").unwrap_or(&digest);
    format!("sn_{}", &short[..short.len().min(16)])
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_hash_is_stable() {
        let a = hash_snippet_text("Sensor: Focus Pro 35K");
        let b = hash_snippet_text("Sensor: Focus Pro 35K");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
    }

    #[test]
    fn snippet_hash_changes_with_text() {
        let a = hash_snippet_text("Sensor: Focus Pro 35K");
        let b = hash_snippet_text("Sensor: Focus Pro 30K");
        assert_ne!(a, b);
    }

    #[test]
    fn snippet_id_is_deterministic() {
        let a = snippet_id_for("DPI: 26000");
        let b = snippet_id_for("DPI: 26000");
        assert_eq!(a, b);
        assert!(a.starts_with("sn_"));
    }

    #[test]
    fn fingerprint_is_sensitive_to_each_component() {
        let base = candidate_fingerprint("dpi", "26000", "parse_template", "specs.dpi");
        let diff_field = candidate_fingerprint("weight", "26000", "parse_template", "specs.dpi");
        assert_ne!(base, diff_field);
    }
}
