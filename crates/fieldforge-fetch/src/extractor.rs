// fieldforge-fetch/src/extractor.rs
// ============================================================================
// Module: Deterministic Extractor
// Description: Field-candidate extraction from structured page surfaces.
// Purpose: Pull candidates out of a fetched page without any LLM call.
// Dependencies: fieldforge-core, serde_json
// ============================================================================

//! ## Overview
//! Surfaces are walked in priority order: structured metadata (JSON-LD →
//! microdata → RDFa → OpenGraph), embedded app state, captured network JSON,
//! then plain-text label/value windows recovered from the page's visible
//! text. Multi-product pages are gated by a page-product-cluster match
//! score; candidates from a cluster below the target-match threshold are
//! dropped before they ever reach the evidence pack.

use std::collections::BTreeMap;

use fieldforge_core::model::evidence::Method;

// ============================================================================
// SECTION: Page Input
// ============================================================================

/// A fetched page's retained, structured surfaces. HTML tag structure is not
/// retained beyond `visible_text` — tables/definition lists/label-value
/// windows are recovered from the flattened text rather than a DOM.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// Page URL.
    pub url: String,
    /// Flattened visible text (tags stripped, block boundaries preserved as
    /// newlines) used for label/value window scanning.
    pub visible_text: String,
    /// Raw `<script type="application/ld+json">` block bodies, in document order.
    pub ldjson_blocks: Vec<String>,
    /// Parsed microdata `Product` items, already reduced to key/value maps.
    pub microdata_products: Vec<BTreeMap<String, String>>,
    /// Parsed RDFa `Product` nodes, already reduced to key/value maps.
    pub rdfa_products: Vec<BTreeMap<String, String>>,
    /// OpenGraph `product:*` meta tag values.
    pub opengraph_product: BTreeMap<String, String>,
    /// Embedded app state (`__NEXT_DATA__`, `__NUXT__`, Apollo cache), if any.
    pub embedded_state: Option<serde_json::Value>,
    /// Captured network JSON responses (REST/GraphQL replays).
    pub network_responses: Vec<serde_json::Value>,
}

/// The page-product-cluster a candidate was extracted under, and how well it
/// matches the product under research.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterMatch {
    /// Cluster identity match score in `[0.0, 1.0]`.
    pub target_match_score: f64,
}

/// Minimum cluster match score for a candidate to survive identity gating
/// on multi-product pages.
pub const TARGET_MATCH_THRESHOLD: f64 = 0.52;

impl ClusterMatch {
    /// Whether this cluster's candidates pass identity gating.
    #[must_use]
    pub fn passes(self) -> bool {
        self.target_match_score >= TARGET_MATCH_THRESHOLD
    }
}

// ============================================================================
// SECTION: Candidates
// ============================================================================

/// One field candidate surfaced by the deterministic extractor, prior to
/// evidence-pack binding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    /// Field this candidate targets.
    pub field: String,
    /// Raw literal value text, as found on the page.
    pub value: String,
    /// Extraction method.
    pub method: Method,
    /// Dotted/bracketed path to the value within its source surface.
    pub key_path: String,
    /// Whether this candidate passed identity/target-match gating.
    pub target_match_passed: bool,
}

/// Per-page parser statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParserStats {
    /// Candidates accepted (kept for the evidence pack).
    pub accepted: u32,
    /// Candidates rejected (failed identity gating or a dimension/key guard).
    pub rejected: u32,
}

/// Keys rejected for width/height/length-style fields because they describe
/// an unrelated image asset rather than the product itself.
const IMAGE_DIMENSION_KEYS: &[&str] = &["image.width", "image.height", "images.width", "images.height"];

/// Field names the image-dimension guard applies to.
const DIMENSION_FIELDS: &[&str] = &["width", "height", "length", "lngth"];

fn is_rejected_image_dimension(field: &str, key_path: &str) -> bool {
    DIMENSION_FIELDS.contains(&field) && IMAGE_DIMENSION_KEYS.iter().any(|guarded| key_path.ends_with(guarded))
}

// ============================================================================
// SECTION: Structured Metadata Extraction
// ============================================================================

/// Extracts `{field, value}` pairs from a JSON-LD `Product` node's flattened
/// keys, skipping nested arrays/objects the caller hasn't flattened.
#[must_use]
pub fn extract_json_ld(block: &str, field_keys: &[&str]) -> Vec<RawCandidate> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(block) else { return Vec::new() };
    extract_from_flat_object(&value, field_keys, Method::JsonLd, "ld_json")
}

/// Extracts candidates from a reduced microdata item map.
#[must_use]
pub fn extract_microdata(item: &BTreeMap<String, String>, field_keys: &[&str]) -> Vec<RawCandidate> {
    extract_from_string_map(item, field_keys, Method::Microdata, "microdata")
}

/// Extracts candidates from a reduced RDFa node map.
#[must_use]
pub fn extract_rdfa(node: &BTreeMap<String, String>, field_keys: &[&str]) -> Vec<RawCandidate> {
    extract_from_string_map(node, field_keys, Method::Rdfa, "rdfa")
}

/// Extracts candidates from OpenGraph `product:*` meta values.
#[must_use]
pub fn extract_opengraph(meta: &BTreeMap<String, String>, field_keys: &[&str]) -> Vec<RawCandidate> {
    extract_from_string_map(meta, field_keys, Method::Opengraph, "opengraph")
}

fn extract_from_string_map(
    map: &BTreeMap<String, String>,
    field_keys: &[&str],
    method: Method,
    surface: &str,
) -> Vec<RawCandidate> {
    field_keys
        .iter()
        .filter_map(|field| {
            map.get(*field).map(|value| RawCandidate {
                field: (*field).to_string(),
                value: value.clone(),
                method,
                key_path: format!("{surface}.{field}"),
                target_match_passed: true,
            })
        })
        .collect()
}

fn extract_from_flat_object(value: &serde_json::Value, field_keys: &[&str], method: Method, surface: &str) -> Vec<RawCandidate> {
    let serde_json::Value::Object(map) = value else { return Vec::new() };
    field_keys
        .iter()
        .filter_map(|field| {
            map.get(*field).and_then(|candidate| scalar_to_string(candidate)).map(|text| RawCandidate {
                field: (*field).to_string(),
                value: text,
                method,
                key_path: format!("{surface}.{field}"),
                target_match_passed: true,
            })
        })
        .collect()
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

// ============================================================================
// SECTION: Embedded State & Network JSON
// ============================================================================

/// Walks a JSON value's nested object keys looking for `field_keys`,
/// returning every match with its dotted key path (embedded state / network
/// JSON both reduce to this same flattened walk.
#[must_use]
pub fn extract_from_json_tree(root: &serde_json::Value, field_keys: &[&str], method: Method) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    walk_json_tree(root, "", field_keys, method, &mut out);
    out
}

fn walk_json_tree(value: &serde_json::Value, path: &str, field_keys: &[&str], method: Method, out: &mut Vec<RawCandidate>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                if field_keys.contains(&key.as_str()) {
                    if let Some(text) = scalar_to_string(child) {
                        let rejected = is_rejected_image_dimension(key, &child_path);
                        out.push(RawCandidate {
                            field: key.clone(),
                            value: text,
                            method,
                            key_path: child_path.clone(),
                            target_match_passed: !rejected,
                        });
                    }
                }
                walk_json_tree(child, &child_path, field_keys, method, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let child_path = format!("{path}[{index}]");
                walk_json_tree(item, &child_path, field_keys, method, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// SECTION: Label/Value Window Scanning
// ============================================================================

/// Scans flattened visible text line-by-line for `Label: Value` pairs whose
/// folded label matches one of `field_labels` (label, field-key), the
/// fallback surface once no structured metadata or embedded state yields a
/// field (definition lists / label-value windows).
#[must_use]
pub fn extract_label_value_windows(text: &str, field_labels: &[(&str, &str)]) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for line in text.lines() {
        let Some((label, value)) = line.split_once(':') else { continue };
        let folded_label = fold_label(label);
        for (candidate_label, field) in field_labels {
            if fold_label(candidate_label) == folded_label {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    out.push(RawCandidate {
                        field: (*field).to_string(),
                        value: trimmed.to_string(),
                        method: Method::ParseTemplate,
                        key_path: format!("label_value.{field}"),
                        target_match_passed: true,
                    });
                }
                break;
            }
        }
    }
    out
}

fn fold_label(label: &str) -> String {
    label.trim().to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

// ============================================================================
// SECTION: Identity-Cluster Gating
// ============================================================================

/// Applies cluster gating to a batch of candidates extracted from one
/// page-product-cluster: on pages with a single product, `cluster` should
/// always pass; on multi-product pages, only clusters whose brand/model
/// match the target pass.
#[must_use]
pub fn gate_by_cluster(candidates: Vec<RawCandidate>, cluster: ClusterMatch) -> (Vec<RawCandidate>, ParserStats) {
    if cluster.passes() {
        let accepted = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
        (candidates, ParserStats { accepted, rejected: 0 })
    } else {
        let rejected = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
        (Vec::new(), ParserStats { accepted: 0, rejected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_ld_scalar_fields() {
        let block = r#"{"dpi": 26000, "sensor": "PixArt PAW3395"}"#;
        let candidates = extract_json_ld(block, &["dpi", "sensor"]);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().any(|c| c.field == "dpi" && c.value == "26000"));
    }

    #[test]
    fn rejects_image_dimension_keys_for_physical_fields() {
        let tree = serde_json::json!({ "image": { "width": 1200, "height": 800 }, "width": 68.5 });
        let candidates = extract_from_json_tree(&tree, &["width", "height"], Method::NetworkJson);
        let image_width = candidates.iter().find(|c| c.key_path == "image.width").expect("found");
        assert!(!image_width.target_match_passed);
        let product_width = candidates.iter().find(|c| c.key_path == "width").expect("found");
        assert!(product_width.target_match_passed);
    }

    #[test]
    fn label_value_window_matches_folded_label() {
        let text = "Specs\nSensor Type: Optical\nDPI: 26,000\n";
        let candidates = extract_label_value_windows(text, &[("sensor type", "sensor"), ("dpi", "dpi")]);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().any(|c| c.field == "sensor" && c.value == "Optical"));
    }

    #[test]
    fn cluster_below_threshold_rejects_all_candidates() {
        let candidates = vec![RawCandidate {
            field: "dpi".to_string(),
            value: "26000".to_string(),
            method: Method::JsonLd,
            key_path: "ld_json.dpi".to_string(),
            target_match_passed: true,
        }];
        let (kept, stats) = gate_by_cluster(candidates, ClusterMatch { target_match_score: 0.2 });
        assert!(kept.is_empty());
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn cluster_at_or_above_threshold_keeps_candidates() {
        let candidates = vec![RawCandidate {
            field: "dpi".to_string(),
            value: "26000".to_string(),
            method: Method::JsonLd,
            key_path: "ld_json.dpi".to_string(),
            target_match_passed: true,
        }];
        let (kept, stats) = gate_by_cluster(candidates, ClusterMatch { target_match_score: TARGET_MATCH_THRESHOLD });
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.accepted, 1);
    }
}
