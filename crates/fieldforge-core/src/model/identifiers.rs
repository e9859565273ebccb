// fieldforge-core/src/model/identifiers.rs
// ============================================================================
// Module: Field Forge Identifiers
// Description: Canonical opaque identifiers and slugging for product specs.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, unicode-normalization
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! fieldforge, plus the `slug` function that derives a [`ProductId`] from a
//! product's identity tuple. Identifiers are opaque and serialize as strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(Category, "Product category, e.g. `mouse`.");
string_id!(Brand, "Canonical brand name as carried by the catalog.");
string_id!(Model, "Canonical model name as carried by the catalog.");
string_id!(Variant, "Canonical variant name; empty when the catalog has none.");
string_id!(ProductId, "Stable slug identity: `category-brand-model[-variant]`.");
string_id!(RunId, "Identifier for one product run (a sequence of rounds).");
string_id!(SourceId, "Identifier for a retained source page within a run.");
string_id!(SnippetId, "Identifier for an evidence snippet, form `sn_<hash>`.");
string_id!(FieldKey, "Rule-engine field key, e.g. `dpi` or `sensor`.");

/// Product identity tuple, locked by the upstream catalog gate.
///
/// # Invariants
/// - `variant` is empty unless the catalog lists a non-empty variant for
///   `(brand, model)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Product category.
    pub category: Category,
    /// Brand name.
    pub brand: Brand,
    /// Model name.
    pub model: Model,
    /// Variant name, empty string when none.
    pub variant: Variant,
}

impl Identity {
    /// Builds the identity tuple, normalizing `variant` to empty when blank.
    #[must_use]
    pub fn new(
        category: impl Into<Category>,
        brand: impl Into<Brand>,
        model: impl Into<Model>,
        variant: impl Into<Variant>,
    ) -> Self {
        let variant = variant.into();
        let variant = if variant.as_str().trim().is_empty() {
            Variant::new("")
        } else {
            variant
        };
        Self {
            category: category.into(),
            brand: brand.into(),
            model: model.into(),
            variant,
        }
    }

    /// Derives the stable [`ProductId`] for this identity per the slug law.
    #[must_use]
    pub fn product_id(&self) -> ProductId {
        let mut parts = vec![
            slug(self.category.as_str()),
            slug(self.brand.as_str()),
            slug(self.model.as_str()),
        ];
        if !self.variant.as_str().is_empty() {
            parts.push(slug(self.variant.as_str()));
        }
        ProductId::new(parts.join("-"))
    }
}

// ============================================================================
// SECTION: Slugging
// ============================================================================

/// Lowercases, NFD-normalizes (stripping diacritics), preserves underscores,
/// and collapses runs of non-alphanumeric/non-underscore characters into a
/// single hyphen, trimming leading/trailing hyphens.
///
/// `slug(slug(s)) == slug(s)` for all `s`.
#[must_use]
pub fn slug(input: &str) -> String {
    let lowered = input.to_lowercase();
    let stripped: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut last_was_sep = false;
    for ch in stripped.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('-');
            last_was_sep = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Returns whether `c` is a Unicode combining mark (NFD diacritic).
///
/// Avoids a dependency on `unicode-categories`: combining marks occupy the
/// `U+0300..=U+036F` block for the scripts this system targets.
fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_hyphenates() {
        assert_eq!(slug("Focus Pro 35K"), "focus-pro-35k");
    }

    #[test]
    fn slug_strips_diacritics() {
        assert_eq!(slug("Señor Café"), "senor-cafe");
    }

    #[test]
    fn slug_preserves_underscores() {
        assert_eq!(slug("paw_3395 Sensor"), "paw_3395-sensor");
    }

    #[test]
    fn slug_is_idempotent() {
        let cases = ["Focus Pro 35K", "Señor Café", "  weird -- spacing  "];
        for case in cases {
            let once = slug(case);
            let twice = slug(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn identity_product_id_omits_empty_variant() {
        let id = Identity::new("mouse", "Razer", "Viper V3 Pro", "");
        assert_eq!(id.product_id().as_str(), "mouse-razer-viper-v3-pro");
    }

    #[test]
    fn identity_product_id_includes_variant() {
        let id = Identity::new("mouse", "Razer", "Viper V3 Pro", "Wireless");
        assert_eq!(
            id.product_id().as_str(),
            "mouse-razer-viper-v3-pro-wireless"
        );
    }

    proptest::proptest! {
        /// `slug(slug(s)) == slug(s)` for arbitrary input, not just the
        /// hand-picked cases above.
        #[test]
        fn slug_is_idempotent_over_arbitrary_strings(input in "\\PC{0,64}") {
            let once = slug(&input);
            let twice = slug(&once);
            proptest::prop_assert_eq!(once, twice);
        }

        /// Slugging never introduces characters outside `[a-z0-9_-]`, and
        /// never produces a leading/trailing hyphen.
        #[test]
        fn slug_output_is_well_formed(input in "\\PC{0,64}") {
            let slugged = slug(&input);
            proptest::prop_assert!(slugged.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
            proptest::prop_assert!(!slugged.starts_with('-') && !slugged.ends_with('-'));
        }
    }
}
