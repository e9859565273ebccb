// fieldforge-cli/src/helpers.rs
// ============================================================================
// Module: Helper File Bundle
// Description: Loads a category's compiled rules, catalog, and source tiers.
// Purpose: Read the `<helper_files_root>/<category>/...` tree on disk.
// Dependencies: fieldforge-core, fieldforge-rules, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Helper files live on disk under `helper_files_root`, outside the object
//! store's key namespace: compiled
//! rules, the migration plan, the product catalog, and the approved-domain
//! source table. Rule compilation from spreadsheets is a Non-goal, so
//! [`compile_rule_set`] only assembles and validates an already-typed
//! [`RuleSet`] from a JSON array of [`FieldRule`]s; it never infers a schema.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use fieldforge_core::identity::CatalogIndex;
use fieldforge_core::identity::CatalogRow;
use fieldforge_core::model::identifiers::FieldKey;
use fieldforge_core::model::rule::FieldRule;
use fieldforge_core::model::tier::Tier;
use fieldforge_rules::MigrationPlan;
use fieldforge_rules::RuleEngineError;
use fieldforge_rules::RuleSet;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// One approved source domain entry for a category (`sources.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Root domain, e.g. `"razer.com"`.
    pub root_domain: String,
    /// The domain's evidence tier.
    pub tier: Tier,
    /// Whether this domain currently counts toward the approved-domain floor.
    pub approved: bool,
}

/// A category's fully loaded helper-file bundle.
#[derive(Debug, Clone)]
pub struct HelperBundle {
    /// Compiled field rules for this category.
    pub rules: RuleSet,
    /// Key-migration plan for this category, empty when none is configured.
    pub migrations: MigrationPlan,
    /// Canonical identity catalog for the identity gate.
    pub catalog: CatalogIndex,
    /// Approved-domain source table, keyed by root domain.
    pub sources: BTreeMap<String, SourceEntry>,
}

/// Errors loading or compiling a category's helper files.
#[derive(Debug, Error)]
pub enum HelperError {
    /// A helper file could not be read.
    #[error("failed to read helper file `{path}`: {source}")]
    Io {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A helper file's JSON could not be parsed.
    #[error("failed to parse helper file `{path}`: {source}")]
    Parse {
        /// The path that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A compiled rule set failed internal-consistency validation.
    #[error("rule set for category `{category}` is invalid: {source}")]
    InvalidRuleSet {
        /// The category whose rule set failed validation.
        category: String,
        /// The underlying validation error.
        #[source]
        source: RuleEngineError,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, HelperError> {
    let bytes = fs::read(path).map_err(|source| HelperError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_slice(&bytes).map_err(|source| HelperError::Parse { path: path.to_path_buf(), source })
}

fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, HelperError> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

/// Returns the per-category generated-rules directory under `root`.
#[must_use]
pub fn generated_dir(root: &Path, category: &str) -> PathBuf {
    root.join(category).join("_generated")
}

impl HelperBundle {
    /// Loads every helper file for `category` under `helper_files_root`.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError`] when a required file is unreadable, malformed,
    /// or the compiled rule set fails [`RuleSet::validate`].
    pub fn load(helper_files_root: &Path, category: &str) -> Result<Self, HelperError> {
        let generated = generated_dir(helper_files_root, category);
        let rules: RuleSet = read_json(&generated.join("field_rules.json"))?;
        rules
            .validate()
            .map_err(|source| HelperError::InvalidRuleSet { category: category.to_string(), source })?;
        let migrations: MigrationPlan = read_json_or_default(&generated.join("key_migrations.json"))?;

        let category_dir = helper_files_root.join(category);
        let catalog_rows: Vec<CatalogRow> =
            read_json_or_default(&helper_files_root.join("_control_plane").join("product_catalog.json"))?;
        let catalog = CatalogIndex::new(catalog_rows);

        let source_entries: Vec<SourceEntry> = read_json_or_default(&category_dir.join("sources.json"))?;
        let sources = source_entries.into_iter().map(|entry| (entry.root_domain.clone(), entry)).collect();

        Ok(Self { rules, migrations, catalog, sources })
    }

    /// Returns the required/critical-level rule map in the shape
    /// [`fieldforge_core::runner::ProductRunner::submit_round`] expects.
    #[must_use]
    pub fn rule_contracts(
        &self,
    ) -> BTreeMap<FieldKey, (fieldforge_core::model::rule::Contract, fieldforge_core::model::rule::RequiredLevel)>
    {
        self.rules
            .fields
            .iter()
            .map(|(field, rule)| (field.clone(), (rule.contract.clone(), rule.required_level)))
            .collect()
    }

    /// Returns the [`Tier`] and approved status for `root_domain`, defaulting
    /// an unlisted domain to [`Tier::DatabaseOrCommunity`] and unapproved.
    #[must_use]
    pub fn tier_for(&self, root_domain: &str) -> (Tier, bool) {
        self.sources
            .get(root_domain)
            .map_or((Tier::DatabaseOrCommunity, false), |entry| (entry.tier, entry.approved))
    }
}

/// Assembles and validates a [`RuleSet`] from an already-typed field list;
/// this never infers a schema from untyped sources.
///
/// # Errors
///
/// Returns [`RuleEngineError`] when `field_order` disagrees with `fields`.
pub fn compile_rule_set(
    category: &str,
    version: &str,
    field_order: Vec<FieldKey>,
    fields: Vec<FieldRule>,
) -> Result<RuleSet, RuleEngineError> {
    let rule_set = RuleSet {
        category: category.to_string(),
        version: version.to_string(),
        field_order,
        fields: fields.into_iter().map(|rule| (rule.field.clone(), rule)).collect(),
        approved_domain_floors: BTreeMap::new(),
    };
    rule_set.validate()?;
    Ok(rule_set)
}
