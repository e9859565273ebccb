// fieldforge-cli/src/main.rs
// ============================================================================
// Module: Daemon CLI
// Description: Thin argument-parsing/dispatch layer over fieldforge-cli's library.
// Purpose: Implement daemon CLI commands and exit codes.
// Dependencies: fieldforge-cli, fieldforge-core, fieldforge-fetch, fieldforge-providers,
//               fieldforge-rules, fieldforge-store, clap, tokio
// ============================================================================

//! ## Overview
//! Argument parsing and exit-code translation live here; everything fallible
//! and testable lives in [`fieldforge_cli::config`], [`fieldforge_cli::helpers`],
//! and [`fieldforge_cli::pipeline`]. This binary
//! implements all of them, though `compile-rules*`/`diff-rules` only assemble
//! and validate already-typed rule sets (schema bootstrapping from untyped
//! sources is out of scope here) and `benchmark-*` only roll up pass/fail counts
//! (KPI reporting proper is an external collaborator).

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use fieldforge_cli::config::Config;
use fieldforge_cli::config::ConfigError;
use fieldforge_cli::helpers::HelperBundle;
use fieldforge_cli::pipeline;
use fieldforge_cli::pipeline::PipelineError;
use fieldforge_cli::pipeline::ProductInput;
use fieldforge_core::events::encode_ndjson;
use fieldforge_core::frontier::Mode;
use fieldforge_core::interfaces::Storage;
use fieldforge_core::model::identifiers::Category;
use fieldforge_core::model::time::Timestamp;
use fieldforge_fetch::fetchers::DryRunFetcher;
use fieldforge_fetch::http::HttpFetcher;
use fieldforge_fetch::http::HttpFetcherConfig;
use fieldforge_fetch::policy::HttpRobotsProbe;
use fieldforge_fetch::policy::PolicyFetcher;
use fieldforge_providers::http::HttpLlmProvider;
use fieldforge_providers::http::HttpProviderConfig;
use fieldforge_rules::RuleSet;
use fieldforge_rules::classify_version_change;
use fieldforge_store::SqliteStorage;
use fieldforge_store::SqliteStorageConfig;

/// Exit code for a generic, unclassified failure.
const EXIT_GENERIC_FAILURE: u8 = 1;
/// Exit code for invalid configuration.
const EXIT_CONFIG_INVALID: u8 = 2;
/// Exit code for an identity-gate rejection.
const EXIT_IDENTITY_REJECTED: u8 = 3;
/// Exit code produced when a termination signal interrupted the run.
const EXIT_SIGNAL: u8 = 130;
/// User-Agent string presented to fetch targets and robots.txt probes.
const USER_AGENT: &str = "fieldforge/0.1 (+https://fieldforge.invalid/bot)";

#[derive(Parser)]
#[command(name = "fieldforge", about = "Evidence-backed product-spec harvesting daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs one product to completion and writes its artifacts.
    RunOnce {
        /// Product category (e.g. `mouse`).
        #[arg(long)]
        category: String,
        /// Product identity input JSON file (`ProductInput` shape).
        #[arg(long)]
        input: PathBuf,
        /// Skip live network fetches, producing empty pages (smoke-testing).
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Runs every product under `specs/inputs/<category>/products/` with
    /// bounded concurrency, draining gracefully on SIGTERM.
    RunDaemon {
        /// Product category to run.
        #[arg(long)]
        category: String,
        /// Skip live network fetches, producing empty pages (smoke-testing).
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Assembles and validates a single category's compiled rule set.
    CompileRules {
        /// Product category.
        #[arg(long)]
        category: String,
        /// Path to a JSON array of already-typed `FieldRule` objects.
        #[arg(long)]
        fields: PathBuf,
        /// Semver version to stamp on the compiled rule set.
        #[arg(long)]
        version: String,
    },
    /// Runs `compile-rules` for every category subdirectory of `--root`.
    CompileRulesAll {
        /// Root directory containing one subdirectory per category, each
        /// with a `fields.json` array and a `version.txt`.
        #[arg(long)]
        root: PathBuf,
    },
    /// Polls a category's rule-source directory and recompiles on change.
    WatchCompile {
        /// Product category.
        #[arg(long)]
        category: String,
        /// Path to a JSON array of already-typed `FieldRule` objects.
        #[arg(long)]
        fields: PathBuf,
        /// Semver version to stamp on each recompilation.
        #[arg(long)]
        version: String,
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 2_000)]
        poll_ms: u64,
        /// Stop after this many polls (0 = run until a termination signal).
        #[arg(long, default_value_t = 0)]
        max_polls: u64,
    },
    /// Classifies the version bump between two compiled rule sets.
    DiffRules {
        /// Path to the previous compiled `field_rules.json`.
        #[arg(long)]
        prev: PathBuf,
        /// Path to the next compiled `field_rules.json`.
        #[arg(long)]
        next: PathBuf,
    },
    /// Runs every product under a category against the dry-run fetcher and
    /// reports coverage, without asserting pass/fail against a golden set.
    BenchmarkScale {
        /// Product category.
        #[arg(long)]
        category: String,
    },
    /// Runs every product in a golden fixture set and compares its published
    /// field values against the fixture's expected values.
    BenchmarkGolden {
        /// Product category.
        #[arg(long)]
        category: String,
        /// Directory of golden fixtures: `<product_id>.input.json` paired
        /// with `<product_id>.expected.json` (a flat `field -> value` map).
        #[arg(long)]
        golden_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            let _ = write_stderr_line(&format!("fieldforge: {err}"));
            ExitCode::from(err.exit_code())
        }
    }
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Every top-level failure this binary can report, tagged with its exit code.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Configuration resolution failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Identity gate rejected the product.
    #[error("identity rejected: {0}")]
    IdentityRejected(String),
    /// A termination signal interrupted the run.
    #[error("interrupted by signal")]
    Signal,
    /// Any other generic failure (I/O, parse, validation).
    #[error("{0}")]
    Generic(String),
}

impl CliError {
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG_INVALID,
            Self::IdentityRejected(_) => EXIT_IDENTITY_REJECTED,
            Self::Signal => EXIT_SIGNAL,
            Self::Generic(_) => EXIT_GENERIC_FAILURE,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::IdentityRejected(reason) => Self::IdentityRejected(reason.to_string()),
        }
    }
}

impl From<fieldforge_cli::helpers::HelperError> for CliError {
    fn from(err: fieldforge_cli::helpers::HelperError) -> Self {
        Self::Generic(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Generic(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Generic(err.to_string())
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::RunOnce { category, input, dry_run } => run_once_command(&category, &input, dry_run),
        Command::RunDaemon { category, dry_run } => run_daemon_command(&category, dry_run),
        Command::CompileRules { category, fields, version } => compile_rules_command(&category, &fields, &version),
        Command::CompileRulesAll { root } => compile_rules_all_command(&root),
        Command::WatchCompile { category, fields, version, poll_ms, max_polls } => {
            watch_compile_command(&category, &fields, &version, poll_ms, max_polls)
        }
        Command::DiffRules { prev, next } => diff_rules_command(&prev, &next),
        Command::BenchmarkScale { category } => benchmark_scale_command(&category),
        Command::BenchmarkGolden { category, golden_dir } => benchmark_golden_command(&category, &golden_dir),
    }
}

// ============================================================================
// SECTION: run-once / run-daemon
// ============================================================================

fn now() -> Timestamp {
    Timestamp::from_offset(time::OffsetDateTime::now_utc())
}

/// Builds a dry-run or policy-gated live fetcher and drives `input` through
/// one product run, writing its artifacts to the object store.
fn run_once_command(category: &str, input_path: &Path, dry_run: bool) -> Result<(), CliError> {
    let config = Config::from_env()?;
    let bundle = HelperBundle::load(&config.helper_files_root, category)?;
    let storage = SqliteStorage::new(SqliteStorageConfig { path: config.store_path.clone(), busy_timeout_ms: 5_000 })
        .map_err(|err| CliError::Generic(err.to_string()))?;
    let input: ProductInput = serde_json::from_slice(&std::fs::read(input_path)?)?;
    let category = Category::new(category);
    let mode = mode_for_profile(config.run_profile);
    let llm = resolve_llm_provider(&config);

    let outcome = if dry_run {
        pipeline::run_once(&DryRunFetcher, llm.as_ref(), &bundle, &input, &category, config.budget_defaults, mode, now())?
    } else {
        let probe = HttpRobotsProbe::new().map_err(|err| CliError::Generic(err.to_string()))?;
        let http = HttpFetcher::new(HttpFetcherConfig {
            timeout_ms: HttpFetcherConfig::DEFAULT_TIMEOUT_MS,
            user_agent: USER_AGENT.to_string(),
            max_response_bytes: HttpFetcherConfig::DEFAULT_MAX_RESPONSE_BYTES,
        })
        .map_err(|err| CliError::Generic(err.to_string()))?;
        let fetcher = PolicyFetcher::new(probe, http, USER_AGENT.to_string(), now(), 1);
        pipeline::run_once(&fetcher, llm.as_ref(), &bundle, &input, &category, config.budget_defaults, mode, now())?
    };

    write_run_artifacts(&storage, &category, &outcome)?;
    write_stdout_line(
        &serde_json::json!({
            "product_id": outcome.record.product_id.as_str(),
            "stop_reason": outcome.stop_reason,
            "rounds": outcome.rounds,
            "validated": outcome.record.summary.validated,
        })
        .to_string(),
    )?;
    Ok(())
}

/// Runs every product JSON found under
/// `specs/inputs/<category>/products/` with up to `config.daemon_concurrency`
/// running at once, stopping admission of new work (but letting active
/// product runs finish) on SIGTERM.
fn run_daemon_command(category: &str, dry_run: bool) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Generic(err.to_string()))?;
    runtime.block_on(run_daemon_async(category, dry_run))
}

async fn run_daemon_async(category: &str, dry_run: bool) -> Result<(), CliError> {
    let config = Config::from_env()?;
    let bundle = HelperBundle::load(&config.helper_files_root, category)?;
    let storage = SqliteStorage::new(SqliteStorageConfig { path: config.store_path.clone(), busy_timeout_ms: 5_000 })
        .map_err(|err| CliError::Generic(err.to_string()))?;
    let prefix = format!("specs/inputs/{category}/products/");
    let keys = storage.list_keys(&prefix).map_err(|err| CliError::Generic(err.to_string()))?;

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(config.daemon_concurrency.max(1)));
    let mut handles = Vec::new();
    let mut terminated = false;

    for key in keys {
        tokio::select! {
            () = wait_for_termination() => {
                terminated = true;
            }
            permit = semaphore.clone().acquire_owned() => {
                let Ok(permit) = permit else { continue };
                let category_owned = category.to_string();
                let bundle_owned = bundle.clone();
                let storage_owned = storage.clone();
                let config_owned = config.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    run_one_daemon_product(&category_owned, &bundle_owned, &storage_owned, &config_owned, &key, dry_run)
                });
                handles.push(handle);
            }
        }
        if terminated {
            break;
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    if terminated {
        return Err(CliError::Signal);
    }
    Ok(())
}

fn run_one_daemon_product(
    category: &str,
    bundle: &HelperBundle,
    storage: &SqliteStorage,
    config: &Config,
    input_key: &str,
    dry_run: bool,
) {
    let Ok(bytes) = storage.read_object(input_key) else { return };
    let Ok(input) = serde_json::from_slice::<ProductInput>(&bytes) else { return };
    let category = Category::new(category);
    let mode = mode_for_profile(config.run_profile);
    let llm = resolve_llm_provider(config);

    let result = if dry_run {
        pipeline::run_once(&DryRunFetcher, llm.as_ref(), bundle, &input, &category, config.budget_defaults, mode, now())
    } else {
        let Ok(probe) = HttpRobotsProbe::new() else { return };
        let Ok(http) = HttpFetcher::new(HttpFetcherConfig {
            timeout_ms: HttpFetcherConfig::DEFAULT_TIMEOUT_MS,
            user_agent: USER_AGENT.to_string(),
            max_response_bytes: HttpFetcherConfig::DEFAULT_MAX_RESPONSE_BYTES,
        }) else {
            return;
        };
        let fetcher = PolicyFetcher::new(probe, http, USER_AGENT.to_string(), now(), 1);
        pipeline::run_once(&fetcher, llm.as_ref(), bundle, &input, &category, config.budget_defaults, mode, now())
    };

    if let Ok(outcome) = result {
        let _ = write_run_artifacts(storage, &category, &outcome);
    }
}

/// Resolves once SIGINT or (on Unix) SIGTERM arrives, so `run-daemon` can
/// stop admitting new products and report `stop_reason=signal:SIGTERM`-style
/// termination while letting already-spawned tasks finish.
async fn wait_for_termination() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let Ok(mut term) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            let _ = ctrl_c.await;
            return;
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

fn mode_for_profile(profile: fieldforge_cli::config::RunProfile) -> Mode {
    match profile {
        fieldforge_cli::config::RunProfile::Fast | fieldforge_cli::config::RunProfile::Standard => Mode::Standard,
        fieldforge_cli::config::RunProfile::Thorough => Mode::UberAggressive,
    }
}

fn resolve_llm_provider(config: &Config) -> Option<HttpLlmProvider> {
    let credentials = config.llm_credentials.as_ref()?;
    HttpLlmProvider::new(HttpProviderConfig {
        endpoint: config.llm_endpoint.clone(),
        api_key: credentials.api_key.clone(),
        timeout_ms: HttpProviderConfig::DEFAULT_TIMEOUT_MS,
        max_response_bytes: HttpProviderConfig::DEFAULT_MAX_RESPONSE_BYTES,
    })
    .ok()
}

/// Writes `latest/normalized.json|provenance.json|summary.json` and the
/// run's NDJSON event log, object-key namespace.
fn write_run_artifacts(
    storage: &SqliteStorage,
    category: &Category,
    outcome: &pipeline::RunOutcome,
) -> Result<(), CliError> {
    let product_id = outcome.record.product_id.clone();
    storage
        .write_object(
            &storage.resolve_output_key(category, &product_id, "normalized.json"),
            &pretty_json(&outcome.record.fields)?,
        )
        .map_err(|err| CliError::Generic(err.to_string()))?;
    storage
        .write_object(
            &storage.resolve_output_key(category, &product_id, "provenance.json"),
            &pretty_json(&outcome.record.provenance)?,
        )
        .map_err(|err| CliError::Generic(err.to_string()))?;
    storage
        .write_object(
            &storage.resolve_output_key(category, &product_id, "summary.json"),
            &pretty_json(&outcome.record.summary)?,
        )
        .map_err(|err| CliError::Generic(err.to_string()))?;
    let events_key = format!(
        "specs/outputs/{}/{}/runs/run_{}/logs/events.jsonl",
        category.as_str(),
        product_id.as_str(),
        outcome.rounds
    );
    storage.write_object(&events_key, &encode_ndjson(&outcome.events)?).map_err(|err| CliError::Generic(err.to_string()))?;
    Ok(())
}

/// Serializes `value` as pretty JSON with a trailing newline (every
/// human-readable artifact is UTF-8 pretty-printed with a trailing newline).
fn pretty_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ============================================================================
// SECTION: compile-rules / compile-rules-all / watch-compile / diff-rules
// ============================================================================

fn load_rule_set(category: &str, fields_path: &Path, version: &str) -> Result<RuleSet, CliError> {
    let fields: Vec<fieldforge_core::model::rule::FieldRule> = serde_json::from_slice(&std::fs::read(fields_path)?)?;
    let field_order = fields.iter().map(|rule| rule.field.clone()).collect();
    fieldforge_cli::helpers::compile_rule_set(category, version, field_order, fields)
        .map_err(|err| CliError::Generic(err.to_string()))
}

fn compile_rules_command(category: &str, fields_path: &Path, version: &str) -> Result<(), CliError> {
    let config = Config::from_env()?;
    let rule_set = load_rule_set(category, fields_path, version)?;
    let generated = fieldforge_cli::helpers::generated_dir(&config.helper_files_root, category);
    std::fs::create_dir_all(&generated)?;
    std::fs::write(generated.join("field_rules.json"), pretty_json(&rule_set)?)?;
    write_stdout_line(&format!("compiled {} fields for category `{category}` at version {version}", rule_set.fields.len()))?;
    Ok(())
}

fn compile_rules_all_command(root: &Path) -> Result<(), CliError> {
    let mut compiled = 0usize;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let category = entry.file_name().to_string_lossy().into_owned();
        let dir = entry.path();
        let fields_path = dir.join("fields.json");
        let version_path = dir.join("version.txt");
        if !fields_path.exists() || !version_path.exists() {
            continue;
        }
        let version = std::fs::read_to_string(&version_path)?.trim().to_string();
        compile_rules_command(&category, &fields_path, &version)?;
        compiled += 1;
    }
    write_stdout_line(&format!("compiled {compiled} categories"))?;
    Ok(())
}

fn watch_compile_command(
    category: &str,
    fields_path: &Path,
    version: &str,
    poll_ms: u64,
    max_polls: u64,
) -> Result<(), CliError> {
    let mut last_modified = None;
    let mut polls = 0u64;
    loop {
        let modified = std::fs::metadata(fields_path)?.modified().ok();
        if modified != last_modified {
            compile_rules_command(category, fields_path, version)?;
            last_modified = modified;
        }
        polls += 1;
        if max_polls != 0 && polls >= max_polls {
            return Ok(());
        }
        std::thread::sleep(std::time::Duration::from_millis(poll_ms));
    }
}

fn diff_rules_command(prev_path: &Path, next_path: &Path) -> Result<(), CliError> {
    let prev: RuleSet = serde_json::from_slice(&std::fs::read(prev_path)?)?;
    let next: RuleSet = serde_json::from_slice(&std::fs::read(next_path)?)?;
    let change = classify_version_change(&prev, &next);
    write_stdout_line(&serde_json::to_string_pretty(&serde_json::json!({
        "bump": format!("{:?}", change.bump).to_lowercase(),
        "added": change.added.iter().map(fieldforge_core::model::identifiers::FieldKey::as_str).collect::<Vec<_>>(),
        "removed": change.removed.iter().map(fieldforge_core::model::identifiers::FieldKey::as_str).collect::<Vec<_>>(),
    }))?)?;
    Ok(())
}

// ============================================================================
// SECTION: benchmark-scale / benchmark-golden
// ============================================================================

fn benchmark_scale_command(category: &str) -> Result<(), CliError> {
    let config = Config::from_env()?;
    let bundle = HelperBundle::load(&config.helper_files_root, category)?;
    let storage = SqliteStorage::new(SqliteStorageConfig { path: config.store_path.clone(), busy_timeout_ms: 5_000 })
        .map_err(|err| CliError::Generic(err.to_string()))?;
    let prefix = format!("specs/inputs/{category}/products/");
    let keys = storage.list_keys(&prefix).map_err(|err| CliError::Generic(err.to_string()))?;

    let mut total = 0usize;
    let mut validated = 0usize;
    let mut coverage_sum = 0.0;
    for key in &keys {
        let Ok(bytes) = storage.read_object(key) else { continue };
        let Ok(input) = serde_json::from_slice::<ProductInput>(&bytes) else { continue };
        let category_id = Category::new(category);
        let Ok(outcome) = pipeline::run_once(
            &DryRunFetcher,
            None::<&HttpLlmProvider>,
            &bundle,
            &input,
            &category_id,
            config.budget_defaults,
            mode_for_profile(config.run_profile),
            now(),
        ) else {
            continue;
        };
        total += 1;
        coverage_sum += outcome.record.summary.coverage_overall;
        if outcome.record.summary.validated {
            validated += 1;
        }
    }

    write_stdout_line(
        &serde_json::json!({
            "category": category,
            "products": total,
            "validated": validated,
            "mean_coverage": if total == 0 { 0.0 } else { coverage_sum / total as f64 },
        })
        .to_string(),
    )?;
    Ok(())
}

fn benchmark_golden_command(category: &str, golden_dir: &Path) -> Result<(), CliError> {
    let config = Config::from_env()?;
    let bundle = HelperBundle::load(&config.helper_files_root, category)?;
    let category_id = Category::new(category);

    let mut total = 0usize;
    let mut passed = 0usize;
    for entry in std::fs::read_dir(golden_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(stem) = path.file_name().and_then(|name| name.to_str()).and_then(|name| name.strip_suffix(".input.json"))
        else {
            continue;
        };
        let expected_path = golden_dir.join(format!("{stem}.expected.json"));
        if !expected_path.exists() {
            continue;
        }
        total += 1;
        let input: ProductInput = serde_json::from_slice(&std::fs::read(&path)?)?;
        let expected: std::collections::BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(&std::fs::read(&expected_path)?)?;

        let Ok(outcome) = pipeline::run_once(
            &DryRunFetcher,
            None::<&HttpLlmProvider>,
            &bundle,
            &input,
            &category_id,
            config.budget_defaults,
            mode_for_profile(config.run_profile),
            now(),
        ) else {
            continue;
        };

        let matches = expected.iter().all(|(field, expected_value)| {
            let field_key = fieldforge_core::model::identifiers::FieldKey::new(field.as_str());
            outcome.record.fields.get(&field_key).is_some_and(|value| {
                serde_json::to_value(value).ok().as_ref() == Some(expected_value)
            })
        });
        if matches {
            passed += 1;
        } else {
            write_stdout_line(&format!("golden mismatch: {stem}"))?;
        }
    }

    write_stdout_line(&serde_json::json!({ "category": category, "fixtures": total, "passed": passed }).to_string())?;
    if total > 0 && passed < total {
        return Err(CliError::Generic(format!("{}/{} golden fixtures failed", total - passed, total)));
    }
    Ok(())
}
