// fieldforge-cli/src/pipeline.rs
// ============================================================================
// Module: Product Run Pipeline
// Description: Wires fetch, deterministic extraction, audit, and the LLM
//              extractor into one product's round loop.
// Purpose: Drive a ProductRunner from GATE to STOP for `run-once`/`run-daemon`.
// Dependencies: fieldforge-core, fieldforge-fetch, fieldforge-rules, serde, serde_json
// ============================================================================

//! ## Overview
//! [`fieldforge_core::runner::ProductRunner`] owns the state machine but
//! never touches I/O; this module is the driver that plays one round against
//! page fetches, deterministic candidate extraction, and evidence auditing.
//! One round fetches a bounded slice of the product's seed URLs,
//! extracts label/value candidates, verifies their citations, and — when an
//! LLM provider is configured and required fields remain unresolved — asks
//! it to propose additional candidates before handing everything to
//! [`ProductRunner::submit_round`].

use std::collections::BTreeMap;

use fieldforge_core::auditor;
use fieldforge_core::budget::BudgetSet;
use fieldforge_core::events::RunEvent;
use fieldforge_core::frontier::Mode;
use fieldforge_core::identity::RejectReason;
use fieldforge_core::interfaces::Fetcher;
use fieldforge_core::interfaces::LlmProvider;
use fieldforge_core::interfaces::LlmRequest;
use fieldforge_core::model::candidate::Candidate;
use fieldforge_core::model::candidate::CandidateSource;
use fieldforge_core::model::evidence::Method;
use fieldforge_core::model::field_value::FieldValue;
use fieldforge_core::model::hashing::candidate_fingerprint;
use fieldforge_core::model::identifiers::Category;
use fieldforge_core::model::identifiers::FieldKey;
use fieldforge_core::model::identifiers::Identity;
use fieldforge_core::model::identifiers::SnippetId;
use fieldforge_core::model::identifiers::SourceId;
use fieldforge_core::model::record::ProductRecord;
use fieldforge_core::model::rule::DataType;
use fieldforge_core::model::snippet::Snippet;
use fieldforge_core::model::snippet::SnippetType;
use fieldforge_core::model::tier::Tier;
use fieldforge_core::model::time::Timestamp;
use fieldforge_core::runner::ProductRunner;
use fieldforge_core::runner::RunnerError;
use fieldforge_core::runner::State;
use fieldforge_core::runner::StopReason;
use fieldforge_fetch::evidence_pack::bind_deterministic_candidates;
use fieldforge_fetch::evidence_pack::build_evidence_pack;
use fieldforge_fetch::extractor::RawCandidate;
use fieldforge_fetch::extractor::extract_label_value_windows;
use serde::Deserialize;
use thiserror::Error;

use crate::helpers::HelperBundle;

/// Maximum evidence characters retained per fetched page.
const MAX_EVIDENCE_CHARS: usize = 20_000;
/// URLs fetched per round, bounded independently of the per-product budget.
const URLS_PER_ROUND: usize = 3;
/// Flat per-fetch wallclock estimate recorded against the product's time budget.
const FETCH_TIME_ESTIMATE_MS: u64 = 500;
/// Flat per-LLM-call cost estimate recorded against the product's cost budget.
const LLM_CALL_ESTIMATE_USD: f64 = 0.01;
/// Confidence assigned to a deterministic candidate from an approved domain.
const APPROVED_CONFIDENCE: f64 = 0.85;
/// Confidence assigned to a deterministic candidate from an unapproved domain.
const UNAPPROVED_CONFIDENCE: f64 = 0.6;
/// Confidence assigned to an LLM-proposed candidate, always below the
/// approved-domain floor so it can corroborate but never singlehandedly win
/// a `required`/`critical` field.
const LLM_CONFIDENCE: f64 = 0.55;

/// Raw per-product input read from `specs/inputs/<category>/products/<id>.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    /// Brand name, as proposed upstream.
    pub brand: String,
    /// Model name, as proposed upstream.
    pub model: String,
    /// Variant name, empty when none.
    #[serde(default)]
    pub variant: String,
    /// Candidate URLs to fetch, in preference order.
    #[serde(default)]
    pub seed_urls: Vec<String>,
}

/// Failures that stop a product before any round runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The identity gate rejected this product.
    #[error("identity rejected: {0}")]
    IdentityRejected(&'static str),
}

/// What one product's run produced.
pub struct RunOutcome {
    /// The product's final record.
    pub record: ProductRecord,
    /// Why the run stopped.
    pub stop_reason: StopReason,
    /// Rounds executed.
    pub rounds: u32,
    /// NDJSON-serializable event trace for this run.
    pub events: Vec<RunEvent>,
}

/// Drives `input` through gate → rounds → stop, using `fetcher` for every
/// page fetch and `llm` (when present) to backfill fields deterministic
/// extraction left unresolved.
///
/// # Errors
///
/// Returns [`PipelineError::IdentityRejected`] when the identity gate
/// rejects `input`'s `(brand, model, variant)` tuple; the caller must not
/// write any run artifacts in that case.
pub fn run_once<F: Fetcher, L: LlmProvider>(
    fetcher: &F,
    llm: Option<&L>,
    bundle: &HelperBundle,
    input: &ProductInput,
    category: &Category,
    budget: BudgetSet,
    mode: Mode,
    now: Timestamp,
) -> Result<RunOutcome, PipelineError> {
    let identity = Identity::new(category.as_str(), input.brand.as_str(), input.model.as_str(), input.variant.as_str());
    let mut runner = ProductRunner::gate_with_floors(
        identity,
        &bundle.catalog,
        budget,
        mode,
        Vec::new(),
        bundle.rules.approved_domain_floors(),
    )
    .map_err(|RunnerError::IdentityRejected(reason)| PipelineError::IdentityRejected(reject_reason_str(reason)))?;
    let product_id = runner.record().product_id.clone();

    let rules = bundle.rule_contracts();
    let field_labels: Vec<(&str, &str)> = bundle.rules.field_order.iter().map(|f| (f.as_str(), f.as_str())).collect();
    let mut remaining_urls: Vec<String> = input.seed_urls.clone();
    let mut last_stop = StopReason::BudgetExhausted;
    let mut events: Vec<RunEvent> = Vec::new();

    while matches!(runner.state(), State::Plan) {
        let round = runner.round();
        runner.budget_mut().record_query();
        let known_before: Vec<FieldKey> =
            runner.record().fields.iter().filter(|(_, value)| !value.is_unknown()).map(|(field, _)| field.clone()).collect();

        let mut snippets: BTreeMap<SnippetId, Snippet> = BTreeMap::new();
        let mut candidates_by_field: BTreeMap<FieldKey, Vec<Candidate>> = BTreeMap::new();

        let mut urls_this_round = Vec::new();
        while !remaining_urls.is_empty() && urls_this_round.len() < URLS_PER_ROUND && runner.can_fetch() {
            urls_this_round.push(remaining_urls.remove(0));
            runner.budget_mut().record_url_fetch();
            runner.budget_mut().record_elapsed_ms(FETCH_TIME_ESTIMATE_MS);
        }

        for (index, url) in urls_this_round.iter().enumerate() {
            events.push(RunEvent::SourceFetchStarted { product_id: product_id.clone(), round, url: url.clone(), at: now });
            let Ok(parsed) = url::Url::parse(url) else { continue };
            let Some(host) = parsed.host_str() else { continue };
            let host = host.to_string();
            let Ok(outcome) = fetcher.fetch(url, &host) else { continue };
            let Some(html) = outcome.html.filter(|html| !html.is_empty()) else { continue };

            let root_domain = root_domain_of(&host);
            let (tier, approved) = bundle.tier_for(&root_domain);
            let source_id = SourceId::new(format!("src_{round}_{index}"));

            let raw_candidates = extract_label_value_windows(&html, &field_labels);
            let mut pack = build_evidence_pack(&[(SnippetType::Text, html.clone())], &source_id, url, now, MAX_EVIDENCE_CHARS);
            bind_deterministic_candidates(&mut pack, &raw_candidates, &source_id, url, now);
            for snippet in &pack.snippets {
                snippets.insert(snippet.id.clone(), snippet.clone());
            }

            let mut accepted = 0u32;
            for raw in &raw_candidates {
                let Some(field_rule) = bundle.rules.fields.get(&FieldKey::new(raw.field.as_str())) else { continue };
                let Some(mut candidate) = build_candidate(raw, field_rule, &pack, &host, &root_domain, tier, approved) else { continue };
                if auditor::verify_candidate(&mut candidate, &snippets).is_ok() {
                    candidates_by_field.entry(candidate.field.clone()).or_default().push(candidate);
                    accepted += 1;
                }
            }
            events.push(RunEvent::SourceProcessed {
                product_id: product_id.clone(),
                round,
                url: url.clone(),
                candidates_accepted: accepted,
                at: now,
            });
        }

        if let Some(provider) = llm {
            augment_with_llm(provider, &rules, &mut candidates_by_field, &mut runner, &budget, round, now);
        }

        let stop = runner.submit_round(candidates_by_field, &rules);
        if let Some(stop) = stop {
            last_stop = stop;
        }
        let fields_resolved: Vec<FieldKey> = runner
            .record()
            .fields
            .iter()
            .filter(|(field, value)| !value.is_unknown() && !known_before.contains(field))
            .map(|(field, _)| field.clone())
            .collect();
        events.push(RunEvent::RoundSummary { product_id: product_id.clone(), round, fields_resolved, stop_reason: stop, at: now });
    }

    Ok(RunOutcome { record: runner.record().clone(), stop_reason: last_stop, rounds: runner.round(), events })
}

/// Builds a verifiable [`Candidate`] from one extracted label/value match,
/// normalizing it against the field's compiled rule first. Returns `None`
/// when the binding is missing or normalization rejects the raw value —
/// a rejected candidate never reaches `candidates_by_field`, so the field
/// simply stays unresolved for this source rather than being recorded wrong.
fn build_candidate(
    raw: &RawCandidate,
    field_rule: &fieldforge_core::model::rule::FieldRule,
    pack: &fieldforge_fetch::evidence_pack::EvidencePack,
    host: &str,
    root_domain: &str,
    tier: Tier,
    approved: bool,
) -> Option<Candidate> {
    let field = FieldKey::new(raw.field.as_str());
    let fingerprint = candidate_fingerprint(&raw.field, &raw.value, method_wire_name(raw.method), &raw.key_path);
    let (_, snippet_id) = pack.candidate_bindings.iter().find(|(fp, _)| fp == &fingerprint)?;
    let snippet_id = SnippetId::new(snippet_id.clone());
    let snippet = pack.snippets.iter().find(|snippet| snippet.id == snippet_id)?;

    let normalized = match fieldforge_rules::normalize_candidate(field_rule, &raw.value) {
        fieldforge_rules::NormalizeOutcome::Ok { normalized } => normalized,
        fieldforge_rules::NormalizeOutcome::Failed { .. } => return None,
    };

    Some(Candidate {
        field,
        value: decode_value(field_rule.contract.data_type, &normalized),
        method: raw.method,
        source: CandidateSource {
            host: host.to_string(),
            root_domain: root_domain.to_string(),
            tier,
            tier_name: tier.name().to_string(),
            approved_domain: approved,
        },
        confidence: if approved { APPROVED_CONFIDENCE } else { UNAPPROVED_CONFIDENCE },
        evidence_refs: vec![snippet_id],
        snippet_hash: snippet.snippet_hash.clone(),
        quote: raw.value.clone(),
        quote_span: None,
    })
}

/// Converts a normalized token into the `FieldValue` shape its data type demands.
fn decode_value(data_type: DataType, normalized: &str) -> FieldValue {
    match data_type {
        DataType::Number => normalized.parse::<f64>().map_or_else(
            |_| FieldValue::unknown(fieldforge_core::model::unknown_reason::UnknownReason::ParseFailure),
            FieldValue::Number,
        ),
        DataType::Bool => normalized.parse::<bool>().map_or_else(
            |_| FieldValue::unknown(fieldforge_core::model::unknown_reason::UnknownReason::ParseFailure),
            FieldValue::Bool,
        ),
        DataType::List => FieldValue::List(normalized.split(',').map(|part| FieldValue::Text(part.trim().to_string())).collect()),
        DataType::String => FieldValue::Text(normalized.to_string()),
    }
}

/// Asks `provider` to propose values for every field still unresolved after
/// deterministic extraction this round, folding survivors into
/// `candidates_by_field`. An LLM candidate is its own sole evidence source,
/// so it can corroborate an existing field but never singlehandedly clear
/// the distinct-approved-domain floor a `required`/`critical` field needs.
fn augment_with_llm<L: LlmProvider>(
    provider: &L,
    rules: &BTreeMap<FieldKey, (fieldforge_core::model::rule::Contract, fieldforge_core::model::rule::RequiredLevel)>,
    candidates_by_field: &mut BTreeMap<FieldKey, Vec<Candidate>>,
    runner: &mut ProductRunner,
    budget: &BudgetSet,
    round: u32,
    now: Timestamp,
) {
    let missing: Vec<&FieldKey> = rules.keys().filter(|field| !candidates_by_field.contains_key(*field)).collect();
    if missing.is_empty() || !runner.budget_mut().can_call_llm(budget, LLM_CALL_ESTIMATE_USD, false) {
        return;
    }

    let field_list = missing.iter().map(|field| field.as_str()).collect::<Vec<_>>().join(", ");
    let request = LlmRequest {
        model: "gpt-4o-mini".to_string(),
        system: "Propose values for the requested product fields as a flat JSON object; omit fields you cannot support.".to_string(),
        user: format!("Fields needed: {field_list}"),
        json_schema: true,
        reasoning_mode: false,
    };

    let Ok(serde_json::Value::Object(map)) = provider.call(&request) else { return };
    runner.budget_mut().record_llm_call(LLM_CALL_ESTIMATE_USD, false);

    for (field_name, raw_value) in map {
        let field = FieldKey::new(field_name.as_str());
        if rules.get(&field).is_none() {
            continue;
        }
        let text = raw_value.as_str().map(str::to_string).unwrap_or_else(|| raw_value.to_string());
        let source_id = SourceId::new(format!("src_llm_{round}"));
        let snippet = Snippet::new(SnippetType::Text, text.clone(), source_id, "llm://extract", now);
        let mut candidate = Candidate {
            field: field.clone(),
            value: FieldValue::Text(text.clone()),
            method: Method::LlmExtract,
            source: CandidateSource {
                host: "llm".to_string(),
                root_domain: "llm".to_string(),
                tier: Tier::DatabaseOrCommunity,
                tier_name: Tier::DatabaseOrCommunity.name().to_string(),
                approved_domain: false,
            },
            confidence: LLM_CONFIDENCE,
            evidence_refs: vec![snippet.id.clone()],
            snippet_hash: snippet.snippet_hash.clone(),
            quote: text,
            quote_span: None,
        };
        let mut one = BTreeMap::new();
        one.insert(snippet.id.clone(), snippet);
        if auditor::verify_candidate(&mut candidate, &one).is_ok() {
            candidates_by_field.entry(field).or_default().push(candidate);
        }
    }
}

/// Approximates a registrable root domain as the last two dot-separated
/// labels (no public-suffix-list lookup; good enough for the approved-domain
/// table's own keying, which uses the same convention).
fn root_domain_of(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 { host.to_string() } else { labels[labels.len() - 2..].join(".") }
}

fn method_wire_name(method: Method) -> &'static str {
    match method {
        Method::ParseTemplate => "parse_template",
        Method::SpecTableMatch => "spec_table_match",
        Method::JsonLd => "json_ld",
        Method::Microdata => "microdata",
        Method::Rdfa => "rdfa",
        Method::Opengraph => "opengraph",
        Method::NetworkJson => "network_json",
        Method::LlmExtract => "llm_extract",
        Method::ComponentDb => "component_db",
        Method::PdfKv => "pdf_kv",
        Method::PdfTable => "pdf_table",
    }
}

fn reject_reason_str(reason: RejectReason) -> &'static str {
    reason.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldforge_core::identity::CatalogIndex;
    use fieldforge_core::interfaces::FetchError;
    use fieldforge_core::interfaces::FetchOutcome;
    use fieldforge_core::interfaces::FetchTelemetry;
    use fieldforge_core::interfaces::LlmError;
    use fieldforge_core::model::rule::Contract;
    use fieldforge_core::model::rule::RequiredLevel;
    use fieldforge_core::model::rule::Shape;
    use fieldforge_rules::RuleSet;
    use std::collections::BTreeMap as Map;

    struct StaticFetcher(String);

    impl Fetcher for StaticFetcher {
        fn fetch(&self, _url: &str, _host: &str) -> Result<FetchOutcome, FetchError> {
            Ok(FetchOutcome {
                status: 200,
                blocked_by_robots: false,
                title: None,
                html: Some(self.0.clone()),
                telemetry: FetchTelemetry { retry_count: 0, degraded_from_mode: None, degraded_reason: None },
            })
        }
    }

    struct NoLlm;

    impl LlmProvider for NoLlm {
        fn call(&self, _request: &LlmRequest) -> Result<serde_json::Value, LlmError> {
            Err(LlmError::CallFailed("unused in this test".to_string()))
        }
    }

    fn contract() -> Contract {
        Contract {
            data_type: DataType::String,
            shape: Shape::Scalar,
            unit: None,
            r#enum: Vec::new(),
            aliases: Map::new(),
            range: None,
            source_dependent: false,
            preserve_all: false,
            selection_policy: None,
            list_union: false,
            tolerance_epsilon: None,
        }
    }

    fn bundle() -> HelperBundle {
        let mut fields = Map::new();
        fields.insert(
            FieldKey::new("sensor"),
            fieldforge_core::model::rule::FieldRule {
                field: FieldKey::new("sensor"),
                version: "1.0.0".to_string(),
                required_level: RequiredLevel::Expected,
                difficulty: fieldforge_core::model::rule::Difficulty::Easy,
                contract: contract(),
                parse: fieldforge_core::model::rule::ParseRef { template: "label_value".to_string() },
                evidence: fieldforge_core::model::rule::EvidencePolicy {
                    required: true,
                    min_evidence_refs: 1,
                    tier_preference: Vec::new(),
                    distinct_sources_required: false,
                },
            },
        );
        HelperBundle {
            rules: RuleSet {
                category: "mouse".to_string(),
                version: "1.0.0".to_string(),
                field_order: vec![FieldKey::new("sensor")],
                fields,
                approved_domain_floors: Map::new(),
            },
            migrations: fieldforge_rules::MigrationPlan::default(),
            catalog: CatalogIndex::new(Vec::new()),
            sources: Map::new(),
        }
    }

    fn ts() -> Timestamp {
        Timestamp::parse("2026-07-28T00:00:00Z").expect("valid")
    }

    #[test]
    fn extracts_and_resolves_a_single_source_expected_field() {
        let fetcher = StaticFetcher("Sensor: Focus Pro 35K\n".to_string());
        let bundle = bundle();
        let input = ProductInput {
            brand: "Razer".to_string(),
            model: "Viper V3 Pro".to_string(),
            variant: String::new(),
            seed_urls: vec!["https://razer.com/viper".to_string()],
        };
        let outcome = run_once(
            &fetcher,
            None::<&NoLlm>,
            &bundle,
            &input,
            &Category::new("mouse"),
            BudgetSet {
                max_urls_per_product: 5,
                max_queries_per_product: 3,
                max_time_per_product_ms: 60_000,
                max_llm_calls_per_product: 0,
                max_high_tier_calls_per_product: 0,
                max_cost_per_product_usd: 0.0,
            },
            Mode::Standard,
            ts(),
        )
        .expect("identity accepted");

        let value = outcome.record.fields.get(&FieldKey::new("sensor")).expect("field present");
        assert_eq!(value.as_text(), Some("Focus Pro 35K"));
    }

    #[test]
    fn root_domain_of_keeps_last_two_labels() {
        assert_eq!(root_domain_of("www.razer.com"), "razer.com");
        assert_eq!(root_domain_of("razer.com"), "razer.com");
    }
}
