// fieldforge-core/src/budget/mod.rs
// ============================================================================
// Module: Budget Enforcer
// Description: Per-product counters gating fetches, queries, and LLM calls.
// Purpose: Stop a product run from overspending wallclock, cost, or calls.
// Dependencies: none (pure counters)
// ============================================================================

//! ## Overview
//! A [`BudgetSet`] fixes the ceilings; a [`BudgetCounters`] tracks usage
//! against them. Counters never decrease except via `reset`, and once a ceiling is reached its predicate is permanently
//! disabled until `reset`.

/// Named ceilings for one product run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSet {
    /// Maximum URLs fetched per product.
    pub max_urls_per_product: u32,
    /// Maximum search queries issued per product.
    pub max_queries_per_product: u32,
    /// Maximum wallclock budget, in milliseconds.
    pub max_time_per_product_ms: u64,
    /// Maximum LLM calls per product.
    pub max_llm_calls_per_product: u32,
    /// Maximum high-tier (reasoning) LLM calls per product.
    pub max_high_tier_calls_per_product: u32,
    /// Maximum USD cost per product.
    pub max_cost_per_product_usd: f64,
}

/// Budget limits a run exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// URL-fetch ceiling exceeded.
    Urls,
    /// Query ceiling exceeded.
    Queries,
    /// Wallclock ceiling exceeded.
    Time,
    /// LLM-call ceiling exceeded.
    LlmCalls,
    /// High-tier LLM-call ceiling exceeded.
    HighTierCalls,
    /// Cost ceiling exceeded.
    Cost,
}

/// Live counters for one product run, checked against a [`BudgetSet`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BudgetCounters {
    urls: u32,
    queries: u32,
    elapsed_ms: u64,
    llm_calls: u32,
    high_tier_calls: u32,
    cost_usd: f64,
}

impl BudgetCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every counter; the only way counters may decrease.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns whether one more URL fetch is admissible under `limits`.
    #[must_use]
    pub fn can_fetch_url(&self, limits: &BudgetSet) -> bool {
        self.urls < limits.max_urls_per_product && self.elapsed_ms < limits.max_time_per_product_ms
    }

    /// Returns whether one more query is admissible under `limits`.
    #[must_use]
    pub fn can_query(&self, limits: &BudgetSet) -> bool {
        self.queries < limits.max_queries_per_product && self.elapsed_ms < limits.max_time_per_product_ms
    }

    /// Returns whether one more LLM call, at `estimated_cost_usd`, is
    /// admissible under `limits`.
    #[must_use]
    pub fn can_call_llm(&self, limits: &BudgetSet, estimated_cost_usd: f64, high_tier: bool) -> bool {
        if self.elapsed_ms >= limits.max_time_per_product_ms {
            return false;
        }
        if self.llm_calls >= limits.max_llm_calls_per_product {
            return false;
        }
        if high_tier && self.high_tier_calls >= limits.max_high_tier_calls_per_product {
            return false;
        }
        self.cost_usd + estimated_cost_usd <= limits.max_cost_per_product_usd
    }

    /// Records one URL fetch.
    pub fn record_url_fetch(&mut self) {
        self.urls += 1;
    }

    /// Records one query.
    pub fn record_query(&mut self) {
        self.queries += 1;
    }

    /// Records elapsed wallclock time.
    pub fn record_elapsed_ms(&mut self, delta_ms: u64) {
        self.elapsed_ms += delta_ms;
    }

    /// Records one LLM call and its cost.
    pub fn record_llm_call(&mut self, cost_usd: f64, high_tier: bool) {
        self.llm_calls += 1;
        self.cost_usd += cost_usd;
        if high_tier {
            self.high_tier_calls += 1;
        }
    }

    /// Total LLM cost recorded so far, in USD.
    #[must_use]
    pub const fn cost_usd(&self) -> f64 {
        self.cost_usd
    }

    /// Share of LLM calls that were high-tier, `0` when no calls were made.
    #[must_use]
    pub fn high_tier_utilization(&self) -> f64 {
        if self.llm_calls == 0 {
            0.0
        } else {
            f64::from(self.high_tier_calls) / f64::from(self.llm_calls.max(1))
        }
    }

    /// Returns every ceiling currently exceeded.
    #[must_use]
    pub fn violations(&self, limits: &BudgetSet) -> Vec<Violation> {
        let mut out = Vec::new();
        if self.urls >= limits.max_urls_per_product {
            out.push(Violation::Urls);
        }
        if self.queries >= limits.max_queries_per_product {
            out.push(Violation::Queries);
        }
        if self.elapsed_ms >= limits.max_time_per_product_ms {
            out.push(Violation::Time);
        }
        if self.llm_calls >= limits.max_llm_calls_per_product {
            out.push(Violation::LlmCalls);
        }
        if self.high_tier_calls >= limits.max_high_tier_calls_per_product {
            out.push(Violation::HighTierCalls);
        }
        if self.cost_usd >= limits.max_cost_per_product_usd {
            out.push(Violation::Cost);
        }
        out
    }
}
