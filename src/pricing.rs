//! Per-model pricing lookup.
//!
//! [`ArenaClient`](crate::client::ArenaClient) only sees the [`PricingLookup`]
//! contract. The crate ships a static table and a catalog-backed cache that refreshes
//! from a remote price list at most once per freshness window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::metrics::ModelPricing;
use crate::types::ProviderKind;

/// Source of per-1K-token prices.
#[async_trait]
pub trait PricingLookup: Send + Sync {
    /// Price for `model_id`, `None` when unknown.
    async fn pricing(&self, provider: ProviderKind, model_id: &str) -> Option<ModelPricing>;
}

pub type DynPricingLookup = Arc<dyn PricingLookup>;

/// Lowercases and folds `.` into `-` so `claude-3.5-sonnet` and `claude-3-5-sonnet`
/// compare equal.
fn normalize_model(model_id: &str) -> String {
    model_id
        .trim()
        .trim_start_matches("models/")
        .to_ascii_lowercase()
        .replace('.', "-")
}

fn longest_prefix<'a, I>(candidates: I, model: &str) -> Option<ModelPricing>
where
    I: IntoIterator<Item = (&'a str, &'a ModelPricing)>,
{
    candidates
        .into_iter()
        .filter(|(key, _)| model.starts_with(*key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, pricing)| *pricing)
}

/// Fixed price list matched by longest model-id prefix.
#[derive(Debug, Clone, Default)]
pub struct StaticPricingTable {
    entries: HashMap<ProviderKind, Vec<(String, ModelPricing)>>,
}

impl StaticPricingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Prices of well-known models at the time of writing.
    pub fn builtin() -> Self {
        const BUILTIN: &[(ProviderKind, &str, f64, f64)] = &[
            (ProviderKind::OpenAi, "gpt-4o", 0.0025, 0.01),
            (ProviderKind::OpenAi, "gpt-4o-mini", 0.00015, 0.0006),
            (ProviderKind::OpenAi, "gpt-4-turbo", 0.01, 0.03),
            (ProviderKind::OpenAi, "gpt-3.5-turbo", 0.0005, 0.0015),
            (ProviderKind::OpenAi, "o1", 0.015, 0.06),
            (ProviderKind::OpenAi, "o1-mini", 0.0011, 0.0044),
            (ProviderKind::OpenAi, "o3-mini", 0.0011, 0.0044),
            (ProviderKind::Anthropic, "claude-3-5-sonnet", 0.003, 0.015),
            (ProviderKind::Anthropic, "claude-3-7-sonnet", 0.003, 0.015),
            (ProviderKind::Anthropic, "claude-sonnet-4", 0.003, 0.015),
            (ProviderKind::Anthropic, "claude-3-5-haiku", 0.0008, 0.004),
            (ProviderKind::Anthropic, "claude-3-haiku", 0.00025, 0.00125),
            (ProviderKind::Anthropic, "claude-3-opus", 0.015, 0.075),
            (ProviderKind::Anthropic, "claude-opus-4", 0.015, 0.075),
            (ProviderKind::Gemini, "gemini-1.5-pro", 0.00125, 0.005),
            (ProviderKind::Gemini, "gemini-1.5-flash", 0.000075, 0.0003),
            (ProviderKind::Gemini, "gemini-2.0-flash", 0.0001, 0.0004),
        ];

        BUILTIN
            .iter()
            .fold(Self::empty(), |table, (provider, model, input, output)| {
                table.with_entry(*provider, model, ModelPricing::new(*input, *output))
            })
    }

    /// Adds or replaces the price of every model starting with `model_prefix`.
    pub fn with_entry(mut self, provider: ProviderKind, model_prefix: &str, pricing: ModelPricing) -> Self {
        let key = normalize_model(model_prefix);
        let entries = self.entries.entry(provider).or_default();
        entries.retain(|(existing, _)| *existing != key);
        entries.push((key, pricing));
        self
    }

    /// Synchronous lookup used by the catalog fallback.
    pub fn lookup(&self, provider: ProviderKind, model_id: &str) -> Option<ModelPricing> {
        let model = normalize_model(model_id);
        let entries = self.entries.get(&provider)?;
        longest_prefix(entries.iter().map(|(key, price)| (key.as_str(), price)), &model)
    }
}

#[async_trait]
impl PricingLookup for StaticPricingTable {
    async fn pricing(&self, provider: ProviderKind, model_id: &str) -> Option<ModelPricing> {
        self.lookup(provider, model_id)
    }
}

/// One fetched price list, keyed by `vendor/model`.
#[derive(Debug, Clone, Default)]
pub struct PricingSnapshot {
    prices: HashMap<String, ModelPricing>,
}

impl PricingSnapshot {
    pub fn new(prices: HashMap<String, ModelPricing>) -> Self {
        let prices = prices
            .into_iter()
            .map(|(key, price)| (normalize_model(&key), price))
            .collect();
        Self { prices }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn lookup(&self, provider: ProviderKind, model_id: &str) -> Option<ModelPricing> {
        let model = format!("{}/{}", catalog_vendor(provider), normalize_model(model_id));
        longest_prefix(self.prices.iter().map(|(key, price)| (key.as_str(), price)), &model)
    }
}

/// Vendor segment used by aggregated price catalogs.
fn catalog_vendor(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "openai",
        ProviderKind::Anthropic => "anthropic",
        ProviderKind::Gemini => "google",
    }
}

/// Remote price list consumed by [`CatalogPricing`].
#[async_trait]
pub trait PricingCatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<PricingSnapshot, LLMError>;
}

/// Price catalog cached for a freshness window.
///
/// All concurrent lookups that miss the cache share one in-flight refresh. A failed
/// refresh is remembered for the retry backoff, so an unreachable catalog is asked at
/// most once per backoff window. Meanwhile lookups use the last good snapshot, or the
/// static table when there has never been one.
pub struct CatalogPricing {
    source: Arc<dyn PricingCatalogSource>,
    cache: Cache<(), Arc<PricingSnapshot>>,
    failures: Cache<(), Arc<LLMError>>,
    last_good: Cache<(), Arc<PricingSnapshot>>,
    fallback: StaticPricingTable,
}

impl CatalogPricing {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

    pub fn new(source: Arc<dyn PricingCatalogSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            failures: failure_cache(Self::DEFAULT_RETRY_BACKOFF),
            last_good: Cache::builder().max_capacity(1).build(),
            fallback: StaticPricingTable::builtin(),
        }
    }

    pub fn with_fallback(mut self, fallback: StaticPricingTable) -> Self {
        self.fallback = fallback;
        self
    }

    /// How long a failed refresh is reused before the catalog is asked again.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.failures = failure_cache(backoff);
        self
    }

    /// Returns the cached snapshot, refreshing it when stale.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure shared by every caller that awaited it, or the
    /// remembered failure while still inside the retry backoff.
    pub async fn snapshot(&self) -> Result<Arc<PricingSnapshot>, Arc<LLMError>> {
        if let Some(snapshot) = self.cache.get(&()).await {
            return Ok(snapshot);
        }
        if let Some(err) = self.failures.get(&()).await {
            return Err(err);
        }
        let refreshed = self
            .cache
            .try_get_with((), async {
                debug!("refreshing pricing catalog");
                let snapshot = Arc::new(self.source.fetch().await?);
                self.last_good.insert((), snapshot.clone()).await;
                Ok::<_, LLMError>(snapshot)
            })
            .await;
        if let Err(err) = &refreshed {
            self.failures.insert((), err.clone()).await;
        }
        refreshed
    }

    /// Drops the cached snapshot and any remembered failure so the next lookup refreshes.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
        self.failures.invalidate_all();
    }
}

fn failure_cache(backoff: Duration) -> Cache<(), Arc<LLMError>> {
    Cache::builder().max_capacity(1).time_to_live(backoff).build()
}

#[async_trait]
impl PricingLookup for CatalogPricing {
    async fn pricing(&self, provider: ProviderKind, model_id: &str) -> Option<ModelPricing> {
        let snapshot = match self.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                let stale = self.last_good.get(&()).await;
                warn!(
                    error = %err,
                    stale = stale.is_some(),
                    "pricing catalog unavailable, using last known prices"
                );
                stale
            }
        };
        snapshot
            .and_then(|snapshot| snapshot.lookup(provider, model_id))
            .or_else(|| self.fallback.lookup(provider, model_id))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    pricing: Option<CatalogPrice>,
}

/// Prices are USD per single token, serialized as strings.
#[derive(Debug, Deserialize)]
struct CatalogPrice {
    prompt: Option<String>,
    completion: Option<String>,
}

/// Fetches an OpenRouter-style `GET {base_url}/models` price catalog.
pub struct HttpPricingCatalog {
    transport: DynHttpTransport,
    base_url: String,
    timeout: Duration,
}

impl HttpPricingCatalog {
    pub const DEFAULT_BASE_URL: &'static str = "https://openrouter.ai/api/v1";

    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse(body: &str) -> Result<PricingSnapshot, LLMError> {
        let response: CatalogResponse = serde_json::from_str(body)
            .map_err(|err| LLMError::provider("pricing", format!("invalid catalog payload: {err}")))?;

        let per_1k = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|price| price.is_finite() && *price >= 0.0)
                .map(|price| price * 1000.0)
        };

        let prices = response
            .data
            .into_iter()
            // `vendor/model:variant` entries (free tiers, beta routes) carry their own prices.
            .filter(|entry| !entry.id.contains(':'))
            .filter_map(|entry| {
                let price = entry.pricing?;
                let input = per_1k(&price.prompt)?;
                let output = per_1k(&price.completion)?;
                Some((entry.id, ModelPricing::new(input, output)))
            })
            .collect();
        Ok(PricingSnapshot::new(prices))
    }
}

#[async_trait]
impl PricingCatalogSource for HttpPricingCatalog {
    async fn fetch(&self) -> Result<PricingSnapshot, LLMError> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let response = self
            .transport
            .send(HttpRequest::get(url).with_timeout(self.timeout))
            .await?;
        if !response.is_success() {
            return Err(LLMError::provider(
                "pricing",
                format!("catalog request failed with status {}", response.status),
            ));
        }
        let snapshot = Self::parse(&response.into_string()?)?;
        debug!(entries = snapshot.len(), "pricing catalog loaded");
        Ok(snapshot)
    }
}
