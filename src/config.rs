use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ArenaClient;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::pricing::{CatalogPricing, DynPricingLookup, HttpPricingCatalog, StaticPricingTable};
use crate::provider::anthropic_messages::AnthropicMessagesProvider;
use crate::provider::google_gemini::GoogleGeminiProvider;
use crate::provider::openai_chat::OpenAiChatProvider;
use crate::provider::{DynProvider, Timeouts};
use crate::types::{GenerationParameters, ProviderKind};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 300;

/// Settings of a whole arena: which adapters exist and how they talk upstream.
///
/// Credentials are deliberately absent; they travel with each [`crate::RequestTarget`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub providers: Vec<ProviderSettings>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
    #[serde(default)]
    pub defaults: GenerationParameters,
    /// OpenRouter-style catalog; the built-in static table is used when unset.
    #[serde(default)]
    pub pricing_catalog_url: Option<String>,
    #[serde(default)]
    pub pricing_ttl_secs: Option<u64>,
}

/// One provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    /// Provider specific knobs, e.g. `organization` for OpenAI or `version` for Anthropic.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl ProviderSettings {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            base_url: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        match self.extra.get(key) {
            Some(Value::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_stream_timeout() -> u64 {
    DEFAULT_STREAM_TIMEOUT_SECS
}

impl Default for ArenaConfig {
    /// Every provider at its public endpoint.
    fn default() -> Self {
        Self {
            providers: ProviderKind::ALL.iter().copied().map(ProviderSettings::new).collect(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT_SECS,
            defaults: GenerationParameters::default(),
            pricing_catalog_url: None,
            pricing_ttl_secs: None,
        }
    }
}

impl ArenaConfig {
    /// Reads overrides from `ARENA_*` environment variables on top of [`ArenaConfig::default`].
    ///
    /// | variable | effect |
    /// |---|---|
    /// | `ARENA_OPENAI_BASE_URL`, `ARENA_ANTHROPIC_BASE_URL`, `ARENA_GEMINI_BASE_URL` | adapter base URL |
    /// | `ARENA_OPENAI_ORGANIZATION` | `OpenAI-Organization` header |
    /// | `ARENA_ANTHROPIC_VERSION` | `anthropic-version` header |
    /// | `ARENA_REQUEST_TIMEOUT_SECS`, `ARENA_STREAM_TIMEOUT_SECS` | timeouts |
    /// | `ARENA_TEMPERATURE`, `ARENA_MAX_TOKENS` | default generation parameters |
    /// | `ARENA_PRICING_URL`, `ARENA_PRICING_TTL_SECS` | live pricing catalog |
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidConfig`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, LLMError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ArenaConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LLMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        for settings in &mut config.providers {
            let prefix = format!("ARENA_{}", settings.provider.as_str().to_ascii_uppercase());
            if let Some(base_url) = var(&format!("{prefix}_BASE_URL")) {
                settings.base_url = Some(base_url);
            }
            let extra_key = match settings.provider {
                ProviderKind::OpenAi => Some(("ORGANIZATION", "organization")),
                ProviderKind::Anthropic => Some(("VERSION", "version")),
                ProviderKind::Gemini => None,
            };
            if let Some((suffix, key)) = extra_key {
                if let Some(value) = var(&format!("{prefix}_{suffix}")) {
                    settings.extra.insert(key.to_string(), Value::String(value));
                }
            }
        }

        if let Some(raw) = var("ARENA_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_var("ARENA_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = var("ARENA_STREAM_TIMEOUT_SECS") {
            config.stream_timeout_secs = parse_var("ARENA_STREAM_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = var("ARENA_TEMPERATURE") {
            config.defaults.temperature = parse_var("ARENA_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = var("ARENA_MAX_TOKENS") {
            config.defaults.max_output_tokens = parse_var("ARENA_MAX_TOKENS", &raw)?;
        }
        config.pricing_catalog_url = var("ARENA_PRICING_URL");
        if let Some(raw) = var("ARENA_PRICING_TTL_SECS") {
            config.pricing_ttl_secs = Some(parse_var("ARENA_PRICING_TTL_SECS", &raw)?);
        }
        config.defaults = config.defaults.normalized();

        Ok(config)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            request: Duration::from_secs(self.request_timeout_secs),
            stream: Duration::from_secs(self.stream_timeout_secs),
        }
    }
}

fn parse_var<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, LLMError> {
    raw.trim().parse().map_err(|_| LLMError::InvalidConfig {
        field: field.to_string(),
        reason: format!("cannot parse `{raw}`"),
    })
}

/// Conventional credential variable of each provider.
pub fn credential_env_var(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Gemini => "GEMINI_API_KEY",
    }
}

/// Reads a provider credential from the environment; blank values count as missing.
pub fn credential_from_env(provider: ProviderKind) -> Option<String> {
    std::env::var(credential_env_var(provider))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Builds an [`ArenaClient`] with one adapter per configured provider.
///
/// # Errors
///
/// Rejects a configuration that lists the same provider twice.
pub fn build_client_from_config(
    config: &ArenaConfig,
    transport: DynHttpTransport,
) -> Result<ArenaClient, LLMError> {
    let mut builder = ArenaClient::builder().pricing(build_pricing(config, transport.clone()));
    let mut seen = Vec::with_capacity(config.providers.len());

    for settings in &config.providers {
        if seen.contains(&settings.provider) {
            return Err(LLMError::InvalidConfig {
                field: "providers".to_string(),
                reason: format!("{} is configured more than once", settings.provider),
            });
        }
        seen.push(settings.provider);
        let provider = build_provider(settings, config.timeouts(), transport.clone());
        builder = builder.register_provider(provider);
    }

    Ok(builder.build())
}

fn build_provider(
    settings: &ProviderSettings,
    timeouts: Timeouts,
    transport: DynHttpTransport,
) -> DynProvider {
    match settings.provider {
        ProviderKind::OpenAi => {
            let mut provider = OpenAiChatProvider::new(transport).with_timeouts(timeouts);
            if let Some(base_url) = &settings.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(org) = settings.extra_str("organization") {
                provider = provider.with_organization(org);
            }
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = AnthropicMessagesProvider::new(transport).with_timeouts(timeouts);
            if let Some(base_url) = &settings.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(version) = settings.extra_str("version") {
                provider = provider.with_version(version);
            }
            Arc::new(provider)
        }
        ProviderKind::Gemini => {
            let mut provider = GoogleGeminiProvider::new(transport).with_timeouts(timeouts);
            if let Some(base_url) = &settings.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Arc::new(provider)
        }
    }
}

fn build_pricing(config: &ArenaConfig, transport: DynHttpTransport) -> DynPricingLookup {
    match &config.pricing_catalog_url {
        Some(url) => {
            let source = HttpPricingCatalog::new(transport).with_base_url(url.clone());
            let ttl = config
                .pricing_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(CatalogPricing::DEFAULT_TTL);
            Arc::new(CatalogPricing::new(Arc::new(source), ttl))
        }
        None => Arc::new(StaticPricingTable::builtin()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::reqwest::default_dyn_transport;

    #[test]
    fn default_config_registers_every_provider() {
        let transport = default_dyn_transport().expect("transport");
        let client = build_client_from_config(&ArenaConfig::default(), transport).unwrap();
        assert_eq!(client.providers(), ProviderKind::ALL.to_vec());
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let transport = default_dyn_transport().expect("transport");
        let config = ArenaConfig {
            providers: vec![
                ProviderSettings::new(ProviderKind::Anthropic),
                ProviderSettings::new(ProviderKind::Anthropic).with_extra("version", "2024-01-01"),
            ],
            ..ArenaConfig::default()
        };
        match build_client_from_config(&config, transport) {
            Err(LLMError::InvalidConfig { field, .. }) => assert_eq!(field, "providers"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("duplicate provider accepted"),
        }
    }

    #[test]
    fn env_overrides_are_applied() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ARENA_OPENAI_BASE_URL", "http://localhost:8080/v1"),
            ("ARENA_OPENAI_ORGANIZATION", "org-1"),
            ("ARENA_ANTHROPIC_VERSION", "2024-10-22"),
            ("ARENA_STREAM_TIMEOUT_SECS", "120"),
            ("ARENA_TEMPERATURE", "5"),
            ("ARENA_MAX_TOKENS", "512"),
            ("ARENA_GEMINI_BASE_URL", "  "),
        ]);
        let config = ArenaConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        let openai = &config.providers[0];
        assert_eq!(openai.provider, ProviderKind::OpenAi);
        assert_eq!(openai.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(openai.extra_str("organization"), Some("org-1"));
        assert_eq!(config.providers[1].extra_str("version"), Some("2024-10-22"));
        assert_eq!(config.providers[2].base_url, None);
        assert_eq!(config.stream_timeout_secs, 120);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.defaults.temperature, 1.0);
        assert_eq!(config.defaults.max_output_tokens, 512);
    }

    #[test]
    fn unparsable_number_is_a_config_error() {
        let err = ArenaConfig::from_lookup(|key| {
            (key == "ARENA_REQUEST_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, LLMError::InvalidConfig { ref field, .. } if field == "ARENA_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ArenaConfig = serde_json::from_str(
            r#"{"providers":[{"provider":"gemini","base_url":null}]}"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.stream_timeout_secs, 300);
        assert_eq!(config.defaults, GenerationParameters::default());
        assert_eq!(config.providers[0].provider, ProviderKind::Gemini);
    }
}
