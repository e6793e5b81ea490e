//! Shared data structures for a comparison run.
//!
//! Targets and generation parameters flow in from the caller, stream events and
//! assembled responses live only inside one target's task, and result records flow
//! back out. Field names serialize in camelCase so records round-trip through the
//! JSON export unchanged.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, LLMError};

/// Upstream LLM service a target is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI Chat Completions.
    OpenAi,
    /// Anthropic Messages.
    Anthropic,
    /// Google Gemini GenerateContent.
    Gemini,
}

impl ProviderKind {
    /// Every supported provider, in display order.
    pub const ALL: [ProviderKind; 3] = [Self::OpenAi, Self::Anthropic, Self::Gemini];

    /// Stable identifier used in configs, logs and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Human readable vendor name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" | "gpt" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" | "google_gemini" => Ok(Self::Gemini),
            other => Err(LLMError::Validation {
                message: format!("unknown provider: {other}"),
            }),
        }
    }
}

/// One (provider, model, credential) combination selected for a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTarget {
    pub provider: ProviderKind,
    pub model_id: String,
    pub display_name: String,
    pub context_window_tokens: u64,
    /// Opaque credential forwarded to the proxy; never logged.
    #[serde(skip_serializing)]
    pub credential: Option<String>,
}

impl RequestTarget {
    /// Creates a target whose display name equals its model identifier.
    pub fn new(provider: ProviderKind, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        Self {
            provider,
            display_name: model_id.clone(),
            model_id,
            context_window_tokens: 0,
            credential: None,
        }
    }

    /// Builds a target from a catalog entry.
    pub fn from_descriptor(descriptor: &ModelDescriptor) -> Self {
        Self {
            provider: descriptor.provider,
            model_id: descriptor.id.clone(),
            display_name: descriptor.display_name.clone(),
            context_window_tokens: descriptor.context_window,
            credential: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_context_window(mut self, tokens: u64) -> Self {
        self.context_window_tokens = tokens;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Returns the credential when it is present and non-blank.
    pub fn usable_credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Whether `record` was produced for this target. The display name is part of the
    /// key, so one model compared under two names yields two distinct targets.
    pub fn matches(&self, record: &ResultRecord) -> bool {
        self.provider == record.provider
            && self.model_id == record.model_id
            && self.display_name == record.model
    }
}

/// Sampling controls applied to every target of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationParameters {
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Upper bound on generated tokens, always positive.
    pub max_output_tokens: u32,
}

impl GenerationParameters {
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

    /// Clamps the parameters into their valid ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_arena::types::GenerationParameters;
    ///
    /// let params = GenerationParameters { temperature: 1.7, max_output_tokens: 0 }.normalized();
    /// assert_eq!(params.temperature, 1.0);
    /// assert_eq!(params.max_output_tokens, 1);
    /// ```
    pub fn normalized(self) -> Self {
        let temperature = if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_TEMPERATURE
        };
        Self {
            temperature,
            max_output_tokens: self.max_output_tokens.max(1),
        }
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: Self::DEFAULT_TEMPERATURE,
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// How a usage counter in a [`StreamEvent::UsageUpdate`] combines with earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageMode {
    /// The counter is a running total and replaces the previous value.
    Cumulative,
    /// The counter is a delta and is added to the previous value.
    Incremental,
}

/// Discrete event produced by a stream decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Fragment of generated text.
    ContentDelta { text: String },
    /// Token accounting reported in-band.
    UsageUpdate {
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
        mode: UsageMode,
    },
    /// Provider-reported cause for ending generation, raw vocabulary.
    TerminalReason { reason: Option<String> },
}

/// Provider-neutral category of a terminal reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model considers the turn finished (includes stop sequences).
    Stop,
    /// Output hit the max-output-tokens bound.
    Length,
    /// Blocked by the provider's safety policy.
    ContentFilter,
    /// The model asked for a tool; never requested by this crate.
    ToolUse,
    /// Anything else, raw value kept.
    Other(String),
}

/// Fully reconstructed output of one target's request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledResponse {
    pub text: String,
    /// `None` when the provider never reported the counter.
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// Raw provider terminal reason, kept for diagnostics.
    pub terminal_reason: Option<String>,
    /// Translation of `terminal_reason` into the classifier vocabulary.
    pub finish_reason: Option<FinishReason>,
    pub streamed: bool,
}

impl AssembledResponse {
    /// Whether the response carries any non-whitespace text.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Failure of one target, carrying whatever was assembled before it happened.
#[derive(Debug, Clone)]
pub struct ErrorOutcome {
    pub error: LLMError,
    /// Partial response salvaged from a stream that failed mid-way.
    pub partial: Option<AssembledResponse>,
    /// Time spent until the failure surfaced.
    pub elapsed: Duration,
}

impl ErrorOutcome {
    pub fn new(error: LLMError, elapsed: Duration) -> Self {
        Self {
            error,
            partial: None,
            elapsed,
        }
    }

    pub fn with_partial(mut self, partial: AssembledResponse) -> Self {
        self.partial = Some(partial);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

/// Catalog entry returned by `list_models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub provider: ProviderKind,
    pub context_window: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Resolution of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    /// Resolved without content for a known, explainable reason.
    Warning,
    Error,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Actionable explanation attached to warning and error records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Failure category for errors; `None` for empty-response warnings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    pub title: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub is_retryable: bool,
}

/// The unit returned to the caller per target per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Display name of the model.
    pub model: String,
    pub model_id: String,
    pub provider: ProviderKind,
    pub context_window: u64,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// `None` means the price is unknown, not free.
    #[serde(rename = "estimatedCostUSD")]
    pub estimated_cost_usd: Option<f64>,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
    /// Text was salvaged from a stream that failed before completing.
    #[serde(default)]
    pub is_partial: bool,
    /// Token counts come from the length heuristic rather than the provider.
    #[serde(default)]
    pub usage_estimated: bool,
}

/// Callback receiving each text delta of a streamed target, in order.
pub type DeltaCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback receiving deltas for every target of a run.
pub type TargetDeltaCallback = Arc<dyn Fn(&RequestTarget, &str) + Send + Sync>;

/// Everything an adapter needs to issue one generation request.
#[derive(Clone)]
pub struct PromptRequest {
    pub model_id: String,
    pub prompt: String,
    pub params: GenerationParameters,
    pub credential: String,
    /// When present the upstream is asked to stream and each delta is forwarded here.
    pub on_delta: Option<DeltaCallback>,
}

impl fmt::Debug for PromptRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptRequest")
            .field("model_id", &self.model_id)
            .field("prompt_len", &self.prompt.len())
            .field("params", &self.params)
            .field("streaming", &self.on_delta.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn blank_credentials_are_not_usable() {
        let target = RequestTarget::new(ProviderKind::OpenAi, "gpt-4o").with_credential("   ");
        assert_eq!(target.usable_credential(), None);
        let target = target.with_credential("sk-test");
        assert_eq!(target.usable_credential(), Some("sk-test"));
    }

    #[test]
    fn target_never_serializes_its_credential() {
        let target = RequestTarget::new(ProviderKind::Anthropic, "claude-3-5-haiku-latest")
            .with_credential("secret-key");
        let json = serde_json::to_string(&target).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(json.contains("\"modelId\""));
    }

    #[test]
    fn nan_temperature_falls_back_to_default() {
        let params = GenerationParameters {
            temperature: f32::NAN,
            max_output_tokens: 16,
        }
        .normalized();
        assert_eq!(params.temperature, GenerationParameters::DEFAULT_TEMPERATURE);
        assert_eq!(params.max_output_tokens, 16);
    }
}
