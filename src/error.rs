use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregates every failure mode a provider adapter can run into.
///
/// Adapters never let these escape to the dispatcher: they are converted into an
/// [`crate::types::ErrorOutcome`] and finally into an `error` result record. The
/// variant decides the [`ErrorCategory`] shown to the user and whether a retry is offered.
#[derive(Debug, Clone, Error)]
pub enum LLMError {
    /// Represents transport-layer or networking failures (DNS, reset, fetch failure).
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The request did not complete within its time bound.
    #[error("request timed out: {message}")]
    Timeout { message: String },
    /// Reports invalid or missing credentials.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// Indicates that the provider throttled the request.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Raw message returned by the upstream provider.
        message: String,
        /// Optional wait duration suggested by the provider before retrying.
        retry_after: Option<Duration>,
    },
    /// Billing or usage cap exhausted on the provider account.
    #[error("quota exhausted: {message}")]
    Quota { message: String },
    /// Upstream capacity exhaustion (HTTP 503/529, `overloaded_error`).
    #[error("provider overloaded: {message}")]
    Overloaded { message: String },
    /// Indicates that the prompt or expected completion exceeds the allowed token budget.
    #[error("token limit exceeded: {message}")]
    TokenLimitExceeded {
        /// Raw message returned by the provider, kept verbatim for debugging.
        message: String,
    },
    /// Signals validation failures in the request payload.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Indicates that a requested model could not be resolved.
    #[error("model not found: {message}")]
    ModelNotFound {
        /// Model identifier extracted from the error payload when available.
        model: Option<String>,
        /// Full error message returned by the provider for debugging.
        message: String,
    },
    /// Request or response blocked by the provider's safety policy.
    #[error("blocked by content filter: {message}")]
    ContentFilter { message: String },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// Signals that a streaming channel failed before the provider finished.
    #[error("stream closed unexpectedly: {message}")]
    StreamClosed {
        /// Provider-supplied or synthetic message describing the closure.
        message: String,
    },
    /// Wraps provider-defined errors that cannot be normalized.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Name of the provider, such as `openai_chat`.
        provider: &'static str,
        /// Human-readable error message returned by the provider.
        message: String,
    },
    /// Catches opaque or unexpected failures.
    #[error("unknown error: {message}")]
    Unknown { message: String },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_arena::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Provider`] with the given provider name and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_arena::error::LLMError;
    ///
    /// let err = LLMError::provider("openai_chat", "bad JSON payload");
    /// assert!(matches!(err, LLMError::Provider { provider: "openai_chat", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Auth`] for a target that has no credential configured.
    pub fn missing_credential(provider: &str) -> Self {
        Self::Auth {
            message: format!("no API key configured for {provider}"),
        }
    }

    /// Maps the error onto the user-facing failure taxonomy.
    ///
    /// Variants that carry only a free-form provider message are classified by
    /// scanning that message for well-known hints.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_arena::error::{ErrorCategory, LLMError};
    ///
    /// let err = LLMError::provider("anthropic_messages", "Overloaded");
    /// assert_eq!(err.category(), ErrorCategory::Overloaded);
    /// ```
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } | Self::StreamClosed { .. } => ErrorCategory::Network,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Auth { .. } => ErrorCategory::Auth,
            Self::RateLimit { .. } => ErrorCategory::RateLimit,
            Self::Quota { .. } => ErrorCategory::Quota,
            Self::Overloaded { .. } => ErrorCategory::Overloaded,
            Self::ModelNotFound { .. } => ErrorCategory::ModelNotFound,
            Self::ContentFilter { .. } => ErrorCategory::ContentFilter,
            Self::TokenLimitExceeded { .. } | Self::Validation { .. } | Self::InvalidConfig { .. } => {
                ErrorCategory::InvalidRequest
            }
            Self::Provider { message, .. } | Self::Unknown { message } => {
                ErrorCategory::infer_from_message(message)
            }
        }
    }

    /// Whether the dispatcher should offer a retry for this failure.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Raw message without the variant prefix added by `Display`.
    pub fn message(&self) -> String {
        match self {
            Self::Transport { message }
            | Self::Timeout { message }
            | Self::Auth { message }
            | Self::RateLimit { message, .. }
            | Self::Quota { message }
            | Self::Overloaded { message }
            | Self::TokenLimitExceeded { message }
            | Self::Validation { message }
            | Self::ModelNotFound { message, .. }
            | Self::ContentFilter { message }
            | Self::StreamClosed { message }
            | Self::Provider { message, .. }
            | Self::Unknown { message } => message.clone(),
            Self::InvalidConfig { field, reason } => format!("{field}: {reason}"),
        }
    }
}

/// Failure taxonomy exposed on result diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or invalid credential.
    Auth,
    /// Upstream throttling.
    RateLimit,
    /// Billing or usage cap exhausted.
    Quota,
    /// Upstream capacity exhaustion.
    Overloaded,
    /// Model identifier unknown, deprecated or tier-restricted.
    ModelNotFound,
    /// No response within the time bound.
    Timeout,
    /// Transport-level failure.
    Network,
    /// Request or response blocked by provider policy.
    ContentFilter,
    /// Malformed request or prompt exceeding the context window.
    InvalidRequest,
    /// Unclassified.
    Unknown,
}

impl ErrorCategory {
    /// Default retry policy per category.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Overloaded | Self::Timeout | Self::Network | Self::Unknown
        )
    }

    /// Short identifier used in logs and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Quota => "quota",
            Self::Overloaded => "overloaded",
            Self::ModelNotFound => "model_not_found",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::ContentFilter => "content_filter",
            Self::InvalidRequest => "invalid_request",
            Self::Unknown => "unknown",
        }
    }

    /// Classifies an unstructured error message.
    ///
    /// Order matters: quota messages usually also mention rate limits, so quota is
    /// checked first.
    pub fn infer_from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));

        if has(&["401", "403", "unauthorized", "invalid api key", "invalid x-api-key", "authentication", "permission denied"]) {
            Self::Auth
        } else if has(&["quota", "insufficient_quota", "billing", "credit balance"]) {
            Self::Quota
        } else if has(&["429", "rate limit", "rate_limit", "too many requests"]) {
            Self::RateLimit
        } else if has(&["overloaded", "529", "503", "capacity", "unavailable"]) {
            Self::Overloaded
        } else if has(&["model_not_found", "does not exist", "not found", "404", "deprecated"]) {
            Self::ModelNotFound
        } else if has(&["timeout", "timed out", "deadline"]) {
            Self::Timeout
        } else if has(&["safety", "content_filter", "content filter", "blocked", "refus"]) {
            Self::ContentFilter
        } else if has(&["fetch failed", "connection", "network", "dns", "econnreset", "reset by peer"]) {
            Self::Network
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` when an error code or message suggests a context/window overflow.
pub(crate) fn looks_like_token_limit_error(code_hint: Option<&str>, message: &str) -> bool {
    if let Some(code) = code_hint {
        let lower = code.to_ascii_lowercase();
        if matches!(
            lower.as_str(),
            "context_length_exceeded"
                | "max_context_length_exceeded"
                | "prompt_tokens_exceeded"
                | "context_window_exceeded"
        ) {
            return true;
        }
    }

    let lower_message = message.to_ascii_lowercase();
    const HINTS: [&str; 6] = [
        "context length",
        "context window",
        "token limit",
        "maximum output tokens",
        "max output tokens",
        "prompt is too long",
    ];
    HINTS.iter().any(|needle| lower_message.contains(needle))
}

/// Attempts to extract a model identifier from an error payload.
pub(crate) fn extract_model_identifier(message: &str) -> Option<String> {
    for delimiter in ['`', '"', '\''] {
        if let Some(value) = between_delimiters(message, delimiter) {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn between_delimiters(message: &str, delimiter: char) -> Option<String> {
    let start = message.find(delimiter)? + delimiter.len_utf8();
    let rel_end = message[start..].find(delimiter)?;
    Some(message[start..start + rel_end].to_string())
}
