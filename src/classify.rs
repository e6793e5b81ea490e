//! Maps finished responses and failures onto a [`ResultStatus`] plus diagnostic.

use crate::error::{ErrorCategory, LLMError};
use crate::types::{AssembledResponse, Diagnostic, FinishReason, ResultStatus};

/// Status and optional diagnostic for one resolved target.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: ResultStatus,
    pub diagnostic: Option<Diagnostic>,
}

impl Classification {
    fn success() -> Self {
        Self {
            status: ResultStatus::Success,
            diagnostic: None,
        }
    }
}

/// Classifies a response that completed without a transport failure.
///
/// Only emptiness of the text matters: a one-character answer is a success.
///
/// # Examples
///
/// ```
/// use llm_arena::classify::classify_response;
/// use llm_arena::types::{AssembledResponse, FinishReason, ResultStatus};
///
/// let response = AssembledResponse {
///     text: "4".into(),
///     output_tokens: Some(1),
///     terminal_reason: Some("end_turn".into()),
///     finish_reason: Some(FinishReason::Stop),
///     ..AssembledResponse::default()
/// };
/// assert_eq!(classify_response(&response).status, ResultStatus::Success);
/// ```
pub fn classify_response(response: &AssembledResponse) -> Classification {
    if response.has_content() {
        return Classification::success();
    }

    let raw = response.terminal_reason.as_deref();
    let counts = token_summary(response);
    let (title, suggestion, is_retryable) = match (&response.finish_reason, raw) {
        (None, None) => (
            "Connection interrupted",
            format!(
                "The stream ended before the provider sent a completion signal. A proxy or network timeout most likely cut the connection; retry the request.{counts}"
            ),
            true,
        ),
        (Some(FinishReason::Stop), _) => (
            "Model returned no content",
            format!(
                "The model ended its turn without emitting text (reason: {}). This is provider-side behavior; rephrase the prompt or retry.{counts}",
                raw.unwrap_or("stop")
            ),
            true,
        ),
        (Some(FinishReason::Length), _) => (
            "Output truncated",
            format!(
                "Generation hit the output limit before any text was produced (reason: {}). Increase max tokens and try again.{counts}",
                raw.unwrap_or("length")
            ),
            false,
        ),
        (Some(FinishReason::ContentFilter), _) => (
            "Blocked by safety filter",
            format!(
                "The provider's safety policy blocked this request (reason: {}). Rephrase the prompt.{counts}",
                raw.unwrap_or("content_filter")
            ),
            false,
        ),
        (_, raw) => (
            "Unexpected empty response",
            format!(
                "The provider finished with reason {} but returned no text. Retry or switch to another model.{counts}",
                raw.unwrap_or("unknown")
            ),
            true,
        ),
    };

    Classification {
        status: ResultStatus::Warning,
        diagnostic: Some(Diagnostic {
            category: None,
            title: title.to_string(),
            suggestion,
            stop_reason: response.terminal_reason.clone(),
            is_retryable,
        }),
    }
}

/// Classifies a target that failed, whether or not partial text was salvaged.
pub fn classify_failure(error: &LLMError) -> Classification {
    let category = error.category();
    let (title, hint) = match category {
        ErrorCategory::Auth => (
            "Authentication failed",
            "Check that the API key for this provider is present and valid.",
        ),
        ErrorCategory::RateLimit => (
            "Rate limited",
            "The provider is throttling requests. Wait a moment and retry.",
        ),
        ErrorCategory::Quota => (
            "Quota exhausted",
            "The account's billing or usage cap was reached. Check the plan before retrying.",
        ),
        ErrorCategory::Overloaded => (
            "Provider overloaded",
            "The provider is temporarily out of capacity. Retry shortly.",
        ),
        ErrorCategory::ModelNotFound => (
            "Model not available",
            "The model identifier is unknown, deprecated or not enabled for this key. Pick another model.",
        ),
        ErrorCategory::Timeout => (
            "Request timed out",
            "No response arrived within the time limit. Retry, or use streaming for long generations.",
        ),
        ErrorCategory::Network => (
            "Network error",
            "The connection failed or was reset. Check the proxy and network, then retry.",
        ),
        ErrorCategory::ContentFilter => (
            "Blocked by safety filter",
            "The provider's safety policy rejected the request. Rephrase the prompt.",
        ),
        ErrorCategory::InvalidRequest => (
            "Invalid request",
            "The provider rejected the request parameters or the prompt exceeds the context window.",
        ),
        ErrorCategory::Unknown => (
            "Unexpected error",
            "The failure could not be classified. Retry, and report it if it persists.",
        ),
    };

    let mut suggestion = format!("{hint} Provider message: {}", error.message());
    if let LLMError::RateLimit {
        retry_after: Some(wait),
        ..
    } = error
    {
        suggestion.push_str(&format!(" Suggested wait: {}s.", wait.as_secs().max(1)));
    }

    Classification {
        status: ResultStatus::Error,
        diagnostic: Some(Diagnostic {
            category: Some(category),
            title: title.to_string(),
            suggestion,
            stop_reason: None,
            is_retryable: category.is_retryable(),
        }),
    }
}

fn token_summary(response: &AssembledResponse) -> String {
    match (response.input_tokens, response.output_tokens) {
        (None, None) => String::new(),
        (input, output) => format!(
            " (input tokens: {}, output tokens: {})",
            input.map_or_else(|| "?".to_string(), |v| v.to_string()),
            output.map_or_else(|| "?".to_string(), |v| v.to_string()),
        ),
    }
}
