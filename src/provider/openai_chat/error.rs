use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

const PROVIDER: &str = "openai_chat";

/// `error` object of an OpenAI error body or in-band stream error.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAiErrorDetail {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) code: Option<Value>,
}

impl OpenAiErrorDetail {
    fn code_string(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        }
    }
}

/// Parses error responses returned by OpenAI Chat Completions.
pub(crate) fn parse_openai_error(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAiErrorDetail>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(detail),
        }) => error_from_detail(Some(status), &detail, retry_after),
        _ => match status {
            401 | 403 => LLMError::Auth {
                message: format!("status {status}: {body}"),
            },
            429 => LLMError::RateLimit {
                message: format!("status {status}: {body}"),
                retry_after,
            },
            408 | 504 => LLMError::Timeout {
                message: format!("status {status}: {body}"),
            },
            502 | 503 => LLMError::Overloaded {
                message: format!("status {status}: {body}"),
            },
            _ => LLMError::provider(PROVIDER, format!("status {status}: {body}")),
        },
    }
}

/// Maps an OpenAI error object onto an [`LLMError`]; `status` is `None` for errors
/// delivered inside a stream.
pub(crate) fn error_from_detail(
    status: Option<u16>,
    detail: &OpenAiErrorDetail,
    retry_after: Option<Duration>,
) -> LLMError {
    let code = detail.code_string();
    let code_hint = code.as_deref().or(detail.kind.as_deref());
    let mut message = detail
        .message
        .clone()
        .unwrap_or_else(|| "unknown error".to_string());
    if let Some(code) = &code {
        message = format!("{message} ({code})");
    }

    if matches!(code_hint, Some("insufficient_quota")) {
        return LLMError::Quota { message };
    }
    if looks_like_token_limit_error(code_hint, &message) {
        return LLMError::TokenLimitExceeded { message };
    }
    if status == Some(404) || matches!(code_hint, Some("model_not_found")) {
        return LLMError::ModelNotFound {
            model: extract_model_identifier(&message),
            message,
        };
    }
    if matches!(code_hint, Some("content_filter" | "content_policy_violation")) {
        return LLMError::ContentFilter { message };
    }

    match status {
        Some(401 | 403) => LLMError::Auth { message },
        Some(429) => LLMError::RateLimit {
            message,
            retry_after,
        },
        Some(400 | 422) => LLMError::Validation { message },
        Some(408 | 504) => LLMError::Timeout { message },
        Some(502 | 503) => LLMError::Overloaded { message },
        _ => LLMError::provider(PROVIDER, message),
    }
}
