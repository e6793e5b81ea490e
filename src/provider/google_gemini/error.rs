use std::time::Duration;

use serde::Deserialize;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

const PROVIDER: &str = "google_gemini";

/// Google RPC `error` object, in an error body or inside a streamed chunk.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeminiErrorDetail {
    #[serde(default)]
    pub(crate) code: Option<u16>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// Parses error responses returned by Google Gemini.
pub(crate) fn parse_gemini_error(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorBody {
        Single { error: GeminiErrorDetail },
        // Streaming endpoints wrap the error in a one-element array.
        Batch(Vec<ErrorBody>),
    }

    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Single { error }) => Some(error),
        Ok(ErrorBody::Batch(items)) => items.into_iter().find_map(|item| match item {
            ErrorBody::Single { error } => Some(error),
            ErrorBody::Batch(_) => None,
        }),
        Err(_) => None,
    };

    match detail {
        Some(detail) => error_from_detail(Some(status), &detail, retry_after),
        // Fallback: if the payload cannot be parsed, return the raw body.
        None => {
            let message = format!("status {status}: {body}");
            match status {
                401 | 403 => LLMError::Auth { message },
                429 => LLMError::RateLimit {
                    message,
                    retry_after,
                },
                503 => LLMError::Overloaded { message },
                408 | 504 => LLMError::Timeout { message },
                _ => LLMError::provider(PROVIDER, message),
            }
        }
    }
}

/// Combines the HTTP status with the Google RPC status for classification.
pub(crate) fn error_from_detail(
    status: Option<u16>,
    detail: &GeminiErrorDetail,
    retry_after: Option<Duration>,
) -> LLMError {
    let rpc_status = detail.status.as_deref().filter(|s| !s.is_empty());
    let mut message = detail
        .message
        .clone()
        .unwrap_or_else(|| "unknown error".to_string());
    if let Some(rpc_status) = rpc_status {
        message = format!("{message} ({rpc_status})");
    }
    let lower = message.to_ascii_lowercase();

    if looks_like_token_limit_error(rpc_status, &message) {
        return LLMError::TokenLimitExceeded { message };
    }

    // Gemini reports an invalid key as 400 INVALID_ARGUMENT.
    if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
        return LLMError::Auth { message };
    }

    let code = status.or(detail.code);
    match (rpc_status, code) {
        (Some("UNAUTHENTICATED" | "PERMISSION_DENIED"), _) | (_, Some(401 | 403)) => {
            LLMError::Auth { message }
        }
        (Some("NOT_FOUND"), _) | (_, Some(404)) => LLMError::ModelNotFound {
            model: extract_model_identifier(&message)
                .or_else(|| extract_models_path(&message)),
            message,
        },
        (Some("RESOURCE_EXHAUSTED"), _) | (_, Some(429)) => {
            // Free-tier daily caps also come back as RESOURCE_EXHAUSTED.
            if lower.contains("quota") && !lower.contains("per minute") {
                LLMError::Quota { message }
            } else {
                LLMError::RateLimit {
                    message,
                    retry_after,
                }
            }
        }
        (Some("UNAVAILABLE"), _) | (_, Some(503)) => LLMError::Overloaded { message },
        (Some("DEADLINE_EXCEEDED"), _) | (_, Some(504)) => LLMError::Timeout { message },
        (Some("INVALID_ARGUMENT" | "FAILED_PRECONDITION"), _) | (_, Some(400)) => {
            LLMError::Validation { message }
        }
        _ => LLMError::provider(PROVIDER, message),
    }
}

/// Pulls `models/<id>` out of messages such as "models/gemini-x is not found".
fn extract_models_path(message: &str) -> Option<String> {
    let start = message.find("models/")? + "models/".len();
    let id: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
        .collect();
    (!id.is_empty()).then_some(id)
}
