use std::time::Duration;

use serde::Deserialize;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

const PROVIDER: &str = "anthropic_messages";

/// `error` object of an Anthropic error body or `error` stream event.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicErrorDetail {
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

/// Parses error responses returned by the Anthropic Messages API.
pub(crate) fn parse_anthropic_error(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<AnthropicErrorDetail>,
    }

    if let Ok(ErrorBody {
        error: Some(detail),
    }) = serde_json::from_str::<ErrorBody>(body)
    {
        return error_from_detail(Some(status), &detail, retry_after);
    }

    // Fallback: if the payload cannot be parsed, surface the raw body.
    let message = format!("status {status}: {body}");
    match status {
        401 | 403 => LLMError::Auth { message },
        429 => LLMError::RateLimit {
            message,
            retry_after,
        },
        529 | 503 => LLMError::Overloaded { message },
        408 | 504 => LLMError::Timeout { message },
        _ => LLMError::provider(PROVIDER, message),
    }
}

/// Maps an Anthropic error type onto an [`LLMError`]; the typed `type` field wins over
/// the HTTP status because in-band stream errors have no status at all.
pub(crate) fn error_from_detail(
    status: Option<u16>,
    detail: &AnthropicErrorDetail,
    retry_after: Option<Duration>,
) -> LLMError {
    let kind = detail.kind.as_deref();
    let mut message = detail
        .message
        .clone()
        .unwrap_or_else(|| "unknown error".to_string());
    if let Some(kind) = kind {
        message = format!("{message} ({kind})");
    }

    if looks_like_token_limit_error(kind, &message) {
        return LLMError::TokenLimitExceeded { message };
    }

    match (kind, status) {
        (Some("authentication_error" | "permission_error"), _) | (_, Some(401 | 403)) => {
            LLMError::Auth { message }
        }
        (Some("not_found_error"), _) | (_, Some(404)) => LLMError::ModelNotFound {
            model: extract_model_identifier(&message),
            message,
        },
        (Some("rate_limit_error"), _) | (_, Some(429)) => LLMError::RateLimit {
            message,
            retry_after,
        },
        (Some("overloaded_error"), _) | (_, Some(529 | 503)) => LLMError::Overloaded { message },
        (Some("billing_error"), _) | (_, Some(402)) => LLMError::Quota { message },
        (Some("timeout_error"), _) | (_, Some(408 | 504)) => LLMError::Timeout { message },
        (Some("invalid_request_error" | "request_too_large"), _) | (_, Some(400 | 413)) => {
            if message.to_ascii_lowercase().contains("credit balance") {
                LLMError::Quota { message }
            } else {
                LLMError::Validation { message }
            }
        }
        _ => LLMError::provider(PROVIDER, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn parse_auth_and_rate_limit_errors() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        match parse_anthropic_error(401, body, None) {
            LLMError::Auth { message } => {
                assert!(message.contains("invalid x-api-key"));
                assert!(message.contains("authentication_error"));
            }
            other => panic!("expected Auth error, got {other:?}"),
        }

        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Number of request tokens has exceeded your per-minute rate limit"}}"#;
        match parse_anthropic_error(429, body, Some(Duration::from_secs(2))) {
            LLMError::RateLimit { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(2)));
            }
            other => panic!("expected RateLimit error, got {other:?}"),
        }
    }

    #[test]
    fn overloaded_and_low_credit_are_distinguished() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(
            parse_anthropic_error(529, body, None).category(),
            ErrorCategory::Overloaded
        );

        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"Your credit balance is too low to access the Anthropic API."}}"#;
        assert!(matches!(
            parse_anthropic_error(400, body, None),
            LLMError::Quota { .. }
        ));
    }

    #[test]
    fn parse_anthropic_model_not_found() {
        let body = r#"{"type":"error","error":{"type":"not_found_error","message":"model: `claude-bogus`"}}"#;
        match parse_anthropic_error(404, body, None) {
            LLMError::ModelNotFound { model, .. } => {
                assert_eq!(model.as_deref(), Some("claude-bogus"));
            }
            other => panic!("expected ModelNotFound, got {other:?}"),
        }
    }

    #[test]
    fn parse_token_limit_and_fallback() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"prompt is too long: 210000 tokens > 200000 maximum"}}"#;
        assert!(matches!(
            parse_anthropic_error(400, body, None),
            LLMError::TokenLimitExceeded { .. }
        ));

        match parse_anthropic_error(500, "not a json", None) {
            LLMError::Provider { provider, message } => {
                assert_eq!(provider, "anthropic_messages");
                assert!(message.contains("status 500: not a json"));
            }
            other => panic!("expected Provider fallback error, got {other:?}"),
        }
    }
}
