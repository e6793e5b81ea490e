use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LLMError;
use crate::http::{HttpResponse, HttpStreamResponse, collect_body_text};
use crate::stream::{LineDecoder, PartialFailure, StreamDecoder, assemble};
use crate::types::{
    AssembledResponse, DeltaCallback, ErrorOutcome, FinishReason, ModelDescriptor, PromptRequest,
    ProviderKind,
};

pub mod anthropic_messages;
pub mod google_gemini;
pub mod openai_chat;
pub(crate) mod retry;

/// Context window assumed when a catalog entry does not report one.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 8_192;

/// Capability set every upstream adapter implements.
///
/// Adapters convert every failure into an [`ErrorOutcome`]; nothing they do can make
/// a comparison batch fail.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Models this provider can be asked to run.
    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<ModelDescriptor>, LLMError>;

    /// Sends one prompt. Streams when the request carries a delta callback.
    async fn send_prompt(&self, request: PromptRequest) -> Result<AssembledResponse, ErrorOutcome>;

    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &'static str;
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn LLMProvider>;

/// Time bounds applied to outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// One-shot generation and catalog calls.
    pub request: Duration,
    /// Streaming connections, which stay open for the whole generation.
    pub stream: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(60),
            stream: Duration::from_secs(300),
        }
    }
}

/// Maps a non-2xx status, body and `Retry-After` hint onto an [`LLMError`].
pub(crate) type ErrorParser = fn(u16, &str, Option<Duration>) -> LLMError;

/// Translates a raw terminal reason into the classifier vocabulary.
pub(crate) type FinishReasonMapper = fn(&str) -> FinishReason;

/// Failure of one attempt, before elapsed time is attached.
#[derive(Debug)]
pub(crate) struct AttemptError {
    pub(crate) error: LLMError,
    pub(crate) partial: Option<AssembledResponse>,
}

impl AttemptError {
    pub(crate) fn into_outcome(self, started: Instant) -> ErrorOutcome {
        let outcome = ErrorOutcome::new(self.error, started.elapsed());
        match self.partial {
            Some(partial) => outcome.with_partial(partial),
            None => outcome,
        }
    }
}

impl From<LLMError> for AttemptError {
    fn from(error: LLMError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// Fills `finish_reason` from the raw terminal reason.
pub(crate) fn with_finish_reason(
    mut response: AssembledResponse,
    translate: FinishReasonMapper,
) -> AssembledResponse {
    response.finish_reason = response.terminal_reason.as_deref().map(translate);
    response
}

/// Returns the body of a successful one-shot response.
pub(crate) fn ensure_success(response: HttpResponse, parse_error: ErrorParser) -> Result<String, LLMError> {
    let retry_after = retry::retry_after_from_headers(&response.headers);
    let status = response.status;
    let text = String::from_utf8_lossy(&response.body).into_owned();
    if response.is_success() {
        Ok(text)
    } else {
        Err(parse_error(status, &text, retry_after))
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(provider: &'static str, text: &str) -> Result<T, LLMError> {
    serde_json::from_str(text).map_err(|err| LLMError::Provider {
        provider,
        message: format!("failed to parse response: {err}"),
    })
}

/// Decodes a streamed body into an assembled response, forwarding deltas in order.
pub(crate) async fn read_stream<D>(
    response: HttpStreamResponse,
    decoder: D,
    provider: &'static str,
    parse_error: ErrorParser,
    translate: FinishReasonMapper,
    on_delta: &DeltaCallback,
) -> Result<AssembledResponse, AttemptError>
where
    D: LineDecoder + Unpin,
{
    if !(200..300).contains(&response.status) {
        let retry_after = retry::retry_after_from_headers(&response.headers);
        let text = collect_body_text(response.body).await?;
        return Err(parse_error(response.status, &text, retry_after).into());
    }

    let events = StreamDecoder::new(response.body, decoder, provider);
    match assemble(events, Some(on_delta)).await {
        Ok(response) => Ok(with_finish_reason(response, translate)),
        Err(PartialFailure { error, partial }) => {
            debug!(provider, error = %error, salvaged = partial.text.len(), "stream failed mid-way");
            Err(AttemptError {
                error,
                partial: Some(with_finish_reason(partial, translate)),
            })
        }
    }
}

/// Joins `base` and `path`, tolerating a base that already ends with `version`.
pub(crate) fn versioned_url(base: &str, version: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = format!("/{version}");
    if base.ends_with(&suffix) {
        format!("{base}/{path}")
    } else {
        format!("{base}{suffix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_url_does_not_duplicate_the_version() {
        assert_eq!(
            versioned_url("https://api.openai.com", "v1", "models"),
            "https://api.openai.com/v1/models"
        );
        assert_eq!(
            versioned_url("http://proxy.local/openai/v1/", "v1", "chat/completions"),
            "http://proxy.local/openai/v1/chat/completions"
        );
    }

    #[test]
    fn ensure_success_routes_failures_through_the_parser() {
        fn parser(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
            LLMError::RateLimit {
                message: format!("{status} {body}"),
                retry_after,
            }
        }
        let response = HttpResponse {
            status: 429,
            headers: [("Retry-After".to_string(), "3".to_string())].into(),
            body: b"slow".to_vec(),
        };
        match ensure_success(response, parser) {
            Err(LLMError::RateLimit {
                message,
                retry_after,
            }) => {
                assert_eq!(message, "429 slow");
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
