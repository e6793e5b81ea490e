use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LLMError;
use crate::http::{DynHttpTransport, post_json_stream_with_headers, post_json_with_headers};
use crate::provider::{
    AttemptError, LLMProvider, Timeouts, ensure_success, parse_json, read_stream, versioned_url,
};
use crate::types::{
    AssembledResponse, DeltaCallback, ErrorOutcome, ModelDescriptor, PromptRequest, ProviderKind,
};

use super::error::parse_anthropic_error;
use super::models::known_models;
use super::request::build_anthropic_body;
use super::response::{convert_finish_reason, map_response};
use super::stream::AnthropicMessagesDecoder;
use super::types::AnthropicMessageResponse;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";

/// Anthropic Messages adapter.
pub struct AnthropicMessagesProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) version: String,
    pub(crate) timeouts: Timeouts,
}

impl AnthropicMessagesProvider {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            timeouts: Timeouts::default(),
        }
    }

    /// Points the adapter at a proxy or compatible gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `anthropic-version` header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        versioned_url(&self.base_url, "v1", "messages")
    }

    fn build_headers(&self, credential: &str, stream: bool) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), credential.to_string());
        headers.insert("anthropic-version".to_string(), self.version.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let accept = if stream { "text/event-stream" } else { "application/json" };
        headers.insert("Accept".to_string(), accept.to_string());
        headers
    }

    async fn complete(&self, request: &PromptRequest) -> Result<AssembledResponse, AttemptError> {
        let body = build_anthropic_body(request, false);
        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(&request.credential, false),
            &body,
            self.timeouts.request,
        )
        .await?;
        let text = ensure_success(response, parse_anthropic_error)?;
        let parsed: AnthropicMessageResponse = parse_json(self.name(), &text)?;
        Ok(map_response(parsed))
    }

    async fn stream(
        &self,
        request: &PromptRequest,
        on_delta: &DeltaCallback,
    ) -> Result<AssembledResponse, AttemptError> {
        let body = build_anthropic_body(request, true);
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(&request.credential, true),
            &body,
            self.timeouts.stream,
        )
        .await?;
        read_stream(
            response,
            AnthropicMessagesDecoder,
            self.name(),
            parse_anthropic_error,
            convert_finish_reason,
            on_delta,
        )
        .await
    }
}

#[async_trait]
impl LLMProvider for AnthropicMessagesProvider {
    /// There is no catalog endpoint; the list is fixed and needs no credential.
    async fn list_models(&self, _credential: Option<&str>) -> Result<Vec<ModelDescriptor>, LLMError> {
        Ok(known_models())
    }

    async fn send_prompt(&self, request: PromptRequest) -> Result<AssembledResponse, ErrorOutcome> {
        let started = Instant::now();
        debug!(
            provider = self.name(),
            model = %request.model_id,
            streaming = request.on_delta.is_some(),
            "sending prompt"
        );
        let result = match &request.on_delta {
            Some(on_delta) => self.stream(&request, on_delta).await,
            None => self.complete(&request).await,
        };
        result.map_err(|failure| failure.into_outcome(started))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn name(&self) -> &'static str {
        "anthropic_messages"
    }
}
