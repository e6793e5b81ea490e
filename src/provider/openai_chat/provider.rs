use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LLMError;
use crate::http::{
    DynHttpTransport, HttpRequest, post_json_stream_with_headers, post_json_with_headers,
};
use crate::provider::{
    AttemptError, LLMProvider, Timeouts, ensure_success, parse_json, read_stream, versioned_url,
};
use crate::types::{
    AssembledResponse, DeltaCallback, ErrorOutcome, ModelDescriptor, PromptRequest, ProviderKind,
};

use super::error::parse_openai_error;
use super::models::descriptors_from_catalog;
use super::request::build_openai_body;
use super::response::{convert_finish_reason, map_response};
use super::stream::OpenAiChatDecoder;
use super::types::{OpenAiChatResponse, OpenAiModelList};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI Chat Completions adapter.
pub struct OpenAiChatProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) organization: Option<String>,
    pub(crate) timeouts: Timeouts,
}

impl OpenAiChatProvider {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Points the adapter at a proxy or compatible gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        versioned_url(&self.base_url, "v1", "chat/completions")
    }

    fn build_headers(&self, credential: &str, stream: bool) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {credential}"));
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let accept = if stream { "text/event-stream" } else { "application/json" };
        headers.insert("Accept".to_string(), accept.to_string());
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization".to_string(), org.clone());
        }
        headers
    }

    async fn complete(&self, request: &PromptRequest) -> Result<AssembledResponse, AttemptError> {
        let body = build_openai_body(request, false);
        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(&request.credential, false),
            &body,
            self.timeouts.request,
        )
        .await?;
        let text = ensure_success(response, parse_openai_error)?;
        let parsed: OpenAiChatResponse = parse_json(self.name(), &text)?;
        Ok(map_response(parsed))
    }

    async fn stream(
        &self,
        request: &PromptRequest,
        on_delta: &DeltaCallback,
    ) -> Result<AssembledResponse, AttemptError> {
        let body = build_openai_body(request, true);
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
            OpenAiChatDecoder,
            self.name(),
            parse_openai_error,
            convert_finish_reason,
            on_delta,
        )
        .await
    }
}

#[async_trait]
impl LLMProvider for OpenAiChatProvider {
    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<ModelDescriptor>, LLMError> {
        let credential = credential
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| LLMError::missing_credential(self.kind().as_str()))?;

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {credential}"));
        headers.insert("Accept".to_string(), "application/json".to_string());
        let request = HttpRequest::get(versioned_url(&self.base_url, "v1", "models"))
            .with_headers(headers)
            .with_timeout(self.timeouts.request);

        let response = self.transport.send(request).await?;
        let text = ensure_success(response, parse_openai_error)?;
        let list: OpenAiModelList = parse_json(self.name(), &text)?;
        Ok(descriptors_from_catalog(list))
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
        ProviderKind::OpenAi
    }

    fn name(&self) -> &'static str {
        "openai_chat"
    }
}
