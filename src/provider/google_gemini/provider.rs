use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

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

use super::error::parse_gemini_error;
use super::models::{descriptors_from_catalog, fallback_models};
use super::request::{build_gemini_body, normalize_model};
use super::response::{convert_finish_reason, map_response};
use super::stream::GeminiNdjsonDecoder;
use super::types::{GeminiGenerateContentResponse, GeminiModelList};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Google Gemini GenerateContent adapter.
pub struct GoogleGeminiProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) timeouts: Timeouts,
}

impl GoogleGeminiProvider {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts: Timeouts::default(),
        }
    }

    /// Points the adapter at a proxy or compatible gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Builds the non-streaming endpoint URL for GenerateContent.
    pub(crate) fn endpoint(&self, model: &str) -> String {
        let path = format!("models/{}:generateContent", normalize_model(model));
        versioned_url(&self.base_url, API_VERSION, &path)
    }

    /// Streaming endpoint; without `alt=sse` the body is newline-delimited JSON.
    pub(crate) fn stream_endpoint(&self, model: &str) -> String {
        let path = format!("models/{}:streamGenerateContent", normalize_model(model));
        versioned_url(&self.base_url, API_VERSION, &path)
    }

    fn build_headers(credential: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-goog-api-key".to_string(), credential.to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers
    }

    async fn complete(&self, request: &PromptRequest) -> Result<AssembledResponse, AttemptError> {
        let body = build_gemini_body(request);
        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(&request.model_id),
            Self::build_headers(&request.credential),
            &body,
            self.timeouts.request,
        )
        .await?;
        let text = ensure_success(response, parse_gemini_error)?;
        let parsed: GeminiGenerateContentResponse = parse_json(self.name(), &text)?;
        Ok(map_response(parsed))
    }

    async fn stream(
        &self,
        request: &PromptRequest,
        on_delta: &DeltaCallback,
    ) -> Result<AssembledResponse, AttemptError> {
        let body = build_gemini_body(request);
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            self.stream_endpoint(&request.model_id),
            Self::build_headers(&request.credential),
            &body,
            self.timeouts.stream,
        )
        .await?;
        read_stream(
            response,
            GeminiNdjsonDecoder,
            self.name(),
            parse_gemini_error,
            convert_finish_reason,
            on_delta,
        )
        .await
    }

    async fn fetch_catalog(&self, credential: &str) -> Result<Vec<ModelDescriptor>, LLMError> {
        let url = versioned_url(&self.base_url, API_VERSION, "models?pageSize=1000");
        let mut headers = Self::build_headers(credential);
        headers.remove("Content-Type");
        let request = HttpRequest::get(url)
            .with_headers(headers)
            .with_timeout(self.timeouts.request);
        let response = self.transport.send(request).await?;
        let text = ensure_success(response, parse_gemini_error)?;
        let list: GeminiModelList = parse_json(self.name(), &text)?;
        Ok(descriptors_from_catalog(list))
    }
}

#[async_trait]
impl LLMProvider for GoogleGeminiProvider {
    /// Falls back to a built-in list whenever the catalog is unavailable.
    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<ModelDescriptor>, LLMError> {
        let Some(credential) = credential.filter(|value| !value.trim().is_empty()) else {
            return Ok(fallback_models());
        };
        match self.fetch_catalog(credential).await {
            Ok(models) if !models.is_empty() => Ok(models),
            Ok(_) => Ok(fallback_models()),
            Err(err) => {
                warn!(provider = self.name(), error = %err, "model catalog unavailable, using built-in list");
                Ok(fallback_models())
            }
        }
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
        ProviderKind::Gemini
    }

    fn name(&self) -> &'static str {
        "google_gemini"
    }
}

#[cfg(test)]
mod tests {
    use crate::http::reqwest::default_dyn_transport;

    use super::*;

    #[test]
    fn endpoints_strip_models_prefix_and_respect_versioned_base() {
        let provider = GoogleGeminiProvider::new(default_dyn_transport().unwrap());
        assert_eq!(
            provider.endpoint("models/gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        let provider = provider.with_base_url("http://proxy.local/gemini/v1beta/");
        assert_eq!(
            provider.stream_endpoint("gemini-1.5-pro"),
            "http://proxy.local/gemini/v1beta/models/gemini-1.5-pro:streamGenerateContent"
        );
    }
}
