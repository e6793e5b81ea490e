use std::sync::Arc;
use std::time::Duration;

use llm_arena::config::{ArenaConfig, ProviderSettings, build_client_from_config};
use llm_arena::error::{ErrorCategory, LLMError};
use llm_arena::http::reqwest::default_dyn_transport;
use llm_arena::pricing::{CatalogPricing, HttpPricingCatalog, PricingLookup};
use llm_arena::{ArenaClient, GenerationParameters, ProviderKind, RequestTarget, ResultStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, request_timeout_secs: u64) -> ArenaClient {
    let config = ArenaConfig {
        providers: ProviderKind::ALL
            .iter()
            .map(|kind| ProviderSettings::new(*kind).with_base_url(server.uri()))
            .collect(),
        request_timeout_secs,
        ..ArenaConfig::default()
    };
    build_client_from_config(&config, default_dyn_transport().expect("transport")).expect("client")
}

#[tokio::test]
async fn openai_sse_stream_over_http() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" there\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2,\"total_tokens\":11}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-live"))
        .and(body_partial_json(json!({"stream": true, "stream_options": {"include_usage": true}})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 60);
    let target = RequestTarget::new(ProviderKind::OpenAi, "gpt-4o-mini").with_credential("sk-live");
    let records = client
        .dispatch("Greet me", &[target], GenerationParameters::default(), true, None)
        .await;

    let record = &records[0];
    assert_eq!(record.status, ResultStatus::Success, "{record:?}");
    assert_eq!(record.text.as_deref(), Some("Hello there"));
    assert_eq!((record.input_tokens, record.output_tokens), (Some(9), Some(2)));
    assert!(record.estimated_cost_usd.is_some());
}

#[tokio::test]
async fn anthropic_rate_limit_surfaces_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({
                    "type": "error",
                    "error": {"type": "rate_limit_error", "message": "Number of requests has exceeded your rate limit"}
                })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 60);
    let target = RequestTarget::new(ProviderKind::Anthropic, "claude-3-5-haiku-latest").with_credential("sk-ant");
    let records = client
        .dispatch("hi", &[target], GenerationParameters::default(), false, None)
        .await;

    let diagnostic = records[0].diagnostic.as_ref().expect("diagnostic");
    assert_eq!(records[0].status, ResultStatus::Error);
    assert_eq!(diagnostic.category, Some(ErrorCategory::RateLimit));
    assert!(diagnostic.is_retryable);
    assert!(diagnostic.suggestion.contains("Suggested wait: 7s."), "{}", diagnostic.suggestion);
}

#[tokio::test]
async fn gemini_ndjson_stream_over_http() {
    let server = MockServer::start().await;
    let ndjson = concat!(
        "[{\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Bonjour\"}]}}],\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":1}}\n",
        ",{\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" !\"}]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":3}}\n",
        "]",
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
        .and(header("x-goog-api-key", "gm-key"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 128}})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ndjson, "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server, 60);
    let target = RequestTarget::new(ProviderKind::Gemini, "models/gemini-2.0-flash").with_credential("gm-key");
    let params = GenerationParameters {
        temperature: 0.0,
        max_output_tokens: 128,
    };
    let records = client.dispatch("Say hello in French", &[target], params, true, None).await;

    let record = &records[0];
    assert_eq!(record.status, ResultStatus::Success, "{record:?}");
    assert_eq!(record.text.as_deref(), Some("Bonjour !"));
    assert_eq!((record.input_tokens, record.output_tokens), (Some(5), Some(3)));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let target = RequestTarget::new(ProviderKind::OpenAi, "gpt-4o-mini").with_credential("sk");
    let records = client
        .dispatch("hi", &[target], GenerationParameters::default(), false, None)
        .await;

    assert_eq!(records[0].status, ResultStatus::Error);
    assert_eq!(
        records[0].diagnostic.as_ref().unwrap().category,
        Some(ErrorCategory::Timeout)
    );
}

#[tokio::test]
async fn gemini_catalog_and_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "models/gemini-2.5-pro", "displayName": "Gemini 2.5 Pro", "inputTokenLimit": 1048576,
                 "supportedGenerationMethods": ["generateContent"]},
                {"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "bad"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 60);
    let live = client.list_models(ProviderKind::Gemini, Some("good")).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, "gemini-2.5-pro");

    let fallback = client.list_models(ProviderKind::Gemini, Some("bad")).await.unwrap();
    assert!(fallback.len() > 1);
    assert!(fallback.iter().all(|model| model.provider == ProviderKind::Gemini));
}

#[tokio::test]
async fn openai_catalog_requires_a_credential() {
    let server = MockServer::start().await;
    let client = client_for(&server, 60);
    let err = client.list_models(ProviderKind::OpenAi, None).await.unwrap_err();
    assert!(matches!(err, LLMError::Auth { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn pricing_catalog_is_fetched_once_per_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "openai/gpt-4o-mini", "pricing": {"prompt": "0.00000015", "completion": "0.0000006"}},
                {"id": "openai/gpt-4o-mini:free", "pricing": {"prompt": "0", "completion": "0"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpPricingCatalog::new(default_dyn_transport().unwrap())
        .with_base_url(format!("{}/api/v1", server.uri()));
    let pricing = CatalogPricing::new(Arc::new(source), Duration::from_secs(600));

    for _ in 0..3 {
        let price = pricing
            .pricing(ProviderKind::OpenAi, "gpt-4o-mini")
            .await
            .expect("catalog price");
        assert!((price.input - 0.00015).abs() < 1e-12);
        assert!((price.output - 0.0006).abs() < 1e-12);
    }
    // Not in the catalog; answered by the static table.
    assert!(pricing.pricing(ProviderKind::Anthropic, "claude-3-5-haiku-latest").await.is_some());
}
