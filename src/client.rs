use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{Classification, classify_failure, classify_response};
use crate::error::LLMError;
use crate::metrics::{calculate_cost, estimate_token_count};
use crate::pricing::{DynPricingLookup, StaticPricingTable};
use crate::provider::DynProvider;
use crate::types::{
    AssembledResponse, DeltaCallback, ErrorOutcome, GenerationParameters, ModelDescriptor,
    PromptRequest, ProviderKind, RequestTarget, ResultRecord, ResultStatus, TargetDeltaCallback,
};

/// Fans one prompt out to many targets and turns every outcome into a [`ResultRecord`].
///
/// Holds one adapter per provider plus the pricing collaborator. Nothing else is
/// shared between concurrently running targets.
pub struct ArenaClient {
    providers: HashMap<ProviderKind, DynProvider>,
    pricing: DynPricingLookup,
}

impl ArenaClient {
    pub fn builder() -> ArenaClientBuilder {
        ArenaClientBuilder {
            providers: HashMap::new(),
            pricing: None,
        }
    }

    /// Providers with a registered adapter.
    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Model catalog of one provider.
    ///
    /// # Errors
    ///
    /// Fails when the provider is not registered or its catalog call fails.
    pub async fn list_models(
        &self,
        provider: ProviderKind,
        credential: Option<&str>,
    ) -> Result<Vec<ModelDescriptor>, LLMError> {
        self.get_provider(provider)?.list_models(credential).await
    }

    /// Sends `prompt` to every target concurrently and waits for all of them.
    ///
    /// Returns exactly one record per target, in target order. A failing target only
    /// degrades its own record. With `streaming` set, upstreams are asked to stream and
    /// `on_delta` receives each fragment tagged with its target.
    pub async fn dispatch(
        &self,
        prompt: &str,
        targets: &[RequestTarget],
        params: GenerationParameters,
        streaming: bool,
        on_delta: Option<TargetDeltaCallback>,
    ) -> Vec<ResultRecord> {
        let params = params.normalized();
        let runs = targets.iter().map(|target| {
            let callback = streaming.then(|| target_callback(target, on_delta.clone()));
            self.run_target(target, prompt, params, callback)
        });
        join_all(runs).await
    }

    /// Re-runs a single target with a fresh attempt.
    ///
    /// Streams when `on_delta` is supplied.
    pub async fn retry_one(
        &self,
        target: &RequestTarget,
        prompt: &str,
        params: GenerationParameters,
        on_delta: Option<TargetDeltaCallback>,
    ) -> ResultRecord {
        let callback = on_delta.map(|callback| target_callback(target, Some(callback)));
        self.run_target(target, prompt, params.normalized(), callback)
            .await
    }

    /// Retries `target` and replaces its entry in `results`, leaving every other entry
    /// untouched.
    pub async fn retry_into(
        &self,
        results: &mut ResultSet,
        target: &RequestTarget,
        prompt: &str,
        params: GenerationParameters,
        on_delta: Option<TargetDeltaCallback>,
    ) -> ResultRecord {
        let record = self.retry_one(target, prompt, params, on_delta).await;
        results.replace(record.clone());
        record
    }

    async fn run_target(
        &self,
        target: &RequestTarget,
        prompt: &str,
        params: GenerationParameters,
        on_delta: Option<DeltaCallback>,
    ) -> ResultRecord {
        let Some(credential) = target.usable_credential() else {
            let outcome = ErrorOutcome::new(
                LLMError::missing_credential(target.provider.as_str()),
                Duration::ZERO,
            );
            return self.failure_record(target, prompt, outcome);
        };

        let provider = match self.get_provider(target.provider) {
            Ok(provider) => provider,
            Err(err) => {
                return self.failure_record(target, prompt, ErrorOutcome::new(err, Duration::ZERO));
            }
        };

        let request = PromptRequest {
            model_id: target.model_id.clone(),
            prompt: prompt.to_string(),
            params,
            credential: credential.to_string(),
            on_delta,
        };

        let started = Instant::now();
        match provider.send_prompt(request).await {
            Ok(response) => {
                self.response_record(target, prompt, response, started.elapsed())
                    .await
            }
            Err(outcome) => self.failure_record(target, prompt, outcome),
        }
    }

    async fn response_record(
        &self,
        target: &RequestTarget,
        prompt: &str,
        response: AssembledResponse,
        elapsed: Duration,
    ) -> ResultRecord {
        let classification = classify_response(&response);
        let usage = Usage::resolve(prompt, &response);
        let pricing = self.pricing.pricing(target.provider, &target.model_id).await;
        let cost = calculate_cost(pricing, usage.input, usage.output);

        let record = ResultRecord {
            estimated_cost_usd: cost,
            text: response.has_content().then_some(response.text),
            ..base_record(target, elapsed, classification, usage)
        };
        log_record(&record);
        record
    }

    /// Error records never carry a cost; salvaged text is flagged as partial.
    fn failure_record(&self, target: &RequestTarget, prompt: &str, outcome: ErrorOutcome) -> ResultRecord {
        let classification = classify_failure(&outcome.error);
        let partial = outcome.partial.filter(AssembledResponse::has_content);

        let record = match partial {
            Some(partial) => {
                let usage = Usage::resolve(prompt, &partial);
                ResultRecord {
                    text: Some(partial.text),
                    is_partial: true,
                    ..base_record(target, outcome.elapsed, classification, usage)
                }
            }
            None => ResultRecord {
                input_tokens: None,
                output_tokens: None,
                total_tokens: None,
                usage_estimated: false,
                ..base_record(target, outcome.elapsed, classification, Usage::default())
            },
        };

        warn!(
            provider = %target.provider,
            model = %target.model_id,
            category = ?outcome.error.category(),
            error = %outcome.error,
            "target failed"
        );
        log_record(&record);
        record
    }

    fn get_provider(&self, kind: ProviderKind) -> Result<DynProvider, LLMError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| LLMError::InvalidConfig {
                field: "providers".to_string(),
                reason: format!("no adapter registered for {kind}"),
            })
    }
}

fn target_callback(target: &RequestTarget, on_delta: Option<TargetDeltaCallback>) -> DeltaCallback {
    match on_delta {
        Some(callback) => {
            let target = target.clone();
            Arc::new(move |text: &str| callback(&target, text))
        }
        // Streaming without a listener still streams upstream.
        None => Arc::new(|_: &str| {}),
    }
}

/// Token counts of a record, provider-reported or estimated.
#[derive(Debug, Default, Clone, Copy)]
struct Usage {
    input: u64,
    output: u64,
    estimated: bool,
}

impl Usage {
    fn resolve(prompt: &str, response: &AssembledResponse) -> Self {
        Self {
            input: response
                .input_tokens
                .unwrap_or_else(|| estimate_token_count(prompt)),
            output: response
                .output_tokens
                .unwrap_or_else(|| estimate_token_count(&response.text)),
            estimated: response.input_tokens.is_none() || response.output_tokens.is_none(),
        }
    }
}

fn base_record(
    target: &RequestTarget,
    elapsed: Duration,
    classification: Classification,
    usage: Usage,
) -> ResultRecord {
    ResultRecord {
        model: target.display_name.clone(),
        model_id: target.model_id.clone(),
        provider: target.provider,
        context_window: target.context_window_tokens,
        timestamp: Utc::now(),
        latency_ms: elapsed.as_secs_f64() * 1000.0,
        text: None,
        input_tokens: Some(usage.input),
        output_tokens: Some(usage.output),
        total_tokens: Some(usage.input + usage.output),
        estimated_cost_usd: None,
        status: classification.status,
        diagnostic: classification.diagnostic,
        is_partial: false,
        usage_estimated: usage.estimated,
    }
}

fn log_record(record: &ResultRecord) {
    info!(
        provider = %record.provider,
        model = %record.model_id,
        status = record.status.as_str(),
        latency_ms = record.latency_ms,
        output_tokens = record.output_tokens,
        "target resolved"
    );
}

/// Records the caller keeps between a dispatch and later retries.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ResultRecord>,
}

impl ResultSet {
    pub fn new(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, target: &RequestTarget) -> Option<&ResultRecord> {
        self.records.iter().find(|record| target.matches(record))
    }

    /// Replaces the record of the same provider, model and display name in place, or
    /// appends it.
    pub fn replace(&mut self, record: ResultRecord) {
        match self.records.iter_mut().find(|existing| {
            existing.provider == record.provider
                && existing.model_id == record.model_id
                && existing.model == record.model
        }) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn count(&self, status: ResultStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

impl From<Vec<ResultRecord>> for ResultSet {
    fn from(records: Vec<ResultRecord>) -> Self {
        Self::new(records)
    }
}

/// Registers adapters and the pricing collaborator.
pub struct ArenaClientBuilder {
    providers: HashMap<ProviderKind, DynProvider>,
    pricing: Option<DynPricingLookup>,
}

impl ArenaClientBuilder {
    /// Registers an adapter under its own [`ProviderKind`], replacing any previous one.
    pub fn register_provider(mut self, provider: DynProvider) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn pricing(mut self, pricing: DynPricingLookup) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Falls back to the built-in static price table when no pricing was set.
    pub fn build(self) -> ArenaClient {
        ArenaClient {
            providers: self.providers,
            pricing: self
                .pricing
                .unwrap_or_else(|| Arc::new(StaticPricingTable::builtin())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ErrorCategory;
    use crate::metrics::ModelPricing;
    use crate::provider::LLMProvider;
    use crate::types::{FinishReason, ResultStatus};

    /// Provider whose reply is derived from the model id.
    struct ScriptedProvider {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn list_models(&self, _credential: Option<&str>) -> Result<Vec<ModelDescriptor>, LLMError> {
            Ok(Vec::new())
        }

        async fn send_prompt(&self, request: PromptRequest) -> Result<AssembledResponse, ErrorOutcome> {
            self.calls.lock().unwrap().push(request.model_id.clone());
            match request.model_id.as_str() {
                "partial" => Err(ErrorOutcome::new(
                    LLMError::transport("connection reset by peer"),
                    Duration::from_millis(40),
                )
                .with_partial(AssembledResponse {
                    text: "half an ans".into(),
                    streamed: true,
                    ..AssembledResponse::default()
                })),
                "empty" => Ok(AssembledResponse {
                    terminal_reason: Some("stop".into()),
                    finish_reason: Some(FinishReason::Stop),
                    ..AssembledResponse::default()
                }),
                _ => {
                    if let Some(callback) = &request.on_delta {
                        callback("4");
                    }
                    Ok(AssembledResponse {
                        text: "4".into(),
                        input_tokens: Some(1000),
                        output_tokens: Some(1000),
                        terminal_reason: Some("stop".into()),
                        finish_reason: Some(FinishReason::Stop),
                        streamed: request.on_delta.is_some(),
                    })
                }
            }
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn client() -> (ArenaClient, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider {
            calls: Mutex::new(Vec::new()),
        });
        let pricing = StaticPricingTable::empty().with_entry(
            ProviderKind::OpenAi,
            "priced",
            ModelPricing::new(0.5, 1.5),
        );
        let client = ArenaClient::builder()
            .register_provider(provider.clone())
            .pricing(Arc::new(pricing))
            .build();
        (client, provider)
    }

    fn target(model: &str) -> RequestTarget {
        RequestTarget::new(ProviderKind::OpenAi, model).with_credential("sk-test")
    }

    #[tokio::test]
    async fn success_record_carries_usage_and_cost() {
        let (client, _) = client();
        let records = client
            .dispatch("2+2?", &[target("priced-model")], GenerationParameters::default(), false, None)
            .await;
        let record = &records[0];
        assert_eq!(record.status, ResultStatus::Success);
        assert_eq!(record.text.as_deref(), Some("4"));
        assert_eq!(record.total_tokens, Some(2000));
        assert!(!record.usage_estimated);
        let cost = record.estimated_cost_usd.unwrap();
        assert!((cost - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unknown_price_stays_unknown() {
        let (client, _) = client();
        let records = client
            .dispatch("2+2?", &[target("mystery")], GenerationParameters::default(), false, None)
            .await;
        assert_eq!(records[0].status, ResultStatus::Success);
        assert_eq!(records[0].estimated_cost_usd, None);
    }

    #[tokio::test]
    async fn partial_failure_keeps_text_without_cost() {
        let (client, _) = client();
        let records = client
            .dispatch("explain", &[target("partial")], GenerationParameters::default(), true, None)
            .await;
        let record = &records[0];
        assert_eq!(record.status, ResultStatus::Error);
        assert!(record.is_partial);
        assert_eq!(record.text.as_deref(), Some("half an ans"));
        assert_eq!(record.estimated_cost_usd, None);
        assert!(record.usage_estimated);
        assert_eq!(record.output_tokens, Some(3));
        let diagnostic = record.diagnostic.as_ref().unwrap();
        assert_eq!(diagnostic.category, Some(ErrorCategory::Network));
        assert!(diagnostic.is_retryable);
    }

    #[tokio::test]
    async fn empty_response_is_a_warning_with_cost() {
        let (client, _) = client();
        let records = client
            .dispatch("hi", &[target("empty")], GenerationParameters::default(), false, None)
            .await;
        assert_eq!(records[0].status, ResultStatus::Warning);
        assert_eq!(records[0].text, None);
        assert!(records[0].usage_estimated);
    }

    #[tokio::test]
    async fn unregistered_provider_degrades_to_error_record() {
        let (client, provider) = client();
        let gemini = RequestTarget::new(ProviderKind::Gemini, "gemini-2.0-flash").with_credential("k");
        let records = client
            .dispatch("hi", &[gemini], GenerationParameters::default(), false, None)
            .await;
        assert_eq!(records[0].status, ResultStatus::Error);
        assert_eq!(
            records[0].diagnostic.as_ref().unwrap().category,
            Some(ErrorCategory::InvalidRequest)
        );
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn result_set_replace_is_scoped_to_one_target() {
        let record = |model: &str, status| ResultRecord {
            model: model.into(),
            model_id: model.into(),
            provider: ProviderKind::OpenAi,
            context_window: 0,
            timestamp: Utc::now(),
            latency_ms: 1.0,
            text: None,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            estimated_cost_usd: None,
            status,
            diagnostic: None,
            is_partial: false,
            usage_estimated: false,
        };
        let mut set = ResultSet::new(vec![
            record("a", ResultStatus::Success),
            record("b", ResultStatus::Error),
        ]);
        set.replace(record("b", ResultStatus::Success));
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[1].status, ResultStatus::Success);
        assert_eq!(set.count(ResultStatus::Error), 0);

        set.replace(record("c", ResultStatus::Warning));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn same_model_under_two_names_keeps_two_entries() {
        let record = |name: &str, status| ResultRecord {
            model: name.into(),
            model_id: "gpt-4o".into(),
            provider: ProviderKind::OpenAi,
            context_window: 0,
            timestamp: Utc::now(),
            latency_ms: 1.0,
            text: None,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            estimated_cost_usd: None,
            status,
            diagnostic: None,
            is_partial: false,
            usage_estimated: false,
        };
        let mut set = ResultSet::new(vec![
            record("GPT-4o", ResultStatus::Success),
            record("GPT-4o (creative)", ResultStatus::Error),
        ]);
        set.replace(record("GPT-4o (creative)", ResultStatus::Success));

        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].model, "GPT-4o");
        assert_eq!(set.records()[1].status, ResultStatus::Success);

        let creative = RequestTarget::new(ProviderKind::OpenAi, "gpt-4o").with_display_name("GPT-4o (creative)");
        assert_eq!(set.get(&creative).map(|r| r.model.as_str()), Some("GPT-4o (creative)"));
    }
}
