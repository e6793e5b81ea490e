use crate::types::PromptRequest;

use super::types::{AnthropicMessage, AnthropicMessagesBody};

/// `max_tokens` is mandatory for the Messages API, so it is always sent.
pub(crate) fn build_anthropic_body(request: &PromptRequest, stream: bool) -> AnthropicMessagesBody<'_> {
    let params = request.params.normalized();
    AnthropicMessagesBody {
        model: &request.model_id,
        max_tokens: params.max_output_tokens,
        temperature: params.temperature,
        messages: vec![AnthropicMessage {
            role: "user",
            content: &request.prompt,
        }],
        stream,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::types::GenerationParameters;

    #[test]
    fn body_carries_single_user_turn_and_limits() {
        let request = PromptRequest {
            model_id: "claude-3-5-haiku-latest".into(),
            prompt: "Say OK".into(),
            params: GenerationParameters {
                temperature: 3.0,
                max_output_tokens: 0,
            },
            credential: "key".into(),
            on_delta: None,
        };
        let body: Value = serde_json::to_value(build_anthropic_body(&request, true)).unwrap();
        assert_eq!(body["model"], "claude-3-5-haiku-latest");
        assert_eq!(body["max_tokens"], 1);
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Say OK");
        assert_eq!(body["stream"], true);

        let body: Value = serde_json::to_value(build_anthropic_body(&request, false)).unwrap();
        assert!(body.get("stream").is_none());
    }
}
