use crate::types::{AssembledResponse, FinishReason};

use super::types::AnthropicMessageResponse;

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "refusal" => FinishReason::ContentFilter,
        "tool_use" => FinishReason::ToolUse,
        other => FinishReason::Other(other.to_string()),
    }
}

pub(crate) fn map_response(response: AnthropicMessageResponse) -> AssembledResponse {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    AssembledResponse {
        text,
        input_tokens: response.usage.and_then(|u| u.input_tokens),
        output_tokens: response.usage.and_then(|u| u.output_tokens),
        finish_reason: response.stop_reason.as_deref().map(convert_finish_reason),
        terminal_reason: response.stop_reason,
        streamed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::parse_json;

    #[test]
    fn joins_text_blocks_and_reads_usage() {
        let body = r#"{
  "id": "msg_01",
  "type": "message",
  "role": "assistant",
  "model": "claude-3-5-sonnet-20241022",
  "content": [
    {"type": "thinking", "thinking": "hmm"},
    {"type": "text", "text": "Hello"},
    {"type": "text", "text": ", world"}
  ],
  "stop_reason": "end_turn",
  "stop_sequence": null,
  "usage": {"input_tokens": 10, "output_tokens": 4}
}"#;
        let response = map_response(parse_json("anthropic_messages", body).unwrap());
        assert_eq!(response.text, "Hello, world");
        assert_eq!(response.input_tokens, Some(10));
        assert_eq!(response.output_tokens, Some(4));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn convert_finish_reason_variants() {
        assert_eq!(convert_finish_reason("stop_sequence"), FinishReason::Stop);
        assert_eq!(convert_finish_reason("max_tokens"), FinishReason::Length);
        assert_eq!(convert_finish_reason("refusal"), FinishReason::ContentFilter);
        assert_eq!(
            convert_finish_reason("pause_turn"),
            FinishReason::Other("pause_turn".into())
        );
    }
}
