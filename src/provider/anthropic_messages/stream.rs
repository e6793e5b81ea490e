use crate::stream::{DecodedLine, LineDecoder, sse_data};
use crate::types::{StreamEvent, UsageMode};

use super::error::error_from_detail;
use super::types::AnthropicStreamEvent;

/// Decodes the typed envelopes of a Messages event stream.
///
/// The `event:` line is redundant with the payload's `type` field and is skipped.
#[derive(Debug, Default)]
pub(crate) struct AnthropicMessagesDecoder;

impl LineDecoder for AnthropicMessagesDecoder {
    fn decode_line(&mut self, line: &str) -> DecodedLine {
        let Some(data) = sse_data(line) else {
            return DecodedLine::Ignored;
        };
        let event: AnthropicStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(err) => return DecodedLine::Malformed(err.to_string()),
        };

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                let input_tokens = message.usage.and_then(|u| u.input_tokens);
                if input_tokens.is_none() {
                    return DecodedLine::Ignored;
                }
                DecodedLine::Events(vec![StreamEvent::UsageUpdate {
                    input_tokens,
                    output_tokens: None,
                    mode: UsageMode::Cumulative,
                }])
            }
            AnthropicStreamEvent::ContentBlockDelta { delta } => match delta.text {
                Some(text) if delta.kind == "text_delta" => {
                    DecodedLine::Events(vec![StreamEvent::ContentDelta { text }])
                }
                _ => DecodedLine::Ignored,
            },
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(output_tokens) = usage.and_then(|u| u.output_tokens) {
                    events.push(StreamEvent::UsageUpdate {
                        input_tokens: None,
                        output_tokens: Some(output_tokens),
                        mode: UsageMode::Incremental,
                    });
                }
                if let Some(reason) = delta.and_then(|d| d.stop_reason) {
                    events.push(StreamEvent::TerminalReason {
                        reason: Some(reason),
                    });
                }
                DecodedLine::Events(events)
            }
            AnthropicStreamEvent::MessageStop => DecodedLine::Done,
            AnthropicStreamEvent::Error { error } => {
                DecodedLine::Failed(error_from_detail(None, &error, None))
            }
            AnthropicStreamEvent::ContentBlockStart {}
            | AnthropicStreamEvent::ContentBlockStop {}
            | AnthropicStreamEvent::Ping => DecodedLine::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::error::{ErrorCategory, LLMError};
    use crate::http::HttpBodyStream;
    use crate::stream::{StreamDecoder, assemble};

    const TRANSCRIPT: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":\"claude-3-5-haiku-latest\",\"stop_reason\":null,\"usage\":{\"input_tokens\":11,\"output_tokens\":1}}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
event: ping\n\
data: {\"type\": \"ping\"}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Bonjour\"}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" à tous\"}}\n\n\
event: content_block_stop\n\
data: {\"type\":\"content_block_stop\",\"index\":0}\n\n\
event: message_delta\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\",\"stop_sequence\":null},\"usage\":{\"output_tokens\":6}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n\n";

    fn body(chunks: Vec<Vec<u8>>) -> HttpBodyStream {
        Box::pin(stream::iter(chunks.into_iter().map(Ok::<_, LLMError>).collect::<Vec<_>>()))
    }

    #[tokio::test]
    async fn assembles_typed_envelopes() {
        let decoder = StreamDecoder::new(
            body(vec![TRANSCRIPT.as_bytes().to_vec()]),
            AnthropicMessagesDecoder,
            "anthropic_messages",
        );
        let response = assemble(decoder, None).await.unwrap();
        assert_eq!(response.text, "Bonjour à tous");
        assert_eq!(response.input_tokens, Some(11));
        assert_eq!(response.output_tokens, Some(6));
        assert_eq!(response.terminal_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn split_inside_multibyte_character_is_harmless() {
        let bytes = TRANSCRIPT.as_bytes();
        let split = TRANSCRIPT.find('à').unwrap() + 1;
        let decoder = StreamDecoder::new(
            body(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]),
            AnthropicMessagesDecoder,
            "anthropic_messages",
        );
        assert_eq!(assemble(decoder, None).await.unwrap().text, "Bonjour à tous");
    }

    #[test]
    fn output_usage_is_incremental() {
        let mut decoder = AnthropicMessagesDecoder;
        match decoder.decode_line(r#"data: {"type":"message_delta","delta":{},"usage":{"output_tokens":3}}"#) {
            DecodedLine::Events(events) => assert_eq!(
                events,
                vec![StreamEvent::UsageUpdate {
                    input_tokens: None,
                    output_tokens: Some(3),
                    mode: UsageMode::Incremental,
                }]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overloaded_event_fails_with_category() {
        let mut decoder = AnthropicMessagesDecoder;
        match decoder.decode_line(
            r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ) {
            DecodedLine::Failed(err) => assert_eq!(err.category(), ErrorCategory::Overloaded),
            other => panic!("unexpected {other:?}"),
        }
    }
}
