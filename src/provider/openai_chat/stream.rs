use crate::stream::{DecodedLine, LineDecoder, sse_data};
use crate::types::{StreamEvent, UsageMode};

use super::error::error_from_detail;
use super::types::OpenAiChatChunk;

const DONE_SENTINEL: &str = "[DONE]";

/// Decodes `data:` lines of a Chat Completions event stream.
#[derive(Debug, Default)]
pub(crate) struct OpenAiChatDecoder;

impl LineDecoder for OpenAiChatDecoder {
    fn decode_line(&mut self, line: &str) -> DecodedLine {
        let Some(data) = sse_data(line) else {
            return DecodedLine::Ignored;
        };
        if data == DONE_SENTINEL {
            return DecodedLine::Done;
        }

        let chunk: OpenAiChatChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => return DecodedLine::Malformed(err.to_string()),
        };
        if let Some(detail) = chunk.error {
            return DecodedLine::Failed(error_from_detail(None, &detail, None));
        }

        let mut events = Vec::new();
        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(text) = choice.delta.and_then(|delta| delta.content) {
                events.push(StreamEvent::ContentDelta { text });
            }
            if choice.finish_reason.is_some() {
                events.push(StreamEvent::TerminalReason {
                    reason: choice.finish_reason,
                });
            }
        }
        // With `include_usage` the last chunk carries totals and an empty `choices`.
        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::UsageUpdate {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                mode: UsageMode::Cumulative,
            });
        }
        DecodedLine::Events(events)
    }
}
