use crate::stream::ResponseAssembler;
use crate::types::{AssembledResponse, FinishReason, StreamEvent, UsageMode};

use super::types::GeminiGenerateContentResponse;

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        // Safety, recitation and policy blocks, including prompt-level block reasons.
        "SAFETY" | "RECITATION" | "LANGUAGE" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
        | "IMAGE_SAFETY" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Events carried by one GenerateContent payload, in wire order.
///
/// Only the first candidate is read; `candidateCount` is never raised.
pub(crate) fn response_events(response: GeminiGenerateContentResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(candidate) = response.candidates.into_iter().next() {
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        events.extend(
            parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .map(|text| StreamEvent::ContentDelta { text }),
        );
        if candidate.finish_reason.is_some() {
            events.push(StreamEvent::TerminalReason {
                reason: candidate.finish_reason,
            });
        }
    }

    // A blocked prompt yields no candidates at all.
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        events.push(StreamEvent::TerminalReason {
            reason: Some(reason),
        });
    }

    if let Some(usage) = response.usage_metadata {
        events.push(StreamEvent::UsageUpdate {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            mode: UsageMode::Cumulative,
        });
    }

    events
}

pub(crate) fn map_response(response: GeminiGenerateContentResponse) -> AssembledResponse {
    let mut assembler = ResponseAssembler::new(false);
    for event in response_events(response) {
        assembler.apply(event);
    }
    let mut assembled = assembler.finish();
    assembled.finish_reason = assembled.terminal_reason.as_deref().map(convert_finish_reason);
    assembled
}
