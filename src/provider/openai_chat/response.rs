use crate::types::{AssembledResponse, FinishReason};

use super::types::OpenAiChatResponse;

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolUse,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Only the first choice is read; the request never asks for `n > 1`.
pub(crate) fn map_response(response: OpenAiChatResponse) -> AssembledResponse {
    let choice = response.choices.into_iter().next();
    let terminal_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
    let text = choice
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();

    AssembledResponse {
        text,
        input_tokens: response.usage.and_then(|u| u.prompt_tokens),
        output_tokens: response.usage.and_then(|u| u.completion_tokens),
        finish_reason: terminal_reason.as_deref().map(convert_finish_reason),
        terminal_reason,
        streamed: false,
    }
}
