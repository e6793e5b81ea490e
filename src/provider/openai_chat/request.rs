use crate::types::PromptRequest;

use super::types::{OpenAiChatBody, OpenAiMessage, OpenAiStreamOptions};

/// `o1`, `o3` and `o4` families only accept the default temperature and count
/// reasoning tokens against `max_completion_tokens`.
pub(crate) fn is_reasoning_model(model: &str) -> bool {
    let model = model.rsplit('/').next().unwrap_or(model);
    ["o1", "o3", "o4"].iter().any(|family| {
        model == *family
            || model
                .strip_prefix(family)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}

pub(crate) fn build_openai_body(request: &PromptRequest, stream: bool) -> OpenAiChatBody<'_> {
    let params = request.params.normalized();
    let reasoning = is_reasoning_model(&request.model_id);

    OpenAiChatBody {
        model: &request.model_id,
        messages: vec![OpenAiMessage {
            role: "user",
            content: &request.prompt,
        }],
        temperature: (!reasoning).then_some(params.temperature),
        max_tokens: (!reasoning).then_some(params.max_output_tokens),
        max_completion_tokens: reasoning.then_some(params.max_output_tokens),
        stream,
        stream_options: stream.then_some(OpenAiStreamOptions {
            include_usage: true,
        }),
    }
}
