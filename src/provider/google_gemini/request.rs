use crate::types::PromptRequest;

use super::types::{
    GeminiGenerateContentBody, GeminiGenerationConfig, GeminiRequestContent, GeminiRequestPart,
};

/// Strips the `models/` resource prefix catalog ids carry.
pub(crate) fn normalize_model(model: &str) -> &str {
    model.trim().trim_start_matches("models/")
}

pub(crate) fn build_gemini_body(request: &PromptRequest) -> GeminiGenerateContentBody<'_> {
    let params = request.params.normalized();
    GeminiGenerateContentBody {
        contents: vec![GeminiRequestContent {
            role: "user",
            parts: vec![GeminiRequestPart {
                text: &request.prompt,
            }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
        },
    }
}
