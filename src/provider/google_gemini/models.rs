use crate::provider::DEFAULT_CONTEXT_WINDOW;
use crate::types::{ModelDescriptor, ProviderKind};

use super::request::normalize_model;
use super::types::GeminiModelList;

const GENERATE_CONTENT: &str = "generateContent";

/// Offered when the catalog cannot be reached, e.g. before a key is configured.
const FALLBACK_MODELS: [(&str, &str, u64); 5] = [
    ("gemini-2.5-pro", "Gemini 2.5 Pro", 1_048_576),
    ("gemini-2.5-flash", "Gemini 2.5 Flash", 1_048_576),
    ("gemini-2.0-flash", "Gemini 2.0 Flash", 1_048_576),
    ("gemini-1.5-pro", "Gemini 1.5 Pro", 2_097_152),
    ("gemini-1.5-flash", "Gemini 1.5 Flash", 1_048_576),
];

pub(crate) fn fallback_models() -> Vec<ModelDescriptor> {
    FALLBACK_MODELS
        .iter()
        .map(|(id, name, context_window)| ModelDescriptor {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            provider: ProviderKind::Gemini,
            context_window: *context_window,
            description: None,
        })
        .collect()
}

/// Keeps catalog entries that support `generateContent`.
pub(crate) fn descriptors_from_catalog(list: GeminiModelList) -> Vec<ModelDescriptor> {
    list.models
        .into_iter()
        .filter(|entry| {
            entry
                .supported_generation_methods
                .iter()
                .any(|method| method == GENERATE_CONTENT)
        })
        .map(|entry| {
            let id = normalize_model(&entry.name).to_string();
            ModelDescriptor {
                display_name: entry.display_name.unwrap_or_else(|| id.clone()),
                provider: ProviderKind::Gemini,
                context_window: entry.input_token_limit.unwrap_or(DEFAULT_CONTEXT_WINDOW),
                description: entry.description,
                id,
            }
        })
        .collect()
}
