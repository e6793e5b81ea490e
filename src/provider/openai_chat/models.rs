use crate::provider::DEFAULT_CONTEXT_WINDOW;
use crate::types::{ModelDescriptor, ProviderKind};

use super::types::OpenAiModelList;

const CHAT_PREFIXES: [&str; 5] = ["gpt-", "o1", "o3", "o4", "chatgpt-"];
const NON_CHAT_MARKERS: [&str; 8] = [
    "instruct",
    "audio",
    "realtime",
    "transcribe",
    "tts",
    "image",
    "search",
    "embedding",
];

/// Whether a catalog id belongs to a chat-capable family.
pub(crate) fn is_chat_model(id: &str) -> bool {
    CHAT_PREFIXES.iter().any(|prefix| id.starts_with(prefix))
        && !NON_CHAT_MARKERS.iter().any(|marker| id.contains(marker))
}

/// Filters the catalog to chat models, newest identifier first.
pub(crate) fn descriptors_from_catalog(list: OpenAiModelList) -> Vec<ModelDescriptor> {
    let mut models: Vec<ModelDescriptor> = list
        .data
        .into_iter()
        .filter(|entry| is_chat_model(&entry.id))
        .map(|entry| ModelDescriptor {
            display_name: entry.id.clone(),
            provider: ProviderKind::OpenAi,
            context_window: entry.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW),
            description: None,
            id: entry.id,
        })
        .collect();
    models.sort_by(|a, b| b.id.cmp(&a.id));
    models
}
