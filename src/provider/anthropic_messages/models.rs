use crate::types::{ModelDescriptor, ProviderKind};

/// Models offered without a catalog call, newest first.
const KNOWN_MODELS: [(&str, &str, &str); 7] = [
    ("claude-opus-4-20250514", "Claude Opus 4", "Most capable model for complex reasoning"),
    ("claude-sonnet-4-20250514", "Claude Sonnet 4", "Balanced intelligence and speed"),
    ("claude-3-7-sonnet-latest", "Claude 3.7 Sonnet", "Extended thinking capable Sonnet"),
    ("claude-3-5-sonnet-latest", "Claude 3.5 Sonnet", "Strong general purpose model"),
    ("claude-3-5-haiku-latest", "Claude 3.5 Haiku", "Fastest current model"),
    ("claude-3-opus-latest", "Claude 3 Opus", "Previous generation flagship"),
    ("claude-3-haiku-20240307", "Claude 3 Haiku", "Compact, low latency model"),
];

/// Context window by model-name substring; first match wins.
const CONTEXT_WINDOWS: [(&str, u64); 5] = [
    ("claude-2.1", 200_000),
    ("claude-2", 100_000),
    ("claude-instant", 100_000),
    ("claude-3", 200_000),
    ("claude-", 200_000),
];

const FALLBACK_CONTEXT_WINDOW: u64 = 200_000;

pub(crate) fn context_window_for(model_id: &str) -> u64 {
    CONTEXT_WINDOWS
        .iter()
        .find(|(needle, _)| model_id.contains(needle))
        .map_or(FALLBACK_CONTEXT_WINDOW, |(_, tokens)| *tokens)
}

pub(crate) fn known_models() -> Vec<ModelDescriptor> {
    KNOWN_MODELS
        .iter()
        .map(|(id, name, description)| ModelDescriptor {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            provider: ProviderKind::Anthropic,
            context_window: context_window_for(id),
            description: Some((*description).to_string()),
        })
        .collect()
}
