//! OpenAI Chat Completions (`/v1/chat/completions`, `/v1/models`).

mod error;
mod models;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::OpenAiChatProvider;
