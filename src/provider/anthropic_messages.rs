//! Anthropic Messages (`/v1/messages`).

mod error;
mod models;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::AnthropicMessagesProvider;
