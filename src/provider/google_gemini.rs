//! Google Gemini GenerateContent (`/v1beta/models`).

mod error;
mod models;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::GoogleGeminiProvider;
