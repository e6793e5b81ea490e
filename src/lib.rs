//! Fan one prompt out to several LLM providers and compare normalized results.

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod http;
pub mod metrics;
pub mod pricing;
pub mod provider;
pub mod stream;
pub mod types;

pub use client::{ArenaClient, ResultSet};
pub use error::{ErrorCategory, LLMError};
pub use provider::LLMProvider;
pub use types::*;
