//! LLM provider implementations

mod factory;
mod http_client;
mod openai;

pub use factory::{LlmProviderConfig, LlmProviderFactory, LlmProviderKind};
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiProvider;

#[cfg(test)]
pub use http_client::mock;
