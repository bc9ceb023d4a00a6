use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::http_client::HttpClient;
use super::OpenAiProvider;
use crate::domain::{DomainError, LlmProvider};

/// Supported language model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LlmProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
}

/// LLM provider configuration
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub kind: LlmProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl LlmProviderConfig {
    pub fn new(kind: LlmProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            base_url: None,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an LLM provider from configuration
    pub fn create(config: &LlmProviderConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        if config.api_key.trim().is_empty() {
            return Err(DomainError::configuration("LLM API key is empty"));
        }

        let http_client = match config.timeout {
            Some(timeout) => HttpClient::with_timeout(timeout)?,
            None => HttpClient::new(),
        };

        match config.kind {
            LlmProviderKind::OpenAi => {
                let provider = match &config.base_url {
                    Some(base_url) => {
                        OpenAiProvider::with_base_url(http_client, &config.api_key, base_url)
                    }
                    None => OpenAiProvider::new(http_client, &config.api_key),
                };
                Ok(Arc::new(provider))
            }
        }
    }
}
