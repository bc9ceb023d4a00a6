use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::serper::{SerperSearchProvider, DEFAULT_SERPER_ENDPOINT};
use crate::domain::{DomainError, SearchProvider};
use crate::infrastructure::llm::HttpClient;

/// Supported web search backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchProviderKind {
    #[default]
    Serper,
}

/// Search provider configuration
#[derive(Debug, Clone)]
pub struct SearchProviderConfig {
    pub kind: SearchProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

impl SearchProviderConfig {
    pub fn new(kind: SearchProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            endpoint: None,
            timeout: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Factory for creating search providers
#[derive(Debug)]
pub struct SearchProviderFactory;

impl SearchProviderFactory {
    pub fn create(config: &SearchProviderConfig) -> Result<Arc<dyn SearchProvider>, DomainError> {
        if config.api_key.trim().is_empty() {
            return Err(DomainError::configuration("search API key is empty"));
        }

        let http_client = match config.timeout {
            Some(timeout) => HttpClient::with_timeout(timeout)?,
            None => HttpClient::new(),
        };

        match config.kind {
            SearchProviderKind::Serper => {
                let endpoint = config.endpoint.as_deref().unwrap_or(DEFAULT_SERPER_ENDPOINT);
                Ok(Arc::new(SerperSearchProvider::with_endpoint(
                    http_client,
                    &config.api_key,
                    endpoint,
                )))
            }
        }
    }
}
