use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{DomainError, SearchHit, SearchProvider};
use crate::infrastructure::llm::HttpClientTrait;

pub const DEFAULT_SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Serper (Google search) provider
#[derive(Debug)]
pub struct SerperSearchProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    endpoint: String,
}

impl<C: HttpClientTrait> SerperSearchProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_endpoint(client, api_key, DEFAULT_SERPER_ENDPOINT)
    }

    pub fn with_endpoint(
        client: C,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("X-API-KEY", self.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(
        json: serde_json::Value,
        count: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let response: SerperResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("serper", format!("Failed to parse response: {}", e))
        })?;

        Ok(response
            .organic
            .into_iter()
            .filter_map(|item| {
                let url = item.link.filter(|link| !link.trim().is_empty())?;
                Some(SearchHit::new(
                    item.title.unwrap_or_default(),
                    url,
                    item.snippet.unwrap_or_default(),
                ))
            })
            .take(count)
            .collect())
    }
}

#[async_trait]
impl<C: HttpClientTrait> SearchProvider for SerperSearchProvider<C> {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, DomainError> {
        let body = serde_json::json!({ "q": query, "num": count });

        let response = self
            .client
            .post_json(&self.endpoint, self.headers(), &body)
            .await
            .map_err(|e| e.with_provider(self.provider_name()))?;

        Self::parse_response(response, count)
    }

    fn provider_name(&self) -> &'static str {
        "serper"
    }
}

// Serper API types

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}
