use async_trait::async_trait;
use std::fmt::Debug;

use super::SearchHit;
use crate::domain::DomainError;

/// Trait for web search providers
#[async_trait]
pub trait SearchProvider: Send + Sync + Debug {
    /// Search for `query`, returning at most `count` hits in ranking order
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock search provider scripted per query
    ///
    /// Queries without a scripted answer return no hits, or the default error
    /// when one is set.
    #[derive(Debug, Default)]
    pub struct MockSearchProvider {
        hits: HashMap<String, Vec<SearchHit>>,
        errors: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        default_error: Option<String>,
        default_delay: Option<Duration>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl MockSearchProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
            self.hits.insert(query.to_string(), hits);
            self
        }

        pub fn with_error(mut self, query: &str, error: impl Into<String>) -> Self {
            self.errors.insert(query.to_string(), error.into());
            self
        }

        pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
            self.delays.insert(query.to_string(), delay);
            self
        }

        pub fn failing(mut self, error: impl Into<String>) -> Self {
            self.default_error = Some(error.into());
            self
        }

        pub fn hanging(mut self, delay: Duration) -> Self {
            self.default_delay = Some(delay);
            self
        }

        pub fn calls(&self) -> Vec<(String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for MockSearchProvider {
        async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, DomainError> {
            self.calls.lock().unwrap().push((query.to_string(), count));

            if let Some(delay) = self.delays.get(query).or(self.default_delay.as_ref()) {
                tokio::time::sleep(*delay).await;
            }

            if let Some(error) = self.errors.get(query).or(self.default_error.as_ref()) {
                return Err(DomainError::provider("mock", error));
            }

            Ok(self.hits.get(query).cloned().unwrap_or_default())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}
