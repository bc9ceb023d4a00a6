//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Counts and limits for one research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of search queries generated from the question
    #[serde(default = "default_query_count")]
    pub query_count: usize,
    /// Hits requested from the search provider per query
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
    /// Number of follow-up questions generated from the summary
    #[serde(default = "default_follow_up_count")]
    pub follow_up_count: usize,
    /// Upper bound for every capability call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Concurrent search calls; defaults to one slot per query
    #[serde(default)]
    pub max_concurrent_searches: Option<usize>,
}

fn default_query_count() -> usize {
    3
}

fn default_results_per_query() -> usize {
    5
}

fn default_follow_up_count() -> usize {
    2
}

fn default_timeout_ms() -> u64 {
    30000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query_count: default_query_count(),
            results_per_query: default_results_per_query(),
            follow_up_count: default_follow_up_count(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_searches: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_query_count(mut self, count: usize) -> Self {
        self.query_count = count;
        self
    }

    pub fn with_results_per_query(mut self, count: usize) -> Self {
        self.results_per_query = count;
        self
    }

    pub fn with_follow_up_count(mut self, count: usize) -> Self {
        self.follow_up_count = count;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrent_searches(mut self, limit: usize) -> Self {
        self.max_concurrent_searches = Some(limit);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective size of the search worker pool
    pub fn search_concurrency(&self) -> usize {
        self.max_concurrent_searches
            .unwrap_or(self.query_count)
            .max(1)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.query_count == 0 {
            return Err(DomainError::configuration("query_count must be at least 1"));
        }

        if self.results_per_query == 0 {
            return Err(DomainError::configuration(
                "results_per_query must be at least 1",
            ));
        }

        if self.follow_up_count == 0 {
            return Err(DomainError::configuration(
                "follow_up_count must be at least 1",
            ));
        }

        if self.timeout_ms == 0 {
            return Err(DomainError::configuration("timeout_ms must be positive"));
        }

        if self.max_concurrent_searches == Some(0) {
            return Err(DomainError::configuration(
                "max_concurrent_searches must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();

        assert_eq!(config.query_count, 3);
        assert_eq!(config.results_per_query, 5);
        assert_eq!(config.follow_up_count, 2);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.search_concurrency(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"query_count": 4, "max_concurrent_searches": 2}"#).unwrap();

        assert_eq!(config.query_count, 4);
        assert_eq!(config.results_per_query, 5);
        assert_eq!(config.search_concurrency(), 2);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(PipelineConfig::default().with_query_count(0).validate().is_err());
        assert!(PipelineConfig::default().with_timeout_ms(0).validate().is_err());
        assert!(PipelineConfig::default()
            .with_max_concurrent_searches(0)
            .validate()
            .is_err());
    }
}
