//! Search execution stage

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::domain::{
    DomainError, PipelineStage, PipelineState, SearchHit, SearchProvider, Stage, StageContext,
    StageError, StageOutput,
};

/// Runs one search per query and merges the hits
///
/// Queries fan out through a bounded pool; results are merged in query
/// submission order regardless of which call finishes first.
#[derive(Debug, Clone)]
pub struct SearchExecutionStage {
    provider: Arc<dyn SearchProvider>,
}

impl SearchExecutionStage {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    async fn search_all(
        &self,
        queries: Vec<String>,
        ctx: &StageContext,
    ) -> Vec<(String, Result<Vec<SearchHit>, DomainError>)> {
        let count = ctx.config().results_per_query;
        let provider_name = self.provider.provider_name();

        // `buffered` keeps input order, which gives the stable merge
        stream::iter(queries)
            .map(|query| async move {
                let result = ctx
                    .bounded(provider_name, self.provider.search(&query, count))
                    .await;
                (query, result)
            })
            .buffered(ctx.config().search_concurrency())
            .collect()
            .await
    }
}

/// Concatenate hits and drop repeated URLs, keeping the first occurrence
pub fn merge_by_url(hits: impl IntoIterator<Item = SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();

    hits.into_iter()
        .filter(|hit| seen.insert(hit.url.clone()))
        .collect()
}

#[async_trait]
impl PipelineStage for SearchExecutionStage {
    fn stage(&self) -> Stage {
        Stage::Search
    }

    async fn execute(&self, state: &mut PipelineState, ctx: &StageContext) {
        let queries = state.queries_or_question();
        let count = ctx.config().results_per_query;

        info!(queries = queries.len(), per_query = count, "Executing web searches");

        let outcomes = self.search_all(queries, ctx).await;
        let mut hits = Vec::new();
        let mut failed = 0usize;

        for (query, result) in outcomes {
            match result {
                Ok(found) => {
                    debug!(query = %query, found = found.len(), "Search returned");
                    hits.extend(found.into_iter().take(count));
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed");
                    failed += 1;
                    state.record_error(StageError::new(
                        Stage::Search,
                        e.kind(),
                        format!("query '{}': {}", query, e),
                    ));
                }
            }
        }

        let total = hits.len();
        let merged = merge_by_url(hits);

        info!(
            collected = total,
            unique = merged.len(),
            failed,
            "Search results merged"
        );

        if failed == 0 {
            state.set_search_results(StageOutput::Complete(merged));
        } else {
            state.set_search_results(StageOutput::Degraded(merged));
        }
    }

    fn skip(&self, state: &mut PipelineState) {
        state.set_search_results(StageOutput::Degraded(Vec::new()));
    }
}
