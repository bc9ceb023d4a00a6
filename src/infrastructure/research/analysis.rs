//! Query analysis stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::validation::distinct_entries;
use crate::domain::{
    LanguageModel, LlmJsonSchema, PipelineStage, PipelineState, Prompt, Stage, StageContext,
    StageError, StageOutput, StructuredOutput,
};

const SYSTEM_PROMPT: &str = "You break down research questions into diverse, precise web-search \
queries. Cover the most important angles of the topic. Each query should be concise, relevant \
and designed to yield useful search results. Give each query a short rationale explaining why \
it is useful.";

#[derive(Debug, Deserialize)]
struct SearchQueries {
    queries: Vec<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
    #[serde(default)]
    rationale: String,
}

impl StructuredOutput for SearchQueries {
    fn json_schema() -> LlmJsonSchema {
        LlmJsonSchema::new(
            "search_queries",
            json!({
                "type": "object",
                "properties": {
                    "queries": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "query": {"type": "string", "description": "Search query text"},
                                "rationale": {
                                    "type": "string",
                                    "description": "Why this query is useful"
                                }
                            },
                            "required": ["query", "rationale"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["queries"],
                "additionalProperties": false
            }),
        )
    }
}

/// Turns the raw question into `query_count` targeted search queries
///
/// Falls back to searching the question verbatim when the model fails.
#[derive(Debug, Clone)]
pub struct QueryAnalysisStage {
    model: LanguageModel,
}

impl QueryAnalysisStage {
    pub fn new(model: LanguageModel) -> Self {
        Self { model }
    }

    fn prompt(question: &str, count: usize) -> Prompt {
        Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "User question: {}\n\nGenerate EXACTLY {} distinct search queries.",
                question, count
            ),
        )
    }
}

#[async_trait]
impl PipelineStage for QueryAnalysisStage {
    fn stage(&self) -> Stage {
        Stage::Analysis
    }

    async fn execute(&self, state: &mut PipelineState, ctx: &StageContext) {
        let question = state.question().to_string();
        let count = ctx.config().query_count;
        let prompt = Self::prompt(&question, count);

        let result = ctx
            .bounded(
                self.model.provider_name(),
                self.model.complete::<SearchQueries>(&prompt),
            )
            .await
            .and_then(|output| {
                for q in &output.queries {
                    debug!(query = %q.query, rationale = %q.rationale, "Proposed search query");
                }
                distinct_entries(
                    output.queries.into_iter().map(|q| q.query),
                    count,
                    "search queries",
                )
            });

        match result {
            Ok(queries) => {
                info!(count = queries.len(), "Generated search queries");
                state.set_search_queries(StageOutput::Complete(queries));
            }
            Err(e) => {
                warn!(error = %e, "Query analysis failed, searching the question verbatim");
                state.record_error(StageError::from_error(Stage::Analysis, &e));
                state.set_search_queries(StageOutput::Degraded(vec![question]));
            }
        }
    }

    fn skip(&self, state: &mut PipelineState) {
        let question = state.question().to_string();
        state.set_search_queries(StageOutput::Degraded(vec![question]));
    }
}
