//! Synthesis stage

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{
    DomainError, LanguageModel, LlmJsonSchema, PipelineStage, PipelineState, Prompt, SearchHit,
    Stage, StageContext, StageError, StageOutput, StructuredOutput, Summary,
};

const SYSTEM_PROMPT: &str = "You synthesise multiple sources into a clear, cited answer. \
Highlight key insights. In sources_consulted list the exact URLs of the search results you \
relied on, copied verbatim from the input.";

#[derive(Debug, Deserialize)]
struct ResearchSummary {
    summary: String,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    sources_consulted: Vec<String>,
}

impl StructuredOutput for ResearchSummary {
    fn json_schema() -> LlmJsonSchema {
        LlmJsonSchema::new(
            "research_summary",
            json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "key_insights": {"type": "array", "items": {"type": "string"}},
                    "sources_consulted": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["summary", "key_insights", "sources_consulted"],
                "additionalProperties": false
            }),
        )
    }
}

/// Produces a cited summary of the merged search results
#[derive(Debug, Clone)]
pub struct SynthesisStage {
    model: LanguageModel,
}

impl SynthesisStage {
    pub fn new(model: LanguageModel) -> Self {
        Self { model }
    }

    fn prompt(question: &str, hits: &[SearchHit]) -> Prompt {
        let formatted: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "Source {}: {}\nURL: {}\nContent: {}\n",
                    i + 1,
                    hit.title,
                    hit.url,
                    hit.snippet
                )
            })
            .collect();

        Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "User question: {}\n\nSearch results:\n{}",
                question,
                formatted.join("\n")
            ),
        )
    }
}

/// Validate model output and keep only citations present in the input
fn contain_citations(
    output: ResearchSummary,
    known_urls: &BTreeSet<String>,
) -> Result<Summary, DomainError> {
    let text = output.summary.trim();

    if text.is_empty() {
        return Err(DomainError::schema_validation("summary text is empty"));
    }

    let claimed = output.sources_consulted.len();
    let cited_sources: BTreeSet<String> = output
        .sources_consulted
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| known_urls.contains(url))
        .collect();

    if cited_sources.len() < claimed {
        debug!(
            claimed,
            kept = cited_sources.len(),
            "Dropped citations not present in search results"
        );
    }

    Ok(Summary {
        text: text.to_string(),
        key_insights: output
            .key_insights
            .into_iter()
            .map(|insight| insight.trim().to_string())
            .filter(|insight| !insight.is_empty())
            .collect(),
        cited_sources,
    })
}

#[async_trait]
impl PipelineStage for SynthesisStage {
    fn stage(&self) -> Stage {
        Stage::Synthesis
    }

    async fn execute(&self, state: &mut PipelineState, ctx: &StageContext) {
        let hits: &[SearchHit] = state
            .search_results()
            .value()
            .map(Vec::as_slice)
            .unwrap_or_default();

        if hits.is_empty() {
            info!("No search results, skipping synthesis");
            state.set_summary(StageOutput::Degraded(Summary::no_results()));
            return;
        }

        let prompt = Self::prompt(state.question(), hits);
        let known_urls: BTreeSet<String> = hits.iter().map(|h| h.url.clone()).collect();

        info!(sources = hits.len(), "Synthesizing research summary");

        let result = ctx
            .bounded(
                self.model.provider_name(),
                self.model.complete::<ResearchSummary>(&prompt),
            )
            .await
            .and_then(|output| contain_citations(output, &known_urls));

        match result {
            Ok(summary) => {
                info!(
                    length = summary.text.len(),
                    citations = summary.cited_sources.len(),
                    "Summary generated"
                );
                state.set_summary(StageOutput::Complete(summary));
            }
            Err(e) => {
                warn!(error = %e, "Synthesis failed");
                state.record_error(StageError::from_error(Stage::Synthesis, &e));
                state.set_summary(StageOutput::Degraded(Summary::empty()));
            }
        }
    }

    fn skip(&self, state: &mut PipelineState) {
        state.set_summary(StageOutput::Degraded(Summary::empty()));
    }
}
