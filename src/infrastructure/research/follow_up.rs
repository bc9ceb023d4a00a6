//! Follow-up question stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::validation::distinct_entries;
use crate::domain::{
    LanguageModel, LlmJsonSchema, PipelineStage, PipelineState, Prompt, Stage, StageContext,
    StageError, StageOutput, StructuredOutput,
};

const SYSTEM_PROMPT: &str = "Generate thoughtful follow-up questions that would deepen the \
user's understanding or cover aspects the research summary left out. Be concise and give each \
question a short rationale.";

#[derive(Debug, Deserialize)]
struct FollowUpQuestions {
    questions: Vec<FollowUpQuestion>,
}

#[derive(Debug, Deserialize)]
struct FollowUpQuestion {
    question: String,
    #[serde(default)]
    rationale: String,
}

impl StructuredOutput for FollowUpQuestions {
    fn json_schema() -> LlmJsonSchema {
        LlmJsonSchema::new(
            "follow_up_questions",
            json!({
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "question": {"type": "string"},
                                "rationale": {"type": "string"}
                            },
                            "required": ["question", "rationale"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["questions"],
                "additionalProperties": false
            }),
        )
    }
}

/// Proposes `follow_up_count` questions from a completed summary
#[derive(Debug, Clone)]
pub struct FollowUpStage {
    model: LanguageModel,
}

impl FollowUpStage {
    pub fn new(model: LanguageModel) -> Self {
        Self { model }
    }

    fn prompt(question: &str, summary: &str, count: usize) -> Prompt {
        Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "Original question: {}\n\nResearch summary: {}\n\n\
                 Generate EXACTLY {} follow-up questions.",
                question, summary, count
            ),
        )
    }
}

#[async_trait]
impl PipelineStage for FollowUpStage {
    fn stage(&self) -> Stage {
        Stage::FollowUp
    }

    async fn execute(&self, state: &mut PipelineState, ctx: &StageContext) {
        let count = ctx.config().follow_up_count;

        // Degraded summaries (no results, failed synthesis) carry nothing to build on
        let prompt = match state.summary() {
            StageOutput::Complete(summary) if summary.has_text() => {
                Some(Self::prompt(state.question(), &summary.text, count))
            }
            _ => None,
        };

        let Some(prompt) = prompt else {
            info!("No usable summary, skipping follow-up questions");
            state.set_follow_up_questions(StageOutput::Degraded(Vec::new()));
            return;
        };

        let result = ctx
            .bounded(
                self.model.provider_name(),
                self.model.complete::<FollowUpQuestions>(&prompt),
            )
            .await
            .and_then(|output| {
                for q in &output.questions {
                    debug!(question = %q.question, rationale = %q.rationale, "Proposed follow-up");
                }
                distinct_entries(
                    output.questions.into_iter().map(|q| q.question),
                    count,
                    "follow-up questions",
                )
            });

        match result {
            Ok(questions) => {
                info!(count = questions.len(), "Generated follow-up questions");
                state.set_follow_up_questions(StageOutput::Complete(questions));
            }
            Err(e) => {
                warn!(error = %e, "Follow-up generation failed");
                state.record_error(StageError::from_error(Stage::FollowUp, &e));
                state.set_follow_up_questions(StageOutput::Degraded(Vec::new()));
            }
        }
    }

    fn skip(&self, state: &mut PipelineState) {
        state.set_follow_up_questions(StageOutput::Degraded(Vec::new()));
    }
}
