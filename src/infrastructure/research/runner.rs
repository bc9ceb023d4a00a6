//! Pipeline runner implementation

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{FollowUpStage, QueryAnalysisStage, SearchExecutionStage, SynthesisStage};
use crate::domain::{
    DomainError, FailureKind, LanguageModel, PipelineConfig, PipelineStage, PipelineState,
    SearchProvider, Stage, StageContext, StageError,
};

/// Sequences the four research stages over one state
///
/// The runner only drives the state machine and hands the state from stage to
/// stage. It never retries and never fails: callers inspect
/// [`PipelineState::errors`] to detect partial failure.
#[derive(Debug)]
pub struct PipelineRunner {
    analysis: QueryAnalysisStage,
    search: SearchExecutionStage,
    synthesis: SynthesisStage,
    follow_up: FollowUpStage,
    config: PipelineConfig,
}

impl PipelineRunner {
    /// Create a runner; the same model handle backs every model-driven stage
    pub fn new(
        model: LanguageModel,
        search_provider: Arc<dyn SearchProvider>,
        config: PipelineConfig,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        Ok(Self {
            analysis: QueryAnalysisStage::new(model.clone()),
            search: SearchExecutionStage::new(search_provider),
            synthesis: SynthesisStage::new(model.clone()),
            follow_up: FollowUpStage::new(model),
            config,
        })
    }

    fn stage(&self, stage: Stage) -> &dyn PipelineStage {
        match stage {
            Stage::Analysis => &self.analysis,
            Stage::Search => &self.search,
            Stage::Synthesis => &self.synthesis,
            Stage::FollowUp => &self.follow_up,
        }
    }

    /// Answer `question`, running every stage to completion
    pub async fn run(&self, question: impl Into<String>) -> PipelineState {
        self.run_with_cancellation(question, CancellationToken::new())
            .await
    }

    /// Answer `question`, stopping at the next stage boundary once `cancellation` fires
    ///
    /// Stages skipped after cancellation still write their degraded outputs and
    /// one cancelled error each, so the returned state is always complete.
    pub async fn run_with_cancellation(
        &self,
        question: impl Into<String>,
        cancellation: CancellationToken,
    ) -> PipelineState {
        let mut state = PipelineState::new(question);
        let ctx = StageContext::new(self.config.clone(), cancellation);
        let span = info_span!("research_run", run_id = %state.run_id());

        async {
            info!(question = state.question(), "Starting research run");

            while let Some(stage) = state.advance().stage() {
                if ctx.is_cancelled() {
                    self.skip_stage(stage, &mut state);
                    continue;
                }

                self.execute_stage(stage, &mut state, &ctx).await;
            }

            info!(
                errors = state.errors().len(),
                cancelled = state.is_cancelled(),
                "Research run finished"
            );
        }
        .instrument(span)
        .await;

        state
    }

    async fn execute_stage(&self, stage: Stage, state: &mut PipelineState, ctx: &StageContext) {
        let started = Instant::now();
        let errors_before = state.errors().len();

        self.stage(stage)
            .execute(state, ctx)
            .instrument(info_span!("stage", stage = stage.as_str()))
            .await;

        let elapsed = started.elapsed();
        let new_errors = state.errors().len() - errors_before;

        // Only a call actually interrupted by the token makes the run partial
        if state.errors()[errors_before..]
            .iter()
            .any(|e| e.kind == FailureKind::Cancelled)
        {
            state.mark_cancelled();
        }

        histogram!("research_stage_duration_seconds", "stage" => stage.as_str())
            .record(elapsed.as_secs_f64());

        if new_errors > 0 {
            counter!("research_stage_errors_total", "stage" => stage.as_str())
                .increment(new_errors as u64);
        }

        debug!(
            stage = stage.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            new_errors,
            "Stage finished"
        );
    }

    fn skip_stage(&self, stage: Stage, state: &mut PipelineState) {
        if !state.is_cancelled() {
            warn!(stage = stage.as_str(), "Run cancelled, skipping remaining stages");
            state.mark_cancelled();
        }

        self.stage(stage).skip(state);
        state.record_error(StageError::new(
            stage,
            FailureKind::Cancelled,
            "run cancelled before stage started",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::mock::MockLlmProvider;
    use crate::domain::{LlmProvider, LlmRequest, LlmResponse};
    use async_trait::async_trait;
    use crate::domain::search::mock::MockSearchProvider;
    use crate::domain::{RunPhase, SearchHit, StageOutput, Summary, NO_RESULTS_SUMMARY};
    use serde_json::json;
    use std::time::Duration;

    const QUESTION: &str = "What is quantum entanglement?";
    const QUERIES: [&str; 3] = [
        "quantum entanglement definition",
        "quantum entanglement experiments",
        "quantum entanglement applications",
    ];

    fn queries_response() -> String {
        json!({
            "queries": QUERIES
                .iter()
                .map(|q| json!({"query": q, "rationale": "angle"}))
                .collect::<Vec<_>>()
        })
        .to_string()
    }

    fn summary_response() -> String {
        json!({
            "summary": "Entanglement correlates measurements of separated particles.",
            "key_insights": ["Measurements are correlated", "No faster-than-light signalling"],
            "sources_consulted": ["https://a.example/1", "https://invented.example"]
        })
        .to_string()
    }

    fn follow_ups_response() -> String {
        json!({
            "questions": [
                {"question": "How is entanglement created in the lab?", "rationale": "method"},
                {"question": "What is quantum teleportation?", "rationale": "application"}
            ]
        })
        .to_string()
    }

    fn healthy_llm() -> MockLlmProvider {
        MockLlmProvider::new()
            .with_response("search_queries", queries_response())
            .with_response("research_summary", summary_response())
            .with_response("follow_up_questions", follow_ups_response())
    }

    fn healthy_search() -> MockSearchProvider {
        MockSearchProvider::new()
            .with_hits(
                QUERIES[0],
                vec![
                    SearchHit::new("Def", "https://a.example/1", "definition"),
                    SearchHit::new("Shared", "https://shared.example", "first"),
                ],
            )
            .with_hits(
                QUERIES[1],
                vec![SearchHit::new("Shared again", "https://shared.example", "second")],
            )
            .with_hits(
                QUERIES[2],
                vec![SearchHit::new("Apps", "https://c.example/3", "apps")],
            )
    }

    fn runner(llm: Arc<MockLlmProvider>, search: Arc<MockSearchProvider>) -> PipelineRunner {
        runner_with_config(llm, search, PipelineConfig::default())
    }

    fn runner_with_config(
        llm: Arc<MockLlmProvider>,
        search: Arc<MockSearchProvider>,
        config: PipelineConfig,
    ) -> PipelineRunner {
        PipelineRunner::new(LanguageModel::new(llm, "gpt-4o"), search, config).unwrap()
    }

    #[tokio::test]
    async fn test_all_capabilities_succeed() {
        let llm = Arc::new(healthy_llm());
        let state = runner(llm.clone(), Arc::new(healthy_search()))
            .run(QUESTION)
            .await;

        assert!(state.is_done());
        assert!(!state.is_cancelled());
        assert!(state.errors().is_empty());
        assert!(state.is_fully_successful());

        assert!(state.search_queries().is_complete());
        assert_eq!(state.search_queries().value().unwrap().len(), 3);

        let results = state.search_results().value().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].snippet, "first");

        let summary = state.summary().value().unwrap();
        assert!(summary.has_text());
        assert_eq!(summary.cited_sources.len(), 1);
        assert!(summary.cited_sources.contains("https://a.example/1"));

        assert_eq!(state.follow_up_questions().value().unwrap().len(), 2);
        assert_eq!(
            llm.calls(),
            vec!["search_queries", "research_summary", "follow_up_questions"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_always_times_out() {
        let llm = Arc::new(healthy_llm());
        let search = Arc::new(MockSearchProvider::new().hanging(Duration::from_secs(3600)));
        let config = PipelineConfig::default().with_timeout_ms(5000);

        let state = runner_with_config(llm.clone(), search, config)
            .run(QUESTION)
            .await;

        assert!(state.is_done());
        assert_eq!(state.search_queries().value().unwrap().len(), 3);
        assert_eq!(state.search_results().value().unwrap().len(), 0);
        assert_eq!(
            state.summary().value().unwrap(),
            &Summary {
                text: NO_RESULTS_SUMMARY.to_string(),
                ..Summary::default()
            }
        );
        assert_eq!(state.follow_up_questions(), &StageOutput::Degraded(Vec::new()));

        assert_eq!(state.errors_for(Stage::Search).count(), 3);
        assert!(state
            .errors_for(Stage::Search)
            .all(|e| e.kind == FailureKind::ProviderTimeout));
        assert_eq!(state.errors_for(Stage::Synthesis).count(), 0);
        assert_eq!(state.errors_for(Stage::FollowUp).count(), 0);
        assert_eq!(llm.calls(), vec!["search_queries"]);
    }

    #[tokio::test]
    async fn test_model_fails_only_on_synthesis() {
        let llm = Arc::new(
            MockLlmProvider::new()
                .with_response("search_queries", queries_response())
                .with_error("research_summary", "HTTP 500: upstream error")
                .with_response("follow_up_questions", follow_ups_response()),
        );

        let state = runner(llm.clone(), Arc::new(healthy_search()))
            .run(QUESTION)
            .await;

        assert!(state.is_done());
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].stage, Stage::Synthesis);
        assert_eq!(state.summary().value().unwrap().text, "");
        assert!(state.follow_up_questions().value().unwrap().is_empty());
        assert!(state.search_queries().is_complete());
        assert!(state.search_results().is_complete());
        assert_eq!(llm.call_count("follow_up_questions"), 0);
    }

    #[tokio::test]
    async fn test_every_capability_failing_still_reaches_done() {
        let llm = Arc::new(MockLlmProvider::new().with_error("search_queries", "HTTP 401"));
        let search = Arc::new(MockSearchProvider::new().failing("HTTP 403"));

        let state = runner(llm, search.clone()).run(QUESTION).await;

        assert_eq!(state.phase(), RunPhase::Done);
        assert_eq!(
            state.search_queries(),
            &StageOutput::Degraded(vec![QUESTION.to_string()])
        );
        assert_eq!(search.calls(), vec![(QUESTION.to_string(), 5)]);
        assert_eq!(state.summary().value().unwrap().text, NO_RESULTS_SUMMARY);
        assert!(state.follow_up_questions().value().unwrap().is_empty());

        let stages: Vec<Stage> = state.errors().iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec![Stage::Analysis, Stage::Search]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_invokes_nothing() {
        let llm = Arc::new(healthy_llm());
        let search = Arc::new(healthy_search());
        let token = CancellationToken::new();
        token.cancel();

        let state = runner(llm.clone(), search.clone())
            .run_with_cancellation(QUESTION, token)
            .await;

        assert!(state.is_done());
        assert!(state.is_cancelled());
        assert!(llm.calls().is_empty());
        assert!(search.calls().is_empty());

        assert_eq!(state.search_queries().value().unwrap(), &vec![QUESTION.to_string()]);
        assert!(state.search_results().value().unwrap().is_empty());
        assert_eq!(state.summary().value().unwrap().text, "");
        assert!(state.follow_up_questions().value().unwrap().is_empty());

        assert_eq!(state.errors().len(), 4);
        assert!(state.errors().iter().all(|e| e.kind == FailureKind::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_search_is_recorded_and_stops_the_run() {
        let llm = Arc::new(healthy_llm());
        let search = Arc::new(MockSearchProvider::new().hanging(Duration::from_secs(10)));
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let state = runner(llm.clone(), search)
            .run_with_cancellation(QUESTION, token)
            .await;
        canceller.await.unwrap();

        assert!(state.is_done());
        assert!(state.is_cancelled());
        assert_eq!(state.errors_for(Stage::Search).count(), 3);
        assert!(state.errors().iter().all(|e| e.kind == FailureKind::Cancelled));
        assert_eq!(state.errors_for(Stage::Synthesis).count(), 1);
        assert_eq!(state.errors_for(Stage::FollowUp).count(), 1);
        assert_eq!(llm.calls(), vec!["search_queries"]);
    }

    /// Fires the token as soon as the follow-up call has answered
    #[derive(Debug)]
    struct CancelAfterFollowUp {
        inner: MockLlmProvider,
        token: CancellationToken,
    }

    #[async_trait]
    impl LlmProvider for CancelAfterFollowUp {
        async fn chat(
            &self,
            model: &str,
            request: LlmRequest,
        ) -> Result<LlmResponse, DomainError> {
            let is_follow_up = request.schema_name() == Some("follow_up_questions");
            let response = self.inner.chat(model, request).await;
            if is_follow_up {
                self.token.cancel();
            }
            response
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_cancellation_after_last_call_leaves_run_complete() {
        let token = CancellationToken::new();
        let llm = Arc::new(CancelAfterFollowUp {
            inner: healthy_llm(),
            token: token.clone(),
        });
        let runner = PipelineRunner::new(
            LanguageModel::new(llm, "gpt-4o"),
            Arc::new(healthy_search()),
            PipelineConfig::default(),
        )
        .unwrap();

        let state = runner.run_with_cancellation(QUESTION, token.clone()).await;

        assert!(token.is_cancelled());
        assert!(state.is_done());
        assert!(!state.is_cancelled());
        assert!(state.errors().is_empty());
        assert!(state.is_fully_successful());
        assert_eq!(state.follow_up_questions().value().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_follow_up_marks_run_cancelled() {
        let llm = Arc::new(
            healthy_llm().with_delay("follow_up_questions", Duration::from_secs(10)),
        );
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let state = runner(llm, Arc::new(healthy_search()))
            .run_with_cancellation(QUESTION, token)
            .await;
        canceller.await.unwrap();

        assert!(state.is_done());
        assert!(state.is_cancelled());
        assert!(state.summary().is_complete());
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].stage, Stage::FollowUp);
        assert_eq!(state.errors()[0].kind, FailureKind::Cancelled);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = PipelineRunner::new(
            LanguageModel::new(Arc::new(MockLlmProvider::new()), "gpt-4o"),
            Arc::new(MockSearchProvider::new()),
            PipelineConfig::default().with_query_count(0),
        );

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
