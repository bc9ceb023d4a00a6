//! Research command - runs the pipeline once and prints the report

use std::fmt;

use clap::{Args, ValueEnum};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::PipelineState;
use crate::infrastructure::logging;

const RULE: &str = "============================================================";

/// Report format written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the research command
#[derive(Args, Clone, Debug)]
pub struct ResearchArgs {
    /// Question to research
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Number of search queries to generate (overrides config)
    #[arg(long)]
    pub queries: Option<usize>,

    /// Results requested per search query (overrides config)
    #[arg(long)]
    pub results: Option<usize>,

    /// Number of follow-up questions (overrides config)
    #[arg(long)]
    pub follow_ups: Option<usize>,

    /// Per-call timeout in milliseconds (overrides config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl ResearchArgs {
    pub fn question(&self) -> String {
        self.question.join(" ").trim().to_string()
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        let pipeline = &mut config.pipeline;

        if let Some(queries) = self.queries {
            pipeline.query_count = queries;
        }
        if let Some(results) = self.results {
            pipeline.results_per_query = results;
        }
        if let Some(follow_ups) = self.follow_ups {
            pipeline.follow_up_count = follow_ups;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            pipeline.timeout_ms = timeout_ms;
        }
    }
}

/// Run the research command
pub async fn run(args: ResearchArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let question = args.question();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let mut config = AppConfig::load().unwrap_or_default();
    args.apply_overrides(&mut config);
    logging::init_logging(&config.logging);

    let runner = crate::create_pipeline_runner(&config)?;

    let cancellation = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancellation.clone()));

    let state = runner.run_with_cancellation(question, cancellation).await;
    watcher.abort();

    match args.format {
        OutputFormat::Text => print!("{}", render_report(&state)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
    }

    Ok(())
}

async fn cancel_on_ctrl_c(cancellation: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, cancelling research run");
            cancellation.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
    }
}

/// Human-readable report of a finished run
pub fn render_report(state: &PipelineState) -> String {
    Report(state).to_string()
}

struct Report<'a>(&'a PipelineState);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0;

        writeln!(f, "{}", RULE)?;
        writeln!(f, "Question: {}", state.question())?;
        writeln!(f, "{}", RULE)?;

        if let Some(queries) = state.search_queries().value() {
            writeln!(f, "\nSearch queries:")?;
            for (i, query) in queries.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, query)?;
            }
        }

        if let Some(summary) = state.summary().value() {
            if summary.has_text() {
                writeln!(f, "\nResearch summary:\n{}", summary.text)?;
            }

            if !summary.key_insights.is_empty() {
                writeln!(f, "\nKey insights:")?;
                for insight in &summary.key_insights {
                    writeln!(f, "  - {}", insight)?;
                }
            }

            if !summary.cited_sources.is_empty() {
                writeln!(f, "\nSources:")?;
                for url in &summary.cited_sources {
                    writeln!(f, "  - {}", url)?;
                }
            }
        }

        if let Some(questions) = state.follow_up_questions().value() {
            if !questions.is_empty() {
                writeln!(f, "\nFollow-up questions:")?;
                for (i, question) in questions.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, question)?;
                }
            }
        }

        writeln!(f, "\n{}", RULE)?;
        if state.is_cancelled() {
            writeln!(f, "Run cancelled; output is partial.")?;
        }
        if state.errors().is_empty() {
            writeln!(f, "No errors - workflow completed successfully.")?;
        } else {
            writeln!(f, "Errors encountered during workflow:")?;
            for error in state.errors() {
                writeln!(f, "  - {}", error)?;
            }
        }
        writeln!(f, "{}", RULE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Stage, StageError, StageOutput, Summary};

    fn args(question: &[&str]) -> ResearchArgs {
        ResearchArgs {
            question: question.iter().map(|s| s.to_string()).collect(),
            format: OutputFormat::Text,
            queries: None,
            results: None,
            follow_ups: None,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_overrides_apply_to_pipeline_config() {
        let mut config = AppConfig::default();
        let args = ResearchArgs {
            queries: Some(5),
            timeout_ms: Some(1000),
            ..args(&["q"])
        };

        args.apply_overrides(&mut config);

        assert_eq!(config.pipeline.query_count, 5);
        assert_eq!(config.pipeline.timeout_ms, 1000);
        assert_eq!(config.pipeline.follow_up_count, 2);
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let error = run(args(&["  ", ""])).await.unwrap_err();
        assert!(error.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_report_lists_sections_and_errors() {
        let mut state = PipelineState::new("What is entanglement?");
        state.set_search_queries(StageOutput::Complete(vec!["a".into(), "b".into()]));
        let mut summary = Summary::new("Entanglement correlates particles.");
        summary.key_insights.push("Non-local correlations".into());
        summary.cited_sources.insert("https://a.example".into());
        state.set_summary(StageOutput::Complete(summary));
        state.set_follow_up_questions(StageOutput::Degraded(Vec::new()));
        state.record_error(StageError::new(
            Stage::FollowUp,
            FailureKind::ProviderRejected,
            "HTTP 500",
        ));

        let report = render_report(&state);

        assert!(report.contains("Question: What is entanglement?"));
        assert!(report.contains("  1. a\n  2. b\n"));
        assert!(report.contains("Research summary:\nEntanglement correlates particles."));
        assert!(report.contains("  - Non-local correlations"));
        assert!(report.contains("  - https://a.example"));
        assert!(!report.contains("Follow-up questions:"));
        assert!(report.contains("  - followup: HTTP 500"));
    }

    #[test]
    fn test_report_for_clean_run() {
        let mut state = PipelineState::new("q");
        state.set_follow_up_questions(StageOutput::Complete(vec!["Why?".into()]));

        let report = render_report(&state);

        assert!(report.contains("Follow-up questions:\n  1. Why?"));
        assert!(report.contains("No errors"));
    }

    #[test]
    fn test_report_flags_cancelled_run() {
        let mut state = PipelineState::new("q");
        state.mark_cancelled();
        state.record_error(StageError::new(
            Stage::Synthesis,
            FailureKind::Cancelled,
            "run cancelled before stage started",
        ));

        let report = render_report(&state);

        assert!(report.starts_with(RULE));
        assert!(report.contains("Run cancelled; output is partial.\nErrors encountered"));
        assert!(report.trim_end().ends_with(RULE));
    }
}
