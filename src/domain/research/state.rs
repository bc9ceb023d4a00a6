//! Shared state threaded through the research pipeline

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::search::SearchHit;
use crate::domain::{DomainError, FailureKind};

/// Summary text used when there is nothing to synthesize
pub const NO_RESULTS_SUMMARY: &str = "No search results available to synthesize.";

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "analysis")]
    Analysis,
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "synthesis")]
    Synthesis,
    #[serde(rename = "followup")]
    FollowUp,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Analysis,
        Stage::Search,
        Stage::Synthesis,
        Stage::FollowUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Search => "search",
            Self::Synthesis => "synthesis",
            Self::FollowUp => "followup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the run's error log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(stage: Stage, error: &DomainError) -> Self {
        Self::new(stage, error.kind(), error.to_string())
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

/// Population status of a stage output field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum StageOutput<T> {
    /// The producing stage has not run
    #[default]
    Pending,
    /// The producing stage fully succeeded
    Complete(T),
    /// The producing stage substituted a fallback or partial value
    Degraded(T),
}

impl<T> StageOutput<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Pending => None,
            Self::Complete(value) | Self::Degraded(value) => Some(value),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Cited synthesis of the search results
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub cited_sources: BTreeSet<String>,
}

impl Summary {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Degraded value for a run without search results
    pub fn no_results() -> Self {
        Self::new(NO_RESULTS_SUMMARY)
    }

    /// Degraded value for a failed synthesis
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Position of a run in the pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Init,
    Analyzing,
    Searching,
    Synthesizing,
    FollowingUp,
    Done,
}

impl RunPhase {
    /// Unconditional linear transition
    pub fn next(self) -> Self {
        match self {
            Self::Init => Self::Analyzing,
            Self::Analyzing => Self::Searching,
            Self::Searching => Self::Synthesizing,
            Self::Synthesizing => Self::FollowingUp,
            Self::FollowingUp | Self::Done => Self::Done,
        }
    }

    /// Stage executed while in this phase
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::Analyzing => Some(Stage::Analysis),
            Self::Searching => Some(Stage::Search),
            Self::Synthesizing => Some(Stage::Synthesis),
            Self::FollowingUp => Some(Stage::FollowUp),
            Self::Init | Self::Done => None,
        }
    }
}

/// The single record passed through every stage of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    run_id: Uuid,
    question: String,
    phase: RunPhase,
    search_queries: StageOutput<Vec<String>>,
    search_results: StageOutput<Vec<SearchHit>>,
    summary: StageOutput<Summary>,
    follow_up_questions: StageOutput<Vec<String>>,
    errors: Vec<StageError>,
    cancelled: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            question: question.into(),
            phase: RunPhase::Init,
            search_queries: StageOutput::Pending,
            search_results: StageOutput::Pending,
            summary: StageOutput::Pending,
            follow_up_questions: StageOutput::Pending,
            errors: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn search_queries(&self) -> &StageOutput<Vec<String>> {
        &self.search_queries
    }

    pub fn search_results(&self) -> &StageOutput<Vec<SearchHit>> {
        &self.search_results
    }

    pub fn summary(&self) -> &StageOutput<Summary> {
        &self.summary
    }

    pub fn follow_up_questions(&self) -> &StageOutput<Vec<String>> {
        &self.follow_up_questions
    }

    pub fn errors(&self) -> &[StageError] {
        &self.errors
    }

    pub fn errors_for(&self, stage: Stage) -> impl Iterator<Item = &StageError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_done(&self) -> bool {
        self.phase == RunPhase::Done
    }

    /// True when every stage fully succeeded
    pub fn is_fully_successful(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Queries to search, falling back to the question when analysis never ran
    pub fn queries_or_question(&self) -> Vec<String> {
        match self.search_queries.value() {
            Some(queries) if !queries.is_empty() => queries.clone(),
            _ => vec![self.question.clone()],
        }
    }

    /// URLs present in the merged search results
    pub fn result_urls(&self) -> BTreeSet<&str> {
        self.search_results
            .value()
            .map(|hits| hits.iter().map(|h| h.url.as_str()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn set_search_queries(&mut self, queries: StageOutput<Vec<String>>) {
        self.search_queries = queries;
    }

    pub(crate) fn set_search_results(&mut self, results: StageOutput<Vec<SearchHit>>) {
        self.search_results = results;
    }

    pub(crate) fn set_summary(&mut self, summary: StageOutput<Summary>) {
        self.summary = summary;
    }

    pub(crate) fn set_follow_up_questions(&mut self, questions: StageOutput<Vec<String>>) {
        self.follow_up_questions = questions;
    }

    /// Append to the error log; entries are never removed
    pub(crate) fn record_error(&mut self, error: StageError) {
        self.errors.push(error);
    }

    pub(crate) fn advance(&mut self) -> RunPhase {
        self.phase = self.phase.next();

        if self.phase == RunPhase::Done && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }

        self.phase
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }
}
