//! Research pipeline domain module
//!
//! A research run answers one question through four linear stages:
//! - Query analysis: the question becomes N targeted search queries
//! - Search execution: one web search per query, merged and deduplicated
//! - Synthesis: a cited summary of the merged results
//! - Follow-up: M questions that deepen the answer
//!
//! Every stage contains its own failures. A failing capability call appends a
//! [`StageError`] to the run's log and the stage writes a degraded value, so a
//! run always reaches [`RunPhase::Done`].

mod config;
mod stage;
mod state;

pub use self::config::PipelineConfig;
pub use stage::{PipelineStage, StageContext};
pub use state::{
    PipelineState, RunPhase, Stage, StageError, StageOutput, Summary, NO_RESULTS_SUMMARY,
};
