//! Research pipeline stages and runner

mod analysis;
mod follow_up;
mod runner;
mod search;
mod synthesis;
mod validation;

pub use analysis::QueryAnalysisStage;
pub use follow_up::FollowUpStage;
pub use runner::PipelineRunner;
pub use search::{merge_by_url, SearchExecutionStage};
pub use synthesis::SynthesisStage;
