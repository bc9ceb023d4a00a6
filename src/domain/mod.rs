//! Domain layer - Core business logic and entities

pub mod error;
pub mod llm;
pub mod research;
pub mod search;

pub use error::{DomainError, FailureKind};
pub use llm::{
    FinishReason, LanguageModel, LlmJsonSchema, LlmProvider, LlmRequest, LlmRequestBuilder,
    LlmResponse, LlmResponseFormat, Message, MessageRole, Prompt, StructuredOutput, Usage,
};
pub use research::{
    PipelineConfig, PipelineStage, PipelineState, RunPhase, Stage, StageContext, StageError,
    StageOutput, Summary, NO_RESULTS_SUMMARY,
};
pub use search::{SearchHit, SearchProvider};
