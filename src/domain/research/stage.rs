//! Stage trait and the per-run context handed to each stage

use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PipelineConfig, PipelineState, Stage};
use crate::domain::DomainError;

/// Per-run settings and cancellation signal shared by all stages
#[derive(Debug, Clone)]
pub struct StageContext {
    config: PipelineConfig,
    cancellation: CancellationToken,
}

impl StageContext {
    pub fn new(config: PipelineConfig, cancellation: CancellationToken) -> Self {
        Self {
            config,
            cancellation,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Await a capability call bounded by the run timeout and cancellation
    ///
    /// Both a timeout and a cancellation surface as errors, so callers handle
    /// them exactly like any other provider failure.
    pub async fn bounded<T, F>(&self, provider: &'static str, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>> + Send,
        T: Send,
    {
        let result = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(DomainError::Cancelled),
            outcome = tokio::time::timeout(self.config.timeout(), call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(DomainError::timeout(provider, self.config.timeout_ms)),
            },
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => {
                debug!(provider, error = %e, "Capability call failed");
                "error"
            }
        };
        counter!("research_capability_calls_total", "provider" => provider, "status" => status)
            .increment(1);

        result
    }
}

/// One processing step of the research pipeline
///
/// A stage never fails past its own boundary: every capability failure is
/// recorded in the state's error log and replaced by a degraded value.
#[async_trait]
pub trait PipelineStage: Send + Sync + Debug {
    fn stage(&self) -> Stage;

    /// Read upstream fields and write this stage's output field
    async fn execute(&self, state: &mut PipelineState, ctx: &StageContext);

    /// Write the degraded output used when the run is cancelled before this stage
    fn skip(&self, state: &mut PipelineState);
}
