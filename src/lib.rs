//! Research Workflow
//!
//! Answers a free-text research question through a fixed pipeline:
//! - Query analysis into targeted web-search queries
//! - Web search fan-out with URL deduplication
//! - Cited synthesis of the merged results
//! - Follow-up questions that deepen the answer
//!
//! Every stage contains its own failures, so a run always completes with a
//! best-effort result and a log of what went wrong.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;

use domain::{LanguageModel, LlmProvider, SearchProvider};
use infrastructure::llm::{LlmProviderConfig, LlmProviderFactory};
use infrastructure::research::PipelineRunner;
use infrastructure::search::{SearchProviderConfig, SearchProviderFactory};
use tracing::info;

/// Build a pipeline runner from configuration and the API keys in the environment
pub fn create_pipeline_runner(config: &AppConfig) -> anyhow::Result<PipelineRunner> {
    let llm_provider = create_llm_provider(config)?;
    let search_provider = create_search_provider(config)?;

    let mut model = LanguageModel::new(llm_provider, config.llm.model.clone())
        .with_temperature(config.llm.temperature);
    if let Some(max_tokens) = config.llm.max_tokens {
        model = model.with_max_tokens(max_tokens);
    }

    info!(
        model = %config.llm.model,
        queries = config.pipeline.query_count,
        follow_ups = config.pipeline.follow_up_count,
        "Research pipeline configured"
    );

    Ok(PipelineRunner::new(
        model,
        search_provider,
        config.pipeline.clone(),
    )?)
}

fn create_llm_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable is required"))?;

    let mut provider_config = LlmProviderConfig::new(config.llm.provider, api_key)
        .with_timeout(config.pipeline.timeout());

    if let Some(url) = &config.llm.base_url {
        info!("Using OpenAI provider with custom base URL: {}", url);
        provider_config = provider_config.with_base_url(url);
    }

    Ok(LlmProviderFactory::create(&provider_config)?)
}

fn create_search_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn SearchProvider>> {
    let api_key = std::env::var("SERPER_API_KEY")
        .map_err(|_| anyhow::anyhow!("SERPER_API_KEY environment variable is required"))?;

    let provider_config = SearchProviderConfig::new(config.search.provider, api_key)
        .with_endpoint(&config.search.endpoint)
        .with_timeout(config.pipeline.timeout());

    Ok(SearchProviderFactory::create(&provider_config)?)
}
