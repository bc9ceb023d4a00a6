//! Schema-validated structured output on top of a chat provider

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::{LlmJsonSchema, LlmProvider, LlmRequest};
use crate::domain::DomainError;

/// A typed value the model must return as JSON
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Schema attached to the request as the response format
    fn json_schema() -> LlmJsonSchema;
}

/// System instruction plus user content for one model call
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Language model capability returning parsed, schema-conforming values
#[derive(Debug, Clone)]
pub struct LanguageModel {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LanguageModel {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Run one completion and parse the reply into `T`
    pub async fn complete<T: StructuredOutput>(&self, prompt: &Prompt) -> Result<T, DomainError> {
        let mut builder = LlmRequest::builder()
            .system(&prompt.system)
            .user(&prompt.user)
            .json_schema(T::json_schema());

        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = self.provider.chat(&self.model, builder.build()).await?;

        if response.is_truncated() {
            return Err(DomainError::schema_validation(
                "model output was truncated before completion",
            ));
        }

        parse_structured(response.content())
    }
}

/// Parse model output as JSON, tolerating a surrounding markdown code fence
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T, DomainError> {
    let body = strip_code_fence(content);

    if body.is_empty() {
        return Err(DomainError::schema_validation("model returned an empty response"));
    }

    serde_json::from_str(body).map_err(|e| DomainError::schema_validation(e.to_string()))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Info string ("json") may be followed by a newline or sit inline with the body
    let body = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    body.trim_end().trim_end_matches("```").trim()
}
