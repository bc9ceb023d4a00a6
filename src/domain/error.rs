use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core domain errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Failure taxonomy recorded in the pipeline error log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The capability did not answer within the configured timeout
    ProviderTimeout,
    /// The capability answered with an error (auth, quota, transport, ...)
    ProviderRejected,
    /// The capability answered but the payload did not match the schema
    SchemaValidationFailed,
    /// The run was cancelled while the call was in flight
    Cancelled,
}

impl DomainError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn timeout(provider: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            provider: provider.into(),
            timeout_ms,
        }
    }

    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Attribute a transport-level error to the provider that issued the call
    pub fn with_provider(self, name: &str) -> Self {
        match self {
            Self::Provider { message, .. } => Self::provider(name, message),
            Self::Timeout { timeout_ms, .. } => Self::timeout(name, timeout_ms),
            other => other,
        }
    }

    /// Classify this error for the pipeline error log
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::ProviderTimeout,
            Self::SchemaValidation { .. } => FailureKind::SchemaValidationFailed,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Provider { .. } | Self::Configuration { .. } => FailureKind::ProviderRejected,
        }
    }
}
