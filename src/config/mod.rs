//! Application configuration

mod app_config;

pub use app_config::{AppConfig, LlmConfig, LogFormat, LoggingConfig, SearchConfig};
