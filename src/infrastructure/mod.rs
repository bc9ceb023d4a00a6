//! Infrastructure layer - External service implementations

pub mod llm;
pub mod logging;
pub mod research;
pub mod search;
