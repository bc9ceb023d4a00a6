//! Web search provider implementations

mod factory;
mod serper;

pub use factory::{SearchProviderConfig, SearchProviderFactory, SearchProviderKind};
pub use serper::{SerperSearchProvider, DEFAULT_SERPER_ENDPOINT};
