//! Web search domain models and traits

mod hit;
mod provider;

pub use hit::SearchHit;
pub use provider::SearchProvider;

#[cfg(test)]
pub use provider::mock;
