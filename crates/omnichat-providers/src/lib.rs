//! Vendor adapter layer for Omnichat.
//!
//! # Architecture
//!
//! - [`traits::Provider`]: the single `create_completion` capability every adapter implements
//! - [`registry`]: static specs for the built-in vendors plus the lazily-caching [`ProviderRegistry`]
//! - [`http_provider::HttpProvider`]: generic OpenAI-compatible HTTP adapter
//! - [`anthropic::AnthropicProvider`]: native Anthropic Messages API adapter

pub mod anthropic;
pub mod http_provider;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use anthropic::AnthropicProvider;
pub use http_provider::HttpProvider;
pub use registry::{
    find_by_name, split_model, ApiStyle, ProviderFactory, ProviderRegistry, ProviderSpec, PROVIDERS,
};
pub use traits::{CompletionOptions, Provider};
