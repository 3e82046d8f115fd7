//! Tiered Translator - multi-tier translation routing library
//!
//! Translates batches of texts through an ordered set of external providers, falling back
//! to the next tier on failure while honouring per-provider rate limits, retry policy,
//! batch sizes and a shared response cache.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod processors;
pub mod server;

// Re-export key types for convenience
pub use core::{
    cache::ResponseCache,
    client::{ProviderClient, TranslationProvider},
    config::{ProviderDescriptor, ProviderKind, RouterConfig},
    errors::{ProviderFailure, TranslationError},
    models::{ProviderOutcome, RoutedTranslation, RouterResult, TranslationRequest},
    router::FallbackRouter,
    selector::ProviderSelector,
};

pub use processors::{bundle::BundleProcessor, placeholder::PlaceholderGuard};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
