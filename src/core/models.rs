//! Core data models for routed translation

use serde::{Deserialize, Serialize};

use crate::core::errors::{ProviderFailure, TranslationError};

/// Source language value that lets the provider detect the language itself
pub const AUTO_DETECT: &str = "auto";

/// Translation request for one batch of texts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub texts: Vec<String>,
    pub source_lang: String,
    pub target_lang: String,
}

impl TranslationRequest {
    pub fn new(texts: Vec<String>, target_lang: impl Into<String>) -> Self {
        Self {
            texts,
            source_lang: AUTO_DETECT.to_string(),
            target_lang: target_lang.into(),
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = source_lang.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Result of one provider attempt over one request
#[derive(Debug)]
pub enum ProviderOutcome {
    Success(Vec<String>),
    Failure {
        error: TranslationError,
        attempts: u32,
    },
}

impl ProviderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Success(_))
    }
}

/// Successful routed translation
#[derive(Debug)]
pub struct RoutedTranslation {
    /// Translations, index-aligned with the request texts
    pub texts: Vec<String>,
    /// Name of the provider that produced `texts`
    pub provider_used: String,
    /// Providers tried before the successful one
    pub fallback_count: usize,
    /// Failures of the providers tried before the successful one, in attempt order
    pub failures: Vec<ProviderFailure>,
}

/// Outcome of a routed call
pub type RouterResult = std::result::Result<RoutedTranslation, TranslationError>;

/// Cache identity of one translated text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub source_text: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl CacheKey {
    pub fn new(provider: &str, source_text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            provider: provider.to_string(),
            source_text: source_text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }
}
