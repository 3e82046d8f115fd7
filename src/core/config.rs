//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::errors::{Result, TranslationError};

/// Prefix of environment variables layered over the config file
pub const ENV_PREFIX: &str = "TIERED_TRANSLATOR";

/// Wire protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Deepl,
    Google,
    Openai,
    Generic,
}

impl ProviderKind {
    /// Environment variable consulted when no key is configured
    pub fn default_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Deepl => "DEEPL_API_KEY",
            ProviderKind::Google => "GOOGLE_TRANSLATE_API_KEY",
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Generic => "TRANSLATION_API_KEY",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Deepl => "https://api-free.deepl.com",
            ProviderKind::Google => "https://translation.googleapis.com/language/translate/v2",
            ProviderKind::Openai => "https://api.openai.com/v1",
            ProviderKind::Generic => "http://localhost:8080/translate",
        }
    }

    pub fn default_batch_size(&self) -> usize {
        match self {
            ProviderKind::Deepl => 50,
            ProviderKind::Google => 128,
            ProviderKind::Openai => 20,
            ProviderKind::Generic => 0,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Deepl => write!(f, "deepl"),
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Openai => write!(f, "openai"),
            ProviderKind::Generic => write!(f, "generic"),
        }
    }
}

/// Configuration for one translation provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDescriptor {
    pub name: String,
    pub kind: ProviderKind,
    /// 1 is tried first
    pub tier: u32,
    pub enabled: bool,
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    /// 0 = unlimited
    pub batch_size: usize,
    /// 0 = unlimited
    pub rate_limit_per_second: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub preferred_languages: Vec<String>,
}

impl Default for ProviderDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ProviderKind::Generic,
            tier: 1,
            enabled: true,
            endpoint: None,
            api_key: None,
            api_key_env: None,
            model: None,
            timeout_ms: 30000,
            max_retries: 3,
            batch_size: 0,
            rate_limit_per_second: 0,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            backoff_multiplier: 2.0,
            preferred_languages: vec![],
        }
    }
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, kind: ProviderKind, tier: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            tier,
            batch_size: kind.default_batch_size(),
            ..Default::default()
        }
    }

    /// Resolve the credential: explicit key, then the named env var, then the kind's default
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same lookup order as `resolve_api_key` over an arbitrary variable source
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.kind.default_key_env()))
            .find_map(|name| lookup(name).filter(|k| !k.trim().is_empty()))
    }

    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.kind.default_endpoint().to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    /// Check if the provider declares affinity for the language
    pub fn prefers(&self, lang: &str) -> bool {
        self.preferred_languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(lang))
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(config_error("provider name must not be empty"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(config_error(format!(
                "provider {}: backoff_multiplier must be >= 1.0",
                self.name
            )));
        }
        if self.max_retry_delay_ms < self.initial_retry_delay_ms {
            return Err(config_error(format!(
                "provider {}: max_retry_delay_ms must be >= initial_retry_delay_ms",
                self.name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(config_error(format!(
                "provider {}: timeout_ms must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Global fallback behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// Drop providers without credentials instead of failing construction
    pub skip_on_missing_key: bool,
    /// Must stay true: the first successful provider always wins
    pub stop_on_first_success: bool,
    pub log_fallback_events: bool,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            skip_on_missing_key: true,
            stop_on_first_success: true,
            log_fallback_events: true,
        }
    }
}

/// Response cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Configuration for the router
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub providers: Vec<ProviderDescriptor>,
    pub fallback: FallbackSettings,
    pub cache: CacheSettings,
}

/// Default provider tiers
const DEFAULT_PROVIDERS: &[(&str, ProviderKind, u32, u32)] = &[
    ("deepl", ProviderKind::Deepl, 1, 5),
    ("google", ProviderKind::Google, 2, 10),
    ("openai", ProviderKind::Openai, 3, 3),
];

impl RouterConfig {
    /// Load configuration from an optional file layered under environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(TranslationError::FileError {
                    path: path.display().to_string(),
                    message: "config file not found".to_string(),
                });
            }
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| config_error(e.to_string()))?;

        if config.providers.is_empty() {
            config.providers = default_providers();
            info!("Loaded {} default providers", config.providers.len());
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.fallback.stop_on_first_success {
            return Err(config_error(
                "stop_on_first_success cannot be disabled: the first successful provider always wins",
            ));
        }

        if self.cache.capacity == 0 {
            return Err(config_error("cache capacity must be greater than 0"));
        }

        if self.providers.is_empty() {
            warn!("No providers configured");
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !seen.insert(provider.name.as_str()) {
                return Err(config_error(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
        }

        Ok(())
    }

    /// Get all enabled providers in configuration order
    pub fn enabled_providers(&self) -> Vec<&ProviderDescriptor> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    /// Find provider by name
    pub fn find_provider(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }
}

fn default_providers() -> Vec<ProviderDescriptor> {
    DEFAULT_PROVIDERS
        .iter()
        .map(|(name, kind, tier, rps)| ProviderDescriptor {
            rate_limit_per_second: *rps,
            ..ProviderDescriptor::new(*name, *kind, *tier)
        })
        .collect()
}

fn config_error(message: impl Into<String>) -> TranslationError {
    TranslationError::ConfigError {
        message: message.into(),
    }
}
