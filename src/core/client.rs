//! Per-provider translation client with caching, rate limiting, chunking and retry

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::backends::{Backend, HttpBackend};
use crate::core::cache::ResponseCache;
use crate::core::chunker::chunk;
use crate::core::config::ProviderDescriptor;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{CacheKey, ProviderOutcome};
use crate::core::rate_limiter::RateLimiter;
use crate::core::retry::RetryPolicy;
use crate::core::stats::ProviderStats;

/// Capability shared by every provider the router can dispatch to
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn tier(&self) -> u32;

    /// Credentials are configured
    fn is_available(&self) -> bool;

    fn descriptor(&self) -> &ProviderDescriptor;

    fn stats(&self) -> &ProviderStats;

    /// Translate all `texts`, all-or-nothing, preserving input order
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> ProviderOutcome;
}

/// Translation client for one configured provider
pub struct ProviderClient {
    descriptor: ProviderDescriptor,
    backend: Option<Arc<dyn Backend>>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    cache: Arc<ResponseCache>,
    stats: ProviderStats,
}

impl ProviderClient {
    /// Create a client talking HTTP; without a resolvable credential the client is unavailable
    pub fn new(descriptor: ProviderDescriptor, cache: Arc<ResponseCache>) -> Result<Self> {
        let api_key = descriptor.resolve_api_key();
        Self::with_api_key(descriptor, api_key, cache)
    }

    /// Create a client talking HTTP with an already resolved credential
    pub fn with_api_key(
        descriptor: ProviderDescriptor,
        api_key: Option<String>,
        cache: Arc<ResponseCache>,
    ) -> Result<Self> {
        let backend: Option<Arc<dyn Backend>> = match api_key {
            Some(key) => Some(Arc::new(HttpBackend::new(&descriptor, key)?)),
            None => None,
        };
        Ok(Self::build(descriptor, backend, cache))
    }

    /// Create a client over an arbitrary backend
    pub fn with_backend(
        descriptor: ProviderDescriptor,
        backend: Arc<dyn Backend>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self::build(descriptor, Some(backend), cache)
    }

    fn build(
        descriptor: ProviderDescriptor,
        backend: Option<Arc<dyn Backend>>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            limiter: RateLimiter::per_second(descriptor.rate_limit_per_second),
            retry: RetryPolicy::from_descriptor(&descriptor),
            descriptor,
            backend,
            cache,
            stats: ProviderStats::new(),
        }
    }

    fn cache_key(&self, text: &str, source_lang: &str, target_lang: &str) -> CacheKey {
        CacheKey::new(&self.descriptor.name, text, source_lang, target_lang)
    }

    /// One HTTP attempt, bounded by the provider timeout
    async fn send_chunk(
        &self,
        backend: &dyn Backend,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        self.stats.record_request();

        let translations = timeout(
            self.descriptor.timeout(),
            backend.send(texts, source_lang, target_lang),
        )
        .await
        .map_err(|_| TranslationError::Timeout)??;

        if translations.len() != texts.len() {
            return Err(TranslationError::InvalidResponse {
                message: format!(
                    "expected {} translations, got {}",
                    texts.len(),
                    translations.len()
                ),
            });
        }
        Ok(translations)
    }

    async fn run(
        &self,
        backend: &dyn Backend,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> ProviderOutcome {
        let mut results: Vec<Option<String>> = vec![None; texts.len()];
        let mut uncached_indices = Vec::new();
        let mut uncached_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self
                .cache
                .get(&self.cache_key(text, source_lang, target_lang))
                .await
            {
                Some(translated) => results[i] = Some(translated),
                None => {
                    uncached_indices.push(i);
                    uncached_texts.push(text.clone());
                }
            }
        }

        let misses = uncached_texts.len() as u64;
        self.stats
            .record_cache(texts.len() as u64 - misses, misses);

        if uncached_texts.is_empty() {
            debug!(
                "{}: all {} texts served from cache",
                self.descriptor.name,
                texts.len()
            );
        }

        let mut translated = Vec::with_capacity(uncached_texts.len());
        let mut attempts_made = 0;

        for batch in chunk(&uncached_texts, self.descriptor.batch_size) {
            let (result, attempts) = self
                .retry
                .run(move |_| self.send_chunk(backend, batch, source_lang, target_lang))
                .await;
            attempts_made += attempts;
            self.stats.record_retries(u64::from(attempts.saturating_sub(1)));

            match result {
                Ok(outputs) => {
                    for (text, output) in batch.iter().zip(&outputs) {
                        self.cache
                            .put(
                                self.cache_key(text, source_lang, target_lang),
                                output.clone(),
                            )
                            .await;
                    }
                    translated.extend(outputs);
                }
                Err(error) => {
                    return ProviderOutcome::Failure {
                        error,
                        attempts: attempts_made,
                    }
                }
            }
        }

        for (index, output) in uncached_indices.into_iter().zip(translated) {
            results[index] = Some(output);
        }

        match results.into_iter().collect::<Option<Vec<_>>>() {
            Some(texts) => ProviderOutcome::Success(texts),
            None => ProviderOutcome::Failure {
                error: TranslationError::InvalidResponse {
                    message: "translation missing for some inputs".to_string(),
                },
                attempts: attempts_made,
            },
        }
    }
}

#[async_trait]
impl TranslationProvider for ProviderClient {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn tier(&self) -> u32 {
        self.descriptor.tier
    }

    fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> ProviderOutcome {
        let Some(backend) = self.backend.as_deref() else {
            return ProviderOutcome::Failure {
                error: TranslationError::Authentication {
                    message: format!("no credentials configured for {}", self.descriptor.name),
                },
                attempts: 0,
            };
        };

        let outcome = self.run(backend, texts, source_lang, target_lang).await;
        match &outcome {
            ProviderOutcome::Success(texts) => {
                self.stats.record_success(texts.len() as u64);
                info!(
                    "{}: translated {} texts to {}",
                    self.descriptor.name,
                    texts.len(),
                    target_lang
                );
            }
            ProviderOutcome::Failure { error, attempts } => {
                self.stats.record_failure(&error.to_string());
                warn!(
                    "{}: failed after {} attempts: {}",
                    self.descriptor.name, attempts, error
                );
            }
        }
        outcome
    }
}
