//! Fallback router trying providers in priority order

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::cache::ResponseCache;
use crate::core::client::{ProviderClient, TranslationProvider};
use crate::core::config::{FallbackSettings, RouterConfig};
use crate::core::errors::{ProviderFailure, Result, TranslationError};
use crate::core::models::{ProviderOutcome, RoutedTranslation, RouterResult, TranslationRequest};
use crate::core::selector::ProviderSelector;

/// Router owning the providers, their rate limiters and the shared response cache
#[derive(Clone)]
pub struct FallbackRouter {
    providers: Vec<Arc<dyn TranslationProvider>>,
    cache: Arc<ResponseCache>,
    settings: FallbackSettings,
}

impl FallbackRouter {
    /// Create a router over already constructed providers
    pub fn new(
        providers: Vec<Arc<dyn TranslationProvider>>,
        cache: Arc<ResponseCache>,
        settings: FallbackSettings,
    ) -> Self {
        Self {
            providers,
            cache,
            settings,
        }
    }

    /// Build HTTP providers from configuration, resolving credentials from the environment
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        Self::from_config_with_keys(config, |name| std::env::var(name).ok())
    }

    /// Build HTTP providers, resolving credentials through `lookup`
    pub fn from_config_with_keys(
        config: &RouterConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(ResponseCache::from_settings(&config.cache));
        let mut providers: Vec<Arc<dyn TranslationProvider>> =
            Vec::with_capacity(config.providers.len());

        for descriptor in &config.providers {
            let client = ProviderClient::with_api_key(
                descriptor.clone(),
                descriptor.resolve_api_key_with(&lookup),
                cache.clone(),
            )?;
            if descriptor.enabled && !client.is_available() {
                if !config.fallback.skip_on_missing_key {
                    return Err(TranslationError::ConfigError {
                        message: format!("no API key configured for provider {}", descriptor.name),
                    });
                }
                warn!(
                    "Provider {} has no API key and will be skipped",
                    descriptor.name
                );
            }
            providers.push(Arc::new(client));
        }

        info!(
            "Router ready with {} providers ({} available)",
            providers.len(),
            providers
                .iter()
                .filter(|p| p.descriptor().enabled && p.is_available())
                .count()
        );

        Ok(Self::new(providers, cache, config.fallback.clone()))
    }

    /// Create from configuration file and environment
    pub fn from_env(config_path: Option<&std::path::Path>) -> Result<Self> {
        let config = RouterConfig::load(config_path)?;
        Self::from_config(&config)
    }

    /// All configured providers, in configuration order
    pub fn providers(&self) -> &[Arc<dyn TranslationProvider>] {
        &self.providers
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Providers in the order they would be tried for `target_lang`
    pub fn select(&self, target_lang: &str) -> Vec<Arc<dyn TranslationProvider>> {
        ProviderSelector::select(&self.providers, target_lang)
    }

    /// Translate a batch, falling back through the providers until one succeeds
    pub async fn translate_batch(&self, request: &TranslationRequest) -> RouterResult {
        self.route(request).await
    }

    /// Like `translate_batch`, abandoning the in-flight provider once `cancel` fires
    pub async fn translate_batch_with_cancel(
        &self,
        request: &TranslationRequest,
        cancel: &CancellationToken,
    ) -> RouterResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Translation to {} cancelled", request.target_lang);
                Err(TranslationError::Cancelled)
            }
            result = self.route(request) => result,
        }
    }

    async fn route(&self, request: &TranslationRequest) -> RouterResult {
        let ordered = self.select(&request.target_lang);
        if ordered.is_empty() {
            return Err(TranslationError::NoProvidersAvailable {
                target_lang: request.target_lang.clone(),
            });
        }

        debug!(
            "Routing {} texts to {} via [{}]",
            request.texts.len(),
            request.target_lang,
            ordered
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut failures = Vec::new();

        for (i, provider) in ordered.iter().enumerate() {
            let outcome = provider
                .translate_batch(&request.texts, &request.source_lang, &request.target_lang)
                .await;

            match outcome {
                ProviderOutcome::Success(texts) => {
                    if i > 0 && self.settings.log_fallback_events {
                        info!(
                            "Translated with fallback provider {} after {} failed",
                            provider.name(),
                            i
                        );
                    }
                    return Ok(RoutedTranslation {
                        texts,
                        provider_used: provider.name().to_string(),
                        fallback_count: i,
                        failures,
                    });
                }
                ProviderOutcome::Failure { error, attempts } => {
                    warn!("Provider {} failed: {}", provider.name(), error);
                    if self.settings.log_fallback_events {
                        if let Some(next) = ordered.get(i + 1) {
                            info!("Falling back from {} to {}", provider.name(), next.name());
                        }
                    }
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        error,
                        attempts,
                    });
                }
            }
        }

        Err(TranslationError::AllProvidersFailed { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ProviderDescriptor, ProviderKind};
    use crate::core::testing::{descriptor, provider, ScriptedBackend};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn request(texts: &[&str], target: &str) -> TranslationRequest {
        TranslationRequest::new(texts.iter().map(|s| s.to_string()).collect(), target)
            .with_source_lang("en")
    }

    fn router(setups: Vec<(ProviderDescriptor, Arc<ScriptedBackend>)>) -> FallbackRouter {
        let cache = Arc::new(ResponseCache::new(100));
        let providers = setups
            .into_iter()
            .map(|(desc, backend)| provider(desc, backend, cache.clone()))
            .collect();
        FallbackRouter::new(providers, cache, FallbackSettings::default())
    }

    fn fatal() -> TranslationError {
        TranslationError::from_status(401, "invalid key".into(), None)
    }

    #[tokio::test]
    async fn test_fallback_determinism() {
        let a = Arc::new(ScriptedBackend::failing(fatal));
        let b = Arc::new(ScriptedBackend::echo("b:"));
        let router = router(vec![
            (descriptor("A", 1), a.clone()),
            (descriptor("B", 2), b.clone()),
        ]);

        let result = assert_ok!(router.translate_batch(&request(&["hi", "there"], "fi")).await);
        assert_eq!(result.texts, vec!["b:hi", "b:there"]);
        assert_eq!(result.provider_used, "B");
        assert_eq!(result.fallback_count, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].provider, "A");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let a = Arc::new(ScriptedBackend::echo("a:"));
        let b = Arc::new(ScriptedBackend::echo("b:"));
        let router = router(vec![
            (descriptor("A", 1), a.clone()),
            (descriptor("B", 2), b.clone()),
        ]);

        let result = assert_ok!(router.translate_batch(&request(&["hi"], "fi")).await);
        assert_eq!(result.provider_used, "A");
        assert_eq!(result.fallback_count, 0);
        assert!(result.failures.is_empty());
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_every_provider_in_order() {
        let router = router(vec![
            (descriptor("C", 3), Arc::new(ScriptedBackend::failing(fatal))),
            (
                descriptor("A", 1),
                Arc::new(ScriptedBackend::failing(|| TranslationError::Timeout)),
            ),
            (
                descriptor("B", 2),
                Arc::new(ScriptedBackend::failing(|| TranslationError::ClientError {
                    status: 404,
                    message: "no such endpoint".into(),
                })),
            ),
        ]);

        let err = assert_err!(router.translate_batch(&request(&["hi"], "fi")).await);
        match &err {
            TranslationError::AllProvidersFailed { failures } => {
                let order: Vec<_> = failures.iter().map(|f| f.provider.as_str()).collect();
                assert_eq!(order, vec!["A", "B", "C"]);
                assert_eq!(failures[0].attempts, 4);
                assert!(matches!(
                    failures[0].error,
                    TranslationError::MaxRetriesExceeded { .. }
                ));
                assert!(matches!(
                    failures[1].error,
                    TranslationError::ClientError { status: 404, .. }
                ));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("[1] A"));
        assert!(message.contains("[3] C"));
    }

    #[tokio::test]
    async fn test_no_providers_available() {
        let router = FallbackRouter::new(
            vec![],
            Arc::new(ResponseCache::new(10)),
            FallbackSettings::default(),
        );
        let err = assert_err!(router.translate_batch(&request(&["hi"], "fi")).await);
        assert!(matches!(err, TranslationError::NoProvidersAvailable { .. }));
    }

    #[tokio::test]
    async fn test_cache_idempotence_across_calls() {
        let a = Arc::new(ScriptedBackend::echo("a:"));
        let router = router(vec![(descriptor("A", 1), a.clone())]);
        let req = request(&["one", "two", "three"], "fi");

        let first = assert_ok!(router.translate_batch(&req).await);
        let second = assert_ok!(router.translate_batch(&req).await);
        assert_eq!(first.texts, second.texts);
        assert_eq!(a.calls(), 1);
        assert_eq!(router.cache().stats().await.hits, 3);
    }

    #[tokio::test]
    async fn test_cache_is_per_provider() {
        let a = Arc::new(ScriptedBackend::echo("a:"));
        let b = Arc::new(ScriptedBackend::echo("b:"));
        let cache = Arc::new(ResponseCache::new(100));
        let mut only_b = descriptor("B", 2);
        only_b.preferred_languages = vec!["sv".into()];
        let router = FallbackRouter::new(
            vec![
                provider(descriptor("A", 1), a.clone(), cache.clone()),
                provider(only_b, b.clone(), cache.clone()),
            ],
            cache,
            FallbackSettings::default(),
        );

        assert_ok!(router.translate_batch(&request(&["hi"], "fi")).await);
        // Same text, B preferred for sv: A's cached entry must not be reused
        let result = assert_ok!(router.translate_batch(&request(&["hi"], "sv")).await);
        assert_eq!(result.texts, vec!["b:hi"]);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_language_affinity_routing() {
        let a = Arc::new(ScriptedBackend::echo("a:"));
        let b = Arc::new(ScriptedBackend::echo("b:"));
        let mut desc_a = descriptor("A", 2);
        desc_a.preferred_languages = vec!["fi".into()];
        let router = router(vec![(desc_a, a.clone()), (descriptor("B", 1), b.clone())]);

        let fi = assert_ok!(router.translate_batch(&request(&["x"], "fi")).await);
        assert_eq!(fi.provider_used, "A");
        let de = assert_ok!(router.translate_batch(&request(&["x"], "de")).await);
        assert_eq!(de.provider_used, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_in_flight_provider() {
        let a = Arc::new(ScriptedBackend::hanging());
        let b = Arc::new(ScriptedBackend::echo("b:"));
        let mut slow = descriptor("A", 1);
        slow.timeout_ms = 60_000;
        let router = router(vec![(slow, a.clone()), (descriptor("B", 2), b.clone())]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = assert_err!(
            router
                .translate_batch_with_cancel(&request(&["hi"], "fi"), &cancel)
                .await
        );
        assert!(matches!(err, TranslationError::Cancelled));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_progress_independently() {
        let mut slow_desc = descriptor("slow", 1);
        slow_desc.rate_limit_per_second = 1;
        slow_desc.batch_size = 1;
        slow_desc.preferred_languages = vec!["de".into()];
        let mut fast_desc = descriptor("fast", 1);
        fast_desc.preferred_languages = vec!["fi".into()];

        let slow = Arc::new(ScriptedBackend::echo("de:"));
        let fast = Arc::new(ScriptedBackend::echo("fi:"));
        let router = router(vec![(slow_desc, slow.clone()), (fast_desc, fast.clone())]);

        let start = tokio::time::Instant::now();
        let throttled: Vec<_> = (0..3)
            .map(|caller| {
                let router = router.clone();
                tokio::spawn(async move {
                    let texts: Vec<String> = (0..3).map(|i| format!("c{}-t{}", caller, i)).collect();
                    let req = TranslationRequest::new(texts.clone(), "de").with_source_lang("en");
                    let routed = router.translate_batch(&req).await.unwrap();
                    (texts, routed)
                })
            })
            .collect();

        let unthrottled = {
            let router = router.clone();
            tokio::spawn(async move {
                let routed = router
                    .translate_batch(&request(&["one", "two", "three"], "fi"))
                    .await
                    .unwrap();
                (routed, start.elapsed())
            })
        };

        let (routed, elapsed) = unthrottled.await.unwrap();
        assert_eq!(routed.texts, vec!["fi:one", "fi:two", "fi:three"]);
        assert_eq!(routed.provider_used, "fast");
        assert!(elapsed < Duration::from_millis(100));

        for handle in throttled {
            let (texts, routed) = handle.await.unwrap();
            let expected: Vec<String> = texts.iter().map(|t| format!("de:{}", t)).collect();
            assert_eq!(routed.texts, expected);
            assert_eq!(routed.provider_used, "slow");
        }
        assert_eq!(slow.calls(), 9);
        assert_eq!(fast.calls(), 1);
        // one token up front, then one per second
        assert!(start.elapsed() >= Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_from_config_skips_missing_keys() {
        let mut with_key = ProviderDescriptor::new("keyed", ProviderKind::Generic, 2);
        with_key.api_key = Some("secret".into());
        let mut without_key = ProviderDescriptor::new("keyless", ProviderKind::Generic, 1);
        let no_env = |_: &str| None;

        let mut config = RouterConfig {
            providers: vec![without_key, with_key],
            ..Default::default()
        };
        let router = assert_ok!(FallbackRouter::from_config_with_keys(&config, no_env));
        assert_eq!(router.providers().len(), 2);
        let order: Vec<_> = router.select("fi").iter().map(|p| p.name().to_string()).collect();
        assert_eq!(order, vec!["keyed"]);

        config.fallback.skip_on_missing_key = false;
        assert!(matches!(
            FallbackRouter::from_config_with_keys(&config, no_env),
            Err(TranslationError::ConfigError { .. })
        ));
    }
}
