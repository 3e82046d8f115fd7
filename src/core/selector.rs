//! Provider ordering by language affinity and tier

use std::sync::Arc;

use crate::core::client::TranslationProvider;

/// Orders enabled, credentialed providers for a target language
pub struct ProviderSelector;

impl ProviderSelector {
    /// Preferred-language providers first, then the rest; each group ascending by tier,
    /// configuration order breaking ties.
    pub fn select(
        providers: &[Arc<dyn TranslationProvider>],
        target_lang: &str,
    ) -> Vec<Arc<dyn TranslationProvider>> {
        let (mut preferred, mut other): (Vec<_>, Vec<_>) = providers
            .iter()
            .filter(|p| p.descriptor().enabled && p.is_available())
            .cloned()
            .partition(|p| p.descriptor().prefers(target_lang));

        // sort_by_key is stable
        preferred.sort_by_key(|p| p.tier());
        other.sort_by_key(|p| p.tier());

        preferred.extend(other);
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ResponseCache;
    use crate::core::client::ProviderClient;
    use crate::core::config::{ProviderDescriptor, ProviderKind};
    use crate::core::testing::{descriptor, provider, ScriptedBackend};

    fn build(setups: &[(&str, u32, &[&str])]) -> Vec<Arc<dyn TranslationProvider>> {
        let cache = Arc::new(ResponseCache::new(10));
        setups
            .iter()
            .map(|(name, tier, langs)| {
                let mut desc = descriptor(name, *tier);
                desc.preferred_languages = langs.iter().map(|l| l.to_string()).collect();
                provider(desc, Arc::new(ScriptedBackend::echo("")), cache.clone())
            })
            .collect()
    }

    fn names(providers: &[Arc<dyn TranslationProvider>]) -> Vec<String> {
        providers.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_language_affinity_overrides_tier() {
        let providers = build(&[("A", 2, &["fi"]), ("B", 1, &[])]);
        assert_eq!(names(&ProviderSelector::select(&providers, "fi")), vec!["A", "B"]);
        assert_eq!(names(&ProviderSelector::select(&providers, "de")), vec!["B", "A"]);
    }

    #[test]
    fn test_ties_keep_configuration_order() {
        let providers = build(&[
            ("third", 3, &[]),
            ("first-a", 1, &[]),
            ("first-b", 1, &[]),
            ("pref-2", 2, &["sv"]),
            ("pref-1", 1, &["sv"]),
        ]);
        assert_eq!(
            names(&ProviderSelector::select(&providers, "sv")),
            vec!["pref-1", "pref-2", "first-a", "first-b", "third"]
        );
    }

    #[test]
    fn test_disabled_and_unavailable_are_filtered() {
        let cache = Arc::new(ResponseCache::new(10));
        let mut disabled = descriptor("disabled", 1);
        disabled.enabled = false;

        let no_key = ProviderDescriptor::new("no-key", ProviderKind::Generic, 1);

        let providers: Vec<Arc<dyn TranslationProvider>> = vec![
            provider(disabled, Arc::new(ScriptedBackend::echo("")), cache.clone()),
            Arc::new(ProviderClient::with_api_key(no_key, None, cache.clone()).unwrap()),
            provider(descriptor("ok", 5), Arc::new(ScriptedBackend::echo("")), cache),
        ];

        assert_eq!(names(&ProviderSelector::select(&providers, "fi")), vec!["ok"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(ProviderSelector::select(&[], "fi").is_empty());
    }
}
