//! Per-provider usage counters

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Usage counters owned by one provider client
#[derive(Debug, Default)]
pub struct ProviderStats {
    requests: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    texts_translated: AtomicU64,
    last_event: Mutex<LastEvent>,
}

#[derive(Debug, Default, Clone)]
struct LastEvent {
    success_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

/// Point-in-time copy of a provider's counters
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProviderStatsSnapshot {
    pub requests: u64,
    pub retries: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub texts_translated: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProviderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One outbound HTTP attempt
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries(&self, retries: u64) {
        self.retries.fetch_add(retries, Ordering::Relaxed);
    }

    pub fn record_cache(&self, hits: u64, misses: u64) {
        self.cache_hits.fetch_add(hits, Ordering::Relaxed);
        self.cache_misses.fetch_add(misses, Ordering::Relaxed);
    }

    /// A whole provider attempt succeeded
    pub fn record_success(&self, texts: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.texts_translated.fetch_add(texts, Ordering::Relaxed);
        self.with_last_event(|last| last.success_at = Some(Utc::now()));
    }

    /// A whole provider attempt failed
    pub fn record_failure(&self, error: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let error = error.to_string();
        self.with_last_event(|last| last.error = Some(error));
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Get current usage statistics
    pub fn snapshot(&self) -> ProviderStatsSnapshot {
        let last = self
            .last_event
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default();
        ProviderStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            texts_translated: self.texts_translated.load(Ordering::Relaxed),
            last_success_at: last.success_at,
            last_error: last.error,
        }
    }

    fn with_last_event(&self, update: impl FnOnce(&mut LastEvent)) {
        // A poisoned lock only loses the diagnostic fields
        if let Ok(mut last) = self.last_event.lock() {
            update(&mut last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ProviderStats::new();
        stats.record_request();
        stats.record_request();
        stats.record_retries(1);
        stats.record_cache(3, 2);
        stats.record_success(5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.texts_translated, 5);
        assert!(snapshot.last_success_at.is_some());
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_failure_keeps_last_error() {
        let stats = ProviderStats::new();
        stats.record_failure("first");
        stats.record_failure("second");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.last_error.as_deref(), Some("second"));
    }
}
