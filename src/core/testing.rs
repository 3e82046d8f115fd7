//! Scripted backends for exercising providers and the router without a network

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::backends::Backend;
use crate::core::cache::ResponseCache;
use crate::core::client::{ProviderClient, TranslationProvider};
use crate::core::config::{ProviderDescriptor, ProviderKind};
use crate::core::errors::{Result, TranslationError};

type ErrorFactory = Box<dyn Fn() -> TranslationError + Send + Sync>;

enum Script {
    /// Prefix every text
    Echo(String),
    /// Fail every call
    Fail(ErrorFactory),
    /// Fail only the n-th call (1-based), echo with "ok:" otherwise
    FailOnCall(usize, ErrorFactory),
    /// Never answer
    Hang,
}

/// Backend double that counts calls and records what it received
pub struct ScriptedBackend {
    script: Script,
    calls: AtomicUsize,
    received: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn echo(prefix: &str) -> Self {
        Self::new(Script::Echo(prefix.to_string()))
    }

    pub fn failing(error: impl Fn() -> TranslationError + Send + Sync + 'static) -> Self {
        Self::new(Script::Fail(Box::new(error)))
    }

    pub fn fail_on_call(
        call: usize,
        error: impl Fn() -> TranslationError + Send + Sync + 'static,
    ) -> Self {
        Self::new(Script::FailOnCall(call, Box::new(error)))
    }

    pub fn hanging() -> Self {
        Self::new(Script::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Vec<String>> {
        self.received.lock().unwrap().clone()
    }
}

fn prefixed(prefix: &str, texts: &[String]) -> Vec<String> {
    texts.iter().map(|t| format!("{}{}", prefix, t)).collect()
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn send(
        &self,
        texts: &[String],
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Vec<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.received.lock().unwrap().push(texts.to_vec());

        match &self.script {
            Script::Echo(prefix) => Ok(prefixed(prefix, texts)),
            Script::Fail(error) => Err(error()),
            Script::FailOnCall(n, error) if *n == call => Err(error()),
            Script::FailOnCall(..) => Ok(prefixed("ok:", texts)),
            Script::Hang => std::future::pending().await,
        }
    }
}

/// Descriptor with fast retries for tests
pub fn descriptor(name: &str, tier: u32) -> ProviderDescriptor {
    ProviderDescriptor {
        initial_retry_delay_ms: 10,
        max_retry_delay_ms: 100,
        ..ProviderDescriptor::new(name, ProviderKind::Generic, tier)
    }
}

/// Provider over a scripted backend sharing `cache`
pub fn provider(
    descriptor: ProviderDescriptor,
    backend: Arc<ScriptedBackend>,
    cache: Arc<ResponseCache>,
) -> Arc<dyn TranslationProvider> {
    Arc::new(ProviderClient::with_backend(descriptor, backend, cache))
}
