//! Text-to-speech provider trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::sleep;

use relay_core::error::Result;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct TtsOutput {
    pub audio_data_base64: String,
    pub service_type: String,
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str, language_code: &str) -> Result<TtsOutput>;
}

/// Fallback provider: signals "use the client's own speech synthesis"
/// instead of returning audio bytes, matching the `useClientSpeech` escape
/// hatch in the outbound translation frame.
pub struct NullTtsProvider;

#[async_trait]
impl TtsProvider for NullTtsProvider {
    async fn synthesize(&self, _text: &str, _language_code: &str) -> Result<TtsOutput> {
        Ok(TtsOutput {
            audio_data_base64: String::new(),
            service_type: "browser-speech".to_string(),
        })
    }
}

/// Wraps a provider with the retry/backoff synthesis needs: up to
/// `MAX_ATTEMPTS` tries with exponential backoff, then empty audio (the
/// client falls back to browser speech) rather than failing the handler.
pub struct RetryingTtsProvider<P> {
    inner: P,
}

impl<P: TtsProvider> RetryingTtsProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: TtsProvider> TtsProvider for RetryingTtsProvider<P> {
    async fn synthesize(&self, text: &str, language_code: &str) -> Result<TtsOutput> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.synthesize(text, language_code).await {
                Ok(out) => return Ok(out),
                Err(error) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, %error, language_code, "tts attempt failed, retrying");
                    sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                }
                Err(error) => {
                    tracing::warn!(%error, language_code, "tts exhausted retries, falling back to browser speech");
                    return Ok(TtsOutput {
                        audio_data_base64: String::new(),
                        service_type: "browser-speech".to_string(),
                    });
                }
            }
        }
    }
}

fn fingerprint(text: &str, language_code: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    language_code.hash(&mut hasher);
    hasher.finish()
}

/// Caches synthesized audio by a fingerprint of `(text, languageCode)` so a
/// phrase translated to the same language twice isn't re-synthesized.
pub struct CachingTtsProvider<P> {
    inner: P,
    cache: DashMap<u64, TtsOutput>,
}

impl<P: TtsProvider> CachingTtsProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner, cache: DashMap::new() }
    }
}

#[async_trait]
impl<P: TtsProvider> TtsProvider for CachingTtsProvider<P> {
    async fn synthesize(&self, text: &str, language_code: &str) -> Result<TtsOutput> {
        let key = fingerprint(text, language_code);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        let out = self.inner.synthesize(text, language_code).await?;
        self.cache.insert(key, out.clone());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn null_provider_signals_client_speech() {
        let provider = NullTtsProvider;
        let out = provider.synthesize("hi", "es").await.expect("ok");
        assert!(out.audio_data_base64.is_empty());
        assert_eq!(out.service_type, "browser-speech");
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TtsProvider for CountingProvider {
        async fn synthesize(&self, text: &str, _language_code: &str) -> Result<TtsOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TtsOutput { audio_data_base64: format!("audio:{text}"), service_type: "mock".into() })
        }
    }

    #[tokio::test]
    async fn caches_by_text_and_language_fingerprint() {
        let provider = CachingTtsProvider::new(CountingProvider { calls: AtomicUsize::new(0) });
        let first = provider.synthesize("hello", "es").await.expect("ok");
        let second = provider.synthesize("hello", "es").await.expect("ok");
        assert_eq!(first.audio_data_base64, second.audio_data_base64);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_language_is_a_cache_miss() {
        let provider = CachingTtsProvider::new(CountingProvider { calls: AtomicUsize::new(0) });
        provider.synthesize("hello", "es").await.expect("ok");
        provider.synthesize("hello", "fr").await.expect("ok");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }
}
