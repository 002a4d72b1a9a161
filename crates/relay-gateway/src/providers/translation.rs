//! Machine-translation provider trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use relay_core::error::Result;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String>;
}

/// Fallback provider used when no real MT backend is configured: passes the
/// source text through unchanged so the fan-out pipeline stays exercisable
/// end to end in tests and local development.
pub struct NullTranslationProvider;

#[async_trait]
impl TranslationProvider for NullTranslationProvider {
    async fn translate(&self, text: &str, _source_language: &str, _target_language: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Wraps a provider with the retry/backoff and passthrough-on-failure
/// behavior transient MT errors require: up to `MAX_ATTEMPTS` tries with
/// exponential backoff, then the source text is returned unchanged so the
/// surrounding handler never fails on a provider outage.
pub struct RetryingTranslationProvider<P> {
    inner: P,
}

impl<P: TranslationProvider> RetryingTranslationProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: TranslationProvider> TranslationProvider for RetryingTranslationProvider<P> {
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.translate(text, source_language, target_language).await {
                Ok(translated) => return Ok(translated),
                Err(error) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, %error, target_language, "translation attempt failed, retrying");
                    sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                }
                Err(error) => {
                    tracing::warn!(%error, target_language, "translation exhausted retries, passing source text through");
                    return Ok(text.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn null_provider_echoes_text() {
        let provider = NullTranslationProvider;
        let out = provider.translate("hello", "en-US", "es").await.expect("ok");
        assert_eq!(out, "hello");
    }

    struct FlakyProvider {
        fail_times: AtomicUsize,
    }

    #[async_trait]
    impl TranslationProvider for FlakyProvider {
        async fn translate(&self, text: &str, _source_language: &str, _target_language: &str) -> Result<String> {
            if self.fail_times.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(relay_core::error::RelayError::Internal("provider unavailable".into()));
            }
            Ok(format!("translated:{text}"))
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let provider = RetryingTranslationProvider::new(FlakyProvider { fail_times: AtomicUsize::new(1) });
        let out = provider.translate("hi", "en-US", "es").await.expect("ok");
        assert_eq!(out, "translated:hi");
    }

    #[tokio::test]
    async fn passes_source_text_through_after_exhausting_retries() {
        let provider = RetryingTranslationProvider::new(FlakyProvider { fail_times: AtomicUsize::new(10) });
        let out = provider.translate("hi", "en-US", "es").await.expect("ok");
        assert_eq!(out, "hi");
    }
}
