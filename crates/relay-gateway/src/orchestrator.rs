//! Translation fan-out orchestrator (component C8).
//!
//! Given a teacher's transcription, translates it once per distinct student
//! language in the classroom and delivers a `TranslationFrame` to every
//! listener on that language, retrying a full outbound queue a bounded
//! number of times before giving up on that one connection. Every stage is
//! timed so the outbound frame carries real latency breakdown instead of
//! zeros.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use relay_core::error::Result;
use relay_core::protocol::outbound::{Latency, LatencyComponents, SpeechParams, TranslationFrame};
use relay_core::protocol::Outbound;

use crate::obs::metrics::GatewayMetrics;
use crate::providers::{TranslationProvider, TtsProvider};
use crate::registry::{ConnectionRegistry, Role};
use crate::store::Store;

const MAX_SEND_ATTEMPTS: usize = 3;
const SEND_RETRY_DELAY: Duration = Duration::from_millis(20);
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// The narrow slice of durable storage the orchestrator needs: persisting a
/// translated pair and bumping the session's translation counter. Kept as a
/// trait (rather than a direct `Arc<Store>` dependency) so the fan-out logic
/// is unit-testable without a live Postgres connection, the same seam
/// `TranslationProvider`/`TtsProvider` give the provider side.
#[async_trait]
pub trait TranslationSink: Send + Sync {
    async fn persist_translation(
        &self,
        session_id: Uuid,
        source_language: &str,
        target_language: &str,
        source_text: &str,
        translated_text: &str,
    ) -> Result<()>;

    async fn bump_total_translations(&self, session_id: Uuid) -> Result<()>;
}

#[async_trait]
impl TranslationSink for Store {
    async fn persist_translation(
        &self,
        session_id: Uuid,
        source_language: &str,
        target_language: &str,
        source_text: &str,
        translated_text: &str,
    ) -> Result<()> {
        self.insert_translation(session_id, source_language, target_language, source_text, translated_text)
            .await?;
        Ok(())
    }

    async fn bump_total_translations(&self, session_id: Uuid) -> Result<()> {
        self.increment_total_translations(session_id).await
    }
}

pub struct Orchestrator {
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn TranslationSink>,
    translation: Arc<dyn TranslationProvider>,
    tts: Arc<dyn TtsProvider>,
    metrics: Arc<GatewayMetrics>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn TranslationSink>,
        translation: Arc<dyn TranslationProvider>,
        tts: Arc<dyn TtsProvider>,
        metrics: Arc<GatewayMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self { registry, sink, translation, tts, metrics })
    }

    /// Translates and delivers `text` to every student in `session_id`,
    /// grouped by target language so each distinct language is translated
    /// once regardless of how many students share it.
    pub async fn fan_out(
        &self,
        session_id: Uuid,
        source_language: &str,
        text: &str,
        use_client_speech: bool,
    ) {
        let preparation_start = Instant::now();
        let students = self.registry.students_in_session(session_id);
        let preparation_ms = preparation_start.elapsed().as_millis() as i64;

        let mut by_language: HashMap<String, Vec<_>> = HashMap::new();
        for student in students {
            let lang = student.language_code.clone().unwrap_or_else(|| source_language.to_string());
            by_language.entry(lang).or_default().push(student);
        }

        for (target_language, connections) in by_language {
            if target_language == source_language {
                self.deliver_same_language(text, source_language, &target_language, preparation_ms, use_client_speech, &connections);
                continue;
            }

            let translation_start = Instant::now();
            let translated = match timeout(
                PROVIDER_TIMEOUT,
                self.translation.translate(text, source_language, &target_language),
            )
            .await
            {
                Ok(Ok(t)) if !t.is_empty() => t,
                Ok(Ok(_)) => {
                    tracing::warn!(target_language, "translation returned empty text, passing source text through");
                    text.to_string()
                }
                Ok(Err(e)) => {
                    self.metrics.provider_failures.inc(&[("provider", "translation")]);
                    tracing::warn!(error = %e, target_language, "translation failed, passing source text through");
                    text.to_string()
                }
                Err(_) => {
                    self.metrics.provider_failures.inc(&[("provider", "translation"), ("reason", "timeout")]);
                    tracing::warn!(target_language, "translation timed out, passing source text through");
                    text.to_string()
                }
            };
            let translation_ms = translation_start.elapsed().as_millis() as i64;

            let (audio_data, speech_params, tts_ms, service_type) = if use_client_speech {
                (None, Some(SpeechParams::browser_speech(translated.clone(), target_language.clone())), 0, None)
            } else {
                let tts_start = Instant::now();
                match timeout(PROVIDER_TIMEOUT, self.tts.synthesize(&translated, &target_language)).await {
                    Ok(Ok(out)) if !out.audio_data_base64.is_empty() => {
                        (Some(out.audio_data_base64), None, tts_start.elapsed().as_millis() as i64, Some(out.service_type))
                    }
                    Ok(Ok(out)) => (
                        None,
                        Some(SpeechParams::browser_speech(translated.clone(), target_language.clone())),
                        tts_start.elapsed().as_millis() as i64,
                        Some(out.service_type),
                    ),
                    Ok(Err(e)) => {
                        self.metrics.provider_failures.inc(&[("provider", "tts")]);
                        tracing::warn!(error = %e, target_language, "tts failed, falling back to client speech");
                        (None, Some(SpeechParams::browser_speech(translated.clone(), target_language.clone())), 0, None)
                    }
                    Err(_) => {
                        self.metrics.provider_failures.inc(&[("provider", "tts"), ("reason", "timeout")]);
                        (None, Some(SpeechParams::browser_speech(translated.clone(), target_language.clone())), 0, None)
                    }
                }
            };

            let processing_ms = 0i64;
            let total_ms = preparation_ms + translation_ms + tts_ms + processing_ms;
            let frame = Outbound::Translation(Box::new(TranslationFrame {
                text: translated,
                original_text: text.to_string(),
                source_language: source_language.to_string(),
                target_language: target_language.clone(),
                tts_service_type: service_type,
                use_client_speech: speech_params.is_some(),
                speech_params,
                audio_data,
                latency: Latency {
                    total: total_ms,
                    server_complete_time: Utc::now().timestamp_millis(),
                    components: LatencyComponents {
                        preparation: preparation_ms,
                        translation: translation_ms,
                        tts: tts_ms,
                        processing: processing_ms,
                    },
                },
            }));

            self.metrics.translation_fanout_total.inc(&[("target_language", &target_language)]);
            self.metrics.translation_latency.observe(&[("target_language", &target_language)], Duration::from_millis(total_ms.max(0) as u64));

            for conn in connections {
                self.deliver(conn.connection_id, frame.clone()).await;
            }

            self.persist_translation(session_id, source_language.to_string(), target_language, text.to_string(), translated);
        }
    }

    /// Persists the translation row and bumps `totalTranslations` off the
    /// delivery path, per the persistence error policy: logged at ERROR,
    /// never blocks delivery.
    fn persist_translation(
        &self,
        session_id: Uuid,
        source_language: String,
        target_language: String,
        source_text: String,
        translated_text: String,
    ) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(error) = sink
                .persist_translation(session_id, &source_language, &target_language, &source_text, &translated_text)
                .await
            {
                tracing::error!(%error, %session_id, target_language, "failed to persist translation");
                return;
            }
            if let Err(error) = sink.bump_total_translations(session_id).await {
                tracing::error!(%error, %session_id, "failed to increment total_translations");
            }
        });
    }

    fn deliver_same_language(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        preparation_ms: i64,
        use_client_speech: bool,
        connections: &[crate::registry::ConnectionHandle],
    ) {
        let frame = Outbound::Translation(Box::new(TranslationFrame {
            text: text.to_string(),
            original_text: text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            tts_service_type: None,
            use_client_speech,
            speech_params: None,
            audio_data: None,
            latency: Latency {
                total: preparation_ms,
                server_complete_time: Utc::now().timestamp_millis(),
                components: LatencyComponents {
                    preparation: preparation_ms,
                    translation: 0,
                    tts: 0,
                    processing: 0,
                },
            },
        }));
        for conn in connections {
            let registry = self.registry.clone();
            let conn_id = conn.connection_id;
            let frame = frame.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                deliver_with_retry(&registry, conn_id, frame, &metrics).await;
            });
        }
    }

    async fn deliver(&self, connection_id: Uuid, frame: Outbound) {
        deliver_with_retry(&self.registry, connection_id, frame, &self.metrics).await;
    }
}

/// Retries a full outbound queue a bounded number of times before giving up
/// on a single connection; other listeners are unaffected.
async fn deliver_with_retry(
    registry: &ConnectionRegistry,
    connection_id: Uuid,
    frame: Outbound,
    metrics: &GatewayMetrics,
) {
    let Some(handle) = registry.get(connection_id) else {
        return;
    };
    let mut attempt = 0;
    let mut pending = frame;
    loop {
        attempt += 1;
        match handle.try_send(pending) {
            Ok(()) => return,
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => return,
            Err(tokio::sync::mpsc::error::TrySendError::Full(returned)) => {
                pending = returned;
                if attempt >= MAX_SEND_ATTEMPTS {
                    metrics.translation_send_retries.inc(&[("outcome", "dropped")]);
                    tracing::warn!(%connection_id, "dropping translation frame after outbound queue stayed full");
                    return;
                }
                metrics.translation_send_retries.inc(&[("outcome", "retried")]);
                sleep(SEND_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::metrics::GatewayMetrics;
    use crate::providers::{NullTranslationProvider, NullTtsProvider};
    use tokio::sync::mpsc;

    struct NullSink;

    #[async_trait]
    impl TranslationSink for NullSink {
        async fn persist_translation(
            &self,
            _session_id: Uuid,
            _source_language: &str,
            _target_language: &str,
            _source_text: &str,
            _translated_text: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn bump_total_translations(&self, _session_id: Uuid) -> Result<()> {
            Ok(())
        }
    }

    fn test_orchestrator(registry: Arc<ConnectionRegistry>) -> Arc<Orchestrator> {
        Orchestrator::new(
            registry,
            Arc::new(NullSink),
            Arc::new(NullTranslationProvider),
            Arc::new(NullTtsProvider),
            Arc::new(GatewayMetrics::default()),
        )
    }

    fn register_student(registry: &ConnectionRegistry, session_id: Uuid, language: &str) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(8);
        let (ping_tx, _ping_rx) = mpsc::channel(1);
        registry.register(Uuid::new_v4(), session_id, Role::Student, Some(language.into()), tx, ping_tx);
        rx
    }

    #[tokio::test]
    async fn fan_out_delivers_translated_frame_to_student() {
        let registry = ConnectionRegistry::new();
        let orchestrator = test_orchestrator(registry.clone());

        let session_id = Uuid::new_v4();
        let mut rx = register_student(&registry, session_id, "es");

        orchestrator.fan_out(session_id, "en-US", "hello", true).await;

        let frame = rx.recv().await.expect("frame delivered");
        match frame {
            Outbound::Translation(t) => {
                assert_eq!(t.target_language, "es");
                assert_eq!(t.text, "hello");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
