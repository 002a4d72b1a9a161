//! Translation/TTS provider facade (component C1).
//!
//! Third-party STT/MT/TTS providers are out of scope; what lives here is the
//! trait boundary plus a deterministic fallback implementation, mirroring
//! the donor's service-trait pattern (`TextService`/`BinaryService`) so a
//! real provider can be dropped in as another `Arc<dyn ...>` without
//! touching the orchestrator.

pub mod translation;
pub mod tts;

pub use translation::{NullTranslationProvider, RetryingTranslationProvider, TranslationProvider};
pub use tts::{CachingTtsProvider, NullTtsProvider, RetryingTtsProvider, TtsOutput, TtsProvider};
