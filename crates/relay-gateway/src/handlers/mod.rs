//! Per-message-type handlers (component C7).

pub mod audio;
pub mod heartbeat;
pub mod register;
pub mod settings;
pub mod transcription;
pub mod tts;

use std::sync::Arc;

use crate::dispatch::Dispatcher;

/// Registers every handler with the dispatcher. Called once at startup.
pub fn register_all(dispatcher: &Dispatcher) {
    dispatcher.register(Arc::new(register::RegisterHandler));
    dispatcher.register(Arc::new(heartbeat::PingHandler));
    dispatcher.register(Arc::new(heartbeat::PongHandler));
    dispatcher.register(Arc::new(settings::SettingsHandler));
    dispatcher.register(Arc::new(transcription::TranscriptionHandler));
    dispatcher.register(Arc::new(tts::TtsRequestHandler));
    dispatcher.register(Arc::new(audio::AudioHandler));
}
