use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single recognition result from the live engine.
///
/// Final results are appended to the accumulated transcript; interim results
/// replace the not-yet-committed preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionEvent {
    pub text: String,
    pub is_final: bool,
}

/// Non-fatal engine errors; the session continues through all of these.
///
/// `PermissionDenied` additionally disables restart attempts. A
/// `LanguageNotSupported` report auto-corrects to the default language.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no speech detected")]
    NoSpeechDetected,

    #[error("engine audio capture failed: {0}")]
    AudioCaptureFailed(String),

    #[error("speech recognition permission denied")]
    PermissionDenied,

    #[error("speech service network error: {0}")]
    Network(String),

    #[error("speech service unavailable")]
    ServiceUnavailable,

    #[error("language not supported: {0}")]
    LanguageNotSupported(String),

    #[error("unknown engine error: {0}")]
    Unknown(String),
}

/// Events delivered on the engine's channel.
///
/// `Ended` may arrive unsolicited: some engines terminate on their own after
/// a period of silence even though recording is still active.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Transcript(TranscriptionEvent),
    Ended,
    Error(EngineError),
}

/// Continuous speech-to-text engine trait
///
/// Implementations run in continuous + interim-results mode and may emit one
/// trailing event after `stop` before closing the channel.
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Start recognition in the given language.
    ///
    /// Returns a channel receiver for recognition events. An error here
    /// means the engine is unavailable on this host; the session still
    /// functions via the audio-upload path.
    async fn start(&mut self, language: &str) -> Result<mpsc::Receiver<EngineEvent>>;

    /// Stop recognition (best-effort).
    async fn stop(&mut self);

    /// Get engine name for logging
    fn name(&self) -> &str;
}

/// Engine stand-in for hosts without live recognition.
///
/// `start` always fails, which routes every session through the slow
/// (audio-upload) evaluation path.
pub struct NullEngine;

#[async_trait::async_trait]
impl SpeechEngine for NullEngine {
    async fn start(&mut self, _language: &str) -> Result<mpsc::Receiver<EngineEvent>> {
        anyhow::bail!("no live speech engine on this host")
    }

    async fn stop(&mut self) {}

    fn name(&self) -> &str {
        "null"
    }
}
