use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::engine::{EngineError, EngineEvent, SpeechEngine, TranscriptionEvent};

/// Delay before restarting an engine that terminated unsolicited
const RESTART_DELAY: Duration = Duration::from_millis(100);

/// How long to wait for the event loop to drain trailing events on stop
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Self-healing wrapper around a live speech engine.
///
/// Some engines terminate on their own after a period of silence even though
/// recording is still active. The supervisor detects an unsolicited `Ended`
/// while the recording flag is set and restarts the engine after a short
/// delay, without losing the already-accumulated final transcript. Restart
/// failures never crash the session; the audio-upload path covers evaluation
/// at stop time.
pub struct EngineSupervisor {
    engine: Arc<Mutex<Box<dyn SpeechEngine>>>,
    language: String,
    default_language: String,
    recording: Arc<AtomicBool>,
    transcript: Arc<Mutex<String>>,
    interim: Arc<Mutex<String>>,
    restarts: Arc<AtomicUsize>,
    transcript_tx: Option<mpsc::Sender<TranscriptionEvent>>,
    task: Option<JoinHandle<()>>,
}

impl EngineSupervisor {
    pub fn new(
        engine: Box<dyn SpeechEngine>,
        language: String,
        default_language: String,
        recording: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            language,
            default_language,
            recording,
            transcript: Arc::new(Mutex::new(String::new())),
            interim: Arc::new(Mutex::new(String::new())),
            restarts: Arc::new(AtomicUsize::new(0)),
            transcript_tx: None,
            task: None,
        }
    }

    /// Forward every recognition event to the given channel (UI preview)
    pub fn on_transcript(mut self, tx: mpsc::Sender<TranscriptionEvent>) -> Self {
        self.transcript_tx = Some(tx);
        self
    }

    /// Start the engine and the supervision loop.
    ///
    /// Engine unavailability is not an error: the session still works via
    /// the slow upload path, so this only logs and returns.
    pub async fn start(&mut self) {
        if self.task.is_some() {
            warn!("Engine supervisor already started");
            return;
        }

        let engine = Arc::clone(&self.engine);
        let recording = Arc::clone(&self.recording);
        let transcript = Arc::clone(&self.transcript);
        let interim = Arc::clone(&self.interim);
        let restarts = Arc::clone(&self.restarts);
        let transcript_tx = self.transcript_tx.clone();
        let default_language = self.default_language.clone();
        let mut language = self.language.clone();

        let task = tokio::spawn(async move {
            let mut retries_disabled = false;

            loop {
                let started = { engine.lock().await.start(&language).await };

                let mut events = match started {
                    Ok(rx) => rx,
                    Err(e) => {
                        warn!(
                            "Speech engine unavailable ({e:#}); relying on audio upload fallback"
                        );
                        break;
                    }
                };

                // Drain events until the engine terminates
                while let Some(event) = events.recv().await {
                    match event {
                        EngineEvent::Transcript(t) => {
                            if t.is_final {
                                // Final text appends; it is never replaced
                                let mut transcript = transcript.lock().await;
                                transcript.push_str(&t.text);
                                transcript.push(' ');
                                interim.lock().await.clear();
                            } else {
                                *interim.lock().await = t.text.clone();
                            }

                            if let Some(tx) = &transcript_tx {
                                let _ = tx.send(t).await;
                            }
                        }
                        EngineEvent::Ended => break,
                        EngineEvent::Error(EngineError::PermissionDenied) => {
                            warn!("Speech permission denied, disabling engine restarts");
                            retries_disabled = true;
                        }
                        EngineEvent::Error(EngineError::LanguageNotSupported(lang)) => {
                            warn!(
                                "Language {} not supported, continuing with {}",
                                lang, default_language
                            );
                            language = default_language.clone();
                        }
                        EngineEvent::Error(e) => {
                            // Non-fatal: the session continues recording
                            warn!("Transcription error: {}", e);
                        }
                    }
                }

                // Termination is unsolicited only while still recording
                if retries_disabled || !recording.load(Ordering::SeqCst) {
                    break;
                }

                restarts.fetch_add(1, Ordering::SeqCst);
                info!(
                    "Engine ended while recording, restarting in {:?}",
                    RESTART_DELAY
                );
                tokio::time::sleep(RESTART_DELAY).await;

                if !recording.load(Ordering::SeqCst) {
                    break;
                }
            }
        });

        self.task = Some(task);
    }

    /// Stop the engine (best-effort) and settle the supervision loop.
    ///
    /// Expects the recording flag to already be cleared, so a trailing
    /// `Ended` from the engine does not trigger a restart.
    pub async fn stop(&mut self) {
        self.engine.lock().await.stop().await;

        if let Some(mut task) = self.task.take() {
            // Give the loop a moment to drain any trailing event
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                warn!("Engine supervisor did not settle after stop, aborting");
                task.abort();
            }
        }
    }

    /// Accumulated final transcript (append-only while running)
    pub async fn transcript(&self) -> String {
        self.transcript.lock().await.clone()
    }

    /// Last interim result (overwritten by each non-final event)
    pub async fn interim(&self) -> String {
        self.interim.lock().await.clone()
    }

    /// Number of automatic engine restarts so far
    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Clear accumulated state for a fresh attempt
    pub async fn clear(&self) {
        self.transcript.lock().await.clear();
        self.interim.lock().await.clear();
        self.restarts.store(0, Ordering::SeqCst);
    }
}
