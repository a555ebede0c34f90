use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::result::EvaluationResult;
use crate::api::messages::SaveCommunicationRequest;
use crate::api::{ApiError, Evaluator};
use crate::audio::{
    CaptureEncoder, CaptureError, MicrophoneBackend, RecordedAudio, VisualizationSample,
    Visualizer,
};
use crate::transcribe::{EngineSupervisor, SpeechEngine, TranscriptionEvent};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingPermission,
    Recording,
    Stopped,
    Evaluating,
    Complete,
    Error,
}

/// Events emitted to the UI layer over the session's event channel
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    PermissionGranted,
    PermissionDenied(String),
    SetupFailed(String),
    Transcript(TranscriptionEvent),
    Visualization(VisualizationSample),
}

/// Errors a session surfaces to its caller.
///
/// Acquisition and recorder-setup failures are reported through the event
/// channel instead, so the UI can recover without a restart.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] ApiError),

    #[error("nothing recorded to evaluate")]
    NothingRecorded,

    #[error("no completed result to save")]
    NoResult,

    #[error("cannot {operation} in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

/// How long to wait for the frame fan-out task after releasing the stream
const FANOUT_GRACE: Duration = Duration::from_millis(500);

/// One recording + transcription + evaluation attempt.
///
/// Owns its chunk buffer and transcript accumulator exclusively for its
/// lifetime; the finalized artifact is immutable and shared by reference.
/// Collaborators (microphone backend, speech engine, evaluator) are injected
/// at construction.
pub struct PracticeSession {
    config: SessionConfig,
    backend: Mutex<Box<dyn MicrophoneBackend>>,
    evaluator: Arc<dyn Evaluator>,
    supervisor: Mutex<EngineSupervisor>,

    state: Mutex<SessionState>,
    is_recording: Arc<AtomicBool>,
    has_permission: Mutex<Option<bool>>,
    /// Set by a stop command issued while still awaiting permission
    cancel_requested: AtomicBool,

    encoder: Mutex<Option<CaptureEncoder>>,
    artifact: Mutex<Option<Arc<RecordedAudio>>>,
    result: Mutex<Option<EvaluationResult>>,

    /// Most recent frame's samples, read by the visualization loop
    latest_samples: Arc<std::sync::Mutex<Vec<i16>>>,
    viz_task: Mutex<Option<JoinHandle<()>>>,
    fanout_task: Mutex<Option<JoinHandle<()>>>,

    event_tx: mpsc::Sender<SessionEvent>,
}

impl PracticeSession {
    /// Create a session with its collaborators.
    ///
    /// Returns the session and the receiving end of its event channel.
    /// Must be called within a tokio runtime.
    pub fn new(
        config: SessionConfig,
        backend: Box<dyn MicrophoneBackend>,
        engine: Box<dyn SpeechEngine>,
        evaluator: Arc<dyn Evaluator>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(100);

        let is_recording = Arc::new(AtomicBool::new(false));

        // Forward engine transcript events into the session event channel
        let (transcript_tx, mut transcript_rx) = mpsc::channel::<TranscriptionEvent>(100);
        let forward_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = transcript_rx.recv().await {
                let _ = forward_tx.try_send(SessionEvent::Transcript(event));
            }
        });

        let supervisor = EngineSupervisor::new(
            engine,
            config.language.clone(),
            config.default_language.clone(),
            Arc::clone(&is_recording),
        )
        .on_transcript(transcript_tx);

        info!("Created practice session: {}", config.session_id);

        let session = Self {
            config,
            backend: Mutex::new(backend),
            evaluator,
            supervisor: Mutex::new(supervisor),
            state: Mutex::new(SessionState::Idle),
            is_recording,
            has_permission: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            encoder: Mutex::new(None),
            artifact: Mutex::new(None),
            result: Mutex::new(None),
            latest_samples: Arc::new(std::sync::Mutex::new(Vec::new())),
            viz_task: Mutex::new(None),
            fanout_task: Mutex::new(None),
            event_tx,
        };

        (session, event_rx)
    }

    /// Start recording: acquire the microphone, then attach the encoder and
    /// the transcription engine to the same stream.
    ///
    /// Acquisition and setup failures are reported through the event channel
    /// (the session lands in `Error`), not as a returned error.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let state = self.state.lock().await;
            if *state != SessionState::Idle {
                return Err(SessionError::InvalidState {
                    operation: "start",
                    state: *state,
                });
            }
        }

        self.cancel_requested.store(false, Ordering::SeqCst);
        self.set_state(SessionState::AwaitingPermission).await;

        let acquired = {
            let mut backend = self.backend.lock().await;
            backend.acquire(&self.config.constraints).await
        };

        let mut frames = match acquired {
            Ok(frames) => frames,
            Err(e) => {
                *self.has_permission.lock().await = Some(false);
                error!("Microphone acquisition failed: {}", e);
                self.emit(SessionEvent::PermissionDenied(e.to_string()));
                self.set_state(SessionState::Error).await;
                return Ok(());
            }
        };

        *self.has_permission.lock().await = Some(true);

        // A stop issued while awaiting permission aborts before recording
        // ever starts; the stream must not stay acquired.
        if self.cancel_requested.load(Ordering::SeqCst) {
            info!("Start aborted before recording, releasing stream");
            self.backend.lock().await.release().await;
            self.set_state(SessionState::Idle).await;
            return Ok(());
        }

        self.emit(SessionEvent::PermissionGranted);

        // Wire the encode pipeline to the stream
        let mut encoder = match CaptureEncoder::new() {
            Ok(encoder) => encoder,
            Err(e) => return self.fail_setup(e).await,
        };

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        encoder.attach(chunk_rx);
        if let Err(e) = encoder.start(self.config.chunk_interval_ms) {
            return self.fail_setup(e).await;
        }
        *self.encoder.lock().await = Some(encoder);

        // Fan frames out: the encoder and the visualizer read the same
        // underlying stream; neither closes it. Arrival order is preserved
        // by channel FIFO.
        let latest = Arc::clone(&self.latest_samples);
        let fanout = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                {
                    let mut samples = latest.lock().unwrap_or_else(|p| p.into_inner());
                    *samples = frame.samples.clone();
                }
                if chunk_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });
        *self.fanout_task.lock().await = Some(fanout);

        self.is_recording.store(true, Ordering::SeqCst);

        // Live transcription runs against the same stream, supervised for
        // unsolicited termination
        self.supervisor.lock().await.start().await;

        // Visualization ticks only while recording
        let (viz_tx, mut viz_rx) = mpsc::channel(16);
        let viz_task = Visualizer::new(
            Arc::clone(&self.latest_samples),
            Arc::clone(&self.is_recording),
        )
        .spawn(viz_tx);
        *self.viz_task.lock().await = Some(viz_task);

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(sample) = viz_rx.recv().await {
                let _ = event_tx.try_send(SessionEvent::Visualization(sample));
            }
        });

        // Setup crossed several await points since the post-acquire check,
        // so a stop may have landed in between. The flag is read under the
        // state lock, which serializes it against stop()'s own check: either
        // the stop is seen here and everything is torn down, or it arrives
        // after the transition and takes the normal Recording path.
        {
            let mut state = self.state.lock().await;
            if self.cancel_requested.load(Ordering::SeqCst) {
                drop(state);
                info!("Start aborted during setup, tearing down");
                self.teardown_capture().await;
                self.set_state(SessionState::Idle).await;
                return Ok(());
            }
            *state = SessionState::Recording;
        }
        self.emit(SessionEvent::StateChanged(SessionState::Recording));
        info!("Recording started: {}", self.config.session_id);

        Ok(())
    }

    /// Stop recording and evaluate.
    ///
    /// While awaiting permission this aborts the pending start instead.
    /// Stop without a recording in progress is a no-op.
    pub async fn stop(&self) -> Result<Option<EvaluationResult>, SessionError> {
        // The cancel flag is set while still holding the state lock, so it
        // cannot interleave with start()'s transition into Recording: the
        // pending start either sees the flag and aborts, or has already
        // recorded and this stop takes the normal path below.
        let state = {
            let state = self.state.lock().await;
            if *state == SessionState::AwaitingPermission {
                info!("Stop requested while awaiting permission, aborting start");
                self.cancel_requested.store(true, Ordering::SeqCst);
                return Ok(None);
            }
            *state
        };

        match state {
            SessionState::Recording => {
                // Cancel the scheduled visualization tick before flipping
                // the recording flag; no tick may fire after stop.
                if let Some(task) = self.viz_task.lock().await.take() {
                    task.abort();
                }
                self.is_recording.store(false, Ordering::SeqCst);

                // Engine first (best-effort); it may fire one trailing event
                self.supervisor.lock().await.stop().await;

                // Await the encoder's asynchronous finalization
                let artifact = {
                    let mut encoder = self.encoder.lock().await;
                    match encoder.as_mut() {
                        Some(encoder) => encoder.stop().await.unwrap_or_else(|e| {
                            error!("Encoder finalization failed: {:#}", e);
                            None
                        }),
                        None => None,
                    }
                };
                *self.artifact.lock().await = artifact.clone();

                // Both consumers have been told to stop; only now may the
                // orchestrator release the stream.
                self.backend.lock().await.release().await;
                if let Some(mut task) = self.fanout_task.lock().await.take() {
                    if tokio::time::timeout(FANOUT_GRACE, &mut task).await.is_err() {
                        task.abort();
                    }
                }

                self.set_state(SessionState::Stopped).await;
                info!("Recording stopped: {}", self.config.session_id);

                self.evaluate(artifact).await
            }
            _ => {
                warn!("Stop ignored in state {:?}", state);
                Ok(None)
            }
        }
    }

    /// Choose the evaluation path and produce the final result
    async fn evaluate(
        &self,
        artifact: Option<Arc<RecordedAudio>>,
    ) -> Result<Option<EvaluationResult>, SessionError> {
        self.set_state(SessionState::Evaluating).await;

        let transcript = self.supervisor.lock().await.transcript().await;
        let have_transcript = !transcript.trim().is_empty();

        let outcome = if have_transcript {
            // Fast path: the transcript text only, never the audio artifact
            debug!("Fast-path evaluation ({} chars)", transcript.len());
            self.evaluator.evaluate_text(&transcript).await
        } else {
            match &artifact {
                Some(artifact) => {
                    debug!("Slow-path evaluation ({} bytes)", artifact.size_bytes);
                    self.evaluator
                        .evaluate_audio(&artifact.to_base64(), &artifact.mime_type)
                        .await
                }
                None => {
                    error!("Nothing recorded and no transcript to evaluate");
                    self.set_state(SessionState::Error).await;
                    return Err(SessionError::NothingRecorded);
                }
            }
        };

        let result = match outcome {
            Ok(response) => EvaluationResult::from_response(response),
            Err(e) if have_transcript => {
                // Degrade to a synthesized result rather than failing the
                // session; the flag keeps it distinguishable for callers.
                warn!("Evaluation failed ({}), synthesizing local result", e);
                EvaluationResult::synthesize(transcript)
            }
            Err(e) => {
                error!("Evaluation failed with no transcript to fall back on: {}", e);
                self.set_state(SessionState::Error).await;
                return Err(e.into());
            }
        };

        *self.result.lock().await = Some(result.clone());
        self.set_state(SessionState::Complete).await;

        Ok(Some(result))
    }

    /// Persist the completed result to the student's history
    pub async fn save_to_history(
        &self,
        student_register_number: &str,
    ) -> Result<(), SessionError> {
        let result = self
            .result
            .lock()
            .await
            .clone()
            .ok_or(SessionError::NoResult)?;

        let request = SaveCommunicationRequest {
            student_register_number: student_register_number.to_string(),
            communication_data: result.to_communication_data(),
        };

        self.evaluator.save_communication_result(&request).await?;

        info!(
            "Saved communication result for {}",
            student_register_number
        );
        Ok(())
    }

    /// Release the stream, clear all buffers, and return to idle.
    ///
    /// Valid from any state.
    pub async fn reset(&self) {
        info!("Resetting session: {}", self.config.session_id);

        self.teardown_capture().await;
        self.supervisor.lock().await.clear().await;

        *self.artifact.lock().await = None;
        *self.result.lock().await = None;
        self.latest_samples
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        self.cancel_requested.store(false, Ordering::SeqCst);

        self.set_state(SessionState::Idle).await;
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    pub async fn has_permission(&self) -> Option<bool> {
        *self.has_permission.lock().await
    }

    /// Accumulated final transcript
    pub async fn transcript(&self) -> String {
        self.supervisor.lock().await.transcript().await
    }

    /// Last interim (not-yet-committed) transcript
    pub async fn interim_transcript(&self) -> String {
        self.supervisor.lock().await.interim().await
    }

    /// Number of automatic engine restarts in this session
    pub async fn engine_restarts(&self) -> usize {
        self.supervisor.lock().await.restart_count()
    }

    /// The finalized artifact, if recording has stopped
    pub async fn artifact(&self) -> Option<Arc<RecordedAudio>> {
        self.artifact.lock().await.clone()
    }

    /// The completed evaluation, if any
    pub async fn result(&self) -> Option<EvaluationResult> {
        self.result.lock().await.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn set_state(&self, next: SessionState) {
        *self.state.lock().await = next;
        debug!("Session state -> {:?}", next);
        self.emit(SessionEvent::StateChanged(next));
    }

    /// Best-effort event delivery; a full channel drops the event
    fn emit(&self, event: SessionEvent) {
        if self.event_tx.try_send(event).is_err() {
            debug!("Session event channel full, dropping event");
        }
    }

    /// Undo a fully or partially wired capture: stop every consumer of the
    /// stream, then release it.
    async fn teardown_capture(&self) {
        if let Some(task) = self.viz_task.lock().await.take() {
            task.abort();
        }
        self.is_recording.store(false, Ordering::SeqCst);

        self.supervisor.lock().await.stop().await;

        {
            let mut encoder = self.encoder.lock().await;
            if let Some(enc) = encoder.as_mut() {
                if let Err(e) = enc.stop().await {
                    error!("Encoder teardown failed: {:#}", e);
                }
            }
            *encoder = None;
        }

        if let Some(task) = self.fanout_task.lock().await.take() {
            task.abort();
        }
        self.backend.lock().await.release().await;
    }

    async fn fail_setup(&self, err: CaptureError) -> Result<(), SessionError> {
        error!("Recorder setup failed: {}", err);
        self.emit(SessionEvent::SetupFailed(err.to_string()));
        self.backend.lock().await.release().await;
        self.set_state(SessionState::Error).await;
        Ok(())
    }
}
