use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Desired capture constraints.
///
/// All of these are advisory: the underlying device may honor none of them,
/// and acquisition does not fail when one is unsupported.
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: 44100,
        }
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Errors surfaced by microphone acquisition and recorder setup.
///
/// These terminate the session and are reported to the UI through the
/// session's event channel, never as a panic.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("failed to set up recorder: {0}")]
    SetupFailed(String),
}

/// Microphone capture backend trait
///
/// The acquired stream is a scoped resource: whoever calls `acquire` must
/// guarantee a matching `release` on every exit path, including an abort
/// before recording ever started.
#[async_trait::async_trait]
pub trait MicrophoneBackend: Send + Sync {
    /// Request access to the microphone and start delivering frames.
    ///
    /// Returns a channel receiver that will receive audio frames until the
    /// backend is released.
    async fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Release the underlying stream (stop all tracks).
    ///
    /// Safe to call more than once; after release the frame channel closes.
    async fn release(&mut self);

    /// Check if the stream is currently held open
    fn is_live(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Duration of each replayed frame in milliseconds
const FILE_FRAME_MS: u64 = 100;

/// Microphone backend that replays a WAV file as a timed frame stream.
///
/// Used by the demo binary and by tests; stands in for a real input device
/// on hosts without one.
pub struct FileBackend {
    path: PathBuf,
    /// When true, frames are delivered at real-time pace (100ms apart)
    paced: bool,
    live: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paced: true,
            live: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Disable real-time pacing (tests replay as fast as possible)
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
}

#[async_trait::async_trait]
impl MicrophoneBackend for FileBackend {
    async fn acquire(
        &mut self,
        _constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let reader = hound::WavReader::open(&self.path)
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", self.path.display(), e)))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::SetupFailed(format!("failed to read samples: {}", e)))?;

        info!(
            "File backend acquired: {} ({}Hz, {} channels, {} samples)",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        let (tx, rx) = mpsc::channel(64);
        let live = Arc::clone(&self.live);
        live.store(true, Ordering::SeqCst);

        let samples_per_frame =
            (spec.sample_rate as u64 * spec.channels as u64 * FILE_FRAME_MS / 1000) as usize;
        let paced = self.paced;

        let task = tokio::spawn(async move {
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(samples_per_frame.max(1)) {
                if !live.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms,
                };

                if tx.send(frame).await.is_err() {
                    warn!("Frame receiver dropped, stopping file replay");
                    break;
                }

                timestamp_ms += FILE_FRAME_MS;

                if paced {
                    tokio::time::sleep(tokio::time::Duration::from_millis(FILE_FRAME_MS)).await;
                }
            }

            live.store(false, Ordering::SeqCst);
        });

        self.task = Some(task);

        Ok(rx)
    }

    async fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            task.abort();
            info!("File backend released");
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
