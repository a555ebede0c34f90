use anyhow::{Context, Result};
use base64::Engine;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureError};
use super::probe;

/// Encoded container formats, in capability-probe preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFormat {
    WebmOpus,
    Webm,
    OggOpus,
    Ogg,
    Wav,
    Mp4,
}

impl EncodedFormat {
    /// Preference order used by the capability probe
    pub const PREFERENCE: [EncodedFormat; 6] = [
        EncodedFormat::WebmOpus,
        EncodedFormat::Webm,
        EncodedFormat::OggOpus,
        EncodedFormat::Ogg,
        EncodedFormat::Wav,
        EncodedFormat::Mp4,
    ];

    /// Fallback when no listed format reports as supported
    pub const DEFAULT: EncodedFormat = EncodedFormat::Wav;

    pub fn mime_type(&self) -> &'static str {
        match self {
            EncodedFormat::WebmOpus => "audio/webm;codecs=opus",
            EncodedFormat::Webm => "audio/webm",
            EncodedFormat::OggOpus => "audio/ogg;codecs=opus",
            EncodedFormat::Ogg => "audio/ogg",
            EncodedFormat::Wav => "audio/wav",
            EncodedFormat::Mp4 => "audio/mp4",
        }
    }
}

/// Pick the first supported format from the preference list.
///
/// This is a capability probe, not a negotiation: the list order is fixed
/// and the first format the recorder can actually produce wins.
pub fn pick_format(supported: impl Fn(EncodedFormat) -> bool) -> EncodedFormat {
    EncodedFormat::PREFERENCE
        .iter()
        .copied()
        .find(|f| supported(*f))
        .unwrap_or(EncodedFormat::DEFAULT)
}

/// Finalized audio artifact.
///
/// Immutable once assembled; shared by reference with the UI (playback) and
/// the network layer (upload).
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    /// Encoded container bytes
    pub bytes: Vec<u8>,
    /// MIME type of the chosen container format
    pub mime_type: String,
    /// Playable duration derived by the decode probe (0.0 on probe failure)
    pub duration_seconds: f64,
    /// Size of the encoded bytes
    pub size_bytes: usize,
}

impl RecordedAudio {
    /// Transport-safe text representation (no additional framing)
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Buffered chunks awaiting finalization, plus the stream format learned
/// from the first frame.
#[derive(Debug, Default)]
struct EncoderState {
    /// Raw chunks in strict arrival order. Concatenation at stop time must
    /// preserve this order exactly.
    chunks: Vec<Vec<i16>>,
    pending: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

/// Capture & encode pipeline.
///
/// Buffers raw audio in interval-sized chunks while attached to a frame
/// stream, and assembles them into a single playable artifact on stop.
pub struct CaptureEncoder {
    format: EncodedFormat,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    state: Arc<Mutex<EncoderState>>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl CaptureEncoder {
    /// Create an encoder, probing for the best supported container format.
    pub fn new() -> Result<Self, CaptureError> {
        // The in-process recorder can only produce WAV containers; the probe
        // walks the full preference list anyway so format selection behaves
        // the same once other encoders exist.
        let format = pick_format(|f| matches!(f, EncodedFormat::Wav));

        info!("Capture encoder ready (format: {})", format.mime_type());

        Ok(Self {
            format,
            frames: None,
            state: Arc::new(Mutex::new(EncoderState::default())),
            stop_tx: None,
            task: None,
        })
    }

    pub fn format(&self) -> EncodedFormat {
        self.format
    }

    /// Attach the encoder to a frame stream.
    ///
    /// The encoder only reads from the stream; it never closes it.
    pub fn attach(&mut self, frames: mpsc::Receiver<AudioFrame>) {
        self.frames = Some(frames);
    }

    /// Start buffering chunks at the given interval.
    pub fn start(&mut self, chunk_interval_ms: u64) -> Result<(), CaptureError> {
        if self.task.is_some() {
            warn!("Encoder already started");
            return Ok(());
        }

        let mut frames = self
            .frames
            .take()
            .ok_or_else(|| CaptureError::SetupFailed("no stream attached".to_string()))?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        // Flush whatever is pending as the final chunk
                        let mut state = state.lock().await;
                        if !state.pending.is_empty() {
                            let chunk = std::mem::take(&mut state.pending);
                            state.chunks.push(chunk);
                        }
                        break;
                    }
                    frame = frames.recv() => {
                        let Some(frame) = frame else {
                            // Stream closed under us (backend released early)
                            let mut state = state.lock().await;
                            if !state.pending.is_empty() {
                                let chunk = std::mem::take(&mut state.pending);
                                state.chunks.push(chunk);
                            }
                            break;
                        };

                        let mut state = state.lock().await;

                        if state.sample_rate == 0 {
                            state.sample_rate = frame.sample_rate;
                            state.channels = frame.channels;
                        }

                        state.pending.extend_from_slice(&frame.samples);

                        // Rotate a chunk once it covers the configured interval
                        let samples_per_chunk = (state.sample_rate as u64
                            * state.channels as u64
                            * chunk_interval_ms
                            / 1000) as usize;

                        while samples_per_chunk > 0 && state.pending.len() >= samples_per_chunk {
                            let rest = state.pending.split_off(samples_per_chunk);
                            let chunk = std::mem::replace(&mut state.pending, rest);
                            state.chunks.push(chunk);
                        }
                    }
                }
            }
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);

        info!("Capture encoder started (chunk interval: {}ms)", chunk_interval_ms);

        Ok(())
    }

    /// Number of chunks buffered so far
    pub async fn chunk_count(&self) -> usize {
        self.state.lock().await.chunks.len()
    }

    /// Signal the recorder to flush and assemble the final artifact.
    ///
    /// Resolves only after all buffered chunks are concatenated, in arrival
    /// order, into one immutable artifact. Stop without start is a no-op.
    pub async fn stop(&mut self) -> Result<Option<Arc<RecordedAudio>>> {
        let Some(task) = self.task.take() else {
            return Ok(None);
        };

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        task.await.context("Encoder task panicked")?;

        let mut state = self.state.lock().await;
        let chunks = std::mem::take(&mut state.chunks);
        let sample_rate = if state.sample_rate > 0 { state.sample_rate } else { 44100 };
        let channels = if state.channels > 0 { state.channels } else { 1 };
        drop(state);

        // Concatenate in arrival order; the container depends on chunk
        // sequencing, so no reordering and no deduplication.
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend(chunk);
        }

        let bytes = encode_wav(&samples, sample_rate, channels)?;
        let duration_seconds = probe::duration_seconds(&bytes, self.format.mime_type());

        let artifact = RecordedAudio {
            size_bytes: bytes.len(),
            mime_type: self.format.mime_type().to_string(),
            duration_seconds,
            bytes,
        };

        info!(
            "Capture finalized: {} bytes, {:.2}s ({})",
            artifact.size_bytes, artifact.duration_seconds, artifact.mime_type
        );

        Ok(Some(Arc::new(artifact)))
    }
}

/// Encode PCM samples into an in-memory WAV container
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let cursor = Cursor::new(&mut bytes);
        let mut writer =
            hound::WavWriter::new(cursor, spec).context("Failed to create WAV writer")?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV container")?;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_probe_prefers_list_order() {
        let format = pick_format(|f| matches!(f, EncodedFormat::Ogg | EncodedFormat::Wav));
        assert_eq!(format, EncodedFormat::Ogg);
    }

    #[test]
    fn format_probe_falls_back_to_default() {
        let format = pick_format(|_| false);
        assert_eq!(format, EncodedFormat::DEFAULT);
    }

    #[test]
    fn wav_encoding_roundtrip() {
        let samples: Vec<i16> = vec![100, -200, 300, -400];
        let bytes = encode_wav(&samples, 16000, 1).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();

        assert_eq!(decoded, samples);
    }
}
