use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// One visualization tick while recording.
///
/// Ephemeral: regenerated every tick and never stored.
#[derive(Debug, Clone)]
pub struct VisualizationSample {
    /// Perceived volume, 0..=100
    pub volume: u8,
    /// Frequency magnitude bins scaled to byte range
    pub frequency_data: Vec<u8>,
}

/// Number of frequency bins exposed per sample
const FREQUENCY_BINS: usize = 32;

/// Tick interval (roughly one display refresh)
const TICK_MS: u64 = 16;

/// Level/spectrum sampler that runs while recording.
///
/// The tick task is aborted by the session before the recording flag flips
/// on stop, so no tick can fire after stop.
pub struct Visualizer {
    latest: Arc<std::sync::Mutex<Vec<i16>>>,
    recording: Arc<AtomicBool>,
}

impl Visualizer {
    pub fn new(latest: Arc<std::sync::Mutex<Vec<i16>>>, recording: Arc<AtomicBool>) -> Self {
        Self { latest, recording }
    }

    /// Spawn the tick loop, delivering samples until cancelled.
    pub fn spawn(self, tx: mpsc::Sender<VisualizationSample>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(TICK_MS));

            loop {
                interval.tick().await;

                if !self.recording.load(Ordering::SeqCst) {
                    break;
                }

                let samples = {
                    let latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
                    latest.clone()
                };

                if samples.is_empty() {
                    continue;
                }

                let sample = compute_sample(&samples, FREQUENCY_BINS);

                // Visualization is best-effort; a full channel drops the tick
                if tx.try_send(sample).is_err() {
                    debug!("Visualization channel full, dropping tick");
                }
            }
        })
    }
}

/// Compute volume and spectrum bins for one frame of samples
pub fn compute_sample(samples: &[i16], bins: usize) -> VisualizationSample {
    VisualizationSample {
        volume: compute_volume(samples),
        frequency_data: compute_spectrum(samples, bins),
    }
}

/// RMS level scaled to 0..=100
fn compute_volume(samples: &[i16]) -> u8 {
    if samples.is_empty() {
        return 0;
    }

    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / i16::MAX as f64;
            v * v
        })
        .sum();

    let rms = (sum_sq / samples.len() as f64).sqrt();

    // Speech RMS rarely approaches full scale; scale up before clamping
    (rms * 300.0).min(100.0).round() as u8
}

/// FFT magnitude spectrum grouped into `bins` byte-scaled buckets
fn compute_spectrum(samples: &[i16], bins: usize) -> Vec<u8> {
    // Power-of-two window over the most recent samples
    let window = samples.len().next_power_of_two().min(1024).min(samples.len());
    if window < 2 || bins == 0 {
        return vec![0; bins];
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window);

    let mut buffer: Vec<Complex<f32>> = samples[samples.len() - window..]
        .iter()
        .map(|&s| Complex::new(s as f32 / i16::MAX as f32, 0.0))
        .collect();

    fft.process(&mut buffer);

    // Only the first half carries unique magnitudes for a real signal
    let half = window / 2;
    let magnitudes: Vec<f32> = buffer[..half]
        .iter()
        .map(|c| c.norm() / window as f32)
        .collect();

    let per_bin = (half / bins).max(1);
    (0..bins)
        .map(|i| {
            let start = (i * per_bin).min(magnitudes.len());
            let end = ((i + 1) * per_bin).min(magnitudes.len());
            if start >= end {
                return 0;
            }
            let avg: f32 = magnitudes[start..end].iter().sum::<f32>() / (end - start) as f32;
            (avg * 2048.0).min(255.0) as u8
        })
        .collect()
}
