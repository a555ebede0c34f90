use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use commcoach::{
    ApiClient, Config, FileBackend, NullEngine, PracticeSession, SessionConfig, SessionEvent,
};

#[derive(Parser, Debug)]
#[command(name = "commcoach", about = "Communication practice session runner")]
struct Args {
    /// Configuration file (optional; defaults apply when absent)
    #[arg(short, long, default_value = "config/commcoach")]
    config: String,

    /// WAV file to replay as the microphone input
    #[arg(short, long)]
    input: String,

    /// Student register number; when set, the result is saved to history
    #[arg(short, long)]
    student: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("commcoach v{}", env!("CARGO_PKG_VERSION"));
    info!("Evaluation backend: {}", cfg.api.base_url);

    let session_config = SessionConfig {
        language: cfg.speech.language.clone(),
        default_language: cfg.speech.default_language.clone(),
        chunk_interval_ms: cfg.audio.chunk_interval_ms,
        ..SessionConfig::default()
    };

    let backend = FileBackend::new(&args.input);
    let evaluator = Arc::new(
        ApiClient::new(cfg.api.base_url.clone())
            .with_save_timeout(Duration::from_secs(cfg.api.save_timeout_secs)),
    );

    let (session, mut events) = PracticeSession::new(
        session_config,
        Box::new(backend),
        Box::new(NullEngine),
        evaluator,
    );

    // Surface session events while the recording runs
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged(state) => info!("Session state: {:?}", state),
                SessionEvent::PermissionGranted => info!("Microphone acquired"),
                SessionEvent::PermissionDenied(reason) => warn!("Microphone denied: {}", reason),
                SessionEvent::SetupFailed(reason) => warn!("Recorder setup failed: {}", reason),
                SessionEvent::Transcript(t) if t.is_final => info!("Transcript: {}", t.text),
                SessionEvent::Transcript(_) | SessionEvent::Visualization(_) => {}
            }
        }
    });

    session.start().await?;

    // Let the file replay for its real duration, then stop and evaluate
    let replay_secs = wav_duration_seconds(&args.input)?;
    info!("Recording for {:.1}s...", replay_secs);
    tokio::time::sleep(Duration::from_secs_f64(replay_secs)).await;

    let result = session
        .stop()
        .await
        .context("Evaluation failed")?
        .context("Session produced no result")?;

    println!("Transcription: {}", result.transcription);
    println!(
        "Clarity: {}  Confidence: {}  Articulation: {}",
        result.clarity, result.confidence, result.articulation
    );
    println!("Overall score: {}", result.overall_score);
    println!("Feedback: {}", result.feedback);
    if result.synthesized {
        println!("(scores are a local estimate; the evaluation service was unreachable)");
    }

    if let Some(artifact) = session.artifact().await {
        info!(
            "Recorded artifact: {} bytes, {:.2}s ({})",
            artifact.size_bytes, artifact.duration_seconds, artifact.mime_type
        );
    }

    if let Some(student) = &args.student {
        session
            .save_to_history(student)
            .await
            .context("Failed to save result to history")?;
        info!("Result saved for {}", student);
    }

    event_task.abort();

    Ok(())
}

/// Playable duration of the input fixture, used to pace the demo run
fn wav_duration_seconds(path: &str) -> Result<f64> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open input file: {}", path))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}
