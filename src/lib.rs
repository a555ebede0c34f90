pub mod api;
pub mod audio;
pub mod config;
pub mod session;
pub mod transcribe;

pub use api::{ApiClient, ApiError, EvaluationResponse, Evaluator};
pub use audio::{
    AudioFrame, CaptureConstraints, CaptureEncoder, CaptureError, EncodedFormat, FileBackend,
    MicrophoneBackend, RecordedAudio, VisualizationSample,
};
pub use config::Config;
pub use session::{
    EvaluationResult, PracticeSession, SessionConfig, SessionError, SessionEvent, SessionState,
};
pub use transcribe::{
    EngineError, EngineEvent, EngineSupervisor, NullEngine, SpeechEngine, TranscriptionEvent,
};
