//! Live speech-to-text integration
//!
//! This module provides the typed event stream produced by a live
//! transcription engine and the supervisor that keeps the engine alive:
//! - `SpeechEngine` trait: continuous recognition with interim results
//! - `EngineSupervisor`: transcript accumulation + restart-on-termination
//! - `EngineError`: the non-fatal error taxonomy surfaced to the session

mod engine;
mod supervisor;

pub use engine::{EngineError, EngineEvent, NullEngine, SpeechEngine, TranscriptionEvent};
pub use supervisor::EngineSupervisor;
