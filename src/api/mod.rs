//! Evaluation backend client
//!
//! All business logic (grading, transcription scoring, persistence) lives in
//! a remote service reached over JSON/HTTP. This module provides:
//! - POST /transcription/evaluate - audio upload evaluation (slow path)
//! - POST /transcription/evaluate-text - text-only evaluation (fast path)
//! - POST /feedback/save-communication-result - history save (10s timeout)

mod client;
pub mod messages;

pub use client::{ApiClient, ApiError, Evaluator};
pub use messages::{
    AudioEvaluationRequest, CommunicationData, EvaluationResponse, SaveCommunicationRequest,
    SaveResultResponse, TextEvaluationRequest,
};
