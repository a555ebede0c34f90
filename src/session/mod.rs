//! Practice session management
//!
//! This module provides the `PracticeSession` abstraction that manages:
//! - Microphone acquisition and release
//! - The capture/encode pipeline and the live transcription engine,
//!   attached to the same stream
//! - Fast (text) and slow (audio upload) evaluation paths
//! - The synthesized degraded result when the backend is unreachable
//! - Session state and the event channel consumed by the UI

mod config;
mod result;
#[allow(clippy::module_inception)]
mod session;

pub use config::SessionConfig;
pub use result::EvaluationResult;
pub use session::{PracticeSession, SessionError, SessionEvent, SessionState};
