use serde::{Deserialize, Serialize};

use crate::audio::CaptureConstraints;

/// Configuration for a practice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Recognition language requested from the engine
    pub language: String,

    /// Language to fall back to when the requested one is unsupported
    pub default_language: String,

    /// Interval between encoded chunks in milliseconds
    pub chunk_interval_ms: u64,

    /// Advisory capture constraints passed to the microphone backend
    #[serde(skip)]
    pub constraints: CaptureConstraints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("practice-{}", uuid::Uuid::new_v4()),
            language: "en-US".to_string(),
            default_language: "en-US".to_string(),
            chunk_interval_ms: 250,
            constraints: CaptureConstraints::default(),
        }
    }
}
