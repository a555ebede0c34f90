use serde::{Deserialize, Serialize};

/// Body for POST /transcription/evaluate (slow path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEvaluationRequest {
    /// Base64 of the raw encoded-container bytes, no additional framing
    #[serde(rename = "audioData")]
    pub audio_data: String,
    /// MIME type of the container (e.g. "audio/wav")
    pub format: String,
}

/// Body for POST /transcription/evaluate-text (fast path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEvaluationRequest {
    pub transcription: String,
}

/// Evaluation payload returned by both evaluate endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub transcription: String,
    pub clarity: u8,
    pub confidence: u8,
    pub articulation: Option<u8>,
    pub feedback: String,
    pub suggestions: Option<String>,
    pub analysis: Option<serde_json::Value>,
}

/// Body for POST /feedback/save-communication-result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCommunicationRequest {
    pub student_register_number: String,
    pub communication_data: CommunicationData,
}

/// Completed evaluation as persisted in the student's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationData {
    pub transcription: String,
    pub clarity: u8,
    pub confidence: u8,
    pub articulation: u8,
    pub overall_score: u8,
    pub feedback: String,
    pub suggestions: Option<String>,
    pub analysis: Option<serde_json::Value>,
    /// RFC3339 timestamp of the recording
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Response from the save endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResultResponse {
    pub success: bool,
}
