use std::time::Duration;
use tracing::{debug, info};

use super::messages::{
    AudioEvaluationRequest, EvaluationResponse, SaveCommunicationRequest, SaveResultResponse,
    TextEvaluationRequest,
};

/// Timeout raced against the save-to-history call
const SAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the evaluation backend boundary.
///
/// `Timeout` is deliberately distinct from `Network`: a save that exceeds
/// its deadline is reported differently from a refused connection.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("evaluation service unavailable")]
    ServiceUnavailable,

    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("invalid response payload: {0}")]
    InvalidResponse(String),
}

/// Remote evaluation boundary consumed by the session.
///
/// The session takes this as an injected collaborator so tests (and any
/// future offline evaluator) can stand in for the HTTP client.
#[async_trait::async_trait]
pub trait Evaluator: Send + Sync {
    /// Slow path: ship the encoded artifact for transcription + scoring
    async fn evaluate_audio(
        &self,
        audio_base64: &str,
        format: &str,
    ) -> Result<EvaluationResponse, ApiError>;

    /// Fast path: score an already-accumulated transcript
    async fn evaluate_text(&self, transcription: &str) -> Result<EvaluationResponse, ApiError>;

    /// Persist a completed evaluation to the student's history
    async fn save_communication_result(
        &self,
        request: &SaveCommunicationRequest,
    ) -> Result<(), ApiError>;
}

/// HTTP client for the study-assistant backend
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    save_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            save_timeout: SAVE_TIMEOUT,
        }
    }

    /// Override the save-to-history deadline (tests use a short one)
    pub fn with_save_timeout(mut self, timeout: Duration) -> Self {
        self.save_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(ApiError::ServiceUnavailable);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// A reported timeout carries the deadline this client was built with
    fn map_request_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.save_timeout)
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl Evaluator for ApiClient {
    async fn evaluate_audio(
        &self,
        audio_base64: &str,
        format: &str,
    ) -> Result<EvaluationResponse, ApiError> {
        info!(
            "Uploading audio for evaluation ({} base64 chars, {})",
            audio_base64.len(),
            format
        );

        let body = AudioEvaluationRequest {
            audio_data: audio_base64.to_string(),
            format: format.to_string(),
        };

        self.post_json("/transcription/evaluate", &body).await
    }

    async fn evaluate_text(&self, transcription: &str) -> Result<EvaluationResponse, ApiError> {
        info!(
            "Evaluating transcript text ({} chars, fast path)",
            transcription.len()
        );

        let body = TextEvaluationRequest {
            transcription: transcription.to_string(),
        };

        self.post_json("/transcription/evaluate-text", &body).await
    }

    async fn save_communication_result(
        &self,
        request: &SaveCommunicationRequest,
    ) -> Result<(), ApiError> {
        info!(
            "Saving communication result for {}",
            request.student_register_number
        );

        // Race the request against an explicit deadline; whichever settles
        // first wins, and a timeout is surfaced as its own error kind.
        let call =
            self.post_json::<_, SaveResultResponse>("/feedback/save-communication-result", request);

        let response = tokio::time::timeout(self.save_timeout, call)
            .await
            .map_err(|_| ApiError::Timeout(self.save_timeout))??;

        if !response.success {
            return Err(ApiError::Backend {
                status: 200,
                message: "backend rejected the save".to_string(),
            });
        }

        Ok(())
    }
}
