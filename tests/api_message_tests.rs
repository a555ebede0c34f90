// Wire-format tests for the evaluation backend messages
//
// The backend expects camelCase "audioData" on audio uploads and a "type"
// tag on saved history entries; these tests pin those names down.

use commcoach::api::messages::{
    AudioEvaluationRequest, CommunicationData, EvaluationResponse, SaveCommunicationRequest,
    TextEvaluationRequest,
};

#[test]
fn test_audio_request_uses_camelcase_audio_data() {
    let msg = AudioEvaluationRequest {
        audio_data: "UklGRg==".to_string(),
        format: "audio/wav".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"audioData\":\"UklGRg==\""));
    assert!(json.contains("\"format\":\"audio/wav\""));
    assert!(!json.contains("audio_data"), "field must serialize camelCase");

    let deserialized: AudioEvaluationRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.audio_data, "UklGRg==");
}

#[test]
fn test_text_request_shape() {
    let msg = TextEvaluationRequest {
        transcription: "hello world".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"transcription":"hello world"}"#);
}

#[test]
fn test_evaluation_response_tolerates_missing_optionals() {
    // Both evaluate endpoints may omit articulation, suggestions, analysis
    let json = r#"{
        "transcription": "hello",
        "clarity": 82,
        "confidence": 74,
        "feedback": "Good pacing."
    }"#;

    let response: EvaluationResponse = serde_json::from_str(json).unwrap();
    assert_eq!(response.clarity, 82);
    assert_eq!(response.confidence, 74);
    assert!(response.articulation.is_none());
    assert!(response.suggestions.is_none());
    assert!(response.analysis.is_none());
}

#[test]
fn test_save_request_carries_type_tag() {
    let msg = SaveCommunicationRequest {
        student_register_number: "REG-1042".to_string(),
        communication_data: CommunicationData {
            transcription: "hello".to_string(),
            clarity: 80,
            confidence: 90,
            articulation: 85,
            overall_score: 85,
            feedback: "ok".to_string(),
            suggestions: None,
            analysis: None,
            timestamp: "2026-08-30T12:00:00+00:00".to_string(),
            kind: "communication_skills".to_string(),
        },
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"student_register_number\":\"REG-1042\""));
    assert!(json.contains("\"communication_data\""));
    assert!(json.contains("\"type\":\"communication_skills\""));
    assert!(!json.contains("\"kind\""), "history tag must serialize as \"type\"");

    let deserialized: SaveCommunicationRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.communication_data.kind, "communication_skills");
    assert_eq!(deserialized.communication_data.overall_score, 85);
}

#[test]
fn test_analysis_passes_through_untyped() {
    // The analysis payload is backend-defined; it must survive untouched
    let json = r#"{
        "transcription": "hi",
        "clarity": 70,
        "confidence": 70,
        "feedback": "ok",
        "analysis": {"pace_wpm": 142, "filler_words": ["um", "like"]}
    }"#;

    let response: EvaluationResponse = serde_json::from_str(json).unwrap();
    let analysis = response.analysis.unwrap();
    assert_eq!(analysis["pace_wpm"], 142);
    assert_eq!(analysis["filler_words"][0], "um");
}
