pub mod http;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LockerError;
use crate::locker::record::EvidenceKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Observation {
    pub timestamp: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimelineEvent {
    pub timestamp: String,
    pub description: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CrossReference {
    pub file_name: String,
    pub observation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmotionalCue {
    pub emotion: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecognizedSubject {
    pub name: String,
    pub timestamp: String,
    pub confidence: f64,
}

/// Structured result of one analysis run. Every collection defaults to
/// empty on parse: absence of a finding is valid provider output, not a
/// malformed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub summary: String,
    pub new_findings_summary: String,
    pub severity_score: f64,
    pub confidence_score: f64,
    pub children_detected: bool,
    pub key_observations: Vec<Observation>,
    pub timeline_events: Vec<TimelineEvent>,
    pub cross_references: Vec<CrossReference>,
    pub emotional_analysis: Vec<EmotionalCue>,
    pub recognized_subjects: Vec<RecognizedSubject>,
    pub potential_violations: Vec<String>,
    pub full_transcript: String,
}

impl Default for AnalysisOutcome {
    fn default() -> Self {
        Self {
            summary: "No summary available.".to_string(),
            new_findings_summary: "No new findings.".to_string(),
            severity_score: 0.0,
            confidence_score: 0.0,
            children_detected: false,
            key_observations: Vec::new(),
            timeline_events: Vec::new(),
            cross_references: Vec::new(),
            emotional_analysis: Vec::new(),
            recognized_subjects: Vec::new(),
            potential_violations: Vec::new(),
            full_transcript: "N/A".to_string(),
        }
    }
}

/// One asset shipped to the provider. Bytes are read from the stored
/// original right before the call; text documents travel as text.
#[derive(Debug, Clone)]
pub struct AssetPayload {
    pub name: String,
    pub kind: EvidenceKind,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectProfile {
    pub name: String,
    pub details: String,
    pub enhanced_details: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub assets: Vec<AssetPayload>,
    pub known_subjects: Vec<SubjectProfile>,
    pub case_summary: String,
    pub testimony_context: String,
    pub location: Option<String>,
    pub instructions: Option<String>,
    pub manual_tags: Option<Vec<String>>,
    pub timeout: Duration,
}

/// Seam to the external analysis provider. The engine only depends on this
/// trait; the production implementation is [`http::HttpProvider`].
pub trait AnalysisProvider {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, LockerError>;
}

/// Strip Markdown code fences the provider sometimes wraps around JSON.
pub fn clean_json(text: &str) -> &str {
    let cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        if let Some(newline) = rest.find('\n') {
            let body = &rest[newline + 1..];
            if let Some(end) = body.rfind("```") {
                return body[..end].trim();
            }
        }
    }
    cleaned
}

/// Lenient parse of the provider's response body into an outcome. A body
/// that is not a JSON object at all is a provider failure; missing fields
/// fall back to their defaults.
pub fn parse_outcome(text: &str) -> Result<AnalysisOutcome, LockerError> {
    let body = clean_json(text);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| LockerError::ProviderFailure(format!("unparseable result: {err}")))?;
    if !value.is_object() {
        return Err(LockerError::ProviderFailure(
            "result is not a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|err| LockerError::ProviderFailure(format!("malformed result: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_unwraps_code_fences() {
        assert_eq!(clean_json("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(clean_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json("```\n{}\n```"), "{}");
    }

    #[test]
    fn parse_accepts_empty_collections() {
        let out = parse_outcome("{\"summary\":\"quiet\"}").expect("parse");
        assert_eq!(out.summary, "quiet");
        assert!(out.recognized_subjects.is_empty());
        assert_eq!(out.full_transcript, "N/A");
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(parse_outcome("[1,2]").is_err());
        assert!(parse_outcome("not json").is_err());
    }
}
