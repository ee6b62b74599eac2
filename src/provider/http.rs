use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::error::LockerError;
use crate::locker::config::ProviderConfig;
use crate::locker::naming::split_stem_ext;
use crate::locker::record::EvidenceKind;
use crate::provider::{AnalysisOutcome, AnalysisProvider, AnalysisRequest, parse_outcome};

const SYSTEM_ROLE: &str = "You are a forensic evidence analyst. Respond with a single JSON \
object only, no prose or code fences, using exactly these keys: summary, newFindingsSummary, \
severityScore (0-10), confidenceScore (0-100), childrenDetected (bool), keyObservations \
[{timestamp, description}], timelineEvents [{timestamp, description, subjects}], \
crossReferences [{fileName, observation}], emotionalAnalysis [{emotion, evidence}], \
recognizedSubjects [{name, timestamp, confidence}], potentialViolations [string], \
fullTranscript (string, \"N/A\" when nothing was spoken). Empty arrays are valid answers.";

/// HTTP client for the external analysis provider.
pub struct HttpProvider {
    url: String,
    model: String,
    api_key: String,
}

impl HttpProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self, LockerError> {
        let Some(api_key) = cfg.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
        else {
            return Err(LockerError::InvalidArgument(
                "provider api key is not configured (set EVLOCK_PROVIDER_API_KEY)".to_string(),
            ));
        };
        Ok(Self {
            url: cfg.url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: api_key.to_string(),
        })
    }
}

fn mime_type_for(name: &str) -> &'static str {
    let (_, ext) = split_stem_ext(name);
    match ext.to_lowercase().as_str() {
        ".mp4" => "video/mp4",
        ".webm" => "video/webm",
        ".mov" => "video/quicktime",
        ".mkv" => "video/x-matroska",
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".m4a" => "audio/mp4",
        ".ogg" => "audio/ogg",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".pdf" => "application/pdf",
        ".txt" => "text/plain",
        ".md" => "text/markdown",
        _ => "application/octet-stream",
    }
}

fn build_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(SYSTEM_ROLE);
    prompt.push_str("\n\n");

    if request.assets.len() > 1 {
        prompt.push_str(
            "Analyze the following files TOGETHER as one unified case and produce one combined result.\n",
        );
        for asset in &request.assets {
            prompt.push_str(&format!("- {} ({})\n", asset.name, asset.kind.as_str()));
        }
        prompt.push('\n');
    } else if let Some(asset) = request.assets.first() {
        prompt.push_str(&format!(
            "Analyze the file '{}' ({}).\n\n",
            asset.name,
            asset.kind.as_str()
        ));
    }

    if let Some(location) = request.location.as_deref().filter(|l| !l.trim().is_empty()) {
        prompt.push_str(&format!("Recording location: {location}\n\n"));
    }

    if !request.known_subjects.is_empty() {
        prompt.push_str("Known subjects to recognize:\n");
        for subject in &request.known_subjects {
            prompt.push_str(&format!("- {}: {}\n", subject.name, subject.details));
            if let Some(enhanced) = &subject.enhanced_details {
                prompt.push_str(&format!("  Description: {enhanced}\n"));
            }
        }
        prompt.push('\n');
    }

    if !request.case_summary.trim().is_empty() {
        prompt.push_str("Previously analyzed evidence:\n");
        prompt.push_str(&request.case_summary);
        prompt.push_str("\n\n");
    }

    if !request.testimony_context.trim().is_empty() {
        prompt.push_str("Testimony context:\n");
        prompt.push_str(&request.testimony_context);
        prompt.push_str("\n\n");
    }

    if let Some(tags) = request.manual_tags.as_ref().filter(|t| !t.is_empty()) {
        prompt.push_str(&format!(
            "The following subjects are confirmed present; attribute observations to them: {}\n\n",
            tags.join(", ")
        ));
    }

    if let Some(instructions) = request
        .instructions
        .as_deref()
        .filter(|i| !i.trim().is_empty())
    {
        prompt.push_str(&format!("Special instructions: {instructions}\n"));
    }

    prompt
}

fn build_parts(request: &AnalysisRequest) -> Vec<Value> {
    let mut parts = vec![json!({ "text": build_prompt(request) })];
    for asset in &request.assets {
        if asset.kind == EvidenceKind::Document
            && let Ok(text) = std::str::from_utf8(&asset.bytes)
        {
            parts.push(json!({
                "text": format!("--- Document '{}' ---\n{}", asset.name, text)
            }));
            continue;
        }
        parts.push(json!({
            "inline_data": {
                "mime_type": mime_type_for(&asset.name),
                "data": BASE64.encode(&asset.bytes),
            }
        }));
    }
    parts
}

fn extract_text(body: &Value) -> Option<&str> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

impl AnalysisProvider for HttpProvider {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, LockerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(request.timeout)
            .build()
            .map_err(|err| LockerError::ProviderFailure(err.to_string()))?;

        let endpoint = format!(
            "{}/models/{}:generateContent?key={}",
            self.url, self.model, self.api_key
        );
        let payload = json!({
            "contents": [{ "parts": build_parts(request) }],
            "generation_config": {
                "response_mime_type": "application/json",
                "temperature": 0,
            }
        });

        let response = client
            .post(&endpoint)
            .json(&payload)
            .send()
            .map_err(|err| LockerError::ProviderFailure(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(LockerError::ProviderFailure(format!(
                "provider returned {status}: {}",
                detail.trim()
            )));
        }

        let body: Value = response
            .json()
            .map_err(|err| LockerError::ProviderFailure(format!("invalid response: {err}")))?;
        let Some(text) = extract_text(&body) else {
            return Err(LockerError::ProviderFailure(
                "response carried no analysis text".to_string(),
            ));
        };
        parse_outcome(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SubjectProfile;
    use std::time::Duration;

    fn request_with(assets: Vec<crate::provider::AssetPayload>) -> AnalysisRequest {
        AnalysisRequest {
            assets,
            known_subjects: vec![SubjectProfile {
                name: "Alice".to_string(),
                details: "tall, red coat".to_string(),
                enhanced_details: None,
            }],
            case_summary: String::new(),
            testimony_context: String::new(),
            location: Some("warehouse".to_string()),
            instructions: None,
            manual_tags: Some(vec!["Alice".to_string()]),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn prompt_names_subjects_tags_and_location() {
        let request = request_with(vec![crate::provider::AssetPayload {
            name: "clip.mp4".to_string(),
            kind: EvidenceKind::Video,
            bytes: vec![0, 1],
        }]);
        let prompt = build_prompt(&request);
        assert!(prompt.contains("clip.mp4"));
        assert!(prompt.contains("Alice: tall, red coat"));
        assert!(prompt.contains("confirmed present"));
        assert!(prompt.contains("warehouse"));
    }

    #[test]
    fn document_assets_travel_as_text_parts() {
        let request = request_with(vec![crate::provider::AssetPayload {
            name: "notes.txt".to_string(),
            kind: EvidenceKind::Document,
            bytes: b"hello".to_vec(),
        }]);
        let parts = build_parts(&request);
        assert_eq!(parts.len(), 2);
        let text = parts[1]["text"].as_str().expect("text part");
        assert!(text.contains("hello"));
    }

    #[test]
    fn binary_assets_are_inlined_base64() {
        let request = request_with(vec![crate::provider::AssetPayload {
            name: "photo.png".to_string(),
            kind: EvidenceKind::Image,
            bytes: vec![1, 2, 3],
        }]);
        let parts = build_parts(&request);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn mime_types_cover_media_kinds() {
        assert_eq!(mime_type_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("a.mov"), "video/quicktime");
        assert_eq!(mime_type_for("a.bin"), "application/octet-stream");
    }
}
