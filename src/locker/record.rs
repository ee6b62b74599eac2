use serde::{Deserialize, Serialize};

use crate::locker::naming::split_stem_ext;
use crate::provider::{AnalysisOutcome, CrossReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Image,
    Video,
    Audio,
    Document,
}

impl EvidenceKind {
    /// Classify by extension. Anything unrecognized is treated as a
    /// document, the same way unknown uploads are.
    pub fn from_name(name: &str) -> Self {
        let (_, ext) = split_stem_ext(name);
        match ext.to_lowercase().as_str() {
            ".png" | ".jpg" | ".jpeg" | ".gif" | ".webp" | ".bmp" => Self::Image,
            ".mp4" | ".webm" | ".mov" | ".mkv" | ".avi" => Self::Video,
            ".mp3" | ".wav" | ".m4a" | ".ogg" | ".flac" => Self::Audio,
            _ => Self::Document,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "analyzing")]
    Analyzing,
    #[serde(rename = "analyzed-pending-review")]
    PendingReview,
    #[serde(rename = "analyzed-needs-manual-tagging")]
    NeedsManualTags,
    #[serde(rename = "analyzed")]
    Analyzed,
    #[serde(rename = "error")]
    Error,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Analyzing => "analyzing",
            Self::PendingReview => "analyzed-pending-review",
            Self::NeedsManualTags => "analyzed-needs-manual-tagging",
            Self::Analyzed => "analyzed",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Analyzing,
    Analyzed,
    Error,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Error => "error",
        }
    }
}

/// One tracked evidence item. Mutated only by whole-record replacement in
/// the store; `report_documents` entries always resolve inside the storage
/// root or have been deliberately pruned by a delete cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceRecord {
    pub id: String,
    pub display_name: String,
    pub kind: EvidenceKind,
    pub status: RecordStatus,
    pub content_hash: Option<String>,
    pub stored_name: Option<String>,
    pub stored_path: Option<String>,
    pub report_documents: Vec<String>,
    pub analysis: Option<AnalysisOutcome>,
    pub location: Option<String>,
    pub recognition_verified: bool,
    pub last_instructions: Option<String>,
    pub created_at_epoch_secs: u64,
}

impl Default for EvidenceRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: String::new(),
            kind: EvidenceKind::Document,
            status: RecordStatus::New,
            content_hash: None,
            stored_name: None,
            stored_path: None,
            report_documents: Vec::new(),
            analysis: None,
            location: None,
            recognition_verified: false,
            last_instructions: None,
            created_at_epoch_secs: 0,
        }
    }
}

/// A unified analysis unit over 2..N evidence records, carrying the real
/// result while its members hold stubs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Case {
    pub id: String,
    pub display_name: String,
    pub member_ids: Vec<String>,
    pub status: CaseStatus,
    pub analysis: Option<AnalysisOutcome>,
    pub unified_report_name: Option<String>,
    pub unified_report_path: Option<String>,
    pub created_at_epoch_secs: u64,
}

impl Default for Case {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: String::new(),
            member_ids: Vec::new(),
            status: CaseStatus::Analyzing,
            analysis: None,
            unified_report_name: None,
            unified_report_path: None,
            created_at_epoch_secs: 0,
        }
    }
}

/// Placeholder result attached to every member of an analyzed case. The
/// summary names the case so a reader is redirected to the unified report;
/// severity, confidence, and the children flag mirror the case result.
pub fn stub_outcome(case_name: &str, case_result: &AnalysisOutcome) -> AnalysisOutcome {
    AnalysisOutcome {
        summary: format!("See unified case report: {case_name}"),
        new_findings_summary: format!("Analyzed jointly as part of '{case_name}'."),
        severity_score: case_result.severity_score,
        confidence_score: case_result.confidence_score,
        children_detected: case_result.children_detected,
        cross_references: vec![CrossReference {
            file_name: case_name.to_string(),
            observation: format!("This file is part of the unified analysis '{case_name}'."),
        }],
        full_transcript: "N/A".to_string(),
        ..AnalysisOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification_by_extension() {
        assert_eq!(EvidenceKind::from_name("a.JPG"), EvidenceKind::Image);
        assert_eq!(EvidenceKind::from_name("b.mp4"), EvidenceKind::Video);
        assert_eq!(EvidenceKind::from_name("c.wav"), EvidenceKind::Audio);
        assert_eq!(EvidenceKind::from_name("d.pdf"), EvidenceKind::Document);
        assert_eq!(EvidenceKind::from_name("noext"), EvidenceKind::Document);
    }

    #[test]
    fn status_strings_are_stable() {
        let json = serde_json::to_string(&RecordStatus::NeedsManualTags).expect("serialize");
        assert_eq!(json, "\"analyzed-needs-manual-tagging\"");
        let back: RecordStatus =
            serde_json::from_str("\"analyzed-pending-review\"").expect("deserialize");
        assert_eq!(back, RecordStatus::PendingReview);
    }

    #[test]
    fn stub_mirrors_case_scores_and_names_case() {
        let mut result = AnalysisOutcome::default();
        result.severity_score = 7.0;
        result.confidence_score = 88.0;
        result.children_detected = true;

        let stub = stub_outcome("A.jpg + B.jpg", &result);
        assert!(stub.summary.contains("A.jpg + B.jpg"));
        assert_eq!(stub.severity_score, 7.0);
        assert_eq!(stub.confidence_score, 88.0);
        assert!(stub.children_detected);
        assert!(stub.recognized_subjects.is_empty());
        assert_eq!(stub.cross_references.len(), 1);
    }
}
