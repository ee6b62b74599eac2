use chrono::{SecondsFormat, Utc};
use std::fs;

use crate::error::LockerError;
use crate::locker::dirlock;
use crate::locker::naming::{sanitize_file_name, unique_name_in};
use crate::locker::paths::{LockerPaths, ORIGINALS_SUBDIR, REL_PREFIX};
use crate::provider::AnalysisOutcome;

/// Label of the single-asset back-reference line inside a report body. The
/// consistency engine rewrites these lines when the asset is renamed.
pub const FILE_PATH_LABEL: &str = "File Path:";

const RULE_HEAVY: &str = "=====================================";
const RULE_LIGHT: &str = "-------------------------------------";

#[derive(Debug, Clone)]
pub struct SavedReport {
    pub file_name: String,
    pub rel_path: String,
    pub analysis_date: String,
}

fn push_list<T>(out: &mut String, items: &[T], mut line: impl FnMut(&T) -> String) {
    if items.is_empty() {
        out.push_str("None.\n");
        return;
    }
    for item in items {
        out.push_str(&line(item));
        out.push('\n');
    }
}

fn render_sections(out: &mut String, analysis: &AnalysisOutcome) {
    out.push_str("Summary:\n\n");
    out.push_str(&analysis.summary);
    out.push_str("\n\n");

    out.push_str("New Findings Summary:\n");
    out.push_str(&analysis.new_findings_summary);
    out.push_str("\n\n");

    out.push_str(&format!("Confidence Score: {}%\n", analysis.confidence_score));
    out.push_str(&format!("Severity Score: {}\n", analysis.severity_score));
    out.push_str(&format!(
        "Children Detected: {}\n\n",
        if analysis.children_detected { "Yes" } else { "No" }
    ));

    out.push_str("Key Observations:\n");
    push_list(out, &analysis.key_observations, |o| {
        format!("- [{}] {}", o.timestamp, o.description)
    });
    out.push('\n');

    out.push_str("Timeline Events:\n");
    push_list(out, &analysis.timeline_events, |t| {
        let subjects = if t.subjects.is_empty() {
            "Unknown".to_string()
        } else {
            t.subjects.join(", ")
        };
        format!("- [{}] {} (Subjects: {})", t.timestamp, t.description, subjects)
    });
    out.push('\n');

    out.push_str("Cross-References:\n");
    push_list(out, &analysis.cross_references, |c| {
        format!("- File \"{}\": {}", c.file_name, c.observation)
    });
    out.push('\n');

    out.push_str("Emotional Analysis:\n");
    push_list(out, &analysis.emotional_analysis, |e| {
        format!("- {}: {}", e.emotion, e.evidence)
    });
    out.push('\n');

    out.push_str("Recognized Subjects:\n");
    push_list(out, &analysis.recognized_subjects, |r| {
        format!("- {} (at {}) - {}%", r.name, r.timestamp, r.confidence)
    });
    out.push('\n');

    out.push_str("Potential Violations:\n");
    push_list(out, &analysis.potential_violations, |v| format!("- {v}"));
    out.push('\n');

    if !analysis.full_transcript.is_empty() && analysis.full_transcript != "N/A" {
        out.push_str("Full Transcript:\n");
        out.push_str(&analysis.full_transcript);
        out.push_str("\n\n");
    }
}

fn render_single(display_name: &str, stored_name: &str, date: &str, a: &AnalysisOutcome) -> String {
    let mut out = String::new();
    out.push_str(RULE_HEAVY);
    out.push('\n');
    out.push_str(&format!("File Name: {display_name}\n"));
    out.push_str(&format!(
        "{FILE_PATH_LABEL} {REL_PREFIX}/{ORIGINALS_SUBDIR}/{stored_name}\n"
    ));
    out.push_str(&format!("Analysis Date: {date}\n"));
    out.push_str(RULE_LIGHT);
    out.push('\n');
    render_sections(&mut out, a);
    out.push_str(RULE_HEAVY);
    out.push('\n');
    out
}

fn render_unified(
    display_names: &[String],
    stored_names: &[String],
    date: &str,
    a: &AnalysisOutcome,
) -> String {
    let mut out = String::new();
    out.push_str(RULE_HEAVY);
    out.push('\n');
    out.push_str(&format!("Files: {}\n", display_names.join(" + ")));
    out.push_str("File Paths:\n");
    for (idx, stored) in stored_names.iter().enumerate() {
        out.push_str(&format!(
            "- [{}] {REL_PREFIX}/{ORIGINALS_SUBDIR}/{}\n",
            idx + 1,
            sanitize_file_name(stored)
        ));
    }
    out.push_str(&format!("Analysis Date: {date}\n"));
    out.push_str(RULE_LIGHT);
    out.push('\n');
    render_sections(&mut out, a);
    out.push_str(RULE_HEAVY);
    out.push('\n');
    out
}

fn write_report(
    paths: &LockerPaths,
    dir: &std::path::Path,
    base_name: &str,
    content: &str,
    date: String,
) -> Result<SavedReport, LockerError> {
    fs::create_dir_all(dir)?;
    let _lock = dirlock::lock_dir(paths, dirlock::dir_label(paths, dir))?;
    let (file_name, full_path) = unique_name_in(dir, base_name);
    fs::write(&full_path, content)?;
    Ok(SavedReport {
        rel_path: paths.relative_to(dir, &file_name),
        file_name,
        analysis_date: date,
    })
}

/// Persist the report document for one analyzed asset, named by the
/// deterministic convention with collision renumbering.
pub fn save_single_report(
    paths: &LockerPaths,
    display_name: &str,
    stored_name: &str,
    analysis: &AnalysisOutcome,
) -> Result<SavedReport, LockerError> {
    let safe_stored = sanitize_file_name(stored_name);
    let base_name = crate::locker::naming::report_name_for(&safe_stored);
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let content = render_single(display_name, &safe_stored, &date, analysis);
    write_report(paths, &paths.reports_dir, &base_name, &content, date)
}

/// Persist the unified report document for a case.
pub fn save_unified_report(
    paths: &LockerPaths,
    display_names: &[String],
    stored_names: &[String],
    combined_name: &str,
    analysis: &AnalysisOutcome,
) -> Result<SavedReport, LockerError> {
    let label = sanitize_file_name(combined_name);
    let base_name = crate::locker::naming::report_name_for(&label);
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let content = render_unified(display_names, stored_names, &date, analysis);
    write_report(paths, &paths.unified_reports_dir, &base_name, &content, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Observation, RecognizedSubject};
    use tempfile::tempdir;

    fn outcome() -> AnalysisOutcome {
        AnalysisOutcome {
            summary: "Two people argue near the loading dock.".to_string(),
            recognized_subjects: vec![RecognizedSubject {
                name: "Alice".to_string(),
                timestamp: "00:12".to_string(),
                confidence: 91.0,
            }],
            key_observations: vec![Observation {
                timestamp: "00:10".to_string(),
                description: "raised voices".to_string(),
            }],
            ..AnalysisOutcome::default()
        }
    }

    #[test]
    fn single_report_contains_back_reference_and_sections() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");

        let saved = save_single_report(&paths, "clip.mp4", "clip.mp4", &outcome()).expect("save");
        assert_eq!(saved.file_name, "Analysis of clip.mp4.txt");
        assert_eq!(saved.rel_path, "data/reports/Analysis of clip.mp4.txt");

        let body =
            std::fs::read_to_string(paths.reports_dir.join(&saved.file_name)).expect("read");
        assert!(body.contains("File Path: data/originals/clip.mp4"));
        assert!(body.contains("Recognized Subjects:"));
        assert!(body.contains("- Alice (at 00:12) - 91%"));
        assert!(body.contains("- [00:10] raised voices"));
        // transcript section omitted when the provider had nothing
        assert!(!body.contains("Full Transcript:"));
    }

    #[test]
    fn report_collisions_are_renumbered() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");

        let first = save_single_report(&paths, "a.png", "a.png", &outcome()).expect("save");
        let second = save_single_report(&paths, "a.png", "a.png", &outcome()).expect("save");
        assert_eq!(first.file_name, "Analysis of a.png.txt");
        assert_eq!(second.file_name, "Analysis of a.png (2).txt");
    }

    #[test]
    fn unified_report_lists_every_member_path() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");

        let saved = save_unified_report(
            &paths,
            &["A.jpg".to_string(), "B.jpg".to_string()],
            &["A.jpg".to_string(), "B.jpg".to_string()],
            "A.jpg + B.jpg",
            &outcome(),
        )
        .expect("save");
        assert_eq!(saved.file_name, "Analysis of A.jpg + B.jpg.txt");

        let body = std::fs::read_to_string(paths.unified_reports_dir.join(&saved.file_name))
            .expect("read");
        assert!(body.contains("Files: A.jpg + B.jpg"));
        assert!(body.contains("- [1] data/originals/A.jpg"));
        assert!(body.contains("- [2] data/originals/B.jpg"));
    }
}
