use std::time::Duration;

use crate::error::LockerError;
use crate::locker::audit;
use crate::locker::consistency::{self, TargetKind};
use crate::locker::dirlock;
use crate::locker::naming::resolve_relative;
use crate::locker::paths::LockerPaths;
use crate::locker::profile;
use crate::locker::record::{Case, CaseStatus, EvidenceRecord, RecordStatus, stub_outcome};
use crate::locker::report::{self, SavedReport};
use crate::locker::store::EvidenceStore;
use crate::locker::testimony;
use crate::provider::{
    AnalysisOutcome, AnalysisProvider, AnalysisRequest, AssetPayload, SubjectProfile,
};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub location: Option<String>,
    pub instructions: Option<String>,
    pub manual_tags: Option<Vec<String>>,
    pub timeout: Duration,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            location: None,
            instructions: None,
            manual_tags: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRunOutcome {
    pub record_id: String,
    pub status: RecordStatus,
    pub report: Option<SavedReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CaseRunOutcome {
    pub case_id: String,
    pub display_name: String,
    pub status: CaseStatus,
    pub member_ids: Vec<String>,
    pub report: Option<SavedReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeletedCase {
    pub case_id: String,
    pub removed_files: Vec<String>,
    pub reverted_members: Vec<String>,
    pub warnings: Vec<String>,
}

/// Summary of previously analyzed evidence, shipped to the provider so a
/// new run can cross-reference earlier findings.
fn case_summary_excluding(store: &EvidenceStore, exclude: &[String]) -> String {
    let mut summary = String::new();
    for record in store.records() {
        if exclude.contains(&record.id) || record.status != RecordStatus::Analyzed {
            continue;
        }
        let Some(analysis) = &record.analysis else {
            continue;
        };
        if summary.is_empty() {
            summary.push_str("Here is a summary of previously analyzed evidence:\n\n");
        }
        summary.push_str("---\n");
        summary.push_str(&format!("File: {}\n", record.display_name));
        summary.push_str(&format!("Type: {}\n", record.kind.as_str()));
        summary.push_str(&format!("Summary: {}\n", analysis.summary));
        if !analysis.key_observations.is_empty() {
            summary.push_str("Key Observations:\n");
            for obs in &analysis.key_observations {
                summary.push_str(&format!("- [{}] {}\n", obs.timestamp, obs.description));
            }
        }
        summary.push_str("---\n");
    }
    summary
}

fn known_subjects(paths: &LockerPaths) -> Vec<SubjectProfile> {
    profile::list_profiles(paths)
        .unwrap_or_default()
        .into_iter()
        .map(|p| SubjectProfile {
            name: p.name,
            details: p.details,
            enhanced_details: p.enhanced_details,
        })
        .collect()
}

fn asset_payload(paths: &LockerPaths, record: &EvidenceRecord) -> Result<AssetPayload, LockerError> {
    let Some(rel) = record.stored_path.as_deref() else {
        return Err(LockerError::InvalidArgument(format!(
            "'{}' has no stored asset bytes to analyze",
            record.display_name
        )));
    };
    let Some(abs) = resolve_relative(&paths.data_dir, rel) else {
        return Err(LockerError::NotFound(format!(
            "'{rel}' does not resolve under the storage root"
        )));
    };
    let bytes = std::fs::read(&abs).map_err(|err| {
        LockerError::StorageIo(format!("failed to read {}: {err}", abs.display()))
    })?;
    Ok(AssetPayload {
        name: record
            .stored_name
            .clone()
            .unwrap_or_else(|| record.display_name.clone()),
        kind: record.kind,
        bytes,
    })
}

fn build_request(
    store: &EvidenceStore,
    members: &[EvidenceRecord],
    opts: &AnalyzeOptions,
) -> Result<AnalysisRequest, LockerError> {
    let mut assets = Vec::with_capacity(members.len());
    for record in members {
        assets.push(asset_payload(&store.paths, record)?);
    }
    let exclude: Vec<String> = members.iter().map(|r| r.id.clone()).collect();
    Ok(AnalysisRequest {
        assets,
        known_subjects: known_subjects(&store.paths),
        case_summary: case_summary_excluding(store, &exclude),
        testimony_context: testimony::testimony_context(&store.paths),
        location: opts.location.clone(),
        instructions: opts.instructions.clone(),
        manual_tags: opts.manual_tags.clone(),
        timeout: opts.timeout,
    })
}

/// Run one analysis for a single record. Subjects found means pending
/// review; none found without tags means manual tagging; none found with
/// tags means analyzed. Provider failure leaves the record in `error` with
/// its prior result preserved.
pub fn run_analysis(
    store: &mut EvidenceStore,
    provider: &dyn AnalysisProvider,
    record_key: &str,
    opts: &AnalyzeOptions,
) -> Result<AnalysisRunOutcome, LockerError> {
    let Some(id) = store.resolve_record_id(record_key) else {
        return Err(LockerError::NotFound(format!("record '{record_key}'")));
    };
    let record = store
        .record(&id)
        .cloned()
        .ok_or_else(|| LockerError::NotFound(format!("record '{record_key}'")))?;

    // serialize per id: a second analyze on the same record is rejected,
    // never interleaved
    let _guard = dirlock::try_analyze_guard(&store.paths, &id)?;

    let mut analyzing = record.clone();
    analyzing.status = RecordStatus::Analyzing;
    if opts.location.is_some() {
        analyzing.location = opts.location.clone();
    }
    if opts.instructions.is_some() {
        analyzing.last_instructions = opts.instructions.clone();
    }
    store.put_record(analyzing.clone());
    store.save()?;

    let request = match build_request(store, std::slice::from_ref(&analyzing), opts) {
        Ok(request) => request,
        Err(err) => {
            // nothing was sent anywhere; restore the prior status
            store.put_record(record);
            store.save()?;
            return Err(err);
        }
    };

    let outcome = match provider.analyze(&request) {
        Ok(outcome) => outcome,
        Err(err) => {
            let mut failed = analyzing.clone();
            failed.status = RecordStatus::Error;
            store.put_record(failed);
            store.save()?;
            let _ = audit::append_event(
                &store.paths,
                "analyze",
                "error",
                &format!("record={id} err={err}"),
            );
            return Err(err);
        }
    };

    let next_status = if outcome.recognized_subjects.is_empty() {
        if opts.manual_tags.is_none() {
            RecordStatus::NeedsManualTags
        } else {
            RecordStatus::Analyzed
        }
    } else {
        RecordStatus::PendingReview
    };

    let mut warnings = Vec::new();
    let mut saved_report = None;
    // a run still awaiting manual tags has not produced a final document
    if next_status != RecordStatus::NeedsManualTags {
        match report::save_single_report(
            &store.paths,
            &analyzing.display_name,
            analyzing
                .stored_name
                .as_deref()
                .unwrap_or(&analyzing.display_name),
            &outcome,
        ) {
            Ok(saved) => saved_report = Some(saved),
            Err(err) => {
                // keep the analysis result even though persistence failed
                warnings.push(format!("report save failed: {err}"));
                crate::locker::warn::emit(
                    "REPORT_SAVE_FAILED",
                    "analyze",
                    &analyzing.display_name,
                    "report-save-failed",
                    &err.to_string(),
                );
            }
        }
    }

    let mut done = analyzing;
    done.status = next_status;
    done.analysis = Some(outcome);
    done.recognition_verified = next_status == RecordStatus::Analyzed;
    if let Some(saved) = &saved_report {
        done.report_documents.push(saved.rel_path.clone());
    }
    store.put_record(done);
    store.save()?;

    let _ = audit::append_event(
        &store.paths,
        "analyze",
        "ok",
        &format!("record={id} status={}", next_status.as_str()),
    );

    Ok(AnalysisRunOutcome {
        record_id: id,
        status: next_status,
        report: saved_report,
        warnings,
    })
}

/// Confirm (or edit down) the recognized subjects of a record awaiting
/// review. The result's subject list is replaced by the confirmed subset.
pub fn confirm_review(
    store: &mut EvidenceStore,
    record_key: &str,
    keep_names: &[String],
) -> Result<AnalysisRunOutcome, LockerError> {
    let Some(id) = store.resolve_record_id(record_key) else {
        return Err(LockerError::NotFound(format!("record '{record_key}'")));
    };
    let record = store
        .record(&id)
        .cloned()
        .ok_or_else(|| LockerError::NotFound(format!("record '{record_key}'")))?;
    if record.status != RecordStatus::PendingReview {
        return Err(LockerError::InvalidArgument(format!(
            "'{}' is not awaiting recognition review",
            record.display_name
        )));
    }
    let Some(mut analysis) = record.analysis.clone() else {
        return Err(LockerError::InvalidArgument(format!(
            "'{}' has no analysis result to review",
            record.display_name
        )));
    };

    analysis
        .recognized_subjects
        .retain(|s| keep_names.contains(&s.name));

    let mut next = record;
    next.status = RecordStatus::Analyzed;
    next.recognition_verified = true;
    next.analysis = Some(analysis);
    store.put_record(next);
    store.save()?;

    let _ = audit::append_event(&store.paths, "review", "ok", &format!("record={id}"));

    Ok(AnalysisRunOutcome {
        record_id: id,
        status: RecordStatus::Analyzed,
        report: None,
        warnings: Vec::new(),
    })
}

struct CaseMembers {
    records: Vec<EvidenceRecord>,
    truncated: usize,
}

fn resolve_members(
    store: &EvidenceStore,
    member_keys: &[String],
    max_members: usize,
) -> Result<CaseMembers, LockerError> {
    let mut records = Vec::new();
    for key in member_keys {
        let Some(id) = store.resolve_record_id(key) else {
            return Err(LockerError::NotFound(format!("record '{key}'")));
        };
        if records.iter().any(|r: &EvidenceRecord| r.id == id) {
            continue;
        }
        records.push(store.record(&id).expect("resolved id exists").clone());
    }
    if records.len() < 2 {
        return Err(LockerError::InvalidArgument(
            "a unified case needs at least 2 files".to_string(),
        ));
    }
    let truncated = records.len().saturating_sub(max_members);
    records.truncate(max_members);
    Ok(CaseMembers { records, truncated })
}

fn run_case(
    store: &mut EvidenceStore,
    provider: &dyn AnalysisProvider,
    case_id: String,
    created_at_epoch_secs: u64,
    members: CaseMembers,
    opts: &AnalyzeOptions,
) -> Result<CaseRunOutcome, LockerError> {
    let CaseMembers { records, truncated } = members;
    let display_name = records
        .iter()
        .map(|r| r.display_name.clone())
        .collect::<Vec<_>>()
        .join(" + ");
    let member_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

    if truncated > 0 {
        let _ = audit::append_event(
            &store.paths,
            "case",
            "degraded",
            &format!("case={case_id} truncated_members={truncated}"),
        );
    }

    // hold every member's guard for the whole run; one busy member rejects
    // the whole request
    let mut guards = Vec::with_capacity(member_ids.len());
    for id in &member_ids {
        guards.push(dirlock::try_analyze_guard(&store.paths, id)?);
    }

    let prior_records = records.clone();
    for record in &records {
        let mut analyzing = record.clone();
        analyzing.status = RecordStatus::Analyzing;
        if opts.location.is_some() {
            analyzing.location = opts.location.clone();
        }
        if opts.instructions.is_some() {
            analyzing.last_instructions = opts.instructions.clone();
        }
        store.put_record(analyzing);
    }
    store.put_case(Case {
        id: case_id.clone(),
        display_name: display_name.clone(),
        member_ids: member_ids.clone(),
        status: CaseStatus::Analyzing,
        analysis: None,
        unified_report_name: None,
        unified_report_path: None,
        created_at_epoch_secs,
    });
    store.save()?;

    let request = match build_request(store, &records, opts) {
        Ok(request) => request,
        Err(err) => {
            // nothing was sent anywhere; restore the members and drop the case
            for record in prior_records {
                store.put_record(record);
            }
            store.remove_case(&case_id);
            store.save()?;
            return Err(err);
        }
    };
    let outcome = match provider.analyze(&request) {
        Ok(outcome) => outcome,
        Err(err) => {
            for id in &member_ids {
                if let Some(record) = store.record(id).cloned() {
                    let mut failed = record;
                    failed.status = RecordStatus::Error;
                    store.put_record(failed);
                }
            }
            if let Some(case) = store.case(&case_id).cloned() {
                let mut failed = case;
                failed.status = CaseStatus::Error;
                store.put_case(failed);
            }
            store.save()?;
            let _ = audit::append_event(
                &store.paths,
                "case",
                "error",
                &format!("case={case_id} err={err}"),
            );
            return Err(err);
        }
    };

    let mut warnings = Vec::new();
    let display_names: Vec<String> = records.iter().map(|r| r.display_name.clone()).collect();
    let stored_names: Vec<String> = records
        .iter()
        .map(|r| r.stored_name.clone().unwrap_or_else(|| r.display_name.clone()))
        .collect();
    let saved_report = match report::save_unified_report(
        &store.paths,
        &display_names,
        &stored_names,
        &display_name,
        &outcome,
    ) {
        Ok(saved) => Some(saved),
        Err(err) => {
            warnings.push(format!("unified report save failed: {err}"));
            crate::locker::warn::emit(
                "REPORT_SAVE_FAILED",
                "case",
                &display_name,
                "unified-report-save-failed",
                &err.to_string(),
            );
            None
        }
    };

    let mut case = store.case(&case_id).cloned().expect("case inserted above");
    case.status = CaseStatus::Analyzed;
    case.analysis = Some(outcome.clone());
    case.unified_report_name = saved_report.as_ref().map(|s| s.file_name.clone());
    case.unified_report_path = saved_report.as_ref().map(|s| s.rel_path.clone());
    store.put_case(case);

    for id in &member_ids {
        if let Some(record) = store.record(id).cloned() {
            let mut member = record;
            member.status = RecordStatus::Analyzed;
            member.analysis = Some(stub_outcome(&display_name, &outcome));
            member.recognition_verified = false;
            store.put_record(member);
        }
    }
    store.save()?;

    let _ = audit::append_event(
        &store.paths,
        "case",
        "ok",
        &format!("case={case_id} members={}", member_ids.len()),
    );

    Ok(CaseRunOutcome {
        case_id,
        display_name,
        status: CaseStatus::Analyzed,
        member_ids,
        report: saved_report,
        warnings,
    })
}

/// Group 2..N records into a unified case and analyze them jointly.
/// Members beyond the configured maximum are silently truncated (and the
/// truncation is recorded in the audit log).
pub fn create_case(
    store: &mut EvidenceStore,
    provider: &dyn AnalysisProvider,
    max_members: usize,
    member_keys: &[String],
    opts: &AnalyzeOptions,
) -> Result<CaseRunOutcome, LockerError> {
    let members = resolve_members(store, member_keys, max_members)?;
    let case_id = store.fresh_case_id()?;
    let created = crate::locker::util::now_epoch_secs()
        .map_err(|err| LockerError::StorageIo(err.to_string()))?;
    run_case(store, provider, case_id, created, members, opts)
}

/// Replace a case's member set wholesale and re-run the unified analysis.
/// Members dropped from the set revert to `new`.
pub fn rerun_case(
    store: &mut EvidenceStore,
    provider: &dyn AnalysisProvider,
    max_members: usize,
    case_key: &str,
    member_keys: &[String],
    opts: &AnalyzeOptions,
) -> Result<CaseRunOutcome, LockerError> {
    let Some(case_id) = store.resolve_case_id(case_key) else {
        return Err(LockerError::NotFound(format!("case '{case_key}'")));
    };
    let case = store.case(&case_id).cloned().expect("resolved case exists");

    let members = resolve_members(store, member_keys, max_members)?;
    let kept: Vec<String> = members.records.iter().map(|r| r.id.clone()).collect();
    for old_id in &case.member_ids {
        if kept.contains(old_id) {
            continue;
        }
        if let Some(record) = store.record(old_id).cloned() {
            let mut reverted = record;
            reverted.status = RecordStatus::New;
            reverted.analysis = None;
            reverted.recognition_verified = false;
            store.put_record(reverted);
        }
    }

    run_case(
        store,
        provider,
        case_id,
        case.created_at_epoch_secs,
        members,
        opts,
    )
}

/// Re-persist an edited unified result under the same naming slot and
/// refresh every member's stub.
pub fn update_case(
    store: &mut EvidenceStore,
    case_key: &str,
    edited: AnalysisOutcome,
) -> Result<CaseRunOutcome, LockerError> {
    let Some(case_id) = store.resolve_case_id(case_key) else {
        return Err(LockerError::NotFound(format!("case '{case_key}'")));
    };
    let case = store.case(&case_id).cloned().expect("resolved case exists");

    let records: Vec<EvidenceRecord> = case
        .member_ids
        .iter()
        .filter_map(|id| store.record(id).cloned())
        .collect();
    let display_names: Vec<String> = records.iter().map(|r| r.display_name.clone()).collect();
    let stored_names: Vec<String> = records
        .iter()
        .map(|r| r.stored_name.clone().unwrap_or_else(|| r.display_name.clone()))
        .collect();

    let mut warnings = Vec::new();
    let saved_report = match report::save_unified_report(
        &store.paths,
        &display_names,
        &stored_names,
        &case.display_name,
        &edited,
    ) {
        Ok(saved) => Some(saved),
        Err(err) => {
            warnings.push(format!("unified report save failed: {err}"));
            None
        }
    };

    let mut next = case.clone();
    next.status = CaseStatus::Analyzed;
    next.analysis = Some(edited.clone());
    if let Some(saved) = &saved_report {
        next.unified_report_name = Some(saved.file_name.clone());
        next.unified_report_path = Some(saved.rel_path.clone());
    }
    store.put_case(next);

    for id in &case.member_ids {
        if let Some(record) = store.record(id).cloned() {
            let mut member = record;
            member.status = RecordStatus::Analyzed;
            member.analysis = Some(stub_outcome(&case.display_name, &edited));
            store.put_record(member);
        }
    }
    store.save()?;

    let _ = audit::append_event(&store.paths, "case", "ok", &format!("case={case_id} edited"));

    Ok(CaseRunOutcome {
        case_id,
        display_name: case.display_name,
        status: CaseStatus::Analyzed,
        member_ids: case.member_ids,
        report: saved_report,
        warnings,
    })
}

/// Authenticated case deletion: the unified report leaves the disk and
/// every member returns to the unanalyzed pool.
pub fn delete_case(
    store: &mut EvidenceStore,
    secret_config: Option<&str>,
    case_key: &str,
    secret: Option<&str>,
) -> Result<DeletedCase, LockerError> {
    crate::locker::gate::require(secret_config, secret)?;

    let Some(case_id) = store.resolve_case_id(case_key) else {
        return Err(LockerError::NotFound(format!("case '{case_key}'")));
    };
    let case = store.case(&case_id).cloned().expect("resolved case exists");

    let mut warnings = Vec::new();
    let mut removed_files = Vec::new();
    if let Some(report_name) = &case.unified_report_name {
        match consistency::delete_stored(
            &store.paths,
            secret_config,
            report_name,
            TargetKind::Report,
            secret,
        ) {
            Ok(outcome) => removed_files.extend(outcome.deleted),
            Err(LockerError::NotFound(_)) => {
                warnings.push(format!("unified report '{report_name}' was already gone"));
            }
            Err(err) => {
                warnings.push(format!("unified report delete failed: {err}"));
            }
        }
    }

    let mut reverted_members = Vec::new();
    for id in &case.member_ids {
        if let Some(record) = store.record(id).cloned() {
            let mut reverted = record;
            reverted.status = RecordStatus::New;
            reverted.analysis = None;
            reverted.recognition_verified = false;
            store.put_record(reverted);
            reverted_members.push(id.clone());
        }
    }
    store.remove_case(&case_id);
    store.apply_deletions(&removed_files);
    store.save()?;

    let _ = audit::append_event(
        &store.paths,
        "case",
        "ok",
        &format!("case={case_id} deleted members_reverted={}", reverted_members.len()),
    );

    Ok(DeletedCase {
        case_id,
        removed_files,
        reverted_members,
        warnings,
    })
}
