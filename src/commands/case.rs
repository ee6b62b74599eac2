use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::locker::analysis::{
    AnalyzeOptions, CaseRunOutcome, create_case, delete_case, rerun_case, update_case,
};
use crate::locker::config::load_config;
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;
use crate::provider::AnalysisOutcome;
use crate::provider::http::HttpProvider;

pub struct CaseRunArgs {
    pub members: Vec<String>,
    pub location: Option<String>,
    pub instructions: Option<String>,
    pub timeout_secs: Option<u64>,
}

fn describe_run(report: &mut CommandReport, outcome: &CaseRunOutcome) {
    report.detail(format!(
        "case {} ('{}') -> {} with {} members",
        outcome.case_id,
        outcome.display_name,
        outcome.status.as_str(),
        outcome.member_ids.len(),
    ));
    if let Some(saved) = &outcome.report {
        report.detail(format!("unified report saved: {}", saved.rel_path));
    }
    for warning in &outcome.warnings {
        report.warning(warning);
    }
}

pub fn run_create(args: &CaseRunArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("case create");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let cfg = load_config()?;
    let mut store = EvidenceStore::load(&paths)?;

    let provider = match HttpProvider::from_config(&cfg.provider) {
        Ok(provider) => provider,
        Err(err) => {
            report.issue(err.to_string());
            return Ok(report);
        }
    };
    let opts = AnalyzeOptions {
        location: args.location.clone(),
        instructions: args.instructions.clone(),
        manual_tags: None,
        timeout: Duration::from_secs(args.timeout_secs.unwrap_or(cfg.provider.timeout_secs)),
    };

    match create_case(
        &mut store,
        &provider,
        cfg.analysis.max_case_members,
        &args.members,
        &opts,
    ) {
        Ok(outcome) => describe_run(&mut report, &outcome),
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}

pub fn run_rerun(case: &str, args: &CaseRunArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("case rerun");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let cfg = load_config()?;
    let mut store = EvidenceStore::load(&paths)?;

    let provider = match HttpProvider::from_config(&cfg.provider) {
        Ok(provider) => provider,
        Err(err) => {
            report.issue(err.to_string());
            return Ok(report);
        }
    };
    let opts = AnalyzeOptions {
        location: args.location.clone(),
        instructions: args.instructions.clone(),
        manual_tags: None,
        timeout: Duration::from_secs(args.timeout_secs.unwrap_or(cfg.provider.timeout_secs)),
    };

    match rerun_case(
        &mut store,
        &provider,
        cfg.analysis.max_case_members,
        case,
        &args.members,
        &opts,
    ) {
        Ok(outcome) => describe_run(&mut report, &outcome),
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}

pub fn run_update(case: &str, edited_file: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("case update");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let mut store = EvidenceStore::load(&paths)?;

    let raw = fs::read_to_string(edited_file)
        .with_context(|| format!("failed to read {}", edited_file.display()))?;
    let edited: AnalysisOutcome = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", edited_file.display()))?;

    match update_case(&mut store, case, edited) {
        Ok(outcome) => describe_run(&mut report, &outcome),
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}

pub fn run_delete(case: &str, secret: Option<&str>) -> Result<CommandReport> {
    let mut report = CommandReport::new("case delete");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let cfg = load_config()?;
    let mut store = EvidenceStore::load(&paths)?;

    match delete_case(&mut store, cfg.gate.secret.as_deref(), case, secret) {
        Ok(deleted) => {
            report.detail(format!(
                "case {} removed; {} member{} reverted to new",
                deleted.case_id,
                deleted.reverted_members.len(),
                if deleted.reverted_members.len() == 1 { "" } else { "s" },
            ));
            for file in &deleted.removed_files {
                report.detail(format!("deleted {file}"));
            }
            for warning in &deleted.warnings {
                report.warning(warning);
            }
        }
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}
