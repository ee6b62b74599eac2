use anyhow::Result;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::locker::analysis::{AnalyzeOptions, run_analysis};
use crate::locker::config::load_config;
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;
use crate::provider::http::HttpProvider;

pub struct AnalyzeArgs {
    pub record: String,
    pub location: Option<String>,
    pub instructions: Option<String>,
    pub tags: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

pub fn run(args: &AnalyzeArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("analyze");
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
        manual_tags: args.tags.clone(),
        timeout: Duration::from_secs(args.timeout_secs.unwrap_or(cfg.provider.timeout_secs)),
    };

    match run_analysis(&mut store, &provider, &args.record, &opts) {
        Ok(outcome) => {
            report.detail(format!(
                "record {} -> {}",
                outcome.record_id,
                outcome.status.as_str()
            ));
            if let Some(saved) = &outcome.report {
                report.detail(format!("report saved: {}", saved.rel_path));
            }
            for warning in &outcome.warnings {
                report.warning(warning);
            }
        }
        Err(err) => {
            report.issue(format!("analysis of '{}' failed: {err}", args.record));
        }
    }

    Ok(report)
}
