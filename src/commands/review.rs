use anyhow::Result;

use crate::commands::CommandReport;
use crate::locker::analysis::confirm_review;
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;

pub fn run(record: &str, keep: &[String]) -> Result<CommandReport> {
    let mut report = CommandReport::new("review");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let mut store = EvidenceStore::load(&paths)?;

    match confirm_review(&mut store, record, keep) {
        Ok(outcome) => {
            report.detail(format!(
                "record {} -> {} (kept {} subject{})",
                outcome.record_id,
                outcome.status.as_str(),
                keep.len(),
                if keep.len() == 1 { "" } else { "s" },
            ));
        }
        Err(err) => {
            report.issue(err.to_string());
        }
    }

    Ok(report)
}
