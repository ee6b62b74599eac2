use anyhow::Result;

use crate::commands::CommandReport;
use crate::locker::paths::resolve_paths;
use crate::locker::store::{EvidenceStore, ledger_file_path};
use crate::locker::util::truncate_with_ellipsis;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("data_dir={}", paths.data_dir.display()));
    report.detail(format!("ledger={}", ledger_file_path(&paths).display()));
    report.detail(format!("build={}", env!("BUILD_UUID")));

    let store = EvidenceStore::load(&paths)?;
    let records: Vec<_> = store.records().collect();
    let cases: Vec<_> = store.cases().collect();
    report.detail(format!(
        "records={} cases={}",
        records.len(),
        cases.len()
    ));

    for record in records {
        let stored = record.stored_name.as_deref().unwrap_or("-");
        let summary = record
            .analysis
            .as_ref()
            .map(|a| truncate_with_ellipsis(&a.summary, 60))
            .unwrap_or_default();
        report.detail(format!(
            "record {} [{}] {} stored={} reports={}{}",
            record.id,
            record.status.as_str(),
            record.display_name,
            stored,
            record.report_documents.len(),
            if summary.is_empty() {
                String::new()
            } else {
                format!(" summary={summary}")
            },
        ));
    }

    for case in cases {
        report.detail(format!(
            "case {} [{}] '{}' members={} report={}",
            case.id,
            case.status.as_str(),
            case.display_name,
            case.member_ids.len(),
            case.unified_report_path.as_deref().unwrap_or("-"),
        ));
    }

    Ok(report)
}
