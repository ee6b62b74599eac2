use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;

include!(concat!(env!("OUT_DIR"), "/evlock_env_allowlist.rs"));

/// Environment and layout doctor: flags EVLOCK_* variables the binary does
/// not know (usually typos), checks the directory layout, and parses the
/// ledger.
pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("verify");
    report.detail(format!("build={}", env!("BUILD_UUID")));

    for (key, _) in env::vars() {
        if key.starts_with("EVLOCK_") && !GENERATED_EVLOCK_ENV_ALLOWLIST.contains(&key.as_str()) {
            report.issue(format!("unknown environment variable {key}"));
        }
    }

    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    for (label, dir) in [
        ("originals", &paths.originals_dir),
        ("unified-originals", &paths.unified_originals_dir),
        ("reports", &paths.reports_dir),
        ("unified-reports", &paths.unified_reports_dir),
        ("profiles", &paths.profiles_dir),
        ("testimonies", &paths.testimonies_dir),
    ] {
        if dir.is_dir() {
            report.detail(format!("{label}={}", dir.display()));
        } else {
            report.issue(format!("missing directory {}", dir.display()));
        }
    }

    match EvidenceStore::load(&paths) {
        Ok(store) => {
            report.detail(format!(
                "ledger ok: records={} cases={}",
                store.records().count(),
                store.cases().count()
            ));
        }
        Err(err) => {
            report.issue(format!("ledger unreadable: {err}"));
        }
    }

    Ok(report)
}
