use anyhow::Result;

use crate::commands::CommandReport;
use crate::locker::audit;
use crate::locker::config::load_config;
use crate::locker::consistency::{TargetKind, delete_stored};
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;

pub fn run(name: &str, kind: TargetKind, secret: Option<&str>) -> Result<CommandReport> {
    let mut report = CommandReport::new("delete");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let cfg = load_config()?;
    let mut store = EvidenceStore::load(&paths)?;

    match delete_stored(&paths, cfg.gate.secret.as_deref(), name, kind, secret) {
        Ok(outcome) => {
            for file in &outcome.deleted {
                report.detail(format!("deleted {file}"));
            }
            for warning in &outcome.warnings {
                report.warning(warning);
            }
            store.apply_deletions(&outcome.deleted);
            store.save()?;
            audit::append_event(
                &paths,
                "delete",
                if outcome.warnings.is_empty() { "ok" } else { "degraded" },
                &format!("{name} ({} files)", outcome.deleted.len()),
            )?;
        }
        Err(err) => {
            report.issue(err.to_string());
        }
    }

    Ok(report)
}
