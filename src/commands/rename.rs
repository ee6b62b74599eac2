use anyhow::Result;

use crate::commands::CommandReport;
use crate::locker::audit;
use crate::locker::config::load_config;
use crate::locker::consistency::{TargetKind, rename_stored};
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;

pub fn run(
    old_name: &str,
    new_name: &str,
    kind: TargetKind,
    secret: Option<&str>,
) -> Result<CommandReport> {
    let mut report = CommandReport::new("rename");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let cfg = load_config()?;
    let mut store = EvidenceStore::load(&paths)?;

    match rename_stored(
        &paths,
        cfg.gate.secret.as_deref(),
        old_name,
        new_name,
        kind,
        secret,
    ) {
        Ok(outcome) => {
            report.detail(format!("renamed to {}", outcome.new_primary_name));
            for change in &outcome.changes {
                report.detail(format!("{} -> {}", change.old, change.new));
            }
            for warning in &outcome.warnings {
                report.warning(warning);
            }
            store.apply_rename_changes(&outcome.changes);
            store.save()?;
            audit::append_event(
                &paths,
                "rename",
                if outcome.warnings.is_empty() { "ok" } else { "degraded" },
                &format!("{old_name} -> {} ({} files)", outcome.new_primary_name, outcome.changes.len()),
            )?;
        }
        Err(err) => {
            report.issue(err.to_string());
        }
    }

    Ok(report)
}
