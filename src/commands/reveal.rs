use anyhow::Result;

use crate::commands::CommandReport;
use crate::locker::paths::resolve_paths;
use crate::locker::reveal::reveal;

/// Best-effort: a failed reveal is reported but never fails the command.
pub fn run(relative_path: &str) -> Result<CommandReport> {
    let mut report = CommandReport::new("reveal");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;

    match reveal(&paths, relative_path) {
        Ok(()) => report.detail(format!("revealed {relative_path}")),
        Err(err) => report.warning(format!("could not reveal {relative_path}: {err}")),
    }

    Ok(report)
}
