use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::locker::audit;
use crate::locker::paths::resolve_paths;
use crate::locker::store::EvidenceStore;

pub fn run(files: &[PathBuf]) -> Result<CommandReport> {
    let mut report = CommandReport::new("upload");
    if files.is_empty() {
        report.issue("no files given");
        return Ok(report);
    }

    let paths = resolve_paths()?;
    paths.ensure_layout()?;
    let mut store = EvidenceStore::load(&paths)?;

    for file in files {
        match store.store_asset_file(file) {
            Ok(stored) => {
                audit::append_event(
                    &paths,
                    "upload",
                    "ok",
                    &format!("record={} stored={}", stored.record_id, stored.rel_path),
                )?;
                report.detail(format!(
                    "stored {} as {} (record {}, sha256 {})",
                    file.display(),
                    stored.rel_path,
                    stored.record_id,
                    &stored.content_hash[..12.min(stored.content_hash.len())],
                ));
            }
            Err(err) => {
                report.issue(format!("{}: {err}", file.display()));
            }
        }
    }
    store.save()?;

    Ok(report)
}
