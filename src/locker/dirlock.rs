use fs2::FileExt;
use std::fs;
use std::fs::File;
use std::path::Path;

use crate::error::LockerError;
use crate::locker::paths::LockerPaths;

/// Advisory cross-process lock backed by a file under `state/locks`.
/// Dropped (and therefore released) automatically, including when the
/// owning process dies mid-operation.
#[derive(Debug)]
pub struct HeldLock {
    file: File,
    pub label: String,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_file(paths: &LockerPaths, label: &str) -> Result<File, LockerError> {
    fs::create_dir_all(&paths.locks_dir)?;
    let path = paths.locks_dir.join(format!("{label}.lock"));
    Ok(File::create(path)?)
}

/// Blocking exclusive lock over a logical directory. Used to make
/// unique-name check-and-create atomic with respect to other creators,
/// and to fence rename/delete cascades.
pub fn lock_dir(paths: &LockerPaths, label: &str) -> Result<HeldLock, LockerError> {
    let file = lock_file(paths, &format!("dir-{label}"))?;
    file.lock_exclusive()?;
    Ok(HeldLock {
        file,
        label: label.to_string(),
    })
}

/// Lock several logical directories at once, in sorted label order so that
/// two concurrent cascades cannot deadlock each other.
pub fn lock_dirs(paths: &LockerPaths, labels: &[&str]) -> Result<Vec<HeldLock>, LockerError> {
    let mut sorted: Vec<&str> = labels.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut held = Vec::with_capacity(sorted.len());
    for label in sorted {
        held.push(lock_dir(paths, label)?);
    }
    Ok(held)
}

/// Non-blocking per-record analyze guard. A second analyze request for the
/// same id while one is in flight is rejected, never interleaved.
pub fn try_analyze_guard(paths: &LockerPaths, record_id: &str) -> Result<HeldLock, LockerError> {
    let file = lock_file(paths, &format!("analyze-{record_id}"))?;
    if file.try_lock_exclusive().is_err() {
        return Err(LockerError::InvalidArgument(format!(
            "analysis already in flight for {record_id}"
        )));
    }
    Ok(HeldLock {
        file,
        label: record_id.to_string(),
    })
}

/// Label used with [`lock_dir`] for a concrete directory path.
pub fn dir_label(paths: &LockerPaths, dir: &Path) -> &'static str {
    if dir == paths.unified_originals_dir {
        "unified-originals"
    } else if dir == paths.reports_dir {
        "reports"
    } else if dir == paths.unified_reports_dir {
        "unified-reports"
    } else if dir == paths.profiles_dir {
        "profiles"
    } else if dir == paths.testimonies_dir {
        "testimonies"
    } else {
        "originals"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn analyze_guard_rejects_second_holder() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());

        let first = try_analyze_guard(&paths, "file-1").expect("first guard");
        let second = try_analyze_guard(&paths, "file-1");
        assert!(second.is_err());
        drop(first);

        try_analyze_guard(&paths, "file-1").expect("guard after release");
    }

    #[test]
    fn dir_locks_dedup_and_order_labels() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());

        let held = lock_dirs(&paths, &["reports", "originals", "reports"]).expect("locks");
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].label, "originals");
        assert_eq!(held[1].label, "reports");
    }
}
