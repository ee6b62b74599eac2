use std::path::Path;
use std::process::Command;

use crate::error::LockerError;
use crate::locker::naming::resolve_relative;
use crate::locker::paths::LockerPaths;

/// Best-effort "show in folder" for a managed file. The path is resolved
/// against the storage root first, so a traversal attempt reads as a
/// missing file rather than an escape.
pub fn reveal(paths: &LockerPaths, relative_path: &str) -> Result<(), LockerError> {
    let Some(abs) = resolve_relative(&paths.data_dir, relative_path) else {
        return Err(LockerError::NotFound(format!(
            "'{relative_path}' does not resolve under the storage root"
        )));
    };
    if !abs.exists() {
        return Err(LockerError::NotFound(format!(
            "'{relative_path}' does not exist"
        )));
    }
    spawn_file_manager(&abs)
}

fn spawn_detached(mut cmd: Command) -> Result<(), LockerError> {
    cmd.stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|err| LockerError::StorageIo(format!("could not open file manager: {err}")))
}

#[cfg(target_os = "windows")]
fn spawn_file_manager(abs: &Path) -> Result<(), LockerError> {
    let mut cmd = Command::new("explorer.exe");
    cmd.arg("/select,").arg(abs);
    spawn_detached(cmd)
}

#[cfg(target_os = "macos")]
fn spawn_file_manager(abs: &Path) -> Result<(), LockerError> {
    let mut cmd = Command::new("open");
    cmd.arg("-R").arg(abs);
    spawn_detached(cmd)
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn spawn_file_manager(abs: &Path) -> Result<(), LockerError> {
    // selection support varies by desktop environment; opening the parent
    // directory is the portable behavior
    let opener = which::which("xdg-open")
        .map_err(|_| LockerError::StorageIo("xdg-open is not available".to_string()))?;
    let dir = abs.parent().unwrap_or(abs);
    let mut cmd = Command::new(opener);
    cmd.arg(dir);
    spawn_detached(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reveal_refuses_paths_that_do_not_resolve() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");

        let escape = reveal(&paths, "data/../../etc");
        assert!(matches!(escape, Err(LockerError::NotFound(_))));

        let missing = reveal(&paths, "data/originals/nope.mp4");
        assert!(matches!(missing, Err(LockerError::NotFound(_))));
    }
}
