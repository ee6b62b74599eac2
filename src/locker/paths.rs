use anyhow::Result;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Relative-path prefix used everywhere a path is surfaced to callers or
/// embedded inside a report body, e.g. `data/originals/clip.mp4`.
pub const REL_PREFIX: &str = "data";

pub const ORIGINALS_SUBDIR: &str = "originals";
pub const UNIFIED_ORIGINALS_SUBDIR: &str = "unified-originals";
pub const REPORTS_SUBDIR: &str = "reports";
pub const UNIFIED_REPORTS_SUBDIR: &str = "unified-reports";
pub const PROFILES_SUBDIR: &str = "profiles";
pub const TESTIMONIES_SUBDIR: &str = "testimonies";

#[derive(Debug, Clone)]
pub struct LockerPaths {
    pub data_dir: PathBuf,
    pub originals_dir: PathBuf,
    pub unified_originals_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub unified_reports_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub testimonies_dir: PathBuf,
    pub state_dir: PathBuf,
    pub locks_dir: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<LockerPaths> {
    let home = required_home_dir()?;
    let data_dir = env_or_default_path("EVLOCK_DATA_DIR", home.join("EvidenceLocker/data"));

    let state_dir = data_dir.join("state");
    Ok(LockerPaths {
        originals_dir: data_dir.join(ORIGINALS_SUBDIR),
        unified_originals_dir: data_dir.join(UNIFIED_ORIGINALS_SUBDIR),
        reports_dir: data_dir.join(REPORTS_SUBDIR),
        unified_reports_dir: data_dir.join(UNIFIED_REPORTS_SUBDIR),
        profiles_dir: data_dir.join(PROFILES_SUBDIR),
        testimonies_dir: data_dir.join(TESTIMONIES_SUBDIR),
        locks_dir: state_dir.join("locks"),
        logs_dir: data_dir.join("logs"),
        state_dir,
        data_dir,
    })
}

impl LockerPaths {
    /// Layout rooted at an explicit directory. Tests use this instead of
    /// `resolve_paths` so parallel tests cannot observe each other's
    /// EVLOCK_DATA_DIR mutations.
    #[cfg(test)]
    pub fn rooted_at(root: &Path) -> Self {
        let data_dir = root.to_path_buf();
        let state_dir = data_dir.join("state");
        Self {
            originals_dir: data_dir.join(ORIGINALS_SUBDIR),
            unified_originals_dir: data_dir.join(UNIFIED_ORIGINALS_SUBDIR),
            reports_dir: data_dir.join(REPORTS_SUBDIR),
            unified_reports_dir: data_dir.join(UNIFIED_REPORTS_SUBDIR),
            profiles_dir: data_dir.join(PROFILES_SUBDIR),
            testimonies_dir: data_dir.join(TESTIMONIES_SUBDIR),
            locks_dir: state_dir.join("locks"),
            logs_dir: data_dir.join("logs"),
            state_dir,
            data_dir,
        }
    }

    /// Create the fixed subdirectory layout. Safe to call repeatedly.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            &self.data_dir,
            &self.originals_dir,
            &self.unified_originals_dir,
            &self.reports_dir,
            &self.unified_reports_dir,
            &self.profiles_dir,
            &self.testimonies_dir,
            &self.state_dir,
            &self.locks_dir,
            &self.logs_dir,
        ] {
            fs::create_dir_all(dir)
                .map_err(|err| anyhow::anyhow!("failed to create {}: {err}", dir.display()))?;
        }
        Ok(())
    }

    /// The `data/<subdir>/<name>` form of a file inside one of the managed
    /// directories. Directories outside the layout fall back to `data/<name>`.
    pub fn relative_to(&self, dir: &Path, name: &str) -> String {
        let subdir = if dir == self.originals_dir {
            Some(ORIGINALS_SUBDIR)
        } else if dir == self.unified_originals_dir {
            Some(UNIFIED_ORIGINALS_SUBDIR)
        } else if dir == self.reports_dir {
            Some(REPORTS_SUBDIR)
        } else if dir == self.unified_reports_dir {
            Some(UNIFIED_REPORTS_SUBDIR)
        } else if dir == self.profiles_dir {
            Some(PROFILES_SUBDIR)
        } else if dir == self.testimonies_dir {
            Some(TESTIMONIES_SUBDIR)
        } else {
            None
        };
        match subdir {
            Some(sub) => format!("{REL_PREFIX}/{sub}/{name}"),
            None => format!("{REL_PREFIX}/{name}"),
        }
    }
}
