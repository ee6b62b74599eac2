use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LockerError;
use crate::locker::dirlock;
use crate::locker::gate;
use crate::locker::naming::{
    REPORT_PREFIX, asset_name_in_report, sanitize_file_name, split_stem_ext, unique_name_in,
};
use crate::locker::paths::{
    LockerPaths, ORIGINALS_SUBDIR, REL_PREFIX, UNIFIED_ORIGINALS_SUBDIR,
};
use crate::locker::report::FILE_PATH_LABEL;

const ALL_DIR_LABELS: &[&str] = &["originals", "reports", "unified-originals", "unified-reports"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Asset,
    Report,
    Auto,
}

impl std::str::FromStr for TargetKind {
    type Err = LockerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(Self::Asset),
            "report" => Ok(Self::Report),
            "auto" | "" => Ok(Self::Auto),
            other => Err(LockerError::InvalidArgument(format!(
                "unknown kind '{other}' (use asset, report, or auto)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoundKind {
    Asset,
    Report,
}

#[derive(Debug, Clone)]
struct Located {
    dir: PathBuf,
    name: String,
    kind: FoundKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathChange {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone)]
pub struct RenameOutcome {
    pub new_primary_name: String,
    pub changes: Vec<PathChange>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub warnings: Vec<String>,
}

fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    names
}

/// Find a stored file by name across the evidence directories. Asset
/// directories win over report directories; a kind hint restricts the
/// search.
fn locate(paths: &LockerPaths, name: &str, kind: TargetKind) -> Option<Located> {
    let safe = sanitize_file_name(name);
    let asset_dirs = [&paths.originals_dir, &paths.unified_originals_dir];
    let report_dirs = [&paths.reports_dir, &paths.unified_reports_dir];

    if kind != TargetKind::Report {
        for dir in asset_dirs {
            if dir.join(&safe).is_file() {
                return Some(Located {
                    dir: dir.clone(),
                    name: safe,
                    kind: FoundKind::Asset,
                });
            }
        }
    }
    if kind != TargetKind::Asset {
        for dir in report_dirs {
            if dir.join(&safe).is_file() {
                return Some(Located {
                    dir: dir.clone(),
                    name: safe,
                    kind: FoundKind::Report,
                });
            }
        }
    }
    None
}

/// Two-tier discovery of every report document derived from an asset.
///
/// Tier 1 matches the deterministic naming convention; tier 2 scans the
/// body of every other `.txt` for the asset's declared storage path. The
/// second tier recovers links for documents renamed outside this engine or
/// hand-edited, because the primary link is a naming convention rather than
/// a database foreign key.
pub fn discover_reports(paths: &LockerPaths, asset_name: &str) -> Vec<(PathBuf, String)> {
    let base = sanitize_file_name(asset_name);
    let prefix = format!("{REPORT_PREFIX}{base}").to_lowercase();
    let needle_single =
        format!("{REL_PREFIX}/{ORIGINALS_SUBDIR}/{base}").to_lowercase();
    let needle_unified =
        format!("{REL_PREFIX}/{UNIFIED_ORIGINALS_SUBDIR}/{base}").to_lowercase();

    let mut matches = Vec::new();
    for dir in [&paths.reports_dir, &paths.unified_reports_dir] {
        for name in list_files(dir) {
            let lower = name.to_lowercase();
            if !lower.ends_with(".txt") {
                continue;
            }
            if lower.starts_with(&prefix) {
                matches.push((dir.clone(), name));
                continue;
            }
            let Ok(content) = fs::read_to_string(dir.join(&name)) else {
                continue;
            };
            let content = content.to_lowercase();
            if content.contains(&needle_single) || content.contains(&needle_unified) {
                matches.push((dir.clone(), name));
            }
        }
    }
    matches
}

fn try_rename_unique(
    dir: &Path,
    old_name: &str,
    desired: &str,
) -> Result<(String, PathBuf), LockerError> {
    let safe_desired = sanitize_file_name(desired);
    let (final_name, full_path) = unique_name_in(dir, &safe_desired);
    fs::rename(dir.join(old_name), &full_path)?;
    Ok((final_name, full_path))
}

/// Rewrite the single-asset back-reference lines of a report body after its
/// asset was renamed. The `data/originals/` and `data/unified-originals/`
/// forms each keep their own prefix.
fn rewrite_path_lines(body: &str, new_asset_name: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for line in body.lines() {
        let lower = line.to_lowercase();
        let rewritten = if lower.starts_with(&FILE_PATH_LABEL.to_lowercase()) {
            if lower.contains(&format!("{REL_PREFIX}/{UNIFIED_ORIGINALS_SUBDIR}/")) {
                Some(format!(
                    "{FILE_PATH_LABEL} {REL_PREFIX}/{UNIFIED_ORIGINALS_SUBDIR}/{new_asset_name}"
                ))
            } else if lower.contains(&format!("{REL_PREFIX}/{ORIGINALS_SUBDIR}/")) {
                Some(format!(
                    "{FILE_PATH_LABEL} {REL_PREFIX}/{ORIGINALS_SUBDIR}/{new_asset_name}"
                ))
            } else {
                None
            }
        } else {
            None
        };
        match rewritten {
            Some(text) => out.push_str(&text),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

/// The `" (n)"` tail of a derived report's stem, preserved across a
/// cascade rename. Reports discovered by content scan whose names never
/// matched the convention get a clean conventional name instead.
fn report_suffix(report_name: &str, old_asset_name: &str) -> String {
    let (stem, _) = split_stem_ext(report_name);
    let expected = format!("{REPORT_PREFIX}{old_asset_name}");
    match stem.get(..expected.len()) {
        Some(head) if head.eq_ignore_ascii_case(&expected) => stem[expected.len()..].to_string(),
        _ => String::new(),
    }
}

fn rename_derived_reports(
    paths: &LockerPaths,
    old_asset_name: &str,
    new_asset_name: &str,
    changes: &mut Vec<PathChange>,
    warnings: &mut Vec<String>,
) {
    for (dir, report_name) in discover_reports(paths, old_asset_name) {
        let suffix = report_suffix(&report_name, old_asset_name);
        let desired = format!("{REPORT_PREFIX}{new_asset_name}{suffix}.txt");
        match try_rename_unique(&dir, &report_name, &desired) {
            Ok((renamed, full_path)) => {
                changes.push(PathChange {
                    old: paths.relative_to(&dir, &report_name),
                    new: paths.relative_to(&dir, &renamed),
                });
                match fs::read_to_string(&full_path) {
                    Ok(content) => {
                        let updated = rewrite_path_lines(&content, new_asset_name);
                        if updated != content
                            && let Err(err) = fs::write(&full_path, updated)
                        {
                            warnings.push(format!(
                                "back-reference rewrite failed for {renamed}: {err}"
                            ));
                        }
                    }
                    Err(err) => {
                        warnings.push(format!("could not read {renamed} for rewrite: {err}"));
                    }
                }
            }
            Err(err) => {
                warnings.push(format!("report rename failed for {report_name}: {err}"));
            }
        }
    }
}

/// Authenticated rename of a stored asset or report, cascading across every
/// derived document. Returns every `{old, new}` relative-path pair touched
/// so callers can update their own in-memory references.
pub fn rename_stored(
    paths: &LockerPaths,
    secret_config: Option<&str>,
    old_name: &str,
    new_name: &str,
    kind: TargetKind,
    secret: Option<&str>,
) -> Result<RenameOutcome, LockerError> {
    gate::require(secret_config, secret)?;

    let old_trimmed = old_name.trim();
    let new_trimmed = new_name.trim();
    if old_trimmed.is_empty() || new_trimmed.is_empty() {
        return Err(LockerError::InvalidArgument(
            "both the old and the new name are required".to_string(),
        ));
    }

    // preserve the extension when the caller omitted it
    let (_, old_ext) = split_stem_ext(old_trimmed);
    let (_, new_ext) = split_stem_ext(new_trimmed);
    let desired = if new_ext.is_empty() && !old_ext.is_empty() {
        format!("{new_trimmed}{old_ext}")
    } else {
        new_trimmed.to_string()
    };

    let Some(located) = locate(paths, old_trimmed, kind) else {
        return Err(LockerError::NotFound(format!(
            "'{old_trimmed}' does not resolve under the storage root"
        )));
    };

    let _locks = dirlock::lock_dirs(paths, ALL_DIR_LABELS)?;
    let mut changes = Vec::new();
    let mut warnings = Vec::new();

    match located.kind {
        FoundKind::Asset => {
            let (renamed, _) = try_rename_unique(&located.dir, &located.name, &desired)?;
            changes.push(PathChange {
                old: paths.relative_to(&located.dir, &located.name),
                new: paths.relative_to(&located.dir, &renamed),
            });
            rename_derived_reports(paths, &located.name, &renamed, &mut changes, &mut warnings);
            Ok(RenameOutcome {
                new_primary_name: renamed,
                changes,
                warnings,
            })
        }
        FoundKind::Report => {
            let desired_report = if desired.to_lowercase().ends_with(".txt") {
                desired
            } else {
                format!("{desired}.txt")
            };
            let (renamed, renamed_path) =
                try_rename_unique(&located.dir, &located.name, &desired_report)?;
            changes.push(PathChange {
                old: paths.relative_to(&located.dir, &located.name),
                new: paths.relative_to(&located.dir, &renamed),
            });

            // a convention-named report drags its asset along
            if let Some(old_asset) = asset_name_in_report(&located.name)
                && let Some(new_asset) = asset_name_in_report(&renamed)
                && let Some(asset) =
                    locate(paths, &old_asset, TargetKind::Asset)
            {
                match try_rename_unique(&asset.dir, &asset.name, &sanitize_file_name(&new_asset)) {
                    Ok((renamed_asset, _)) => {
                        changes.push(PathChange {
                            old: paths.relative_to(&asset.dir, &asset.name),
                            new: paths.relative_to(&asset.dir, &renamed_asset),
                        });
                        match fs::read_to_string(&renamed_path) {
                            Ok(content) => {
                                let updated = rewrite_path_lines(&content, &renamed_asset);
                                if updated != content
                                    && let Err(err) = fs::write(&renamed_path, updated)
                                {
                                    warnings.push(format!(
                                        "back-reference rewrite failed for {renamed}: {err}"
                                    ));
                                }
                            }
                            Err(err) => {
                                warnings
                                    .push(format!("could not read {renamed} for rewrite: {err}"));
                            }
                        }
                    }
                    Err(err) => {
                        warnings.push(format!("asset rename failed for {old_asset}: {err}"));
                    }
                }
            }

            Ok(RenameOutcome {
                new_primary_name: renamed,
                changes,
                warnings,
            })
        }
    }
}

fn try_unlink(path: &Path) -> bool {
    fs::remove_file(path).is_ok()
}

/// Authenticated delete of a stored asset or report plus every linked
/// counterpart. Missing secondaries are skipped; a repeat call on an
/// already-deleted name reports `NotFound`.
pub fn delete_stored(
    paths: &LockerPaths,
    secret_config: Option<&str>,
    name: &str,
    kind: TargetKind,
    secret: Option<&str>,
) -> Result<DeleteOutcome, LockerError> {
    gate::require(secret_config, secret)?;

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LockerError::InvalidArgument("missing file name".to_string()));
    }
    let Some(located) = locate(paths, trimmed, kind) else {
        return Err(LockerError::NotFound(format!(
            "'{trimmed}' does not resolve under the storage root"
        )));
    };

    let _locks = dirlock::lock_dirs(paths, ALL_DIR_LABELS)?;
    let mut deleted = Vec::new();
    let mut warnings = Vec::new();

    let primary = located.dir.join(&located.name);
    if !try_unlink(&primary) {
        return Err(LockerError::StorageIo(format!(
            "failed to delete {}",
            primary.display()
        )));
    }
    deleted.push(paths.relative_to(&located.dir, &located.name));

    match located.kind {
        FoundKind::Asset => {
            for (dir, report_name) in discover_reports(paths, &located.name) {
                if try_unlink(&dir.join(&report_name)) {
                    deleted.push(paths.relative_to(&dir, &report_name));
                } else {
                    warnings.push(format!("could not delete derived report {report_name}"));
                }
            }
        }
        FoundKind::Report => {
            if let Some(asset_name) = asset_name_in_report(&located.name)
                && let Some(asset) = locate(paths, &asset_name, TargetKind::Asset)
            {
                if try_unlink(&asset.dir.join(&asset.name)) {
                    deleted.push(paths.relative_to(&asset.dir, &asset.name));
                } else {
                    warnings.push(format!("could not delete linked asset {asset_name}"));
                }
            }
        }
    }

    Ok(DeleteOutcome { deleted, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SECRET: Option<&str> = Some("open-sesame");

    fn layout(tmp: &tempfile::TempDir) -> LockerPaths {
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");
        paths
    }

    fn write_report(paths: &LockerPaths, name: &str, asset: &str) {
        let body = format!(
            "=====\nFile Name: {asset}\nFile Path: data/originals/{asset}\n-----\nSummary:\n\nquiet\n"
        );
        fs::write(paths.reports_dir.join(name), body).expect("write report");
    }

    #[test]
    fn discovery_matches_by_name_and_by_content() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");
        write_report(&paths, "Analysis of clip.mp4.txt", "clip.mp4");
        write_report(&paths, "Analysis of clip.mp4 (2).txt", "clip.mp4");
        // renamed outside the engine: only its body still links the asset
        write_report(&paths, "Renamed notes.txt", "clip.mp4");
        write_report(&paths, "Analysis of other.png.txt", "other.png");

        let found = discover_reports(&paths, "clip.mp4");
        let names: Vec<&str> = found.iter().map(|(_, n)| n.as_str()).collect();
        assert!(names.contains(&"Analysis of clip.mp4.txt"));
        assert!(names.contains(&"Analysis of clip.mp4 (2).txt"));
        assert!(names.contains(&"Renamed notes.txt"));
        assert!(!names.contains(&"Analysis of other.png.txt"));
    }

    #[test]
    fn rename_asset_cascades_to_reports_and_rewrites_back_reference() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");
        write_report(&paths, "Analysis of clip.mp4.txt", "clip.mp4");
        write_report(&paths, "Analysis of clip.mp4 (2).txt", "clip.mp4");

        let out = rename_stored(
            &paths,
            SECRET,
            "clip.mp4",
            "warehouse",
            TargetKind::Auto,
            SECRET,
        )
        .expect("rename");

        assert_eq!(out.new_primary_name, "warehouse.mp4");
        assert!(paths.originals_dir.join("warehouse.mp4").is_file());
        assert!(paths.reports_dir.join("Analysis of warehouse.mp4.txt").is_file());
        assert!(
            paths
                .reports_dir
                .join("Analysis of warehouse.mp4 (2).txt")
                .is_file()
        );
        assert_eq!(out.changes.len(), 3);

        let body = fs::read_to_string(paths.reports_dir.join("Analysis of warehouse.mp4.txt"))
            .expect("read");
        assert!(body.contains("File Path: data/originals/warehouse.mp4"));
        assert!(!body.contains("data/originals/clip.mp4"));
    }

    #[test]
    fn rename_round_trip_restores_original_names() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");
        write_report(&paths, "Analysis of clip.mp4.txt", "clip.mp4");

        rename_stored(&paths, SECRET, "clip.mp4", "tmp", TargetKind::Auto, SECRET)
            .expect("rename away");
        rename_stored(&paths, SECRET, "tmp.mp4", "clip", TargetKind::Auto, SECRET)
            .expect("rename back");

        assert!(paths.originals_dir.join("clip.mp4").is_file());
        let report = paths.reports_dir.join("Analysis of clip.mp4.txt");
        assert!(report.is_file());
        let body = fs::read_to_string(report).expect("read");
        assert!(body.contains("File Path: data/originals/clip.mp4"));
    }

    #[test]
    fn renaming_a_report_drags_its_asset_along() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");
        write_report(&paths, "Analysis of clip.mp4.txt", "clip.mp4");

        let out = rename_stored(
            &paths,
            SECRET,
            "Analysis of clip.mp4.txt",
            "Analysis of dockcam.mp4.txt",
            TargetKind::Report,
            SECRET,
        )
        .expect("rename");

        assert_eq!(out.new_primary_name, "Analysis of dockcam.mp4.txt");
        assert!(paths.originals_dir.join("dockcam.mp4").is_file());
        assert!(!paths.originals_dir.join("clip.mp4").exists());

        let body = fs::read_to_string(paths.reports_dir.join("Analysis of dockcam.mp4.txt"))
            .expect("read");
        assert!(body.contains("File Path: data/originals/dockcam.mp4"));
    }

    #[test]
    fn rename_into_existing_name_is_collision_resolved() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("a.txt"), b"a").expect("asset");
        fs::write(paths.originals_dir.join("b.txt"), b"b").expect("asset");

        let out = rename_stored(&paths, SECRET, "b.txt", "a.txt", TargetKind::Asset, SECRET)
            .expect("rename");
        assert_eq!(out.new_primary_name, "a (2).txt");
    }

    #[test]
    fn delete_asset_removes_every_derived_report() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");
        write_report(&paths, "Analysis of clip.mp4.txt", "clip.mp4");
        write_report(&paths, "Renamed notes.txt", "clip.mp4");

        let out = delete_stored(&paths, SECRET, "clip.mp4", TargetKind::Auto, SECRET)
            .expect("delete");
        assert_eq!(out.deleted.len(), 3);
        assert!(!paths.originals_dir.join("clip.mp4").exists());
        assert!(!paths.reports_dir.join("Analysis of clip.mp4.txt").exists());
        assert!(!paths.reports_dir.join("Renamed notes.txt").exists());
    }

    #[test]
    fn second_delete_is_not_found_not_a_crash() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");
        delete_stored(&paths, SECRET, "clip.mp4", TargetKind::Auto, SECRET).expect("delete");

        let again = delete_stored(&paths, SECRET, "clip.mp4", TargetKind::Auto, SECRET);
        assert!(matches!(again, Err(LockerError::NotFound(_))));
    }

    #[test]
    fn gate_failures_cause_no_mutation() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        fs::write(paths.originals_dir.join("clip.mp4"), b"v").expect("asset");

        let missing = delete_stored(&paths, SECRET, "clip.mp4", TargetKind::Auto, None);
        assert!(matches!(missing, Err(LockerError::Unauthorized(_))));
        let wrong = delete_stored(&paths, SECRET, "clip.mp4", TargetKind::Auto, Some("nope"));
        assert!(matches!(wrong, Err(LockerError::Unauthorized(_))));
        assert!(paths.originals_dir.join("clip.mp4").is_file());
    }
}
