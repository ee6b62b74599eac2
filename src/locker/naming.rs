use std::path::{Component, Path, PathBuf};

use crate::locker::paths::REL_PREFIX;

/// Prefix of every report document derived from an asset: the rest of the
/// contract is `"Analysis of " + asset name + ".txt"`, with a ` (n)` suffix
/// on collision.
pub const REPORT_PREFIX: &str = "Analysis of ";

/// Strip any directory components and replace characters that are unsafe in
/// file names on at least one supported platform with `_`.
pub fn sanitize_file_name(input: &str) -> String {
    let trimmed = input.trim();
    let base = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);
    base.chars()
        .map(|ch| {
            if ch.is_control() || matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            {
                '_'
            } else {
                ch
            }
        })
        .collect()
}

/// Split `name.ext` at the last dot; the extension keeps its dot. Names
/// without an extension (or dotfiles like `.env`) come back whole.
pub fn split_stem_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Collision-free name inside `dir`: `a.txt`, then `a (2).txt`, `a (3).txt`.
/// Callers hold the directory lock around check-and-create.
pub fn unique_name_in(dir: &Path, desired: &str) -> (String, PathBuf) {
    let (stem, ext) = split_stem_ext(desired);
    let mut candidate = desired.to_string();
    let mut counter = 1u32;
    while dir.join(&candidate).exists() {
        counter += 1;
        candidate = format!("{stem} ({counter}){ext}");
    }
    let full = dir.join(&candidate);
    (candidate, full)
}

/// Deterministic report document name for an asset.
pub fn report_name_for(asset_name: &str) -> String {
    sanitize_file_name(&format!("{REPORT_PREFIX}{asset_name}.txt"))
}

/// Inverse of the convention: `Analysis of clip.mp4.txt` -> `clip.mp4`.
/// Case-insensitive on the fixed parts, `None` when the name does not match.
pub fn asset_name_in_report(report_name: &str) -> Option<String> {
    let head = report_name.get(..REPORT_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(REPORT_PREFIX) {
        return None;
    }
    let rest = &report_name[REPORT_PREFIX.len()..];
    let tail_start = rest.len().checked_sub(".txt".len())?;
    let tail = rest.get(tail_start..)?;
    if !tail.eq_ignore_ascii_case(".txt") {
        return None;
    }
    let inner = &rest[..tail_start];
    if inner.is_empty() {
        return None;
    }
    Some(inner.to_string())
}

/// Resolve a caller-supplied relative path like `data/reports/Report.txt`
/// against the storage root. Leading `./`, `.\` and `../` runs are stripped,
/// a `data/` prefix is stripped case-insensitively, and any remaining `..`
/// component that would climb past the root fails closed.
pub fn resolve_relative(root: &Path, rel: &str) -> Option<PathBuf> {
    let trimmed = rel.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = trimmed.trim_start_matches(['.', '/', '\\']);
    let lower = stripped.to_lowercase();
    let prefix = format!("{}/", REL_PREFIX);
    let sub = if lower.starts_with(&prefix) {
        &stripped[prefix.len()..]
    } else {
        stripped
    };

    let mut stack: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(sub).components() {
        match component {
            Component::Normal(part) => stack.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if stack.is_empty() {
        return None;
    }

    let mut abs = root.to_path_buf();
    for part in stack {
        abs.push(part);
    }
    if !abs.starts_with(root) {
        return None;
    }
    Some(abs)
}
