use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::LockerError;
use crate::locker::naming::{sanitize_file_name, split_stem_ext};
use crate::locker::paths::LockerPaths;

const PROFILE_SUFFIX: &str = ".profile.json";

/// Person-profile record stored as `<name>.profile.json`, optionally with a
/// `<name>.reference.<ext>` image beside it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersonProfile {
    pub name: String,
    pub details: String,
    pub enhanced_details: Option<String>,
    pub reference_url: Option<String>,
    pub reference_image_path: Option<String>,
    pub saved_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SavedProfile {
    pub json_rel_path: String,
    pub image_rel_path: Option<String>,
}

fn image_extension_for(source: &str) -> &'static str {
    let (_, ext) = split_stem_ext(source);
    match ext.to_lowercase().as_str() {
        ".jpg" | ".jpeg" => ".jpg",
        ".gif" => ".gif",
        _ => ".png",
    }
}

pub fn save_profile(
    paths: &LockerPaths,
    profile: &PersonProfile,
    reference_image: Option<(&str, &[u8])>,
) -> Result<SavedProfile, LockerError> {
    let base = sanitize_file_name(&profile.name);
    if base.is_empty() {
        return Err(LockerError::InvalidArgument(
            "a profile needs a name".to_string(),
        ));
    }
    fs::create_dir_all(&paths.profiles_dir)?;

    let mut stored = profile.clone();
    stored.saved_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

    let image_rel_path = match reference_image {
        Some((source_name, bytes)) => {
            let image_name = format!("{base}.reference{}", image_extension_for(source_name));
            fs::write(paths.profiles_dir.join(&image_name), bytes)?;
            let rel = paths.relative_to(&paths.profiles_dir, &image_name);
            stored.reference_image_path = Some(rel.clone());
            Some(rel)
        }
        None => stored.reference_image_path.clone(),
    };

    let json_name = format!("{base}{PROFILE_SUFFIX}");
    let data = serde_json::to_string_pretty(&stored)?;
    fs::write(paths.profiles_dir.join(&json_name), format!("{data}\n"))?;

    Ok(SavedProfile {
        json_rel_path: paths.relative_to(&paths.profiles_dir, &json_name),
        image_rel_path,
    })
}

pub fn list_profiles(paths: &LockerPaths) -> Result<Vec<PersonProfile>, LockerError> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(&paths.profiles_dir) else {
        return Ok(out);
    };
    let mut names: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase().ends_with(PROFILE_SUFFIX))
        })
        .collect();
    names.sort();

    for path in names {
        let Ok(raw) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(profile) = serde_json::from_str::<PersonProfile>(&raw) else {
            continue;
        };
        out.push(profile);
    }
    Ok(out)
}

/// Delete a profile record and its reference image, if any.
pub fn delete_profile(paths: &LockerPaths, name: &str) -> Result<Vec<String>, LockerError> {
    let base = sanitize_file_name(name);
    let json_name = format!("{base}{PROFILE_SUFFIX}");
    let json_path = paths.profiles_dir.join(&json_name);
    if !json_path.is_file() {
        return Err(LockerError::NotFound(format!("profile '{name}'")));
    }

    let mut removed = Vec::new();
    fs::remove_file(&json_path)?;
    removed.push(paths.relative_to(&paths.profiles_dir, &json_name));

    let prefix = format!("{base}.reference.");
    if let Ok(entries) = fs::read_dir(&paths.profiles_dir) {
        for entry in entries.flatten() {
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if file_name.starts_with(&prefix) && fs::remove_file(entry.path()).is_ok() {
                removed.push(paths.relative_to(&paths.profiles_dir, &file_name));
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layout(tmp: &tempfile::TempDir) -> LockerPaths {
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");
        paths
    }

    #[test]
    fn profile_round_trips_with_reference_image() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        let profile = PersonProfile {
            name: "Alice".to_string(),
            details: "tall, red coat".to_string(),
            ..PersonProfile::default()
        };
        let saved = save_profile(&paths, &profile, Some(("ref.jpeg", &[1, 2, 3])))
            .expect("save");
        assert_eq!(saved.json_rel_path, "data/profiles/Alice.profile.json");
        assert_eq!(
            saved.image_rel_path.as_deref(),
            Some("data/profiles/Alice.reference.jpg")
        );

        let listed = list_profiles(&paths).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Alice");
        assert!(listed[0].saved_at.is_some());
    }

    #[test]
    fn delete_removes_json_and_image() {
        let tmp = tempdir().expect("tempdir");
        let paths = layout(&tmp);

        let profile = PersonProfile {
            name: "Bob".to_string(),
            ..PersonProfile::default()
        };
        save_profile(&paths, &profile, Some(("x.png", &[9]))).expect("save");

        let removed = delete_profile(&paths, "Bob").expect("delete");
        assert_eq!(removed.len(), 2);
        assert!(matches!(
            delete_profile(&paths, "Bob"),
            Err(LockerError::NotFound(_))
        ));
    }
}
