use anyhow::Result;
use std::fs;

use crate::commands::CommandReport;
use crate::locker::paths::resolve_paths;
use crate::locker::profile::{PersonProfile, delete_profile, list_profiles, save_profile};
use crate::locker::util::truncate_with_ellipsis;

pub struct ProfileSaveArgs {
    pub name: String,
    pub details: String,
    pub enhanced_details: Option<String>,
    pub reference_url: Option<String>,
    pub reference_image: Option<std::path::PathBuf>,
}

pub fn run_save(args: &ProfileSaveArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("profile save");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;

    let profile = PersonProfile {
        name: args.name.clone(),
        details: args.details.clone(),
        enhanced_details: args.enhanced_details.clone(),
        reference_url: args.reference_url.clone(),
        ..PersonProfile::default()
    };

    let image_bytes = match &args.reference_image {
        Some(path) => Some((path.clone(), fs::read(path)?)),
        None => None,
    };
    let image_ref = image_bytes.as_ref().and_then(|(path, bytes)| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| (name, bytes.as_slice()))
    });

    match save_profile(&paths, &profile, image_ref) {
        Ok(saved) => {
            report.detail(format!("profile saved: {}", saved.json_rel_path));
            if let Some(image) = &saved.image_rel_path {
                report.detail(format!("reference image: {image}"));
            }
        }
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}

pub fn run_list() -> Result<CommandReport> {
    let mut report = CommandReport::new("profile list");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;

    let profiles = list_profiles(&paths)?;
    report.detail(format!("profiles={}", profiles.len()));
    for profile in profiles {
        report.detail(format!(
            "{}: {}",
            profile.name,
            truncate_with_ellipsis(&profile.details, 80)
        ));
    }
    Ok(report)
}

pub fn run_delete(name: &str) -> Result<CommandReport> {
    let mut report = CommandReport::new("profile delete");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;

    match delete_profile(&paths, name) {
        Ok(removed) => {
            for file in removed {
                report.detail(format!("deleted {file}"));
            }
        }
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}
