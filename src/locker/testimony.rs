use chrono::{SecondsFormat, Utc};
use std::fs;

use crate::error::LockerError;
use crate::locker::dirlock;
use crate::locker::naming::{sanitize_file_name, unique_name_in};
use crate::locker::paths::LockerPaths;

const RULE_HEAVY: &str = "=====================================";
const RULE_LIGHT: &str = "-------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestimonyKind {
    User,
    Person,
}

#[derive(Debug, Clone)]
pub struct SavedTestimony {
    pub file_name: String,
    pub rel_path: String,
    pub saved_at: String,
}

/// Persist a testimony record as a formatted text document. User testimony
/// lands in one well-known slot; per-person testimony carries the person's
/// name in the file name. Collisions renumber like every other document.
pub fn save_testimony(
    paths: &LockerPaths,
    kind: TestimonyKind,
    person_name: Option<&str>,
    text: &str,
    summary: Option<&str>,
) -> Result<SavedTestimony, LockerError> {
    fs::create_dir_all(&paths.testimonies_dir)?;
    let saved_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    let base = match kind {
        TestimonyKind::User => "My Testimony".to_string(),
        TestimonyKind::Person => {
            let mut who = sanitize_file_name(person_name.unwrap_or("unknown"));
            if who.is_empty() {
                who = "unknown".to_string();
            }
            format!("Witness Testimony - {who}")
        }
    };
    let desired = sanitize_file_name(&format!("{base}.txt"));

    let mut out = String::new();
    out.push_str(RULE_HEAVY);
    out.push('\n');
    out.push_str(&format!(
        "Type: {}\n",
        match kind {
            TestimonyKind::User => "User",
            TestimonyKind::Person => "Witness",
        }
    ));
    if let Some(name) = person_name.filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!("Witness: {name}\n"));
    }
    out.push_str(&format!("Saved At: {saved_at}\n"));
    out.push_str(RULE_LIGHT);
    out.push('\n');
    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        out.push_str("Context Summary:\n");
        out.push_str(summary);
        out.push_str("\n\n");
    }
    out.push_str("Full Testimony:\n");
    out.push_str(text);
    out.push('\n');
    out.push_str(RULE_HEAVY);
    out.push('\n');

    let _lock = dirlock::lock_dir(paths, "testimonies")?;
    let (file_name, full_path) = unique_name_in(&paths.testimonies_dir, &desired);
    fs::write(&full_path, out)?;

    Ok(SavedTestimony {
        rel_path: paths.relative_to(&paths.testimonies_dir, &file_name),
        file_name,
        saved_at,
    })
}

/// Concatenated bodies of every saved testimony, fed to the provider as
/// context for each analysis run.
pub fn testimony_context(paths: &LockerPaths) -> String {
    let Ok(entries) = fs::read_dir(&paths.testimonies_dir) else {
        return String::new();
    };
    let mut names: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        })
        .collect();
    names.sort();

    let mut out = String::new();
    for path in names {
        let Ok(body) = fs::read_to_string(&path) else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(body.trim());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn testimonies_are_collision_renumbered_and_fed_to_context() {
        let tmp = tempdir().expect("tempdir");
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");

        let first = save_testimony(&paths, TestimonyKind::User, None, "It began on Monday.", None)
            .expect("save");
        assert_eq!(first.file_name, "My Testimony.txt");

        let second = save_testimony(&paths, TestimonyKind::User, None, "Amended account.", None)
            .expect("save");
        assert_eq!(second.file_name, "My Testimony (2).txt");

        let witness = save_testimony(
            &paths,
            TestimonyKind::Person,
            Some("Carol"),
            "I saw the van.",
            Some("brief summary"),
        )
        .expect("save");
        assert_eq!(witness.file_name, "Witness Testimony - Carol.txt");

        let context = testimony_context(&paths);
        assert!(context.contains("It began on Monday."));
        assert!(context.contains("I saw the van."));
        assert!(context.contains("brief summary"));
    }
}
