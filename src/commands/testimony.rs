use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::commands::CommandReport;
use crate::locker::paths::resolve_paths;
use crate::locker::testimony::{TestimonyKind, save_testimony};

pub struct TestimonySaveArgs {
    pub witness: Option<String>,
    pub text: Option<String>,
    pub from_file: Option<std::path::PathBuf>,
    pub summary: Option<String>,
}

fn load_text(args: &TestimonySaveArgs) -> Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if let Some(path) = &args.from_file {
        return read_file(path);
    }
    anyhow::bail!("testimony text is required (--text or --from-file)");
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn run_save(args: &TestimonySaveArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("testimony save");
    let paths = resolve_paths()?;
    paths.ensure_layout()?;

    let text = load_text(args)?;
    let kind = if args.witness.is_some() {
        TestimonyKind::Person
    } else {
        TestimonyKind::User
    };

    match save_testimony(
        &paths,
        kind,
        args.witness.as_deref(),
        &text,
        args.summary.as_deref(),
    ) {
        Ok(saved) => {
            report.detail(format!("testimony saved: {}", saved.rel_path));
        }
        Err(err) => report.issue(err.to_string()),
    }
    Ok(report)
}
