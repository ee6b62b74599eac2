use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::commands::analyze::AnalyzeArgs;
use crate::commands::case::CaseRunArgs;
use crate::commands::profile::ProfileSaveArgs;
use crate::commands::testimony::TestimonySaveArgs;
use crate::locker::consistency::TargetKind;

#[derive(Debug, Parser)]
#[command(
    name = "evlock",
    about = "Evidence lifecycle automation: upload, analyze, unify, and keep on-disk reports consistent.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store files under the evidence root and create tracking records
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Send one record to the analysis provider
    Analyze {
        /// Record id, stored name, or display name
        record: String,
        /// Where the evidence was recorded
        #[arg(long)]
        location: Option<String>,
        /// Free-text instructions for this run
        #[arg(long)]
        instructions: Option<String>,
        /// Manual subject tags (comma separated); re-runs a tagging-pending record
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        /// Provider call timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Confirm recognized subjects on a record awaiting review
    Review {
        /// Record id, stored name, or display name
        record: String,
        /// Subject names to keep (comma separated; may be empty)
        #[arg(long, value_delimiter = ',', num_args = 0.., default_value = "")]
        keep: Vec<String>,
    },
    /// Unified multi-file cases
    #[command(subcommand)]
    Case(CaseCommand),
    /// Rename a stored asset or report, cascading to every linked document
    Rename {
        old_name: String,
        new_name: String,
        /// asset, report, or auto
        #[arg(long, default_value = "auto")]
        kind: String,
        /// Destructive-operation secret
        #[arg(long)]
        secret: Option<String>,
    },
    /// Delete a stored asset or report plus every linked document
    Delete {
        name: String,
        /// asset, report, or auto
        #[arg(long, default_value = "auto")]
        kind: String,
        /// Destructive-operation secret
        #[arg(long)]
        secret: Option<String>,
    },
    /// Show a managed file in the host file manager (best effort)
    Reveal {
        /// Path relative to the storage root, e.g. data/reports/...
        relative_path: String,
    },
    /// Summarize records, cases, and the storage layout
    Status,
    /// Person-profile records
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Testimony records
    #[command(subcommand)]
    Testimony(TestimonyCommand),
    /// Check environment variables, layout, and ledger health
    Verify,
}

#[derive(Debug, Subcommand)]
enum CaseCommand {
    /// Analyze 2..N records jointly as one case
    Create {
        /// Member records (ids, stored names, or display names)
        #[arg(required = true)]
        members: Vec<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Replace a case's member set and re-run the unified analysis
    Rerun {
        case: String,
        #[arg(required = true)]
        members: Vec<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Re-persist an edited unified result and refresh member stubs
    Update {
        case: String,
        /// JSON file with the edited result
        #[arg(long)]
        edited: PathBuf,
    },
    /// Remove a case; members return to the unanalyzed pool
    Delete {
        case: String,
        /// Destructive-operation secret
        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    /// Create or overwrite a person profile
    Save {
        name: String,
        #[arg(long, default_value = "")]
        details: String,
        #[arg(long)]
        enhanced_details: Option<String>,
        #[arg(long)]
        reference_url: Option<String>,
        /// Image file copied beside the profile record
        #[arg(long)]
        reference_image: Option<PathBuf>,
    },
    /// List saved profiles
    List,
    /// Delete a profile and its reference image
    Delete { name: String },
}

#[derive(Debug, Subcommand)]
enum TestimonyCommand {
    /// Save user or witness testimony as a text record
    Save {
        /// Witness name; omit for the user's own testimony
        #[arg(long)]
        witness: Option<String>,
        #[arg(long)]
        text: Option<String>,
        /// Read the testimony body from a file instead
        #[arg(long)]
        from_file: Option<PathBuf>,
        /// One-line context summary stored with the record
        #[arg(long)]
        summary: Option<String>,
    },
}

fn finish(report: commands::CommandReport) -> Result<()> {
    report.print();
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Upload { files } => finish(commands::upload::run(&files)?),
        Command::Analyze {
            record,
            location,
            instructions,
            tags,
            timeout_secs,
        } => finish(commands::analyze::run(&AnalyzeArgs {
            record,
            location,
            instructions,
            tags,
            timeout_secs,
        })?),
        Command::Review { record, keep } => {
            let keep: Vec<String> = keep.into_iter().filter(|k| !k.trim().is_empty()).collect();
            finish(commands::review::run(&record, &keep)?)
        }
        Command::Case(case) => match case {
            CaseCommand::Create {
                members,
                location,
                instructions,
                timeout_secs,
            } => finish(commands::case::run_create(&CaseRunArgs {
                members,
                location,
                instructions,
                timeout_secs,
            })?),
            CaseCommand::Rerun {
                case,
                members,
                location,
                instructions,
                timeout_secs,
            } => finish(commands::case::run_rerun(
                &case,
                &CaseRunArgs {
                    members,
                    location,
                    instructions,
                    timeout_secs,
                },
            )?),
            CaseCommand::Update { case, edited } => {
                finish(commands::case::run_update(&case, &edited)?)
            }
            CaseCommand::Delete { case, secret } => {
                finish(commands::case::run_delete(&case, secret.as_deref())?)
            }
        },
        Command::Rename {
            old_name,
            new_name,
            kind,
            secret,
        } => {
            let kind: TargetKind = kind.parse()?;
            finish(commands::rename::run(
                &old_name,
                &new_name,
                kind,
                secret.as_deref(),
            )?)
        }
        Command::Delete { name, kind, secret } => {
            let kind: TargetKind = kind.parse()?;
            finish(commands::delete::run(&name, kind, secret.as_deref())?)
        }
        Command::Reveal { relative_path } => finish(commands::reveal::run(&relative_path)?),
        Command::Status => finish(commands::status::run()?),
        Command::Profile(profile) => match profile {
            ProfileCommand::Save {
                name,
                details,
                enhanced_details,
                reference_url,
                reference_image,
            } => finish(commands::profile::run_save(&ProfileSaveArgs {
                name,
                details,
                enhanced_details,
                reference_url,
                reference_image,
            })?),
            ProfileCommand::List => finish(commands::profile::run_list()?),
            ProfileCommand::Delete { name } => finish(commands::profile::run_delete(&name)?),
        },
        Command::Testimony(testimony) => match testimony {
            TestimonyCommand::Save {
                witness,
                text,
                from_file,
                summary,
            } => finish(commands::testimony::run_save(&TestimonySaveArgs {
                witness,
                text,
                from_file,
                summary,
            })?),
        },
        Command::Verify => finish(commands::verify::run()?),
    }
}
