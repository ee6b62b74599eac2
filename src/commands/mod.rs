pub mod analyze;
pub mod case;
pub mod delete;
pub mod profile;
pub mod rename;
pub mod reveal;
pub mod review;
pub mod status;
pub mod testimony;
pub mod upload;
pub mod verify;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// Issues that degrade the outcome without failing the command
    /// (best-effort cascades, report-save warnings).
    pub fn warning(&mut self, text: impl Into<String>) {
        self.details.push(format!("warning: {}", text.into()));
    }

    pub fn print(&self) {
        for detail in &self.details {
            println!("{detail}");
        }
        for issue in &self.issues {
            eprintln!("{}: {issue}", self.command);
        }
    }
}
