//! Typed systemd unit files.
//!
//! Units are assembled from typed fields and rendered deterministically, so a
//! re-run for the same exporter produces byte-identical unit content.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{InstallerError, Result};
use crate::exporter::ExporterDescriptor;

const NETWORK_TARGET: &str = "network-online.target";
const INSTALL_TARGET: &str = "multi-user.target";
const RESTART_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecStart {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    pub description: String,
    pub documentation: String,
    pub user: String,
    pub group: String,
    pub exec_start: ExecStart,
    pub working_directory: PathBuf,
    pub restart: RestartPolicy,
    pub restart_delay: Duration,
}

impl UnitFile {
    pub fn for_exporter(exporter: &ExporterDescriptor) -> Self {
        let mut args = Vec::new();
        if let (Some(config), Some(path)) = (&exporter.config, exporter.config_path()) {
            args.push(format!("{}={}", config.flag, path.display()));
        }
        args.push(format!("--web.listen-address={}", exporter.listen_address()));

        Self {
            description: exporter.description.clone(),
            documentation: exporter.documentation.clone(),
            user: exporter.user.name.clone(),
            group: exporter.user.name.clone(),
            exec_start: ExecStart {
                program: exporter.binary_path(),
                args,
            },
            working_directory: exporter.install_dir.clone(),
            restart: RestartPolicy::Always,
            restart_delay: RESTART_DELAY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_text("Description", &self.description)?;
        check_text("Documentation", &self.documentation)?;
        check_word("User", &self.user)?;
        check_word("Group", &self.group)?;
        check_absolute("ExecStart", &self.exec_start.program)?;
        check_absolute("WorkingDirectory", &self.working_directory)?;
        for arg in &self.exec_start.args {
            check_word("ExecStart", arg)?;
        }
        Ok(())
    }

    /// Validated unit text.
    pub fn render(&self) -> Result<String> {
        self.validate()?;
        Ok(self.to_string())
    }
}

impl fmt::Display for UnitFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Unit]")?;
        writeln!(f, "Description={}", self.description)?;
        writeln!(f, "Documentation={}", self.documentation)?;
        writeln!(f, "Wants={NETWORK_TARGET}")?;
        writeln!(f, "After={NETWORK_TARGET}")?;
        writeln!(f)?;
        writeln!(f, "[Service]")?;
        writeln!(f, "Type=simple")?;
        writeln!(f, "User={}", self.user)?;
        writeln!(f, "Group={}", self.group)?;
        writeln!(f, "WorkingDirectory={}", self.working_directory.display())?;
        write!(f, "ExecStart={}", self.exec_start.program.display())?;
        for arg in &self.exec_start.args {
            write!(f, " {arg}")?;
        }
        writeln!(f)?;
        writeln!(f, "Restart={}", self.restart)?;
        writeln!(f, "RestartSec={}", self.restart_delay.as_secs())?;
        writeln!(f)?;
        writeln!(f, "[Install]")?;
        writeln!(f, "WantedBy={INSTALL_TARGET}")
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> InstallerError {
    InstallerError::InvalidUnit {
        field,
        reason: reason.into(),
    }
}

fn check_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, "empty value"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid(field, format!("control character in {value:?}")));
    }
    Ok(())
}

/// Like [`check_text`], and additionally no whitespace: the value must stay one token.
fn check_word(field: &'static str, value: &str) -> Result<()> {
    check_text(field, value)?;
    if value.chars().any(char::is_whitespace) {
        return Err(invalid(field, format!("whitespace in {value:?}")));
    }
    Ok(())
}

fn check_absolute(field: &'static str, path: &std::path::Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(invalid(field, format!("{} is not absolute", path.display())));
    }
    check_word(field, &path.to_string_lossy())
}
