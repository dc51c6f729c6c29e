use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Stage;
use crate::service::RegistrationState;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("unknown exporter '{0}'")]
    ExporterNotFound(String),

    #[error("this installer must run as root (effective uid {euid})")]
    NotRoot { euid: u32 },

    #[error("required command '{command}' was not found on PATH")]
    MissingCommand { command: String },

    #[error("failed to create service user '{user}': {reason}")]
    UserCreation { user: String, reason: String },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} failed: {reason} (check network connectivity)")]
    Download { url: String, reason: String },

    #[error("downloaded archive {} is missing or empty (corrupt or truncated artifact)", path.display())]
    EmptyDownload { path: PathBuf },

    #[error("failed to extract {}: {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("no directory matching '{prefix}*' in {} (release layout changed?)", scratch.display())]
    ArchiveLayout { prefix: String, scratch: PathBuf },

    #[error("binary {} is missing after install (release layout changed?)", path.display())]
    BinaryMissing { path: PathBuf },

    #[error("binary {} is not a regular file (release layout changed?)", path.display())]
    BinaryNotRegular { path: PathBuf },

    #[error("failed to set ownership of {} to {owner}: {reason}", path.display())]
    Ownership {
        path: PathBuf,
        owner: String,
        reason: String,
    },

    #[error("failed to write configuration {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid unit field {field}: {reason}")]
    InvalidUnit { field: &'static str, reason: String },

    #[error("invalid service state transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: RegistrationState,
        to: RegistrationState,
    },

    #[error("`{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error("service step {state:?} failed: {detail}")]
    ServiceCommand {
        state: RegistrationState,
        detail: String,
    },

    #[error("unit {unit} is not active after start; inspect logs with: journalctl -u {unit}")]
    NotActive { unit: String },

    #[error("settings error: {0}")]
    Settings(String),

    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<InstallerError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InstallerError {
    pub fn at(self, stage: Stage) -> Self {
        match self {
            already @ Self::StageFailed { .. } => already,
            other => Self::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage a pipeline failure happened in, if it was raised by the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping the stage wrapper.
    pub fn root(&self) -> &InstallerError {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallerError>;
