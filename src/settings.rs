use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{InstallerError, Result};

const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

/// Runtime knobs. Exporter descriptors themselves are not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Parent of the per-run scratch directory (defaults to the system temp dir)
    pub scratch_root: PathBuf,
    /// Where unit files are written
    pub unit_dir: PathBuf,
    /// Wait after `systemctl start` before the first activity check
    pub activation_delay_secs: u64,
    /// How many `is-active` checks to make before giving up
    pub activation_attempts: u32,
    pub activation_interval_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
            activation_delay_secs: 2,
            activation_attempts: 5,
            activation_interval_secs: 1,
            download_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Loads the settings file (if any) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&crate::clienv::settings_path())?;

        if let Some(dir) = crate::clienv::scratch_root() {
            settings.scratch_root = dir;
        }
        if let Some(dir) = crate::clienv::unit_dir() {
            settings.unit_dir = dir;
        }

        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading settings");

        if !path.exists() {
            tracing::trace!("Settings file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            InstallerError::Settings(format!("failed to read {}: {}", path.display(), e))
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| {
            InstallerError::Settings(format!("failed to parse {}: {}", path.display(), e))
        })?;

        if settings.activation_attempts == 0 {
            return Err(InstallerError::Settings(
                "activation_attempts must be at least 1".to_string(),
            ));
        }

        tracing::debug!(?settings, "Settings loaded");
        Ok(settings)
    }

    pub fn activation_delay(&self) -> Duration {
        Duration::from_secs(self.activation_delay_secs)
    }

    pub fn activation_interval(&self) -> Duration {
        Duration::from_secs(self.activation_interval_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
