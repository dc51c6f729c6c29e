use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{InstallerError, Result};
use crate::unit::UnitFile;

/// Unit lifecycle operations of the service manager.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn daemon_reload(&self) -> Result<()>;

    async fn enable(&self, unit: &str) -> Result<()>;

    async fn start(&self, unit: &str) -> Result<()>;

    async fn stop(&self, unit: &str) -> Result<()>;

    async fn disable(&self, unit: &str) -> Result<()>;

    async fn is_active(&self, unit: &str) -> Result<bool>;

    /// Human-readable status report, informational only.
    async fn status(&self, unit: &str) -> Result<String>;
}

pub struct Systemctl;

impl Systemctl {
    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!("Running systemctl {:?}", args);
        let output = Command::new("systemctl")
            .args(args)
            .output()
            .await
            .map_err(|e| InstallerError::Command {
                command: format!("systemctl {}", args.join(" ")),
                detail: e.to_string(),
            })?;
        debug!("systemctl finished with exit code: {:?}", output.status.code());
        Ok(output)
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(InstallerError::Command {
                command: format!("systemctl {}", args.join(" ")),
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceControl for Systemctl {
    async fn daemon_reload(&self) -> Result<()> {
        self.run(&["daemon-reload"]).await
    }

    async fn enable(&self, unit: &str) -> Result<()> {
        self.run(&["enable", unit]).await
    }

    async fn start(&self, unit: &str) -> Result<()> {
        self.run(&["start", unit]).await
    }

    async fn stop(&self, unit: &str) -> Result<()> {
        self.run(&["stop", unit]).await
    }

    async fn disable(&self, unit: &str) -> Result<()> {
        self.run(&["disable", unit]).await
    }

    async fn is_active(&self, unit: &str) -> Result<bool> {
        let output = self.output(&["is-active", "--quiet", unit]).await?;
        Ok(output.status.success())
    }

    async fn status(&self, unit: &str) -> Result<String> {
        // Non-zero exit just means "not running"; the text is still useful.
        let output = self.output(&["status", "--no-pager", unit]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Progress of a unit through registration. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegistrationState {
    Unregistered,
    UnitWritten,
    DaemonReloaded,
    Enabled,
    Started,
    VerifiedActive,
}

impl RegistrationState {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Unregistered => Some(Self::UnitWritten),
            Self::UnitWritten => Some(Self::DaemonReloaded),
            Self::DaemonReloaded => Some(Self::Enabled),
            Self::Enabled => Some(Self::Started),
            Self::Started => Some(Self::VerifiedActive),
            Self::VerifiedActive => None,
        }
    }
}

/// How long to wait for a started unit to report active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationPolicy {
    pub delay: Duration,
    pub attempts: u32,
    pub interval: Duration,
}

impl ActivationPolicy {
    pub fn from_settings(settings: &crate::settings::Settings) -> Self {
        Self {
            delay: settings.activation_delay(),
            attempts: settings.activation_attempts.max(1),
            interval: settings.activation_interval(),
        }
    }
}

/// Writes a unit and drives it to the active state.
pub struct ServiceRegistrar<'a> {
    control: &'a dyn ServiceControl,
    unit_dir: PathBuf,
    policy: ActivationPolicy,
    state: RegistrationState,
}

impl<'a> ServiceRegistrar<'a> {
    pub fn new(control: &'a dyn ServiceControl, unit_dir: &Path, policy: ActivationPolicy) -> Self {
        Self {
            control,
            unit_dir: unit_dir.to_path_buf(),
            policy,
            state: RegistrationState::Unregistered,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    fn advance(&mut self, to: RegistrationState) -> Result<()> {
        if self.state.next() != Some(to) {
            return Err(InstallerError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(from = ?self.state, ?to, "Service registration advanced");
        self.state = to;
        Ok(())
    }

    /// Runs `step` and, on success, moves to `to`. Failures carry the target state.
    async fn step<F>(&mut self, to: RegistrationState, step: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        if self.state.next() != Some(to) {
            return Err(InstallerError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        step.await.map_err(|e| InstallerError::ServiceCommand {
            state: to,
            detail: e.to_string(),
        })?;
        self.advance(to)
    }

    /// Unit path, always overwritten.
    pub async fn write_unit(&mut self, unit_file_name: &str, unit: &UnitFile) -> Result<PathBuf> {
        let path = self.unit_dir.join(unit_file_name);
        let text = unit.render()?;
        let (dir, target) = (self.unit_dir.clone(), path.clone());

        self.step(RegistrationState::UnitWritten, async move {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&target, text).await?;
            Ok(())
        })
        .await?;

        info!(path = %path.display(), "Wrote unit file");
        Ok(path)
    }

    /// Full registration: write, reload, enable, start, wait for active.
    pub async fn register(&mut self, unit_file_name: &str, unit: &UnitFile) -> Result<PathBuf> {
        let path = self.write_unit(unit_file_name, unit).await?;
        let control = self.control;

        self.step(RegistrationState::DaemonReloaded, control.daemon_reload())
            .await?;
        self.step(RegistrationState::Enabled, control.enable(unit_file_name))
            .await?;
        self.step(RegistrationState::Started, control.start(unit_file_name))
            .await?;
        info!(unit = unit_file_name, "Service started, waiting for it to become active");

        self.wait_active(unit_file_name).await?;
        self.advance(RegistrationState::VerifiedActive)?;
        info!(unit = unit_file_name, "Service is active");

        Ok(path)
    }

    async fn wait_active(&self, unit: &str) -> Result<()> {
        tokio::time::sleep(self.policy.delay).await;

        for attempt in 1..=self.policy.attempts {
            match self.control.is_active(unit).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(unit, attempt, "Unit not active yet"),
                Err(e) => warn!(unit, attempt, error = %e, "Could not query unit state"),
            }
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        Err(InstallerError::NotActive {
            unit: unit.to_string(),
        })
    }
}
