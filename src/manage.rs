use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::exporter::ExporterDescriptor;
use crate::service::ServiceControl;
use crate::verify::{self, PortCheck, PortObserver};

#[derive(Debug, Clone, Default)]
pub struct UninstallReport {
    pub unit_removed: Option<PathBuf>,
    pub install_dir_removed: Option<PathBuf>,
    /// Best-effort steps that failed.
    pub warnings: Vec<String>,
}

/// Stops and disables the unit, removes the unit file and, with `purge`, the install dir.
/// The service user is kept.
pub async fn uninstall(
    exporter: &ExporterDescriptor,
    services: &dyn ServiceControl,
    unit_dir: &Path,
    purge: bool,
) -> Result<UninstallReport> {
    let unit = exporter.unit_file_name();
    let mut report = UninstallReport::default();

    if let Err(e) = services.stop(&unit).await {
        tracing::warn!(unit = %unit, error = %e, "Could not stop unit");
        report.warnings.push(e.to_string());
    }
    if let Err(e) = services.disable(&unit).await {
        tracing::warn!(unit = %unit, error = %e, "Could not disable unit");
        report.warnings.push(e.to_string());
    }

    let unit_path = unit_dir.join(&unit);
    match tokio::fs::remove_file(&unit_path).await {
        Ok(()) => {
            tracing::info!(path = %unit_path.display(), "Removed unit file");
            report.unit_removed = Some(unit_path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %unit_path.display(), "No unit file to remove");
        }
        Err(e) => return Err(e.into()),
    }

    services.daemon_reload().await?;

    if purge && exporter.install_dir.exists() {
        tokio::fs::remove_dir_all(&exporter.install_dir).await?;
        tracing::info!(path = %exporter.install_dir.display(), "Removed install directory");
        report.install_dir_removed = Some(exporter.install_dir.clone());
    }

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub binary_installed: bool,
    pub config_present: Option<bool>,
    pub unit_present: bool,
    pub active: bool,
    pub port: PortCheck,
}

pub async fn inspect(
    exporter: &ExporterDescriptor,
    services: &dyn ServiceControl,
    unit_dir: &Path,
    observers: &[Box<dyn PortObserver>],
) -> StatusReport {
    let unit = exporter.unit_file_name();
    let active = services.is_active(&unit).await.unwrap_or_else(|e| {
        tracing::warn!(unit = %unit, error = %e, "Could not query unit state");
        false
    });

    StatusReport {
        binary_installed: exporter.binary_path().is_file(),
        config_present: exporter.config_path().map(|p| p.is_file()),
        unit_present: unit_dir.join(&unit).is_file(),
        active,
        port: verify::check_port(observers, exporter.listen_port).await,
    }
}
