use anyhow::Result;
use console::style;
use exporter_install::service::Systemctl;
use exporter_install::{manage, preflight, ExporterRegistry, Settings};

use super::{print_ok, print_warn};

pub(crate) async fn cmd_uninstall(name: &str, purge: bool) -> Result<()> {
    let registry = ExporterRegistry::default();
    let exporter = super::lookup(&registry, name)?;

    preflight::require_root()?;
    preflight::require_commands(&["systemctl"], &std::env::var_os("PATH").unwrap_or_default())?;
    let settings = Settings::load()?;

    let report = manage::uninstall(exporter, &Systemctl, &settings.unit_dir, purge).await?;

    for warning in &report.warnings {
        print_warn(warning);
    }
    match &report.unit_removed {
        Some(path) => print_ok(&format!("Removed {}", path.display())),
        None => print_warn("No unit file was installed"),
    }
    if let Some(path) = &report.install_dir_removed {
        print_ok(&format!("Removed {}", path.display()));
    }

    println!(
        "{} {} uninstalled (user {} kept)",
        style("✓").green().bold(),
        style(&exporter.name).bold(),
        exporter.user.name
    );
    Ok(())
}
