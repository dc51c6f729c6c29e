use anyhow::{anyhow, Result};
use console::style;
use exporter_install::account::UserOutcome;
use exporter_install::config_file::ConfigOutcome;
use exporter_install::{Architecture, Capabilities, ExporterRegistry, InstallPipeline, Settings};

use super::{print_ok, print_step, print_warn};

pub(crate) async fn cmd_install(name: &str, skip_verify: bool) -> Result<()> {
    let registry = ExporterRegistry::default();
    let exporter = super::lookup(&registry, name)?.clone();

    let arch = Architecture::detect()
        .ok_or_else(|| anyhow!("unsupported architecture: {}", std::env::consts::ARCH))?;
    let settings = Settings::load()?;
    let caps = Capabilities::system(&settings)?;

    print_step(&format!(
        "Installing {} v{} ({})",
        style(&exporter.name).bold(),
        exporter.version,
        arch.as_str()
    ));

    let port = exporter.listen_port;
    let pipeline = InstallPipeline::new(exporter, arch, settings, caps).with_port_check(!skip_verify);
    let report = pipeline.run().await?;

    match report.user {
        UserOutcome::Created => print_ok("Created service user"),
        UserOutcome::AlreadyExists => print_ok("Service user already present"),
    }
    print_ok(&format!("Binary installed at {}", report.binary.display()));
    match report.config {
        ConfigOutcome::Written => print_ok("Wrote default configuration"),
        ConfigOutcome::Preserved => print_ok("Kept existing configuration"),
        ConfigOutcome::NotApplicable => {}
    }
    print_ok(&format!("Unit written to {}", report.unit_path.display()));

    if let Some(status) = &report.status {
        println!();
        println!("{}", style(status.trim_end()).dim());
        println!();
    }

    match &report.port {
        Some(check) if check.is_listening() => print_ok(&format!("Port {port} {check}")),
        Some(check) => print_warn(&format!("Port {port} {check}")),
        None => {}
    }
    if let Some(warning) = &report.cleanup_warning {
        print_warn(warning);
    }

    println!(
        "{} {} is running",
        style("✓").green().bold(),
        style(&report.exporter).bold()
    );
    Ok(())
}
