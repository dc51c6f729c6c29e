use anyhow::Result;
use console::style;
use exporter_install::service::Systemctl;
use exporter_install::{manage, verify, ExporterRegistry, Settings};

fn mark(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("yes").green()
    } else {
        style("no").red()
    }
}

pub(crate) async fn cmd_status(name: &str) -> Result<()> {
    let registry = ExporterRegistry::default();
    let exporter = super::lookup(&registry, name)?;
    let settings = Settings::load()?;

    let observers = verify::default_observers();
    let report = manage::inspect(exporter, &Systemctl, &settings.unit_dir, &observers).await;

    println!("{} v{}", style(&exporter.name).bold(), exporter.version);
    println!("  binary    {} {}", mark(report.binary_installed), exporter.binary_path().display());
    if let (Some(present), Some(path)) = (report.config_present, exporter.config_path()) {
        println!("  config    {} {}", mark(present), path.display());
    }
    println!(
        "  unit      {} {}",
        mark(report.unit_present),
        settings.unit_dir.join(exporter.unit_file_name()).display()
    );
    println!("  active    {}", mark(report.active));
    println!("  port      {}", report.port);
    Ok(())
}
