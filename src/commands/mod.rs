pub(crate) mod completions;
pub(crate) mod install;
pub(crate) mod list;
pub(crate) mod status;
pub(crate) mod uninstall;

use anyhow::{anyhow, Result};
use console::style;
use exporter_install::{ExporterDescriptor, ExporterRegistry};

/// Looks up `name`; an unknown name also lists the exporters that are known.
pub(crate) fn lookup<'a>(registry: &'a ExporterRegistry, name: &str) -> Result<&'a ExporterDescriptor> {
    registry
        .get(name)
        .map_err(|e| anyhow!("{} (available: {})", e, registry.names().join(", ")))
}

pub(crate) fn print_step(message: &str) {
    println!("{} {}", style("→").cyan(), message);
}

pub(crate) fn print_ok(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub(crate) fn print_warn(message: &str) {
    println!("{} {}", style("!").yellow(), message);
}
