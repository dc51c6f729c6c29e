use console::style;
use exporter_install::ExporterRegistry;

pub(crate) fn cmd_list() {
    let registry = ExporterRegistry::default();

    for exporter in registry.list() {
        println!(
            "{:<10} {:<8} {:<24} :{:<6} {}",
            style(&exporter.name).bold(),
            exporter.version,
            exporter.unit_file_name(),
            exporter.listen_port,
            style(&exporter.description).dim(),
        );
    }
}
