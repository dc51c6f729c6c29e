use std::path::PathBuf;

use crate::exporter::{ConfigTemplate, ExporterDescriptor, ServiceUser};

const VERSION: &str = "0.25.0";

const DEFAULT_CONFIG: &str = include_str!("../../assets/blackbox.yml");

/// Blackbox Exporter: probes endpoints over HTTP, TCP and ICMP.
pub fn blackbox_exporter() -> ExporterDescriptor {
    ExporterDescriptor {
        name: "blackbox".to_string(),
        description: "Prometheus Blackbox Exporter".to_string(),
        documentation: "https://github.com/prometheus/blackbox_exporter".to_string(),
        version: VERSION.to_string(),
        url_template: "https://github.com/prometheus/blackbox_exporter/releases/download/v{version}/blackbox_exporter-{version}.linux-{arch}.tar.gz".to_string(),
        binary: "blackbox_exporter".to_string(),
        user: ServiceUser {
            name: "blackbox".to_string(),
            home: PathBuf::from("/home/blackbox"),
        },
        install_dir: PathBuf::from("/home/blackbox/blackbox"),
        config: Some(ConfigTemplate {
            file_name: "blackbox.yml",
            content: DEFAULT_CONFIG,
            flag: "--config.file",
        }),
        unit_name: "blackbox".to_string(),
        listen_port: 9115,
    }
}
