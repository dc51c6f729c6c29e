use std::path::PathBuf;

use crate::exporter::{ExporterDescriptor, ServiceUser};

const VERSION: &str = "1.8.2";

/// Node Exporter: host-level hardware and kernel metrics. Runs without a config file.
pub fn node_exporter() -> ExporterDescriptor {
    ExporterDescriptor {
        name: "node".to_string(),
        description: "Prometheus Node Exporter".to_string(),
        documentation: "https://github.com/prometheus/node_exporter".to_string(),
        version: VERSION.to_string(),
        url_template: "https://github.com/prometheus/node_exporter/releases/download/v{version}/node_exporter-{version}.linux-{arch}.tar.gz".to_string(),
        binary: "node_exporter".to_string(),
        user: ServiceUser {
            name: "node_exporter".to_string(),
            home: PathBuf::from("/home/node_exporter"),
        },
        install_dir: PathBuf::from("/home/node_exporter/node_exporter"),
        config: None,
        unit_name: "node_exporter".to_string(),
        listen_port: 9100,
    }
}
