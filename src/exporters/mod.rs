mod blackbox;
mod node;

pub use blackbox::blackbox_exporter;
pub use node::node_exporter;

use crate::registry::ExporterRegistry;

/// Creates the registry with every exporter this installer knows about
pub fn create_default_registry() -> ExporterRegistry {
    let mut registry = ExporterRegistry::new();

    registry.register(blackbox_exporter());
    registry.register(node_exporter());

    registry
}
