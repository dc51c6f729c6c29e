use std::collections::BTreeMap;

use crate::error::{InstallerError, Result};
use crate::exporter::ExporterDescriptor;

pub struct ExporterRegistry {
    exporters: BTreeMap<String, ExporterDescriptor>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self {
            exporters: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, exporter: ExporterDescriptor) {
        self.exporters.insert(exporter.name.clone(), exporter);
    }

    pub fn get(&self, name: &str) -> Result<&ExporterDescriptor> {
        self.exporters
            .get(name)
            .ok_or_else(|| InstallerError::ExporterNotFound(name.to_string()))
    }

    /// Exporters sorted by name.
    pub fn list(&self) -> Vec<&ExporterDescriptor> {
        self.exporters.values().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.exporters.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exporters.contains_key(name)
    }
}

impl Default for ExporterRegistry {
    fn default() -> Self {
        crate::exporters::create_default_registry()
    }
}
