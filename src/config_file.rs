use std::io::Write;
use std::path::Path;

use crate::error::{InstallerError, Result};
use crate::exporter::ExporterDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOutcome {
    Written,
    Preserved,
    NotApplicable,
}

/// Writes the exporter's default configuration unless a file is already in place.
pub fn materialize(exporter: &ExporterDescriptor) -> Result<ConfigOutcome> {
    let (Some(template), Some(path)) = (&exporter.config, exporter.config_path()) else {
        return Ok(ConfigOutcome::NotApplicable);
    };

    write_if_absent(&path, template.content)
}

fn write_if_absent(path: &Path, content: &str) -> Result<ConfigOutcome> {
    let config_write = |source| InstallerError::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };

    // create_new keeps an existing (possibly edited) file untouched
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::info!(path = %path.display(), "Keeping existing configuration");
            return Ok(ConfigOutcome::Preserved);
        }
        Err(e) => return Err(config_write(e)),
    };

    file.write_all(content.as_bytes()).map_err(config_write)?;
    tracing::info!(path = %path.display(), "Wrote default configuration");
    Ok(ConfigOutcome::Written)
}
