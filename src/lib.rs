pub mod account;
pub mod clienv;
pub mod completions;
pub mod config_file;
pub mod error;
pub mod exporter;
pub mod exporters;
pub mod fetch;
pub mod installer;
pub mod manage;
pub mod pipeline;
pub mod preflight;
pub mod registry;
pub mod service;
pub mod settings;
pub mod unit;
pub mod verify;

pub use error::{InstallerError, Result};
pub use exporter::{Architecture, ExporterDescriptor};
pub use pipeline::{Capabilities, InstallPipeline, InstallReport, Stage};
pub use registry::ExporterRegistry;
pub use settings::Settings;
