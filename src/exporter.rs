use std::path::PathBuf;

/// Release architecture, named the way Prometheus release assets name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    pub fn detect() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Self::Amd64)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Arm64)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUser {
    pub name: String,
    pub home: PathBuf,
}

/// Default configuration shipped with an exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    pub file_name: &'static str,
    pub content: &'static str,
    /// Flag used to point the exporter at the file, e.g. `--config.file`.
    pub flag: &'static str,
}

/// Everything needed to install one exporter. Compiled in, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterDescriptor {
    pub name: String,
    pub description: String,
    pub documentation: String,
    pub version: String,
    /// Release URL with `{version}` and `{arch}` placeholders.
    pub url_template: String,
    pub binary: String,
    pub user: ServiceUser,
    pub install_dir: PathBuf,
    pub config: Option<ConfigTemplate>,
    pub unit_name: String,
    pub listen_port: u16,
}

impl ExporterDescriptor {
    pub fn archive_url(&self, arch: Architecture) -> String {
        self.url_template
            .replace("{version}", &self.version)
            .replace("{arch}", arch.as_str())
    }

    pub fn archive_file_name(&self, arch: Architecture) -> String {
        format!(
            "{}-{}.linux-{}.tar.gz",
            self.binary,
            self.version,
            arch.as_str()
        )
    }

    /// Prefix of the single top-level directory inside the release tarball.
    pub fn extracted_dir_prefix(&self) -> String {
        format!("{}-{}", self.binary, self.version)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(&self.binary)
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .as_ref()
            .map(|config| self.install_dir.join(config.file_name))
    }

    pub fn unit_file_name(&self) -> String {
        format!("{}.service", self.unit_name)
    }

    pub fn listen_address(&self) -> String {
        format!(":{}", self.listen_port)
    }
}
