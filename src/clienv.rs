use std::path::PathBuf;

const ENV_CONFIG: &str = "EXPORTER_INSTALL_CONFIG";
const ENV_SCRATCH_ROOT: &str = "EXPORTER_INSTALL_SCRATCH_ROOT";
const ENV_UNIT_DIR: &str = "EXPORTER_INSTALL_UNIT_DIR";

const FALLBACK_CONFIG_DIR: &str = "/etc";
const APP_SUBDIR: &str = "exporter-install";

/// Non-empty value of an environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Settings file path ($EXPORTER_INSTALL_CONFIG or <config dir>/exporter-install/config.toml)
pub fn settings_path() -> PathBuf {
    let path = env_opt(ENV_CONFIG).map(PathBuf::from).unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG_DIR))
            .join(APP_SUBDIR)
            .join("config.toml")
    });
    tracing::trace!(path = %path.display(), "Resolved settings path");
    path
}

/// Scratch root override ($EXPORTER_INSTALL_SCRATCH_ROOT)
pub fn scratch_root() -> Option<PathBuf> {
    let val = env_opt(ENV_SCRATCH_ROOT).map(PathBuf::from);
    tracing::trace!(value = ?val, "EXPORTER_INSTALL_SCRATCH_ROOT env var");
    val
}

/// systemd unit directory override ($EXPORTER_INSTALL_UNIT_DIR)
pub fn unit_dir() -> Option<PathBuf> {
    let val = env_opt(ENV_UNIT_DIR).map(PathBuf::from);
    tracing::trace!(value = ?val, "EXPORTER_INSTALL_UNIT_DIR env var");
    val
}
