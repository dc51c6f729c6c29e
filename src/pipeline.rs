//! The install workflow: one ordered list of fallible stages.
//!
//! Every stage returns a `Result`; the first failure short-circuits the run and
//! is tagged with the [`Stage`] it happened in. Nothing is rolled back: the
//! user, install directory and unit left behind by a failed run are valid
//! starting points for the next run.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::account::{self, AccountManager, SystemAccounts, UserOutcome};
use crate::config_file::{self, ConfigOutcome};
use crate::error::{InstallerError, Result};
use crate::exporter::{Architecture, ExporterDescriptor};
use crate::fetch::{self, ArchiveFetcher, HttpFetcher};
use crate::installer::{self, ChownCommand, OwnershipChanger};
use crate::preflight;
use crate::service::{ActivationPolicy, RegistrationState, ServiceControl, ServiceRegistrar, Systemctl};
use crate::settings::Settings;
use crate::unit::UnitFile;
use crate::verify::{self, PortCheck, PortObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    ProvisionUser,
    Fetch,
    Install,
    Config,
    RegisterService,
    Verify,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preflight => "preflight",
            Self::ProvisionUser => "provision-user",
            Self::Fetch => "fetch",
            Self::Install => "install",
            Self::Config => "config",
            Self::RegisterService => "register-service",
            Self::Verify => "verify",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

pub type PreflightCheck = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Everything the pipeline needs from the host.
pub struct Capabilities {
    pub preflight: PreflightCheck,
    pub accounts: Box<dyn AccountManager>,
    pub fetcher: Box<dyn ArchiveFetcher>,
    pub ownership: Box<dyn OwnershipChanger>,
    pub services: Box<dyn ServiceControl>,
    pub observers: Vec<Box<dyn PortObserver>>,
}

impl Capabilities {
    /// Real host: root check, `useradd`, HTTPS download, `chown`, `systemctl`.
    pub fn system(settings: &Settings) -> Result<Self> {
        Ok(Self {
            preflight: Box::new(preflight::run),
            accounts: Box::new(SystemAccounts),
            fetcher: Box::new(HttpFetcher::new(settings.download_timeout())?),
            ownership: Box::new(ChownCommand),
            services: Box::new(Systemctl),
            observers: verify::default_observers(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub exporter: String,
    pub user: UserOutcome,
    pub binary: PathBuf,
    pub config: ConfigOutcome,
    pub unit_path: PathBuf,
    pub state: RegistrationState,
    /// `systemctl status` text, when it could be collected.
    pub status: Option<String>,
    /// `None` when verification was skipped.
    pub port: Option<PortCheck>,
    /// Set when the scratch directory could not be removed.
    pub cleanup_warning: Option<String>,
}

pub struct InstallPipeline {
    exporter: ExporterDescriptor,
    arch: Architecture,
    settings: Settings,
    caps: Capabilities,
    verify_port: bool,
}

impl InstallPipeline {
    pub fn new(
        exporter: ExporterDescriptor,
        arch: Architecture,
        settings: Settings,
        caps: Capabilities,
    ) -> Self {
        Self {
            exporter,
            arch,
            settings,
            caps,
            verify_port: true,
        }
    }

    pub fn with_port_check(mut self, enabled: bool) -> Self {
        self.verify_port = enabled;
        self
    }

    /// Fresh, uniquely named 0700 directory under the scratch root.
    /// It outlives the `TempDir` handle so a failed run leaves it behind for inspection.
    fn create_scratch_dir(&self) -> Result<PathBuf> {
        let root = &self.settings.scratch_root;
        let create = |source| InstallerError::CreateDir {
            path: root.clone(),
            source,
        };

        std::fs::create_dir_all(root).map_err(create)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("exporter-install-{}-", self.exporter.name))
            .tempdir_in(root)
            .map_err(create)?;
        Ok(dir.keep())
    }

    pub async fn run(&self) -> Result<InstallReport> {
        let exporter = &self.exporter;
        tracing::info!(exporter = %exporter.name, version = %exporter.version, "Starting installation");

        (self.caps.preflight)().map_err(|e| e.at(Stage::Preflight))?;

        let user = account::ensure_user(self.caps.accounts.as_ref(), &exporter.user)
            .await
            .map_err(|e| e.at(Stage::ProvisionUser))?;

        let scratch = self.create_scratch_dir().map_err(|e| e.at(Stage::Fetch))?;
        let archive = self.fetch(&scratch).await.map_err(|e| e.at(Stage::Fetch))?;

        let binary = installer::install_release(exporter, &archive, &scratch, self.caps.ownership.as_ref())
            .await
            .map_err(|e| e.at(Stage::Install))?;

        let config = self.write_config().await.map_err(|e| e.at(Stage::Config))?;

        let unit = UnitFile::for_exporter(exporter);
        let mut registrar = ServiceRegistrar::new(
            self.caps.services.as_ref(),
            &self.settings.unit_dir,
            ActivationPolicy::from_settings(&self.settings),
        );
        let unit_path = registrar
            .register(&exporter.unit_file_name(), &unit)
            .await
            .map_err(|e| e.at(Stage::RegisterService))?;

        let status = match self.caps.services.status(&exporter.unit_file_name()).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Could not collect service status");
                None
            }
        };

        let port = if self.verify_port {
            let check = verify::check_port(&self.caps.observers, exporter.listen_port).await;
            if !check.is_listening() {
                tracing::warn!(stage = %Stage::Verify, port = exporter.listen_port, result = %check, "Port not confirmed");
            }
            Some(check)
        } else {
            None
        };

        let cleanup_warning = match tokio::fs::remove_dir_all(&scratch).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(stage = %Stage::Cleanup, path = %scratch.display(), error = %e, "Could not remove scratch directory");
                Some(e.to_string())
            }
        };

        Ok(InstallReport {
            exporter: exporter.name.clone(),
            user,
            binary,
            config,
            unit_path,
            state: registrar.state(),
            status,
            port,
            cleanup_warning,
        })
    }

    async fn write_config(&self) -> Result<ConfigOutcome> {
        let outcome = config_file::materialize(&self.exporter)?;
        if let (ConfigOutcome::Written, Some(path)) = (outcome, self.exporter.config_path()) {
            let user = &self.exporter.user.name;
            self.caps.ownership.chown_recursive(&path, user, user).await?;
        }
        Ok(outcome)
    }

    async fn fetch(&self, scratch: &Path) -> Result<PathBuf> {
        let url = self.exporter.archive_url(self.arch);
        let pb = create_progress_bar(&format!(
            "Downloading {} {}",
            self.exporter.binary, self.exporter.version
        ));

        let result = fetch::fetch_archive(
            self.caps.fetcher.as_ref(),
            &url,
            scratch,
            &self.exporter.archive_file_name(self.arch),
        )
        .await;

        match &result {
            Ok(_) => pb.finish_with_message(format!("Downloaded {}", self.exporter.binary)),
            Err(_) => pb.abandon_with_message("Download failed"),
        }
        result
    }
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tests::FakeAccounts;
    use crate::fetch::tests::StaticFetcher;
    use crate::installer::tests::{build_tar_gz, RecordingOwnership};
    use crate::service::tests::FakeSystemd;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    struct Host {
        root: tempfile::TempDir,
    }

    impl Host {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
            }
        }

        fn exporter(&self) -> ExporterDescriptor {
            let mut exporter = crate::exporters::blackbox_exporter();
            exporter.user.home = self.root.path().join("home/blackbox");
            exporter.install_dir = self.root.path().join("home/blackbox/blackbox");
            exporter
        }

        fn settings(&self) -> Settings {
            Settings {
                scratch_root: self.root.path().join("tmp"),
                unit_dir: self.root.path().join("systemd"),
                activation_delay_secs: 0,
                activation_attempts: 1,
                activation_interval_secs: 0,
                ..Settings::default()
            }
        }

        fn unit_path(&self) -> PathBuf {
            self.root.path().join("systemd/blackbox.service")
        }
    }

    fn release_archive() -> Vec<u8> {
        build_tar_gz(&[
            ("blackbox_exporter-0.25.0.linux-amd64/blackbox_exporter", b"ELF v0.25.0", 0o644),
            ("blackbox_exporter-0.25.0.linux-amd64/blackbox.yml", b"modules: {}\n", 0o644),
            ("blackbox_exporter-0.25.0.linux-amd64/LICENSE", b"Apache-2.0", 0o644),
        ])
    }

    /// Shares account state between runs, like a real host would.
    struct SharedAccounts(Arc<FakeAccounts>);

    #[async_trait::async_trait]
    impl AccountManager for SharedAccounts {
        async fn user_exists(&self, name: &str) -> Result<bool> {
            self.0.user_exists(name).await
        }

        async fn create_system_user(&self, name: &str, home: &Path) -> Result<()> {
            self.0.create_system_user(name, home).await
        }
    }

    struct SharedOwnership(Arc<RecordingOwnership>);

    #[async_trait::async_trait]
    impl OwnershipChanger for SharedOwnership {
        async fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<()> {
            self.0.chown_recursive(path, user, group).await
        }
    }

    fn caps(accounts: Arc<FakeAccounts>, body: Option<Vec<u8>>, systemd: FakeSystemd) -> Capabilities {
        caps_with_ownership(accounts, Arc::default(), body, systemd)
    }

    fn caps_with_ownership(
        accounts: Arc<FakeAccounts>,
        ownership: Arc<RecordingOwnership>,
        body: Option<Vec<u8>>,
        systemd: FakeSystemd,
    ) -> Capabilities {
        Capabilities {
            preflight: Box::new(|| Ok(())),
            accounts: Box::new(SharedAccounts(accounts)),
            fetcher: Box::new(StaticFetcher { body }),
            ownership: Box::new(SharedOwnership(ownership)),
            services: Box::new(systemd),
            observers: Vec::new(),
        }
    }

    fn pipeline(host: &Host, caps: Capabilities) -> InstallPipeline {
        InstallPipeline::new(host.exporter(), Architecture::Amd64, host.settings(), caps)
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = [
            Stage::Preflight,
            Stage::ProvisionUser,
            Stage::Fetch,
            Stage::Install,
            Stage::Config,
            Stage::RegisterService,
            Stage::Verify,
            Stage::Cleanup,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(
            names,
            [
                "preflight",
                "provision-user",
                "fetch",
                "install",
                "config",
                "register-service",
                "verify",
                "cleanup"
            ]
        );
    }

    fn scratch_entries(host: &Host) -> usize {
        fs::read_dir(host.settings().scratch_root).unwrap().count()
    }

    #[tokio::test]
    async fn test_fresh_install() {
        let host = Host::new();
        let accounts = Arc::new(FakeAccounts::default());
        let ownership = Arc::new(RecordingOwnership::default());
        let report = pipeline(
            &host,
            caps_with_ownership(accounts.clone(), ownership.clone(), Some(release_archive()), FakeSystemd::active()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.user, UserOutcome::Created);
        assert_eq!(report.config, ConfigOutcome::Written);
        assert_eq!(report.state, RegistrationState::VerifiedActive);
        assert_eq!(report.port, Some(PortCheck::Unavailable));
        assert!(report.cleanup_warning.is_none());

        let exporter = host.exporter();
        let mode = fs::metadata(exporter.binary_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        let config = fs::read_to_string(exporter.config_path().unwrap()).unwrap();
        for module in ["http_2xx", "http_post_2xx", "tcp_connect", "ping"] {
            assert!(config.contains(module));
        }

        assert_eq!(
            fs::read_to_string(host.unit_path()).unwrap(),
            UnitFile::for_exporter(&exporter).render().unwrap()
        );
        assert_eq!(scratch_entries(&host), 0);

        assert_eq!(
            *ownership.calls.lock().unwrap(),
            vec![
                (exporter.install_dir.clone(), "blackbox:blackbox".to_string()),
                (exporter.config_path().unwrap(), "blackbox:blackbox".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_preserved_config_is_not_chowned_again() {
        let host = Host::new();
        let exporter = host.exporter();
        fs::create_dir_all(&exporter.install_dir).unwrap();
        fs::write(exporter.config_path().unwrap(), "modules: {}\n").unwrap();

        let ownership = Arc::new(RecordingOwnership::default());
        let report = pipeline(
            &host,
            caps_with_ownership(Arc::default(), ownership.clone(), Some(release_archive()), FakeSystemd::active()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.config, ConfigOutcome::Preserved);
        assert_eq!(
            *ownership.calls.lock().unwrap(),
            vec![(exporter.install_dir.clone(), "blackbox:blackbox".to_string())]
        );
    }

    #[tokio::test]
    async fn test_scratch_dir_is_unique_and_private() {
        let host = Host::new();
        let stale = host.settings().scratch_root.join("exporter-install-blackbox");
        fs::create_dir_all(stale.join("blackbox_exporter-0.25.0.linux-amd64")).unwrap();
        fs::write(stale.join("blackbox_exporter-0.25.0.linux-amd64/blackbox_exporter"), b"planted").unwrap();

        let install = pipeline(&host, caps(Arc::default(), Some(release_archive()), FakeSystemd::default()));
        let scratch = install.create_scratch_dir().unwrap();

        assert_ne!(scratch, stale);
        assert!(scratch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("exporter-install-blackbox-"));
        assert_eq!(fs::metadata(&scratch).unwrap().permissions().mode() & 0o777, 0o700);
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_scratch_for_inspection() {
        let host = Host::new();
        let archive = build_tar_gz(&[("blackbox_exporter-0.24.0.linux-amd64/blackbox_exporter", b"ELF", 0o755)]);
        pipeline(&host, caps(Arc::default(), Some(archive), FakeSystemd::active()))
            .run()
            .await
            .unwrap_err();

        assert_eq!(scratch_entries(&host), 1);
    }

    #[tokio::test]
    async fn test_rerun_preserves_user_and_config_but_replaces_unit_and_binary() {
        let host = Host::new();
        let accounts = Arc::new(FakeAccounts::default());
        pipeline(&host, caps(accounts.clone(), Some(release_archive()), FakeSystemd::active()))
            .run()
            .await
            .unwrap();

        let exporter = host.exporter();
        let config_path = exporter.config_path().unwrap();
        fs::write(&config_path, "modules:\n  custom: {}\n").unwrap();
        fs::write(host.unit_path(), "[Service]\nExecStart=/bin/false\n").unwrap();
        fs::write(exporter.binary_path(), b"tampered").unwrap();

        let report = pipeline(&host, caps(accounts.clone(), Some(release_archive()), FakeSystemd::active()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.user, UserOutcome::AlreadyExists);
        assert_eq!(report.config, ConfigOutcome::Preserved);
        assert_eq!(accounts.created.lock().unwrap().len(), 1);
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "modules:\n  custom: {}\n");
        assert_eq!(fs::read(exporter.binary_path()).unwrap(), b"ELF v0.25.0");
        assert_eq!(
            fs::read_to_string(host.unit_path()).unwrap(),
            UnitFile::for_exporter(&exporter).render().unwrap()
        );
    }

    #[tokio::test]
    async fn test_download_failure_leaves_no_binary() {
        let host = Host::new();
        let systemd = FakeSystemd::active();
        let err = pipeline(&host, caps(Arc::default(), None, systemd))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert!(matches!(err.root(), InstallerError::Download { .. }));
        assert!(!host.exporter().binary_path().exists());
        assert!(!host.unit_path().exists());
    }

    #[tokio::test]
    async fn test_empty_download_stops_before_extraction() {
        let host = Host::new();
        let err = pipeline(&host, caps(Arc::default(), Some(Vec::new()), FakeSystemd::active()))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert!(matches!(err.root(), InstallerError::EmptyDownload { .. }));
        assert!(!host.exporter().install_dir.exists());
    }

    #[tokio::test]
    async fn test_layout_drift_is_install_failure() {
        let host = Host::new();
        let archive = build_tar_gz(&[("blackbox_exporter-0.24.0.linux-amd64/blackbox_exporter", b"ELF", 0o755)]);
        let err = pipeline(&host, caps(Arc::default(), Some(archive), FakeSystemd::active()))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Install));
        assert!(matches!(err.root(), InstallerError::ArchiveLayout { .. }));
        assert!(!host.exporter().binary_path().exists());
    }

    #[tokio::test]
    async fn test_preflight_failure_happens_before_any_mutation() {
        let host = Host::new();
        let accounts = Arc::new(FakeAccounts::default());
        let mut caps = caps(accounts.clone(), Some(release_archive()), FakeSystemd::active());
        caps.preflight = Box::new(|| Err(InstallerError::NotRoot { euid: 1000 }));

        let err = pipeline(&host, caps).run().await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Preflight));
        assert!(accounts.created.lock().unwrap().is_empty());
        assert!(!host.settings().scratch_root.exists());
    }

    #[tokio::test]
    async fn test_inactive_service_is_fatal() {
        let host = Host::new();
        let err = pipeline(&host, caps(Arc::default(), Some(release_archive()), FakeSystemd::default()))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::RegisterService));
        assert!(err.to_string().contains("journalctl -u blackbox.service"));
    }

    #[tokio::test]
    async fn test_port_check_can_be_skipped() {
        let host = Host::new();
        let report = pipeline(&host, caps(Arc::default(), Some(release_archive()), FakeSystemd::active()))
            .with_port_check(false)
            .run()
            .await
            .unwrap();
        assert!(report.port.is_none());
        assert!(report.status.unwrap().contains("active (running)"));
    }
}
