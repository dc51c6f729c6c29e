use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{InstallerError, Result};
use crate::exporter::ServiceUser;

const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

/// Whether [`ensure_user`] had to create the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Created,
    AlreadyExists,
}

/// OS account operations used when provisioning the service user.
#[async_trait]
pub trait AccountManager: Send + Sync {
    async fn user_exists(&self, name: &str) -> Result<bool>;

    async fn create_system_user(&self, name: &str, home: &Path) -> Result<()>;
}

/// Uses `id` and `useradd`.
pub struct SystemAccounts;

#[async_trait]
impl AccountManager for SystemAccounts {
    async fn user_exists(&self, name: &str) -> Result<bool> {
        let status = Command::new("id")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(status.success())
    }

    async fn create_system_user(&self, name: &str, home: &Path) -> Result<()> {
        let output = Command::new("useradd")
            .arg("--system")
            .arg("--create-home")
            .arg("--home-dir")
            .arg(home)
            .args(["--shell", NOLOGIN_SHELL, name])
            .output()
            .await
            .map_err(|e| InstallerError::UserCreation {
                user: name.to_string(),
                reason: format!("failed to run useradd: {}", e),
            })?;

        if !output.status.success() {
            return Err(InstallerError::UserCreation {
                user: name.to_string(),
                reason: format!(
                    "useradd exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

/// Creates the service user unless it already exists.
pub async fn ensure_user(accounts: &dyn AccountManager, user: &ServiceUser) -> Result<UserOutcome> {
    if accounts.user_exists(&user.name).await? {
        tracing::info!(user = %user.name, "Service user already exists");
        return Ok(UserOutcome::AlreadyExists);
    }

    tracing::info!(user = %user.name, home = %user.home.display(), "Creating service user");
    accounts.create_system_user(&user.name, &user.home).await?;
    Ok(UserOutcome::Created)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory account database.
    #[derive(Default)]
    pub(crate) struct FakeAccounts {
        pub users: Mutex<HashSet<String>>,
        pub created: Mutex<Vec<String>>,
        pub fail_create: bool,
    }

    #[async_trait]
    impl AccountManager for FakeAccounts {
        async fn user_exists(&self, name: &str) -> Result<bool> {
            Ok(self.users.lock().unwrap().contains(name))
        }

        async fn create_system_user(&self, name: &str, _home: &Path) -> Result<()> {
            if self.fail_create {
                return Err(InstallerError::UserCreation {
                    user: name.to_string(),
                    reason: "useradd exited with exit status: 9".to_string(),
                });
            }
            self.users.lock().unwrap().insert(name.to_string());
            self.created.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn blackbox_user() -> ServiceUser {
        ServiceUser {
            name: "blackbox".to_string(),
            home: "/home/blackbox".into(),
        }
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let accounts = FakeAccounts::default();

        let first = ensure_user(&accounts, &blackbox_user()).await.unwrap();
        let second = ensure_user(&accounts, &blackbox_user()).await.unwrap();

        assert_eq!(first, UserOutcome::Created);
        assert_eq!(second, UserOutcome::AlreadyExists);
        assert_eq!(*accounts.created.lock().unwrap(), vec!["blackbox".to_string()]);
    }

    #[tokio::test]
    async fn test_creation_failure_is_fatal() {
        let accounts = FakeAccounts {
            fail_create: true,
            ..Default::default()
        };
        let err = ensure_user(&accounts, &blackbox_user()).await.unwrap_err();
        assert!(matches!(err, InstallerError::UserCreation { user, .. } if user == "blackbox"));
    }
}
