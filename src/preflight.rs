//! Checks that must pass before the installer touches the system.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{InstallerError, Result};

/// External commands the install pipeline shells out to.
pub const REQUIRED_COMMANDS: &[&str] = &["id", "useradd", "chown", "systemctl"];

pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

pub fn require_root() -> Result<()> {
    let euid = effective_uid();
    if euid != 0 {
        return Err(InstallerError::NotRoot { euid });
    }
    Ok(())
}

/// Resolves `command` against the entries of a `PATH`-style value.
pub fn find_in_path(command: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

pub fn command_exists(command: &str) -> bool {
    std::env::var_os("PATH")
        .map(|path| find_in_path(command, &path).is_some())
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Fails on the first command from `commands` missing from `path_var`.
pub fn require_commands(commands: &[&str], path_var: &OsStr) -> Result<()> {
    for command in commands {
        match find_in_path(command, path_var) {
            Some(found) => tracing::debug!(command, path = %found.display(), "Found command"),
            None => {
                return Err(InstallerError::MissingCommand {
                    command: command.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Root check followed by the required-command check against the process `PATH`.
pub fn run() -> Result<()> {
    require_root()?;
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    require_commands(REQUIRED_COMMANDS, &path_var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn make_tool(dir: &Path, name: &str, mode: u32) {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_find_in_path_requires_exec_bit() {
        let dir = tempfile::tempdir().unwrap();
        make_tool(dir.path(), "useradd", 0o755);
        make_tool(dir.path(), "chown", 0o644);

        let path_var = OsString::from(dir.path());
        assert!(find_in_path("useradd", &path_var).is_some());
        assert!(find_in_path("chown", &path_var).is_none());
    }

    #[test]
    fn test_require_commands_names_first_missing() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_tool(first.path(), "id", 0o755);
        make_tool(second.path(), "useradd", 0o755);

        let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();
        let err = require_commands(REQUIRED_COMMANDS, &path_var).unwrap_err();
        assert!(matches!(err, InstallerError::MissingCommand { command } if command == "chown"));

        make_tool(second.path(), "chown", 0o755);
        make_tool(second.path(), "systemctl", 0o755);
        assert!(require_commands(REQUIRED_COMMANDS, &path_var).is_ok());
    }
}
