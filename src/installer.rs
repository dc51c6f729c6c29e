use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio::process::Command;

use crate::error::{InstallerError, Result};
use crate::exporter::ExporterDescriptor;

const BINARY_MODE: u32 = 0o755;

/// Recursive ownership change of an install tree.
#[async_trait]
pub trait OwnershipChanger: Send + Sync {
    async fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<()>;
}

/// Uses `chown -R user:group`.
pub struct ChownCommand;

#[async_trait]
impl OwnershipChanger for ChownCommand {
    async fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<()> {
        let owner = format!("{user}:{group}");
        let output = Command::new("chown")
            .arg("-R")
            .arg(&owner)
            .arg(path)
            .output()
            .await
            .map_err(|e| InstallerError::Ownership {
                path: path.to_path_buf(),
                owner: owner.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(InstallerError::Ownership {
                path: path.to_path_buf(),
                owner,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Unpacks a `.tar.gz` into `dest`.
pub fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let extraction = |reason: String| InstallerError::Extraction {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path).map_err(|e| extraction(e.to_string()))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| extraction(e.to_string()))
}

/// First directory in `scratch` (lexical order) whose name starts with `prefix`.
pub fn locate_extracted_dir(scratch: &Path, prefix: &str) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(scratch)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .collect();
    matches.sort();

    if matches.len() > 1 {
        tracing::warn!(count = matches.len(), "Several extracted directories match, using the first");
    }

    matches
        .into_iter()
        .next()
        .ok_or_else(|| InstallerError::ArchiveLayout {
            prefix: prefix.to_string(),
            scratch: scratch.to_path_buf(),
        })
}

/// Moves every entry of `src` into `dest`, replacing existing entries.
/// Entries named in `exclude` are left in `src`.
pub fn move_contents(src: &Path, dest: &Path, exclude: &[&str]) -> Result<Vec<PathBuf>> {
    let mut moved = Vec::new();

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if exclude.iter().any(|skip| name == *skip) {
            tracing::debug!(name = ?name, "Skipping excluded release file");
            continue;
        }

        let target = dest.join(&name);

        remove_existing(&target)?;
        move_entry(&entry.path(), &target)?;
        moved.push(target);
    }

    Ok(moved)
}

fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Rename, falling back to copy when scratch and install dir are on different filesystems.
fn move_entry(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            copy_recursive(src, dest)?;
            remove_existing(src)
        }
        Err(e) => Err(e),
    }
}

fn copy_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if meta.is_dir() {
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
        fs::set_permissions(dest, meta.permissions())
    } else if meta.file_type().is_symlink() {
        std::os::unix::fs::symlink(fs::read_link(src)?, dest)
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

/// The binary must be a plain file; a symlink would let chmod reach outside the install dir.
fn check_regular_file(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_file() => Ok(()),
        Ok(_) => Err(InstallerError::BinaryNotRegular {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(InstallerError::BinaryMissing {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

pub fn mark_executable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(BINARY_MODE);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Extracts `archive` and installs its release directory into the exporter's install dir.
pub async fn install_release(
    exporter: &ExporterDescriptor,
    archive: &Path,
    scratch: &Path,
    ownership: &dyn OwnershipChanger,
) -> Result<PathBuf> {
    let install_dir = &exporter.install_dir;
    tokio::fs::create_dir_all(install_dir)
        .await
        .map_err(|source| InstallerError::CreateDir {
            path: install_dir.clone(),
            source,
        })?;

    tracing::info!(archive = %archive.display(), "Extracting release archive");
    let (archive_path, scratch_path) = (archive.to_path_buf(), scratch.to_path_buf());
    tokio::task::spawn_blocking(move || extract_tar_gz(&archive_path, &scratch_path))
        .await
        .map_err(|e| InstallerError::Extraction {
            archive: archive.to_path_buf(),
            reason: e.to_string(),
        })??;

    let release_dir = locate_extracted_dir(scratch, &exporter.extracted_dir_prefix())?;
    tracing::debug!(dir = %release_dir.display(), "Found release directory");

    // The config file belongs to the config stage; the copy shipped in the release is ignored.
    let exclude: Vec<&str> = exporter.config.iter().map(|c| c.file_name).collect();
    let moved = move_contents(&release_dir, install_dir, &exclude)?;
    tracing::info!(count = moved.len(), dir = %install_dir.display(), "Installed release files");

    let binary = exporter.binary_path();
    check_regular_file(&binary)?;
    mark_executable(&binary)?;

    ownership
        .chown_recursive(install_dir, &exporter.user.name, &exporter.user.name)
        .await?;

    Ok(binary)
}
