use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{InstallerError, Result};

const USER_AGENT: &str = concat!("exporter-install/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// Downloads a release archive to a local file.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| InstallerError::Download {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let transport = |reason: String| InstallerError::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(transport(format!("server returned status {}", response.status())));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport(format!("failed to read response body: {}", e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = written, path = %dest.display(), "Download finished");
        Ok(())
    }
}

/// Downloads `url` into `scratch/<file_name>` and checks the result is non-empty.
pub async fn fetch_archive(
    fetcher: &dyn ArchiveFetcher,
    url: &str,
    scratch: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(scratch)
        .await
        .map_err(|source| InstallerError::CreateDir {
            path: scratch.to_path_buf(),
            source,
        })?;

    let dest = scratch.join(file_name);
    tracing::info!(url, path = %dest.display(), "Downloading release archive");
    fetcher.fetch(url, &dest).await?;

    match tokio::fs::metadata(&dest).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(dest),
        _ => Err(InstallerError::EmptyDownload { path: dest }),
    }
}
