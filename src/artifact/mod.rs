//! Retrieval and unpacking of build artifacts.
//!
//! Downloads stream into a temporary file inside the downloads directory
//! while counting bytes against the configured ceiling, and archives unpack
//! into a freshly named staging directory beside it. Both temporaries are
//! RAII handles: a failed, timed-out or cancelled fetch leaves nothing
//! behind.

mod unpack;

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};

use crate::circleci::{BuildInfo, CiGateway, ensure_success, map_reqwest_error};
use crate::error::PreviewError;
use crate::store::BuildKey;

/// A downloaded artifact awaiting extraction.
#[derive(Debug)]
pub struct DownloadedArtifact {
    key: BuildKey,
    file: NamedTempFile,
    size: u64,
}

impl DownloadedArtifact {
    /// Location of the downloaded file.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    /// Number of bytes written.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// An unpacked artifact ready to be moved into the build store.
///
/// The directory is removed on drop unless it has been moved away.
#[derive(Debug)]
pub struct StagedArtifact {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl StagedArtifact {
    /// Root of the unpacked contents.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

/// Resolves, downloads and unpacks CI build artifacts.
pub struct ArtifactFetcher {
    ci: Arc<dyn CiGateway>,
    http: Client,
    downloads_dir: Utf8PathBuf,
    size_limit: u64,
}

impl ArtifactFetcher {
    /// Creates a fetcher writing temporaries below `downloads_dir` and
    /// refusing artifacts larger than `size_limit` bytes.
    #[must_use]
    pub const fn new(
        ci: Arc<dyn CiGateway>,
        http: Client,
        downloads_dir: Utf8PathBuf,
        size_limit: u64,
    ) -> Self {
        Self {
            ci,
            http,
            downloads_dir,
            size_limit,
        }
    }

    /// Resolves the GitHub coordinates of `build_num`.
    ///
    /// # Errors
    ///
    /// Propagates [`PreviewError::UpstreamUnavailable`] and
    /// [`PreviewError::InvalidInput`] from the CI gateway.
    pub async fn resolve_build_info(&self, build_num: u64) -> Result<BuildInfo, PreviewError> {
        self.ci.build_info(build_num).await
    }

    /// Streams the artifact stored at `artifact_path` for `build_num` into
    /// a temporary file named after `pr` and `sha`.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for a malformed `pr` or `sha`,
    /// [`PreviewError::ArtifactTooLarge`] once the ceiling is exceeded,
    /// [`PreviewError::UpstreamUnavailable`] for lookup and transport
    /// failures and [`PreviewError::Storage`] when the file cannot be
    /// written. The partial file is removed in every case.
    pub async fn download_artifact(
        &self,
        build_num: u64,
        pr: u64,
        sha: &str,
        artifact_path: &str,
    ) -> Result<DownloadedArtifact, PreviewError> {
        let key = BuildKey::new(pr, sha)?;
        let url = self.ci.artifact_url(build_num, artifact_path).await?;
        let operation = format!("downloading artifact for PR {pr} ({sha})");

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| map_reqwest_error(&operation, error))?;
        response = ensure_success(response, &operation).await?;

        if response
            .content_length()
            .is_some_and(|length| length > self.size_limit)
        {
            return Err(PreviewError::ArtifactTooLarge {
                limit: self.size_limit,
            });
        }

        let mut file = self.create_download_file(&key, artifact_path)?;
        let mut size: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| map_reqwest_error(&operation, error))?
        {
            size = size.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
            if size > self.size_limit {
                tracing::warn!(pr, sha, limit = self.size_limit, "artifact exceeds size limit");
                return Err(PreviewError::ArtifactTooLarge {
                    limit: self.size_limit,
                });
            }
            file.write_all(&chunk)
                .map_err(|error| PreviewError::storage(operation.clone(), &error))?;
        }
        file.flush()
            .map_err(|error| PreviewError::storage(operation.clone(), &error))?;

        tracing::debug!(pr, sha, size, "downloaded artifact to '{}'", file.path().display());
        Ok(DownloadedArtifact { key, file, size })
    }

    /// Extracts a downloaded gzip-compressed tar archive into a new staging
    /// directory. The downloaded file is removed afterwards.
    ///
    /// Extraction runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::CorruptArtifact`] when the archive is empty,
    /// unreadable or holds entries escaping the staging directory, and
    /// [`PreviewError::Storage`] when the staging directory cannot be
    /// created or the extraction task is lost.
    pub async fn unpack(
        &self,
        downloaded: DownloadedArtifact,
    ) -> Result<StagedArtifact, PreviewError> {
        let downloads_dir = self.downloads_dir.clone();
        let operation = format!(
            "staging artifact for PR {} ({})",
            downloaded.key.pr(),
            downloaded.key.sha()
        );
        tokio::task::spawn_blocking(move || unpack_into(&downloads_dir, downloaded))
            .await
            .map_err(|error| PreviewError::blocking_task(operation, &error))?
    }

    fn create_download_file(
        &self,
        key: &BuildKey,
        artifact_path: &str,
    ) -> Result<NamedTempFile, PreviewError> {
        let operation = || format!("creating download file in '{}'", self.downloads_dir);
        std::fs::create_dir_all(&self.downloads_dir)
            .map_err(|error| PreviewError::storage(operation(), &error))?;

        let basename = artifact_path.rsplit('/').next().unwrap_or_default();
        tempfile::Builder::new()
            .prefix(&format!("{}-", key.dir_name()))
            .suffix(&format!("-{basename}"))
            .tempfile_in(&self.downloads_dir)
            .map_err(|error| PreviewError::storage(operation(), &error))
    }
}

/// Extracts `downloaded` into a fresh staging directory under `downloads_dir`.
fn unpack_into(
    downloads_dir: &Utf8Path,
    downloaded: DownloadedArtifact,
) -> Result<StagedArtifact, PreviewError> {
    let DownloadedArtifact { key, file, .. } = downloaded;
    let operation = || format!("staging artifact for PR {} ({})", key.pr(), key.sha());

    let dir = tempfile::Builder::new()
        .prefix(&format!("{}-", key.dir_name()))
        .tempdir_in(downloads_dir)
        .map_err(|error| PreviewError::storage(operation(), &error))?;
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
        PreviewError::Storage {
            operation: operation(),
            message: format!("staging path '{}' is not UTF-8", path.display()),
        }
    })?;

    let archive = file
        .reopen()
        .map_err(|error| PreviewError::storage(operation(), &error))?;
    let entries = unpack::extract_tgz(archive, &root)?;
    unpack::make_servable(&root).map_err(|error| PreviewError::storage(operation(), &error))?;

    if let Err(error) = file.close() {
        tracing::warn!("failed to remove downloaded artifact: {error}");
    }

    tracing::debug!(pr = key.pr(), sha = key.sha(), entries, "unpacked artifact to '{root}'");
    Ok(StagedArtifact { _dir: dir, root })
}
