//! CircleCI build metadata and artifact lookups.
//!
//! Only two endpoints of the v1.1 API are used: build details, which tie a
//! build number back to its repository, pull request and commit, and the
//! artifact listing, which yields the download URL for one artifact path.

mod client;
mod models;

pub use client::{CircleCiClient, DEFAULT_API_BASE};
pub(crate) use client::{ensure_success, map_reqwest_error};

use async_trait::async_trait;
use url::Url;

use crate::error::PreviewError;

/// GitHub coordinates and outcome of one CI build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// GitHub organisation owning the built repository.
    pub org: String,
    /// Repository name.
    pub repo: String,
    /// Pull request the build belongs to.
    pub pr: u64,
    /// Commit that was built.
    pub sha: String,
    /// Whether the build succeeded.
    pub success: bool,
}

/// Gateway for the CI service's build API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CiGateway: Send + Sync {
    /// Resolves the GitHub coordinates of `build_num`.
    async fn build_info(&self, build_num: u64) -> Result<BuildInfo, PreviewError>;

    /// Returns the download URL of the artifact stored at `artifact_path`.
    async fn artifact_url(&self, build_num: u64, artifact_path: &str)
    -> Result<Url, PreviewError>;
}

/// Extracts the pull request number from a `pull/<N>` branch name.
///
/// # Errors
///
/// Returns [`PreviewError::InvalidInput`] for any other branch, including
/// `pull/0`.
pub fn parse_pr_branch(branch: &str) -> Result<u64, PreviewError> {
    branch
        .strip_prefix("pull/")
        .and_then(|number| number.parse::<u64>().ok())
        .filter(|number| *number > 0)
        .ok_or_else(|| {
            PreviewError::invalid_input(format!(
                "build branch '{branch}' is not a pull request branch"
            ))
        })
}
