//! Octocrab implementation of the pull request gateway.

use async_trait::async_trait;
use octocrab::{Octocrab, Page};

use crate::error::PreviewError;
use crate::github::locator::{PersonalAccessToken, RepositoryLocator};
use crate::github::models::{ApiPullRequest, ApiPullRequestFile, PullRequestMetadata};

use super::PullRequestGateway;
use super::client::build_octocrab_client;
use super::error_mapping::map_octocrab_error;

/// Octocrab-backed gateway bound to one repository.
pub struct OctocrabGateway {
    pub(super) client: Octocrab,
    pub(super) locator: RepositoryLocator,
}

impl OctocrabGateway {
    /// Creates a new gateway from an Octocrab client.
    #[must_use]
    pub const fn new(client: Octocrab, locator: RepositoryLocator) -> Self {
        Self { client, locator }
    }

    /// Builds an Octocrab client for the given token and repository.
    ///
    /// Must be called within a Tokio runtime context.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the base URI cannot be
    /// parsed or [`PreviewError::UpstreamUnavailable`] when Octocrab fails to
    /// construct a client.
    pub fn for_token(
        token: &PersonalAccessToken,
        locator: RepositoryLocator,
    ) -> Result<Self, PreviewError> {
        let octocrab = build_octocrab_client(token, locator.api_base().as_str())?;
        Ok(Self::new(octocrab, locator))
    }
}

#[async_trait]
impl PullRequestGateway for OctocrabGateway {
    async fn pull_request(&self, pr: u64) -> Result<PullRequestMetadata, PreviewError> {
        self.client
            .get::<ApiPullRequest, _, _>(self.locator.pull_request_path(pr), None::<&()>)
            .await
            .map(ApiPullRequest::into)
            .map_err(|error| map_octocrab_error(&format!("fetching PR #{pr}"), &error))
    }

    async fn pull_request_files(&self, pr: u64) -> Result<Vec<String>, PreviewError> {
        let operation = format!("listing files of PR #{pr}");
        let page = self
            .client
            .get::<Page<ApiPullRequestFile>, _, _>(
                self.locator.pull_request_files_path(pr),
                None::<&()>,
            )
            .await
            .map_err(|error| map_octocrab_error(&operation, &error))?;

        self.client
            .all_pages(page)
            .await
            .map(|files| files.into_iter().map(|file| file.filename).collect())
            .map_err(|error| map_octocrab_error(&operation, &error))
    }
}
