//! Reqwest implementation of the CircleCI gateway.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::PreviewError;

use super::models::{ApiArtifact, ApiBuildDetails};
use super::{BuildInfo, CiGateway, parse_pr_branch};

/// Public CircleCI v1.1 endpoint.
pub const DEFAULT_API_BASE: &str = "https://circleci.com/api/v1.1";

/// CircleCI API client bound to one GitHub repository.
#[derive(Debug, Clone)]
pub struct CircleCiClient {
    http: Client,
    api_base: String,
    org: String,
    repo: String,
    token: String,
}

impl CircleCiClient {
    /// Creates a client for builds of `org/repo`.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the base URL does not
    /// parse or any identity value is blank.
    pub fn new(
        http: Client,
        api_base: &str,
        org: &str,
        repo: &str,
        token: &str,
    ) -> Result<Self, PreviewError> {
        Url::parse(api_base).map_err(|error| {
            PreviewError::configuration(format!("CircleCI API base '{api_base}' is invalid: {error}"))
        })?;
        for (name, value) in [("organisation", org), ("repository", repo), ("token", token)] {
            if value.trim().is_empty() {
                return Err(PreviewError::configuration(format!(
                    "CircleCI {name} is required"
                )));
            }
        }

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            org: org.trim().to_owned(),
            repo: repo.trim().to_owned(),
            token: token.trim().to_owned(),
        })
    }

    fn build_url(&self, build_num: u64) -> String {
        format!(
            "{}/project/github/{}/{}/{build_num}",
            self.api_base, self.org, self.repo
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        operation: &str,
    ) -> Result<T, PreviewError> {
        let response = self
            .http
            .get(url)
            .query(&[("circle-token", self.token.as_str())])
            .send()
            .await
            .map_err(|error| map_reqwest_error(operation, error))?;

        ensure_success(response, operation)
            .await?
            .json::<T>()
            .await
            .map_err(|error| map_reqwest_error(operation, error))
    }
}

#[async_trait]
impl CiGateway for CircleCiClient {
    async fn build_info(&self, build_num: u64) -> Result<BuildInfo, PreviewError> {
        let operation = format!("fetching CircleCI build {build_num}");
        let details: ApiBuildDetails = self
            .get_json(&self.build_url(build_num), &operation)
            .await?;

        let branch = details.branch.as_deref().unwrap_or_default();
        Ok(BuildInfo {
            org: details.username,
            repo: details.reponame,
            pr: parse_pr_branch(branch)?,
            sha: details.vcs_revision,
            success: !details.failed.unwrap_or(false),
        })
    }

    async fn artifact_url(
        &self,
        build_num: u64,
        artifact_path: &str,
    ) -> Result<Url, PreviewError> {
        let operation = format!("listing artifacts of CircleCI build {build_num}");
        let url = format!("{}/artifacts", self.build_url(build_num));
        let artifacts: Vec<ApiArtifact> = self.get_json(&url, &operation).await?;

        let artifact = artifacts
            .into_iter()
            .find(|artifact| artifact.path == artifact_path)
            .ok_or_else(|| {
                PreviewError::upstream(format!(
                    "missing artifact '{artifact_path}' for CircleCI build {build_num}"
                ))
            })?;

        Url::parse(&artifact.url).map_err(|error| {
            PreviewError::upstream(format!(
                "artifact '{artifact_path}' of CircleCI build {build_num} has an invalid URL: {error}"
            ))
        })
    }
}

/// Fails with [`PreviewError::UpstreamUnavailable`] unless the response
/// carries a success status.
pub(crate) async fn ensure_success(
    response: Response,
    operation: &str,
) -> Result<Response, PreviewError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PreviewError::upstream(format!(
        "{operation} failed with status {status}: {}",
        body.trim()
    )))
}

/// Maps a transport failure, dropping the URL so query-string tokens never
/// reach logs.
pub(crate) fn map_reqwest_error(operation: &str, error: reqwest::Error) -> PreviewError {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_decode() {
        "returned an unreadable body"
    } else {
        "failed"
    };
    PreviewError::upstream(format!("{operation} {kind}: {}", error.without_url()))
}
