//! Orchestration of inbound CI and pull request notifications.
//!
//! [`PreviewService`] runs each notification through the artifact fetcher,
//! the trust evaluator and the build store, deciding along the way whether
//! the notification is worth acting on at all.

use std::sync::Arc;
use std::time::Duration;

use fancy_regex::Regex;

use crate::artifact::ArtifactFetcher;
use crate::config::PreviewConfig;
use crate::error::PreviewError;
use crate::github::{PullRequestGateway, TrustEvaluator};
use crate::store::{BuildStore, PreviewBuild};

/// A CI build finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNotification {
    /// CI build number.
    pub build_num: u64,
    /// Name of the job that ran.
    pub job: String,
}

/// A pull request changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrNotification {
    /// Pull request number.
    pub pr: u64,
    /// Webhook action, if the sender supplied one.
    pub action: Option<String>,
}

/// Why a build notification was not turned into a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The job is not the configured preview job.
    NotPreviewJob,
    /// The CI build failed.
    BuildFailed,
    /// The pull request touches no significant files.
    NoSignificantFiles,
}

/// Result of handling a [`BuildNotification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Nothing was stored.
    Skipped(SkipReason),
    /// The build was stored.
    Created(PreviewBuild),
}

/// Result of handling a [`PrNotification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrOutcome {
    /// The action does not affect previews.
    Ignored,
    /// The pull request was closed and its builds removed.
    Removed(Vec<String>),
    /// The builds of the pull request now match its trust status.
    VisibilityUpdated {
        /// Whether the builds are public.
        is_public: bool,
        /// Commits now in the requested location.
        shas: Vec<String>,
    },
}

/// Fixed inputs for deciding what to do with notifications.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Organisation builds must belong to.
    pub github_org: String,
    /// Repository builds must belong to.
    pub github_repo: String,
    /// Job producing preview artifacts.
    pub preview_job_name: String,
    /// Artifact path within the CI build.
    pub artifact_path: String,
    /// Pattern a changed file must match for the build to be kept.
    pub significant_files: Regex,
}

impl ServiceSettings {
    /// Extracts the settings from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the repository is not
    /// configured or the significant-files pattern is invalid.
    pub fn from_config(config: &PreviewConfig) -> Result<Self, PreviewError> {
        let (org, repo) = config.require_repository_info()?;
        Ok(Self {
            github_org: org.to_owned(),
            github_repo: repo.to_owned(),
            preview_job_name: config.preview_job_name.clone(),
            artifact_path: config.artifact_path.clone(),
            significant_files: config.significant_files()?,
        })
    }
}

/// Handles preview notifications end to end.
pub struct PreviewService {
    settings: ServiceSettings,
    fetcher: ArtifactFetcher,
    trust: TrustEvaluator,
    pull_requests: Arc<dyn PullRequestGateway>,
    store: Arc<BuildStore>,
}

impl PreviewService {
    /// Wires the service together.
    #[must_use]
    pub fn new(
        settings: ServiceSettings,
        fetcher: ArtifactFetcher,
        trust: TrustEvaluator,
        pull_requests: Arc<dyn PullRequestGateway>,
        store: Arc<BuildStore>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            trust,
            pull_requests,
            store,
        }
    }

    /// The build store previews are written to.
    #[must_use]
    pub fn store(&self) -> &BuildStore {
        &self.store
    }

    /// Turns a finished preview job into a stored build.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for a malformed notification or
    /// a build of another repository, and propagates failures from the CI,
    /// GitHub and the build store.
    pub async fn handle_build_completed(
        &self,
        notification: &BuildNotification,
    ) -> Result<BuildOutcome, PreviewError> {
        let build_num = notification.build_num;
        let job = notification.job.as_str();
        if build_num == 0 {
            return Err(PreviewError::invalid_input("build number must be positive"));
        }
        if job.trim().is_empty() {
            return Err(PreviewError::invalid_input("job name must not be empty"));
        }

        if job != self.settings.preview_job_name {
            tracing::info!(
                build_num,
                job,
                "skipping preview processing because this is not the \"{}\" job",
                self.settings.preview_job_name
            );
            return Ok(BuildOutcome::Skipped(SkipReason::NotPreviewJob));
        }

        let info = self.fetcher.resolve_build_info(build_num).await?;
        self.check_repository(&info.org, &info.repo)?;
        let pr = info.pr;
        let sha = info.sha.as_str();

        if !info.success {
            tracing::info!(pr, build_num, "skipping preview processing because the build failed");
            return Ok(BuildOutcome::Skipped(SkipReason::BuildFailed));
        }

        if !self.touches_significant_files(pr).await? {
            tracing::info!(
                pr,
                build_num,
                "skipping preview processing because this PR did not touch any significant files"
            );
            return Ok(BuildOutcome::Skipped(SkipReason::NoSignificantFiles));
        }

        let downloaded = self
            .fetcher
            .download_artifact(build_num, pr, sha, &self.settings.artifact_path)
            .await?;
        let staged = self.fetcher.unpack(downloaded).await?;
        let is_public = self.trust.is_trusted(pr).await?;
        let build = self.store.create(pr, sha, staged.root(), is_public).await?;

        Ok(BuildOutcome::Created(build))
    }

    /// Like [`Self::handle_build_completed`], abandoning the work once
    /// `deadline` passes. Temporaries of an abandoned fetch are removed.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::UpstreamUnavailable`] on expiry, otherwise as
    /// [`Self::handle_build_completed`].
    pub async fn handle_build_completed_within(
        &self,
        notification: &BuildNotification,
        deadline: Duration,
    ) -> Result<BuildOutcome, PreviewError> {
        tokio::time::timeout(deadline, self.handle_build_completed(notification))
            .await
            .map_err(|_| {
                PreviewError::upstream(format!(
                    "handling build {} timed out after {deadline:?}",
                    notification.build_num
                ))
            })?
    }

    /// Re-evaluates trust for a pull request and moves or removes its
    /// builds accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for PR zero and propagates
    /// trust evaluation and build store failures.
    pub async fn handle_pr_updated(
        &self,
        notification: &PrNotification,
    ) -> Result<PrOutcome, PreviewError> {
        let pr = notification.pr;
        if pr == 0 {
            return Err(PreviewError::invalid_input(
                "pull request number must be positive",
            ));
        }

        match notification.action.as_deref() {
            None | Some("labeled" | "unlabeled") => {
                let is_public = self.trust.is_trusted(pr).await?;
                let shas = self
                    .store
                    .update_pr_visibility(pr, is_public)
                    .await?
                    .unwrap_or_default();
                Ok(PrOutcome::VisibilityUpdated { is_public, shas })
            }
            Some("closed") => {
                let shas = self.store.remove_pr(pr).await?;
                Ok(PrOutcome::Removed(shas))
            }
            Some(action) => {
                tracing::debug!(pr, action, "ignoring pull request action");
                Ok(PrOutcome::Ignored)
            }
        }
    }

    /// Returns true when builds of `pr` may be public.
    ///
    /// # Errors
    ///
    /// Same as [`TrustEvaluator::is_trusted`].
    pub async fn can_have_public_preview(&self, pr: u64) -> Result<bool, PreviewError> {
        self.trust.is_trusted(pr).await
    }

    fn check_repository(&self, org: &str, repo: &str) -> Result<(), PreviewError> {
        let checks = [
            ("githubOrg", self.settings.github_org.as_str(), org),
            ("githubRepo", self.settings.github_repo.as_str(), repo),
        ];
        for (property, expected, actual) in checks {
            if expected != actual {
                return Err(PreviewError::invalid_input(format!(
                    "Invalid webhook: expected \"{property}\" property to equal \"{expected}\" but got \"{actual}\"."
                )));
            }
        }
        Ok(())
    }

    async fn touches_significant_files(&self, pr: u64) -> Result<bool, PreviewError> {
        let files = self.pull_requests.pull_request_files(pr).await?;
        for file in &files {
            let matched = self
                .settings
                .significant_files
                .is_match(file)
                .map_err(|error| {
                    PreviewError::configuration(format!(
                        "significant files pattern failed on '{file}': {error}"
                    ))
                })?;
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
