//! Service configuration loaded from CLI, environment, and files.
//!
//! Values are merged with ortho-config's layered approach.
//!
//! # Precedence
//!
//! Configuration values are loaded with the following precedence (lowest to
//! highest):
//!
//! 1. **Defaults** – Built-in defaults
//! 2. **Configuration file** – `.preview-builds.toml` in the current
//!    directory, home directory, or XDG config directory
//! 3. **Environment variables** – `PREVIEW_*`, plus the legacy
//!    `GITHUB_TOKEN` for the GitHub token
//! 4. **Command-line arguments**
//!
//! # Configuration File
//!
//! ```toml
//! builds_dir = "/var/www/aio-builds"
//! github_org = "angular"
//! github_repo = "angular"
//! github_team_slugs = "aio-contributors, angular-core"
//! trusted_pr_label = "aio: preview"
//! domain_name = "ngbuilds.io"
//! circle_ci_token = "..."
//! ```

use std::env;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PreviewError;

/// Which notification an invocation handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// A CI build finished (`build_num` and `job`).
    BuildCompleted,
    /// A pull request was labelled, unlabelled, updated or closed (`pr`).
    PullRequestUpdated,
    /// Report whether a pull request may have a public preview (`pr` with
    /// `check_public_preview`).
    PublicPreviewQuery,
    /// Nothing to do.
    Idle,
}

/// Service configuration supporting CLI, environment, and file sources.
///
/// # Example
///
/// ```no_run
/// use preview_builds::PreviewConfig;
/// use ortho_config::OrthoConfig;
///
/// let config = PreviewConfig::load().expect("failed to load configuration");
/// let builds_dir = config.require_builds_dir().expect("builds directory required");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "PREVIEW",
    discovery(
        dotfile_name = ".preview-builds.toml",
        config_file_name = "preview-builds.toml",
        app_name = "preview-builds"
    )
)]
pub struct PreviewConfig {
    /// Root directory holding the `public/` and `hidden/` build subtrees.
    #[ortho_config(cli_short = 'b')]
    pub builds_dir: Option<String>,

    /// Directory for downloads and staging. Defaults to a directory under
    /// the system temporary directory.
    #[ortho_config()]
    pub downloads_dir: Option<String>,

    /// Largest artifact accepted, in bytes.
    #[ortho_config()]
    pub download_size_limit: u64,

    /// Path of the preview artifact among the CI build's artifacts.
    #[ortho_config(cli_short = 'A')]
    pub artifact_path: String,

    /// Name of the CI job producing preview artifacts.
    #[ortho_config(cli_short = 'P')]
    pub preview_job_name: String,

    /// Regular expression a changed file must match for a build to be
    /// worth previewing.
    #[ortho_config()]
    pub significant_files_pattern: String,

    /// GitHub organisation owning the repository and the allowed teams.
    #[ortho_config()]
    pub github_org: Option<String>,

    /// GitHub repository whose pull requests get previews.
    #[ortho_config()]
    pub github_repo: Option<String>,

    /// Personal access token for the GitHub API.
    ///
    /// Falls back to `GITHUB_TOKEN` when unset.
    #[ortho_config(cli_short = 't')]
    pub github_token: Option<String>,

    /// Comma-separated slugs of the teams whose members are trusted.
    #[ortho_config()]
    pub github_team_slugs: Option<String>,

    /// Label marking a pull request as trusted.
    #[ortho_config()]
    pub trusted_pr_label: Option<String>,

    /// Domain previews are served under, used in comments.
    #[ortho_config()]
    pub domain_name: Option<String>,

    /// CircleCI API token.
    #[ortho_config()]
    pub circle_ci_token: Option<String>,

    /// CircleCI API base URL.
    #[ortho_config()]
    pub circle_ci_api_base: String,

    /// GitHub API base URL.
    #[ortho_config()]
    pub github_api_base: String,

    /// Deadline for handling one CI notification, in seconds. Zero disables
    /// the deadline.
    #[ortho_config()]
    pub request_timeout_seconds: u64,

    /// Number of the completed CI build to process.
    #[ortho_config()]
    pub build_num: Option<u64>,

    /// Name of the CI job that completed.
    #[ortho_config(cli_short = 'j')]
    pub job: Option<String>,

    /// Pull request whose state changed.
    #[ortho_config(cli_short = 'p')]
    pub pr: Option<u64>,

    /// Pull request webhook action (`labeled`, `unlabeled`, `closed`, ...).
    #[ortho_config(cli_short = 'a')]
    pub action: Option<String>,

    /// Only report whether `pr` may have a public preview.
    ///
    /// Note: `ortho_config` does not load boolean values from the
    /// environment, so this is CLI or file only.
    #[ortho_config()]
    pub check_public_preview: bool,
}

/// Default download ceiling of 50 MiB.
pub const DEFAULT_DOWNLOAD_SIZE_LIMIT: u64 = 50 * 1024 * 1024;
const DEFAULT_ARTIFACT_PATH: &str = "aio/tmp/dist.tgz";
const DEFAULT_PREVIEW_JOB_NAME: &str = "aio_preview";
const DEFAULT_SIGNIFICANT_FILES_PATTERN: &str = "^aio/";
const DOWNLOADS_DIR_NAME: &str = "preview-builds-downloads";

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            builds_dir: None,
            downloads_dir: None,
            download_size_limit: DEFAULT_DOWNLOAD_SIZE_LIMIT,
            artifact_path: DEFAULT_ARTIFACT_PATH.to_owned(),
            preview_job_name: DEFAULT_PREVIEW_JOB_NAME.to_owned(),
            significant_files_pattern: DEFAULT_SIGNIFICANT_FILES_PATTERN.to_owned(),
            github_org: None,
            github_repo: None,
            github_token: None,
            github_team_slugs: None,
            trusted_pr_label: None,
            domain_name: None,
            circle_ci_token: None,
            circle_ci_api_base: crate::circleci::DEFAULT_API_BASE.to_owned(),
            github_api_base: crate::github::locator::DEFAULT_API_BASE.to_owned(),
            request_timeout_seconds: 0,
            build_num: None,
            job: None,
            pr: None,
            action: None,
            check_public_preview: false,
        }
    }
}

impl PreviewConfig {
    /// Resolves the GitHub token from configuration or the legacy
    /// `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when no source provides a
    /// non-blank token.
    pub fn resolve_token(&self) -> Result<String, PreviewError> {
        self.resolve_token_with(|name| env::var(name).ok())
    }

    fn resolve_token_with(
        &self,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<String, PreviewError> {
        self.github_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| lookup("GITHUB_TOKEN").filter(|token| !token.trim().is_empty()))
            .ok_or_else(|| {
                PreviewError::configuration(
                    "GitHub token is required (set PREVIEW_GITHUB_TOKEN or GITHUB_TOKEN)",
                )
            })
    }

    /// Returns the builds root.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when unset or blank.
    pub fn require_builds_dir(&self) -> Result<Utf8PathBuf, PreviewError> {
        require(self.builds_dir.as_deref(), "builds directory", "--builds-dir")
            .map(Utf8PathBuf::from)
    }

    /// Returns the downloads directory, defaulting below the system
    /// temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the default location is
    /// not valid UTF-8.
    pub fn downloads_dir(&self) -> Result<Utf8PathBuf, PreviewError> {
        if let Some(dir) = self.downloads_dir.as_deref().filter(|dir| !dir.trim().is_empty()) {
            return Ok(Utf8PathBuf::from(dir));
        }
        Utf8PathBuf::from_path_buf(env::temp_dir().join(DOWNLOADS_DIR_NAME)).map_err(|path| {
            PreviewError::configuration(format!(
                "temporary directory '{}' is not valid UTF-8; set downloads_dir",
                path.display()
            ))
        })
    }

    /// Returns the GitHub organisation and repository.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when either is missing.
    pub fn require_repository_info(&self) -> Result<(&str, &str), PreviewError> {
        Ok((
            require(self.github_org.as_deref(), "GitHub organisation", "--github-org")?,
            require(self.github_repo.as_deref(), "GitHub repository", "--github-repo")?,
        ))
    }

    /// Returns the allowed team slugs, trimmed and without blanks.
    #[must_use]
    pub fn team_slugs(&self) -> Vec<&str> {
        self.github_team_slugs
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .collect()
    }

    /// Returns the trust label.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when unset or blank.
    pub fn require_trusted_pr_label(&self) -> Result<&str, PreviewError> {
        require(
            self.trusted_pr_label.as_deref(),
            "trusted PR label",
            "--trusted-pr-label",
        )
    }

    /// Returns the preview domain.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when unset or blank.
    pub fn require_domain_name(&self) -> Result<&str, PreviewError> {
        require(self.domain_name.as_deref(), "preview domain name", "--domain-name")
    }

    /// Returns the CircleCI token.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when unset or blank.
    pub fn require_circle_ci_token(&self) -> Result<&str, PreviewError> {
        require(
            self.circle_ci_token.as_deref(),
            "CircleCI token",
            "--circle-ci-token",
        )
    }

    /// Compiles the significant-files pattern. Look-around is supported, so
    /// a pattern can exclude paths such as test files.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the pattern is invalid.
    pub fn significant_files(&self) -> Result<Regex, PreviewError> {
        Regex::new(&self.significant_files_pattern).map_err(|error| {
            PreviewError::configuration(format!("significant files pattern is invalid: {error}"))
        })
    }

    /// Deadline for one CI notification, if any.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Determines the operation mode based on provided configuration.
    ///
    /// A build number wins over a pull request number.
    #[must_use]
    pub const fn operation_mode(&self) -> OperationMode {
        if self.build_num.is_some() {
            OperationMode::BuildCompleted
        } else if self.pr.is_some() && self.check_public_preview {
            OperationMode::PublicPreviewQuery
        } else if self.pr.is_some() {
            OperationMode::PullRequestUpdated
        } else {
            OperationMode::Idle
        }
    }
}

fn require<'a>(value: Option<&'a str>, name: &str, flag: &str) -> Result<&'a str, PreviewError> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| PreviewError::configuration(format!("{name} is required (use {flag})")))
}

#[cfg(test)]
mod tests;
