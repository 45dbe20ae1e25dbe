//! Identity wrappers and API path helpers for the configured repository.

use url::Url;

use crate::error::PreviewError;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Repository owner wrapper to avoid stringly typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOwner(String);

impl RepositoryOwner {
    pub(crate) fn new(value: &str) -> Result<Self, PreviewError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PreviewError::configuration("GitHub organisation is required"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the owner value.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Repository name wrapper to prevent parameter mix-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub(crate) fn new(value: &str) -> Result<Self, PreviewError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PreviewError::configuration("GitHub repository is required"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the repository name.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Personal access token wrapper enforcing presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalAccessToken(String);

impl PersonalAccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the supplied string is
    /// blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, PreviewError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(PreviewError::configuration("GitHub token is required"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for PersonalAccessToken {
    fn as_ref(&self) -> &str {
        self.value()
    }
}

/// The repository whose pull requests get previews, plus the API host
/// serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocator {
    api_base: Url,
    owner: RepositoryOwner,
    repository: RepositoryName,
}

impl RepositoryLocator {
    /// Creates a locator for `owner/repo` served by `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the base URL does not
    /// parse or the owner or repository is blank.
    pub fn new(api_base: &str, owner: &str, repo: &str) -> Result<Self, PreviewError> {
        let api_base = Url::parse(api_base).map_err(|error| {
            PreviewError::configuration(format!("GitHub API base '{api_base}' is invalid: {error}"))
        })?;
        Ok(Self {
            api_base,
            owner: RepositoryOwner::new(owner)?,
            repository: RepositoryName::new(repo)?,
        })
    }

    /// Locator for `owner/repo` on github.com.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the owner or repository
    /// is blank.
    pub fn on_github(owner: &str, repo: &str) -> Result<Self, PreviewError> {
        Self::new(DEFAULT_API_BASE, owner, repo)
    }

    /// API base URL.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Repository owner, which is also the organisation owning the teams.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    pub(crate) fn pull_request_path(&self, pr: u64) -> String {
        format!(
            "/repos/{}/{}/pulls/{pr}",
            self.owner.as_str(),
            self.repository.as_str()
        )
    }

    pub(crate) fn pull_request_files_path(&self, pr: u64) -> String {
        format!("{}/files", self.pull_request_path(pr))
    }

    pub(crate) fn comments_path(&self, pr: u64) -> String {
        format!(
            "/repos/{}/{}/issues/{pr}/comments",
            self.owner.as_str(),
            self.repository.as_str()
        )
    }

    pub(crate) fn team_membership_path(&self, team_slug: &str, login: &str) -> String {
        format!(
            "/orgs/{}/teams/{team_slug}/memberships/{login}",
            self.owner.as_str()
        )
    }
}
