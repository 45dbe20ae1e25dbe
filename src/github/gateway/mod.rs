//! Gateways for talking to GitHub through Octocrab.
//!
//! Each concern sits behind its own trait so that trust evaluation and the
//! notifier can be tested against mocks, while [`OctocrabGateway`] handles
//! the real HTTP requests for all of them.

mod client;
mod comments;
mod error_mapping;
mod pull_request;
mod teams;

pub use pull_request::OctocrabGateway;

use async_trait::async_trait;

use crate::error::PreviewError;
use crate::github::models::PullRequestMetadata;

/// Gateway that can load pull request data for the configured repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PullRequestGateway: Send + Sync {
    /// Fetch the pull request author and labels.
    async fn pull_request(&self, pr: u64) -> Result<PullRequestMetadata, PreviewError>;

    /// Fetch the paths of every file the pull request changes.
    async fn pull_request_files(&self, pr: u64) -> Result<Vec<String>, PreviewError>;
}

/// Gateway answering organisation team membership questions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TeamGateway: Send + Sync {
    /// Returns true when `login` is an active member of the team `team_slug`.
    async fn is_member(&self, team_slug: &str, login: &str) -> Result<bool, PreviewError>;
}

/// Gateway that posts issue comments on pull requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentGateway: Send + Sync {
    /// Posts `body` as a new comment on `pr`.
    async fn add_comment(&self, pr: u64, body: &str) -> Result<(), PreviewError>;
}
