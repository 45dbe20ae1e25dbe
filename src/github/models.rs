//! Data models representing the pull request facts trust decisions use.

use serde::Deserialize;

/// Pull request metadata needed to evaluate trust.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestMetadata {
    /// Pull request number.
    pub number: u64,
    /// Author login if present.
    pub author: Option<String>,
    /// Names of the labels currently applied.
    pub labels: Vec<String>,
}

impl PullRequestMetadata {
    /// Returns true when a label named `label` is applied.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|applied| applied == label)
    }
}

/// State of a user's membership in an organisation team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    /// The user is a member.
    Active,
    /// The user was invited but has not accepted.
    Pending,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiPullRequest {
    pub(super) number: u64,
    pub(super) user: Option<ApiUser>,
    #[serde(default)]
    pub(super) labels: Vec<ApiLabel>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiUser {
    pub(super) login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiLabel {
    pub(super) name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiPullRequestFile {
    pub(super) filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiTeamMembership {
    pub(super) state: MembershipState,
}

impl From<ApiPullRequest> for PullRequestMetadata {
    fn from(value: ApiPullRequest) -> Self {
        Self {
            number: value.number,
            author: value.user.and_then(|user| user.login),
            labels: value.labels.into_iter().map(|label| label.name).collect(),
        }
    }
}
