//! Wire types for the CircleCI v1.1 API.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiBuildDetails {
    pub(super) username: String,
    pub(super) reponame: String,
    pub(super) branch: Option<String>,
    pub(super) vcs_revision: String,
    #[serde(default)]
    pub(super) failed: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiArtifact {
    pub(super) path: String,
    pub(super) url: String,
}
