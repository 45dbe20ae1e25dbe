//! Octocrab client construction helpers for gateway implementations.

use http::Uri;
use octocrab::Octocrab;

use crate::error::PreviewError;
use crate::github::locator::PersonalAccessToken;

use super::error_mapping::map_octocrab_error;

/// Builds an Octocrab client for the given token and API base URL.
///
/// # Errors
///
/// Returns [`PreviewError::Configuration`] when the base URI cannot be
/// parsed or [`PreviewError::UpstreamUnavailable`] when Octocrab fails to
/// construct a client.
pub(super) fn build_octocrab_client(
    token: &PersonalAccessToken,
    api_base: &str,
) -> Result<Octocrab, PreviewError> {
    let base_uri: Uri = api_base.parse::<Uri>().map_err(|error| {
        PreviewError::configuration(format!("GitHub API base '{api_base}' is invalid: {error}"))
    })?;

    Octocrab::builder()
        .personal_token(token.as_ref())
        .base_uri(base_uri)
        .map_err(|error| PreviewError::configuration(format!("build client failed: {error}")))?
        .build()
        .map_err(|error| map_octocrab_error("build client", &error))
}
