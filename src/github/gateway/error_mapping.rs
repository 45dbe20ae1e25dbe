//! Error mapping helpers for the Octocrab GitHub gateway implementations.

use http::StatusCode;

use crate::error::PreviewError;

/// Checks if a GitHub error status indicates an authentication failure.
pub(super) const fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Checks if an octocrab error represents a network/transport issue.
pub(super) const fn is_network_error(error: &octocrab::Error) -> bool {
    matches!(
        error,
        octocrab::Error::Http { .. }
            | octocrab::Error::Hyper { .. }
            | octocrab::Error::Service { .. }
    )
}

/// Checks whether the GitHub error represents a rate limit error based on the
/// HTTP status and message / documentation URL content.
pub(super) fn is_rate_limit_error(source: &octocrab::GitHubError) -> bool {
    let is_rate_limit_status = matches!(
        source.status_code,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    );

    let message_indicates_rate_limit = source.message.to_lowercase().contains("rate limit")
        || source
            .documentation_url
            .as_deref()
            .is_some_and(|url| url.contains("rate-limit"));

    is_rate_limit_status && message_indicates_rate_limit
}

/// Returns the HTTP status GitHub answered with, if the error carries one.
pub(super) const fn github_status(error: &octocrab::Error) -> Option<StatusCode> {
    match error {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code),
        _ => None,
    }
}

/// Maps an Octocrab failure to [`PreviewError::UpstreamUnavailable`],
/// keeping the failing operation and the failure class in the message.
pub(super) fn map_octocrab_error(operation: &str, error: &octocrab::Error) -> PreviewError {
    if let octocrab::Error::GitHub { source, .. } = error {
        let status = source.status_code;
        let message = &source.message;
        return if is_rate_limit_error(source) {
            PreviewError::upstream(format!(
                "{operation} failed: GitHub rate limit exceeded ({status}): {message}"
            ))
        } else if is_auth_failure(status) {
            PreviewError::upstream(format!(
                "{operation} failed: GitHub rejected the token ({status}): {message}"
            ))
        } else {
            PreviewError::upstream(format!(
                "{operation} failed with status {status}: {message}"
            ))
        };
    }

    if is_network_error(error) {
        return PreviewError::upstream(format!(
            "{operation} failed: network error talking to GitHub: {error}"
        ));
    }

    PreviewError::upstream(format!("{operation} failed: {error}"))
}
