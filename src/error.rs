//! Error types surfaced by the preview build lifecycle.

use thiserror::Error;

/// Errors surfaced while evaluating trust, fetching artifacts, or mutating
/// the build store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreviewError {
    /// A pull request number, commit, or notification payload is malformed.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected value.
        message: String,
    },

    /// Required configuration is missing or empty.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// GitHub or CircleCI could not be reached or returned an error.
    #[error("upstream service unavailable: {message}")]
    UpstreamUnavailable {
        /// Operation and response detail from the failing call.
        message: String,
    },

    /// The artifact exceeded the configured download ceiling.
    #[error("artifact exceeds the download size limit of {limit} bytes")]
    ArtifactTooLarge {
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// The artifact archive was empty or could not be extracted.
    #[error("artifact is corrupt: {message}")]
    CorruptArtifact {
        /// Extraction failure detail.
        message: String,
    },

    /// A filesystem operation on the build store or staging area failed.
    #[error("storage error while {operation}: {message}")]
    Storage {
        /// Operation being performed, including pr/sha context.
        operation: String,
        /// Error detail from the underlying I/O operation.
        message: String,
    },
}

impl PreviewError {
    /// Returns true when retrying the same request may succeed.
    ///
    /// Upstream and storage failures can be transient; malformed input,
    /// missing configuration and unusable artifacts need a new request or a
    /// new CI run.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. } | Self::Storage { .. })
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub(crate) fn storage(operation: impl Into<String>, error: &std::io::Error) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: error.to_string(),
        }
    }

    /// Wraps a blocking filesystem task that panicked or was cancelled.
    pub(crate) fn blocking_task(
        operation: impl Into<String>,
        error: &tokio::task::JoinError,
    ) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::PreviewError;

    #[rstest]
    #[case(PreviewError::upstream("rate limited"), true)]
    #[case(
        PreviewError::storage("creating build", &std::io::Error::other("disk full")),
        true
    )]
    #[case(PreviewError::invalid_input("sha must not be empty"), false)]
    #[case(PreviewError::ArtifactTooLarge { limit: 10 }, false)]
    #[case(PreviewError::CorruptArtifact { message: "empty".to_owned() }, false)]
    #[case(PreviewError::configuration("missing label"), false)]
    fn retryable_kinds(#[case] error: PreviewError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected, "unexpected for {error:?}");
    }

    #[test]
    fn storage_error_names_operation() {
        let error = PreviewError::storage(
            "moving pr42-abc123 to public",
            &std::io::Error::other("permission denied"),
        );
        assert_eq!(
            error.to_string(),
            "storage error while moving pr42-abc123 to public: permission denied"
        );
    }
}
