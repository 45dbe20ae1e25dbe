//! Directory naming for builds inside the store.
//!
//! The store root holds a `public/` and a `hidden/` subtree. Each build lives
//! in exactly one of them under a directory named `pr<N>-<sha>`. Names that
//! start with a dot are store-internal temporaries.

use crate::error::PreviewError;

pub(crate) const PUBLIC_DIR: &str = "public";
pub(crate) const HIDDEN_DIR: &str = "hidden";

pub(crate) const TRASH_PREFIX: &str = ".trash-";

/// Returns the subtree name for the given visibility.
pub(crate) const fn subtree_name(is_public: bool) -> &'static str {
    if is_public { PUBLIC_DIR } else { HIDDEN_DIR }
}

/// Validated `(pull request, commit)` pair identifying one build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildKey {
    pr: u64,
    sha: String,
}

impl BuildKey {
    /// Validates a pull request number and commit identifier.
    ///
    /// The commit must be non-empty and consist of ASCII alphanumerics, `-`
    /// or `_` so that it can be embedded in a directory name.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] when `pr` is zero or `sha` is
    /// empty or contains other characters.
    pub fn new(pr: u64, sha: &str) -> Result<Self, PreviewError> {
        validate_pr(pr)?;
        if sha.is_empty() {
            return Err(PreviewError::invalid_input(format!(
                "commit for PR {pr} must not be empty"
            )));
        }
        if !sha.chars().all(is_sha_char) {
            return Err(PreviewError::invalid_input(format!(
                "commit '{sha}' for PR {pr} contains unsupported characters"
            )));
        }
        Ok(Self {
            pr,
            sha: sha.to_owned(),
        })
    }

    /// Pull request number.
    #[must_use]
    pub const fn pr(&self) -> u64 {
        self.pr
    }

    /// Commit identifier.
    #[must_use]
    pub fn sha(&self) -> &str {
        self.sha.as_str()
    }

    /// Directory name used for this build in either subtree.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("pr{}-{}", self.pr, self.sha)
    }

    /// Recovers the pair from a directory name produced by [`Self::dir_name`].
    ///
    /// Names that [`Self::dir_name`] would spell differently, such as
    /// `pr007-abc`, are not builds.
    #[must_use]
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        let (number, sha) = name.strip_prefix("pr")?.split_once('-')?;
        if number.is_empty() || !number.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }
        let pr = number.parse::<u64>().ok()?;
        Self::new(pr, sha).ok().filter(|key| key.dir_name() == name)
    }
}

/// Rejects pull request number zero.
pub(crate) fn validate_pr(pr: u64) -> Result<(), PreviewError> {
    if pr == 0 {
        return Err(PreviewError::invalid_input(
            "pull request number must be a positive integer",
        ));
    }
    Ok(())
}

const fn is_sha_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_')
}
