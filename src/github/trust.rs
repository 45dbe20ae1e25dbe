//! Trust evaluation for pull requests.
//!
//! A pull request is trusted when it carries the configured trust label or
//! when its author is an active member of any allowed organisation team.
//! Trusted builds are published; everything else stays hidden until the
//! decision changes.

use std::sync::Arc;

use crate::error::PreviewError;

use super::gateway::{PullRequestGateway, TeamGateway};

/// Outcome of evaluating one pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustDecision {
    /// Pull request number.
    pub pr: u64,
    /// Whether builds of the pull request may be served publicly.
    pub is_public: bool,
}

/// Decides whether a pull request's builds may be public.
pub struct TrustEvaluator {
    pull_requests: Arc<dyn PullRequestGateway>,
    teams: Arc<dyn TeamGateway>,
    team_slugs: Vec<String>,
    trusted_label: String,
}

impl TrustEvaluator {
    /// Creates an evaluator consulting `team_slugs` and `trusted_label`.
    ///
    /// Blank team slugs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when no team slug remains or
    /// the trust label is blank.
    pub fn new<Slug>(
        pull_requests: Arc<dyn PullRequestGateway>,
        teams: Arc<dyn TeamGateway>,
        team_slugs: impl IntoIterator<Item = Slug>,
        trusted_label: &str,
    ) -> Result<Self, PreviewError>
    where
        Slug: AsRef<str>,
    {
        let slugs: Vec<String> = team_slugs
            .into_iter()
            .map(|slug| slug.as_ref().trim().to_owned())
            .filter(|slug| !slug.is_empty())
            .collect();
        if slugs.is_empty() {
            return Err(PreviewError::configuration(
                "at least one allowed GitHub team is required",
            ));
        }

        let label = trusted_label.trim();
        if label.is_empty() {
            return Err(PreviewError::configuration(
                "the trusted pull request label is required",
            ));
        }

        Ok(Self {
            pull_requests,
            teams,
            team_slugs: slugs,
            trusted_label: label.to_owned(),
        })
    }

    /// Returns true when builds of `pr` may be public.
    ///
    /// Team memberships are checked in configured order and the first match
    /// ends the evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for PR zero and propagates
    /// [`PreviewError::UpstreamUnavailable`] from either gateway.
    pub async fn is_trusted(&self, pr: u64) -> Result<bool, PreviewError> {
        if pr == 0 {
            return Err(PreviewError::invalid_input(
                "pull request number must be positive",
            ));
        }

        let metadata = self.pull_requests.pull_request(pr).await?;
        if metadata.has_label(&self.trusted_label) {
            tracing::debug!(pr, label = %self.trusted_label, "trusted by label");
            return Ok(true);
        }

        let Some(author) = metadata.author.as_deref() else {
            tracing::debug!(pr, "no author login, treating as untrusted");
            return Ok(false);
        };

        for slug in &self.team_slugs {
            if self.teams.is_member(slug, author).await? {
                tracing::debug!(pr, author, team = %slug, "trusted by team membership");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Evaluates `pr` into a [`TrustDecision`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::is_trusted`].
    pub async fn decide(&self, pr: u64) -> Result<TrustDecision, PreviewError> {
        let is_public = self.is_trusted(pr).await?;
        Ok(TrustDecision { pr, is_public })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;
    use rstest::rstest;

    use super::{TrustDecision, TrustEvaluator};
    use crate::error::PreviewError;
    use crate::github::gateway::{MockPullRequestGateway, MockTeamGateway};
    use crate::github::models::PullRequestMetadata;

    const LABEL: &str = "aio: preview";

    fn pull_request(author: Option<&str>, labels: &[&str]) -> MockPullRequestGateway {
        let metadata = PullRequestMetadata {
            number: 42,
            author: author.map(str::to_owned),
            labels: labels.iter().map(|label| (*label).to_owned()).collect(),
        };
        let mut gateway = MockPullRequestGateway::new();
        gateway
            .expect_pull_request()
            .with(eq(42))
            .times(1)
            .returning(move |_| Ok(metadata.clone()));
        gateway
    }

    fn evaluator(
        pull_requests: MockPullRequestGateway,
        teams: MockTeamGateway,
        slugs: &[&str],
    ) -> TrustEvaluator {
        TrustEvaluator::new(Arc::new(pull_requests), Arc::new(teams), slugs, LABEL)
            .expect("evaluator should build")
    }

    #[tokio::test]
    async fn label_alone_grants_trust_without_team_lookups() {
        let mut teams = MockTeamGateway::new();
        teams.expect_is_member().never();
        let trust = evaluator(pull_request(Some("octocat"), &[LABEL]), teams, &["core"]);

        assert!(trust.is_trusted(42).await.expect("evaluation should succeed"));
    }

    #[tokio::test]
    async fn team_lookup_stops_at_first_match() {
        let mut teams = MockTeamGateway::new();
        teams
            .expect_is_member()
            .with(eq("first"), eq("octocat"))
            .times(1)
            .returning(|_, _| Ok(false));
        teams
            .expect_is_member()
            .with(eq("second"), eq("octocat"))
            .times(1)
            .returning(|_, _| Ok(true));
        teams
            .expect_is_member()
            .with(eq("third"), eq("octocat"))
            .never();
        let trust = evaluator(
            pull_request(Some("octocat"), &["comp: docs"]),
            teams,
            &["first", "second", "third"],
        );

        assert_eq!(
            trust.decide(42).await.expect("evaluation should succeed"),
            TrustDecision {
                pr: 42,
                is_public: true
            }
        );
    }

    #[tokio::test]
    async fn outsider_without_label_is_untrusted() {
        let mut teams = MockTeamGateway::new();
        teams.expect_is_member().times(2).returning(|_, _| Ok(false));
        let trust = evaluator(pull_request(Some("stranger"), &[]), teams, &["a", "b"]);

        assert!(!trust.is_trusted(42).await.expect("evaluation should succeed"));
    }

    #[tokio::test]
    async fn missing_author_is_untrusted() {
        let mut teams = MockTeamGateway::new();
        teams.expect_is_member().never();
        let trust = evaluator(pull_request(None, &[]), teams, &["core"]);

        assert!(!trust.is_trusted(42).await.expect("evaluation should succeed"));
    }

    #[tokio::test]
    async fn membership_failure_propagates() {
        let mut teams = MockTeamGateway::new();
        teams
            .expect_is_member()
            .returning(|_, _| Err(PreviewError::upstream("GitHub is down")));
        let trust = evaluator(pull_request(Some("octocat"), &[]), teams, &["core"]);

        let result = trust.is_trusted(42).await;

        assert!(
            matches!(result, Err(PreviewError::UpstreamUnavailable { .. })),
            "expected UpstreamUnavailable, got {result:?}"
        );
    }

    #[tokio::test]
    async fn pull_request_failure_propagates() {
        let mut pull_requests = MockPullRequestGateway::new();
        pull_requests
            .expect_pull_request()
            .returning(|_| Err(PreviewError::upstream("rate limited")));
        let trust = evaluator(pull_requests, MockTeamGateway::new(), &["core"]);

        let result = trust.is_trusted(42).await;

        assert!(matches!(
            result,
            Err(PreviewError::UpstreamUnavailable { .. })
        ));
    }

    #[rstest]
    #[case::no_teams(&[], LABEL)]
    #[case::blank_teams(&["", "  "], LABEL)]
    #[case::blank_label(&["core"], " ")]
    fn construction_requires_teams_and_label(#[case] slugs: &[&str], #[case] label: &str) {
        let result = TrustEvaluator::new(
            Arc::new(MockPullRequestGateway::new()),
            Arc::new(MockTeamGateway::new()),
            slugs,
            label,
        );

        assert!(
            matches!(result, Err(PreviewError::Configuration { .. })),
            "expected a configuration error"
        );
    }
}
