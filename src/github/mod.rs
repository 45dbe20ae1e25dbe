//! GitHub access for trust decisions and preview notifications.
//!
//! This module wraps Octocrab behind gateway traits, maps its failures into
//! [`PreviewError`](crate::PreviewError) values, and builds the
//! [`TrustEvaluator`] that decides whether a pull request's builds may be
//! served publicly.

pub mod gateway;
pub mod locator;
pub mod models;
pub mod trust;

pub use gateway::{CommentGateway, OctocrabGateway, PullRequestGateway, TeamGateway};
pub use locator::{PersonalAccessToken, RepositoryLocator, RepositoryName, RepositoryOwner};
pub use models::{MembershipState, PullRequestMetadata};
pub use trust::{TrustDecision, TrustEvaluator};

#[cfg(test)]
pub use gateway::{MockCommentGateway, MockPullRequestGateway, MockTeamGateway};
