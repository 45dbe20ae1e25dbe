//! Preview build lifecycle for pull requests.
//!
//! The library turns CI build notifications into servable preview builds:
//! it resolves the build on CircleCI, checks that the pull request touches
//! significant files, downloads and unpacks the artifact, decides through
//! GitHub whether the pull request is trusted and stores the build in the
//! public or hidden subtree of the builds directory. Pull request
//! notifications move existing builds when trust changes, and public builds
//! are announced with a comment on the pull request.

pub mod artifact;
pub mod circleci;
pub mod config;
pub mod error;
pub mod events;
pub mod github;
pub mod notify;
pub mod service;
pub mod store;
pub mod telemetry;

pub use artifact::{ArtifactFetcher, DownloadedArtifact, StagedArtifact};
pub use circleci::{BuildInfo, CiGateway, CircleCiClient};
pub use config::{OperationMode, PreviewConfig};
pub use error::PreviewError;
pub use events::{EventEmitter, EventReceiver, LifecycleEvent};
pub use github::{
    CommentGateway, OctocrabGateway, PersonalAccessToken, PullRequestGateway, RepositoryLocator,
    TeamGateway, TrustEvaluator,
};
pub use notify::CommentNotifier;
pub use service::{
    BuildNotification, BuildOutcome, PrNotification, PrOutcome, PreviewService, ServiceSettings,
    SkipReason,
};
pub use store::{BuildStore, PreviewBuild};
