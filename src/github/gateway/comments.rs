//! Issue comment posting.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PreviewError;

use super::CommentGateway;
use super::error_mapping::map_octocrab_error;
use super::pull_request::OctocrabGateway;

#[derive(Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

#[async_trait]
impl CommentGateway for OctocrabGateway {
    async fn add_comment(&self, pr: u64, body: &str) -> Result<(), PreviewError> {
        self.client
            .post::<_, serde_json::Value>(
                self.locator.comments_path(pr),
                Some(&NewComment { body }),
            )
            .await
            .map(|_| ())
            .map_err(|error| map_octocrab_error(&format!("commenting on PR #{pr}"), &error))
    }
}
