//! Posts preview links on pull requests as builds become public.

use std::sync::Arc;

use crate::error::PreviewError;
use crate::events::{EventReceiver, LifecycleEvent};
use crate::github::CommentGateway;

/// Consumes lifecycle events and comments on the affected pull request.
pub struct CommentNotifier {
    comments: Arc<dyn CommentGateway>,
    domain_name: String,
}

impl CommentNotifier {
    /// Creates a notifier linking to previews under `domain_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Configuration`] when the domain is blank.
    pub fn new(comments: Arc<dyn CommentGateway>, domain_name: &str) -> Result<Self, PreviewError> {
        let domain = domain_name.trim();
        if domain.is_empty() {
            return Err(PreviewError::configuration("the preview domain name is required"));
        }
        Ok(Self {
            comments,
            domain_name: domain.to_owned(),
        })
    }

    /// Drains `receiver` until every emitter has been dropped.
    ///
    /// Failures to post are logged and do not stop the loop.
    pub async fn run(self, mut receiver: EventReceiver) {
        while let Some(event) = receiver.recv().await {
            self.notify(&event).await;
        }
        tracing::debug!("lifecycle event channel closed");
    }

    async fn notify(&self, event: &LifecycleEvent) {
        let Some(body) = self.comment_for(event) else {
            return;
        };
        let pr = event.pr();
        match self.comments.add_comment(pr, &body).await {
            Ok(()) => tracing::info!(pr, "posted preview comment"),
            Err(error) => tracing::warn!(pr, "failed to post preview comment: {error}"),
        }
    }

    /// Comment announcing the public previews of `event`, if any.
    #[must_use]
    pub fn comment_for(&self, event: &LifecycleEvent) -> Option<String> {
        match event {
            LifecycleEvent::BuildCreated {
                pr,
                sha,
                is_public: true,
            } => Some(self.preview_line(*pr, sha)),
            LifecycleEvent::VisibilityChanged {
                pr,
                shas,
                is_public: true,
            } if !shas.is_empty() => Some(
                shas.iter()
                    .map(|sha| self.preview_line(*pr, sha))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }

    fn preview_line(&self, pr: u64, sha: &str) -> String {
        format!(
            "You can preview {sha} at https://pr{pr}-{sha}.{domain}/.",
            domain = self.domain_name
        )
    }
}
