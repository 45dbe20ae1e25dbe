//! Team membership lookups.

use async_trait::async_trait;
use http::StatusCode;

use crate::error::PreviewError;
use crate::github::models::{ApiTeamMembership, MembershipState};

use super::TeamGateway;
use super::error_mapping::{github_status, map_octocrab_error};
use super::pull_request::OctocrabGateway;

#[async_trait]
impl TeamGateway for OctocrabGateway {
    async fn is_member(&self, team_slug: &str, login: &str) -> Result<bool, PreviewError> {
        let path = self.locator.team_membership_path(team_slug, login);
        match self
            .client
            .get::<ApiTeamMembership, _, _>(path, None::<&()>)
            .await
        {
            Ok(membership) => Ok(membership.state == MembershipState::Active),
            // GitHub answers 404 for users outside the team.
            Err(error) if github_status(&error) == Some(StatusCode::NOT_FOUND) => Ok(false),
            Err(error) => Err(map_octocrab_error(
                &format!("checking membership of '{login}' in team '{team_slug}'"),
                &error,
            )),
        }
    }
}
