//! Request and response bodies.
//!
//! Field names are snake_case on the wire, except the pull request
//! timestamps which are `createdAt` / `mergedAt`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use appoint_core::{PrStatus, PullRequest, PullRequestId, Team, User, UserId, UserProfile};

use crate::error::{validate_field, ApiResult};

pub const MAX_ID_CHARS: usize = 100;
pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_PR_NAME_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMemberDto {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl From<User> for TeamMemberDto {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id.0,
            username: user.username,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamDto {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMemberDto>,
}

impl TeamDto {
    pub fn validate(&self) -> ApiResult<()> {
        validate_field("team_name", &self.team_name, MAX_NAME_CHARS)?;
        for member in &self.members {
            validate_field("user_id", &member.user_id, MAX_ID_CHARS)?;
            validate_field("username", &member.username, MAX_NAME_CHARS)?;
        }
        Ok(())
    }

    pub fn members_as_users(&self) -> Vec<User> {
        self.members
            .iter()
            .map(|m| User::new(m.user_id.as_str(), m.username.as_str(), m.is_active))
            .collect()
    }
}

impl From<Team> for TeamDto {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.team_name.0,
            members: team.members.into_iter().map(TeamMemberDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: TeamDto,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
    /// One of the user's teams, or empty if they have none.
    pub team_name: String,
    pub is_active: bool,
}

impl From<UserProfile> for UserDto {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user.user_id.0,
            username: profile.user.username,
            team_name: profile.team_name.map(|t| t.0).unwrap_or_default(),
            is_active: profile.user.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequestDto {
    pub pull_request_id: PullRequestId,
    pub pull_request_name: String,
    pub author_id: UserId,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<UserId>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<PullRequest> for PullRequestDto {
    fn from(pr: PullRequest) -> Self {
        let status = pr.status();
        let merged_at = pr.merged_at();
        Self {
            pull_request_id: pr.pull_request_id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status,
            assigned_reviewers: pr.reviewers,
            created_at: pr.created_at,
            merged_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequestShortDto {
    pub pull_request_id: PullRequestId,
    pub pull_request_name: String,
    pub author_id: UserId,
    pub status: PrStatus,
}

impl From<PullRequest> for PullRequestShortDto {
    fn from(pr: PullRequest) -> Self {
        let status = pr.status();
        Self {
            pull_request_id: pr.pull_request_id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestResponse {
    pub pr: PullRequestDto,
}

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

impl CreatePullRequestRequest {
    pub fn validate(&self) -> ApiResult<()> {
        validate_field("pull_request_id", &self.pull_request_id, MAX_ID_CHARS)?;
        validate_field("pull_request_name", &self.pull_request_name, MAX_PR_NAME_CHARS)?;
        validate_field("author_id", &self.author_id, MAX_ID_CHARS)
    }
}

#[derive(Debug, Deserialize)]
pub struct MergePullRequestRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignReviewerRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReassignReviewerResponse {
    pub pr: PullRequestDto,
    pub replaced_by: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetReviewResponse {
    pub user_id: UserId,
    pub pull_requests: Vec<PullRequestShortDto>,
}
