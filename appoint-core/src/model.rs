//! Domain types for users, teams and pull requests.
//!
//! Identifiers are newtypes so a user id can never be passed where a pull
//! request id is expected. Membership is not stored on these types: the
//! user↔team relation lives in the repository as two lookup indices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::{PrLifecycle, PrStatus};

/// Newtype for a user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a team name, which is also the team's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamName(pub String);

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TeamName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TeamName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a pull request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestId(pub String);

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PullRequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PullRequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub is_active: bool,
}

impl User {
    pub fn new(user_id: impl Into<UserId>, username: impl Into<String>, is_active: bool) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_active,
        }
    }
}

/// A team together with its current members, ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub team_name: TeamName,
    pub members: Vec<User>,
}

/// A pull request and its current reviewer set.
///
/// `reviewers` is kept in assignment order. The status and merge timestamp
/// are folded into [`PrLifecycle`] so they cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub pull_request_id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub lifecycle: PrLifecycle,
    pub created_at: DateTime<Utc>,
    pub reviewers: Vec<UserId>,
}

impl PullRequest {
    /// A freshly created pull request: open, with no reviewers yet.
    pub fn open(
        pull_request_id: impl Into<PullRequestId>,
        name: impl Into<String>,
        author_id: impl Into<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pull_request_id: pull_request_id.into(),
            name: name.into(),
            author_id: author_id.into(),
            lifecycle: PrLifecycle::Open,
            created_at,
            reviewers: Vec::new(),
        }
    }

    pub fn status(&self) -> PrStatus {
        self.lifecycle.status()
    }

    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.merged_at()
    }

    pub fn has_reviewer(&self, user_id: &UserId) -> bool {
        self.reviewers.iter().any(|r| r == user_id)
    }
}
