//! Repository abstraction for membership and pull request persistence.
//!
//! The engine only talks to these traits, so the same selection logic runs
//! against the in-memory backend (tests, `STORAGE_BACKEND=memory`) and the
//! SQLite backend in the server crate.

mod memory;

pub use memory::InMemoryRepository;

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RepositoryError;
use crate::model::{PullRequest, PullRequestId, Team, TeamName, User, UserId};

/// Result of inserting a row whose identity must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written.
    Inserted,
    /// A row with the same identity already exists; nothing was written.
    AlreadyExists,
}

/// Read/write access to users, teams and their memberships.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Get a user, returning None if not found.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// All users, ordered by user id.
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Teams the user belongs to. Empty for unknown users.
    async fn list_teams_of_user(
        &self,
        user_id: &UserId,
    ) -> Result<BTreeSet<TeamName>, RepositoryError>;

    /// Active users belonging to at least one of `teams`, minus `excluding`.
    ///
    /// Each user appears once even when they share several of the teams.
    /// Results are ordered by user id so a seeded random draw over them is
    /// reproducible across backends.
    async fn list_active_users_in_teams(
        &self,
        teams: &BTreeSet<TeamName>,
        excluding: &HashSet<UserId>,
    ) -> Result<Vec<User>, RepositoryError>;

    /// Get a team with its members, returning None if not found.
    async fn get_team(&self, team_name: &TeamName) -> Result<Option<Team>, RepositoryError>;

    /// Create a team and upsert its members in one step.
    ///
    /// Existing users have their username and active flag overwritten by the
    /// values in `members`. When the team name is taken nothing is written.
    async fn create_team(
        &self,
        team_name: &TeamName,
        members: &[User],
    ) -> Result<InsertOutcome, RepositoryError>;

    /// Set a user's active flag, returning the updated user or None if unknown.
    async fn set_user_active(
        &self,
        user_id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError>;
}

/// Read/write access to pull requests and their reviewer assignments.
#[async_trait]
pub trait PullRequestRepository: Send + Sync {
    /// Get a pull request with its reviewers, returning None if not found.
    async fn get_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError>;

    /// Insert a new pull request together with any reviewers it carries.
    async fn insert_pull_request(&self, pr: &PullRequest)
        -> Result<InsertOutcome, RepositoryError>;

    /// Reviewer ids of a pull request in assignment order.
    async fn list_reviewers_of_pr(&self, id: &PullRequestId)
        -> Result<Vec<UserId>, RepositoryError>;

    /// Append a reviewer assignment.
    ///
    /// Returns `AlreadyExists` if the reviewer is already on the pull request.
    async fn add_reviewer(
        &self,
        id: &PullRequestId,
        reviewer: &UserId,
    ) -> Result<InsertOutcome, RepositoryError>;

    /// Remove a reviewer assignment. Returns false if it did not exist.
    async fn remove_reviewer(
        &self,
        id: &PullRequestId,
        reviewer: &UserId,
    ) -> Result<bool, RepositoryError>;

    /// Atomically remove `old` and append `new`.
    ///
    /// Either both changes are applied or neither is. Returns false (and
    /// changes nothing) if `old` is not currently assigned or `new` already is.
    async fn replace_reviewer(
        &self,
        id: &PullRequestId,
        old: &UserId,
        new: &UserId,
    ) -> Result<bool, RepositoryError>;

    /// Record the merge of a pull request.
    ///
    /// Only an open pull request is changed; returns false if the pull
    /// request is missing or already merged.
    async fn set_merged(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// All pull requests, ordered by id.
    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>, RepositoryError>;

    /// Pull requests on which `reviewer` is currently assigned, ordered by id.
    async fn list_prs_reviewed_by(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError>;
}
