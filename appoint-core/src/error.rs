//! Error taxonomy for the appointment core.
//!
//! Callers branch on [`ErrorKind`] (or the stable string from
//! [`AppointError::code`]), never on the message text.

use thiserror::Error;

use crate::model::{PullRequestId, TeamName, UserId};

/// Failure inside a store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("corrupt {what} in storage")]
    Corruption { what: &'static str },
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: &'static str) -> Self {
        Self::Corruption { what }
    }
}

/// Machine-readable category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced author, user, team, pull request or reviewer does not exist.
    NotFound,
    /// Duplicate identity on creation.
    AlreadyExists,
    /// The pull request's status forbids the operation.
    InvalidState,
    /// The reviewer is not assigned to the pull request.
    NotAssigned,
    /// Valid request, but nobody is eligible as a replacement.
    NoCandidate,
    Internal,
}

impl ErrorKind {
    /// True for the kinds reported as conflicts rather than missing resources.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists | Self::InvalidState | Self::NotAssigned | Self::NoCandidate
        )
    }
}

#[derive(Debug, Error)]
pub enum AppointError {
    #[error("author {0} not found")]
    AuthorNotFound(UserId),

    #[error("author {0} is not a member of any team")]
    AuthorHasNoTeam(UserId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("team {0} not found")]
    TeamNotFound(TeamName),

    #[error("pull request {0} not found")]
    PrNotFound(PullRequestId),

    #[error("reviewer user {0} not found")]
    ReviewerUserNotFound(UserId),

    #[error("pull request {0} already exists")]
    PrAlreadyExists(PullRequestId),

    #[error("team {0} already exists")]
    TeamAlreadyExists(TeamName),

    #[error("cannot reassign on merged pull request {0}")]
    PrMerged(PullRequestId),

    #[error("reviewer {reviewer} is not assigned to pull request {pull_request}")]
    ReviewerNotAssigned {
        pull_request: PullRequestId,
        reviewer: UserId,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AppointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthorNotFound(_)
            | Self::AuthorHasNoTeam(_)
            | Self::UserNotFound(_)
            | Self::TeamNotFound(_)
            | Self::PrNotFound(_)
            | Self::ReviewerUserNotFound(_) => ErrorKind::NotFound,
            Self::PrAlreadyExists(_) | Self::TeamAlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::PrMerged(_) => ErrorKind::InvalidState,
            Self::ReviewerNotAssigned { .. } => ErrorKind::NotAssigned,
            Self::Repository(_) => ErrorKind::Internal,
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PrAlreadyExists(_) => "PR_EXISTS",
            Self::TeamAlreadyExists(_) => "TEAM_EXISTS",
            Self::PrMerged(_) => "PR_MERGED",
            Self::ReviewerNotAssigned { .. } => "NOT_ASSIGNED",
            Self::Repository(_) => "INTERNAL",
            _ => "NOT_FOUND",
        }
    }
}
