//! Pull request status state machine.
//!
//! A pull request is either `Open` or `Merged`. The only transition is
//! `Open -> Merged`, and merging is idempotent: a merge request against a
//! merged pull request leaves it untouched. The merge timestamp lives inside
//! the `Merged` variant, so "merged without a timestamp" cannot be expressed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire-level status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(format!("unknown pull request status '{}'", other)),
        }
    }
}

/// Lifecycle state of a single pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrLifecycle {
    #[default]
    Open,
    /// Terminal. Reviewer set and status are frozen.
    Merged { merged_at: DateTime<Utc> },
}

/// Result of applying a merge request to a lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeTransition {
    pub state: PrLifecycle,
    /// `false` when the pull request was already merged.
    pub transitioned: bool,
}

impl PrLifecycle {
    /// Rebuild a lifecycle from its stored columns.
    ///
    /// Returns `None` for combinations that violate the state machine
    /// (merged without a timestamp, or open with one).
    pub fn from_parts(status: PrStatus, merged_at: Option<DateTime<Utc>>) -> Option<Self> {
        match (status, merged_at) {
            (PrStatus::Open, None) => Some(Self::Open),
            (PrStatus::Merged, Some(merged_at)) => Some(Self::Merged { merged_at }),
            _ => None,
        }
    }

    pub fn status(&self) -> PrStatus {
        match self {
            Self::Open => PrStatus::Open,
            Self::Merged { .. } => PrStatus::Merged,
        }
    }

    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Open => None,
            Self::Merged { merged_at } => Some(*merged_at),
        }
    }

    /// Whether reviewers may still be added, removed or replaced.
    pub fn accepts_reviewer_changes(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Apply a merge request at time `at`.
    pub fn merge(self, at: DateTime<Utc>) -> MergeTransition {
        match self {
            Self::Open => MergeTransition {
                state: Self::Merged { merged_at: at },
                transitioned: true,
            },
            merged @ Self::Merged { .. } => MergeTransition {
                state: merged,
                transitioned: false,
            },
        }
    }
}
