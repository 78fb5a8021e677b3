//! Aggregate counts over pull requests and reviewer assignments.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::lifecycle::PrStatus;
use crate::model::{PullRequest, User, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrStatistics {
    pub total_prs: usize,
    pub open_prs: usize,
    pub merged_prs: usize,
    pub prs_with_reviewers: usize,
    /// Mean reviewer count, rounded to two decimals. Zero with no pull requests.
    pub average_reviewers_per_pr: f64,
}

impl PrStatistics {
    pub fn from_pull_requests(prs: &[PullRequest]) -> Self {
        let total_prs = prs.len();
        let open_prs = prs.iter().filter(|pr| pr.status() == PrStatus::Open).count();
        let prs_with_reviewers = prs.iter().filter(|pr| !pr.reviewers.is_empty()).count();
        let total_reviewers: usize = prs.iter().map(|pr| pr.reviewers.len()).sum();

        let average_reviewers_per_pr = if total_prs == 0 {
            0.0
        } else {
            round2(total_reviewers as f64 / total_prs as f64)
        };

        Self {
            total_prs,
            open_prs,
            merged_prs: total_prs - open_prs,
            prs_with_reviewers,
            average_reviewers_per_pr,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Number of current assignments per reviewer, keyed by username.
///
/// Only users holding at least one assignment appear. Assignments pointing
/// at unknown users are ignored. Users sharing a username are summed.
pub fn reviewer_assignment_counts(users: &[User], prs: &[PullRequest]) -> BTreeMap<String, usize> {
    let usernames: HashMap<&UserId, &str> = users
        .iter()
        .map(|u| (&u.user_id, u.username.as_str()))
        .collect();

    let mut counts = BTreeMap::new();
    for reviewer in prs.iter().flat_map(|pr| pr.reviewers.iter()) {
        if let Some(username) = usernames.get(reviewer) {
            *counts.entry(username.to_string()).or_default() += 1;
        }
    }
    counts
}
