//! Reviewer selection and reassignment.
//!
//! The engine owns the random source and talks to the stores only through the
//! repository traits. It does not serialize callers itself: the service wraps
//! every pull-request operation in a per-PR lock before calling in here.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::AppointError;
use crate::model::{PullRequestId, User, UserId};
use crate::repository::{InsertOutcome, MembershipRepository, PullRequestRepository};

/// Upper bound on reviewers picked at creation time.
pub const MAX_REVIEWERS: usize = 2;

/// Result of a reassignment attempt that passed all validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassignOutcome {
    Replaced { new_reviewer: UserId },
    /// Nobody eligible; the reviewer set is unchanged.
    NoCandidate,
}

pub struct ReviewerEngine {
    membership: Arc<dyn MembershipRepository>,
    pull_requests: Arc<dyn PullRequestRepository>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ReviewerEngine {
    /// Engine backed by an OS-seeded generator.
    pub fn new(
        membership: Arc<dyn MembershipRepository>,
        pull_requests: Arc<dyn PullRequestRepository>,
    ) -> Self {
        Self::with_rng(membership, pull_requests, Box::new(StdRng::from_os_rng()))
    }

    /// Engine with a caller-supplied generator, e.g. a seeded `StdRng` in tests.
    pub fn with_rng(
        membership: Arc<dyn MembershipRepository>,
        pull_requests: Arc<dyn PullRequestRepository>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            membership,
            pull_requests,
            rng: Mutex::new(rng),
        }
    }

    /// Pick up to [`MAX_REVIEWERS`] active teammates of the author and record
    /// them on the pull request.
    ///
    /// Returns the assigned ids in draw order. An author without teammates
    /// gets no reviewers; that is not an error at this level.
    pub async fn assign_reviewers(
        &self,
        author_id: &UserId,
        pr_id: &PullRequestId,
    ) -> Result<Vec<UserId>, AppointError> {
        if self.membership.get_user(author_id).await?.is_none() {
            return Err(AppointError::AuthorNotFound(author_id.clone()));
        }

        let existing = self.pull_requests.list_reviewers_of_pr(pr_id).await?;
        let wanted = MAX_REVIEWERS.saturating_sub(existing.len());

        let teams = self.membership.list_teams_of_user(author_id).await?;
        let mut excluding: HashSet<UserId> = existing.into_iter().collect();
        excluding.insert(author_id.clone());

        let pool = self
            .membership
            .list_active_users_in_teams(&teams, &excluding)
            .await?;
        let picks = self.draw(pool, wanted);

        debug!(
            "Reviewer draw for PR {}: {} team(s), picked {:?}",
            pr_id,
            teams.len(),
            picks
        );

        let mut assigned = Vec::with_capacity(picks.len());
        for reviewer in picks {
            match self.pull_requests.add_reviewer(pr_id, &reviewer).await? {
                InsertOutcome::Inserted => assigned.push(reviewer),
                InsertOutcome::AlreadyExists => {
                    warn!(
                        "Reviewer {} already on PR {}, skipping duplicate assignment",
                        reviewer, pr_id
                    );
                }
            }
        }

        info!("Assigned {} reviewer(s) to PR {}", assigned.len(), pr_id);
        Ok(assigned)
    }

    /// Replace `old_reviewer` with a random active teammate of theirs.
    ///
    /// Validation order: PR exists, PR is open, `old_reviewer` is assigned,
    /// `old_reviewer`'s user record exists.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &PullRequestId,
        old_reviewer: &UserId,
    ) -> Result<ReassignOutcome, AppointError> {
        let pr = self
            .pull_requests
            .get_pull_request(pr_id)
            .await?
            .ok_or_else(|| AppointError::PrNotFound(pr_id.clone()))?;

        if !pr.lifecycle.accepts_reviewer_changes() {
            return Err(AppointError::PrMerged(pr_id.clone()));
        }
        if !pr.has_reviewer(old_reviewer) {
            return Err(not_assigned(pr_id, old_reviewer));
        }
        if self.membership.get_user(old_reviewer).await?.is_none() {
            return Err(AppointError::ReviewerUserNotFound(old_reviewer.clone()));
        }

        // Pool is drawn from the outgoing reviewer's teams, not the author's
        let teams = self.membership.list_teams_of_user(old_reviewer).await?;
        let mut excluding: HashSet<UserId> = pr.reviewers.iter().cloned().collect();
        excluding.insert(old_reviewer.clone());
        excluding.insert(pr.author_id.clone());

        let pool = self
            .membership
            .list_active_users_in_teams(&teams, &excluding)
            .await?;

        let Some(new_reviewer) = self.choose_one(&pool) else {
            info!(
                "No replacement candidate for {} on PR {} ({} team(s) searched)",
                old_reviewer,
                pr_id,
                teams.len()
            );
            return Ok(ReassignOutcome::NoCandidate);
        };

        let replaced = self
            .pull_requests
            .replace_reviewer(pr_id, old_reviewer, &new_reviewer)
            .await?;
        if !replaced {
            // Someone else changed the reviewer set between our read and write
            return Err(not_assigned(pr_id, old_reviewer));
        }

        info!(
            "Reassigned PR {}: {} -> {}",
            pr_id, old_reviewer, new_reviewer
        );
        Ok(ReassignOutcome::Replaced { new_reviewer })
    }

    /// Uniform draw of up to `count` users without replacement, in draw order.
    fn draw(&self, mut pool: Vec<User>, count: usize) -> Vec<UserId> {
        let count = count.min(pool.len());
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let (picked, _) = pool.partial_shuffle(&mut *rng, count);
        picked.iter().map(|u| u.user_id.clone()).collect()
    }

    fn choose_one(&self, pool: &[User]) -> Option<UserId> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pool.choose(&mut *rng).map(|u| u.user_id.clone())
    }
}

fn not_assigned(pr_id: &PullRequestId, reviewer: &UserId) -> AppointError {
    AppointError::ReviewerNotAssigned {
        pull_request: pr_id.clone(),
        reviewer: reviewer.clone(),
    }
}
