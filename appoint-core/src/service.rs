//! Appointment flows: pull request creation, merge and reassignment, plus the
//! team and user operations around them.
//!
//! Every flow touching a pull request holds that pull request's lock for its
//! whole read-then-write sequence. Operations on different pull requests run
//! concurrently.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::engine::{ReassignOutcome, ReviewerEngine};
use crate::error::AppointError;
use crate::model::{PullRequest, PullRequestId, Team, TeamName, User, UserId};
use crate::repository::{InsertOutcome, MembershipRepository, PullRequestRepository};
use crate::statistics::{self, PrStatistics};

/// Pull request state after a reassignment, together with what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignResult {
    pub pull_request: PullRequest,
    pub outcome: ReassignOutcome,
}

/// A user plus one of their teams (the first by name), if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user: User,
    pub team_name: Option<TeamName>,
}

pub struct AppointService {
    membership: Arc<dyn MembershipRepository>,
    pull_requests: Arc<dyn PullRequestRepository>,
    engine: ReviewerEngine,
    /// Per-PR locks serializing the flows on a single pull request.
    pr_locks: RwLock<HashMap<PullRequestId, Arc<Mutex<()>>>>,
}

impl AppointService {
    pub fn new(
        membership: Arc<dyn MembershipRepository>,
        pull_requests: Arc<dyn PullRequestRepository>,
    ) -> Self {
        let engine = ReviewerEngine::new(membership.clone(), pull_requests.clone());
        Self::from_parts(membership, pull_requests, engine)
    }

    pub fn with_rng(
        membership: Arc<dyn MembershipRepository>,
        pull_requests: Arc<dyn PullRequestRepository>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let engine = ReviewerEngine::with_rng(membership.clone(), pull_requests.clone(), rng);
        Self::from_parts(membership, pull_requests, engine)
    }

    fn from_parts(
        membership: Arc<dyn MembershipRepository>,
        pull_requests: Arc<dyn PullRequestRepository>,
        engine: ReviewerEngine,
    ) -> Self {
        Self {
            membership,
            pull_requests,
            engine,
            pr_locks: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_create_pr_lock(&self, pr_id: &PullRequestId) -> Arc<Mutex<()>> {
        {
            let locks = self.pr_locks.read().await;
            if let Some(lock) = locks.get(pr_id) {
                return lock.clone();
            }
        }

        // Double-check under the write lock
        let mut locks = self.pr_locks.write().await;
        locks
            .entry(pr_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_pr(&self, pr_id: &PullRequestId) -> Result<PullRequest, AppointError> {
        self.pull_requests
            .get_pull_request(pr_id)
            .await?
            .ok_or_else(|| AppointError::PrNotFound(pr_id.clone()))
    }

    /// Drop the lock entry of a pull request that does not exist.
    ///
    /// Must be called while holding `pr_lock`. The entry stays if another
    /// caller already holds a clone of it.
    async fn release_pr_lock(&self, pr_id: &PullRequestId, pr_lock: &Arc<Mutex<()>>) {
        let mut locks = self.pr_locks.write().await;
        // One reference in the map, one held by us
        if Arc::strong_count(pr_lock) <= 2 {
            locks.remove(pr_id);
        }
    }

    /// Create an open pull request and appoint its reviewers.
    pub async fn create_pull_request(
        &self,
        pr_id: PullRequestId,
        name: String,
        author_id: UserId,
    ) -> Result<PullRequest, AppointError> {
        let pr_lock = self.get_or_create_pr_lock(&pr_id).await;
        let _guard = pr_lock.lock().await;

        if let Err(e) = self.check_creatable(&pr_id, &author_id).await {
            if !matches!(e, AppointError::PrAlreadyExists(_)) {
                self.release_pr_lock(&pr_id, &pr_lock).await;
            }
            return Err(e);
        }

        let pr = PullRequest::open(pr_id.clone(), name, author_id.clone(), Utc::now());
        if self.pull_requests.insert_pull_request(&pr).await? == InsertOutcome::AlreadyExists {
            // Written by another process sharing the store
            return Err(AppointError::PrAlreadyExists(pr_id));
        }

        self.engine.assign_reviewers(&author_id, &pr_id).await?;
        self.load_pr(&pr_id).await
    }

    async fn check_creatable(
        &self,
        pr_id: &PullRequestId,
        author_id: &UserId,
    ) -> Result<(), AppointError> {
        if self.pull_requests.get_pull_request(pr_id).await?.is_some() {
            return Err(AppointError::PrAlreadyExists(pr_id.clone()));
        }
        if self.membership.get_user(author_id).await?.is_none() {
            return Err(AppointError::AuthorNotFound(author_id.clone()));
        }
        if self.membership.list_teams_of_user(author_id).await?.is_empty() {
            return Err(AppointError::AuthorHasNoTeam(author_id.clone()));
        }
        Ok(())
    }

    /// Merge a pull request. Merging a merged pull request changes nothing.
    pub async fn merge_pull_request(
        &self,
        pr_id: &PullRequestId,
    ) -> Result<PullRequest, AppointError> {
        let pr_lock = self.get_or_create_pr_lock(pr_id).await;
        let _guard = pr_lock.lock().await;

        let result = self.merge_locked(pr_id).await;
        if let Err(AppointError::PrNotFound(_)) = result {
            self.release_pr_lock(pr_id, &pr_lock).await;
        }
        result
    }

    async fn merge_locked(&self, pr_id: &PullRequestId) -> Result<PullRequest, AppointError> {
        let pr = self.load_pr(pr_id).await?;
        let transition = pr.lifecycle.merge(Utc::now());
        if !transition.transitioned {
            return Ok(pr);
        }

        let Some(merged_at) = transition.state.merged_at() else {
            return Ok(pr);
        };
        if self.pull_requests.set_merged(pr_id, merged_at).await? {
            info!("Merged PR {} at {}", pr_id, merged_at);
        } else {
            warn!("PR {} was merged concurrently, keeping stored merge time", pr_id);
        }
        self.load_pr(pr_id).await
    }

    /// Replace one reviewer of an open pull request.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &PullRequestId,
        old_reviewer: &UserId,
    ) -> Result<ReassignResult, AppointError> {
        let pr_lock = self.get_or_create_pr_lock(pr_id).await;
        let _guard = pr_lock.lock().await;

        let outcome = match self.engine.reassign_reviewer(pr_id, old_reviewer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let AppointError::PrNotFound(_) = e {
                    self.release_pr_lock(pr_id, &pr_lock).await;
                }
                return Err(e);
            }
        };
        let pull_request = self.load_pr(pr_id).await?;
        Ok(ReassignResult {
            pull_request,
            outcome,
        })
    }

    /// Create a team, creating or overwriting its member users.
    ///
    /// If a user id is listed twice, the first entry wins.
    pub async fn add_team(
        &self,
        team_name: TeamName,
        members: Vec<User>,
    ) -> Result<Team, AppointError> {
        let mut seen = HashSet::new();
        let members: Vec<User> = members
            .into_iter()
            .filter(|m| seen.insert(m.user_id.clone()))
            .collect();

        match self.membership.create_team(&team_name, &members).await? {
            InsertOutcome::AlreadyExists => Err(AppointError::TeamAlreadyExists(team_name)),
            InsertOutcome::Inserted => {
                info!("Created team {} with {} member(s)", team_name, members.len());
                self.get_team(&team_name).await
            }
        }
    }

    pub async fn get_team(&self, team_name: &TeamName) -> Result<Team, AppointError> {
        self.membership
            .get_team(team_name)
            .await?
            .ok_or_else(|| AppointError::TeamNotFound(team_name.clone()))
    }

    pub async fn set_user_active(
        &self,
        user_id: &UserId,
        is_active: bool,
    ) -> Result<UserProfile, AppointError> {
        let user = self
            .membership
            .set_user_active(user_id, is_active)
            .await?
            .ok_or_else(|| AppointError::UserNotFound(user_id.clone()))?;
        let team_name = self
            .membership
            .list_teams_of_user(user_id)
            .await?
            .into_iter()
            .next();

        info!("User {} is_active set to {}", user_id, is_active);
        Ok(UserProfile { user, team_name })
    }

    /// Pull requests the user currently reviews, ordered by id.
    pub async fn reviews_of_user(&self, user_id: &UserId) -> Result<Vec<PullRequest>, AppointError> {
        if self.membership.get_user(user_id).await?.is_none() {
            return Err(AppointError::UserNotFound(user_id.clone()));
        }
        Ok(self.pull_requests.list_prs_reviewed_by(user_id).await?)
    }

    pub async fn reviewer_assignment_counts(&self) -> Result<BTreeMap<String, usize>, AppointError> {
        let users = self.membership.list_users().await?;
        let prs = self.pull_requests.list_pull_requests().await?;
        Ok(statistics::reviewer_assignment_counts(&users, &prs))
    }

    pub async fn pr_statistics(&self) -> Result<PrStatistics, AppointError> {
        let prs = self.pull_requests.list_pull_requests().await?;
        Ok(PrStatistics::from_pull_requests(&prs))
    }
}
