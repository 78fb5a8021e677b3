//! In-memory implementation of the repository traits.
//!
//! All state is held in memory and lost on restart.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{InsertOutcome, MembershipRepository, PullRequestRepository};
use crate::error::RepositoryError;
use crate::lifecycle::PrLifecycle;
use crate::model::{PullRequest, PullRequestId, Team, TeamName, User, UserId};

/// User records plus the two membership indices.
///
/// `teams_by_user` and `members_by_team` always describe the same relation;
/// they are only mutated together under the same write lock.
#[derive(Default)]
struct MembershipIndex {
    users: HashMap<UserId, User>,
    teams_by_user: HashMap<UserId, BTreeSet<TeamName>>,
    members_by_team: BTreeMap<TeamName, BTreeSet<UserId>>,
}

/// In-memory repository.
///
/// Membership and pull requests sit behind separate `RwLock`s; every
/// multi-step mutation (team creation, reviewer replacement) happens under a
/// single write guard so readers never see it half-applied.
pub struct InMemoryRepository {
    membership: RwLock<MembershipIndex>,
    pull_requests: RwLock<BTreeMap<PullRequestId, PullRequest>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            membership: RwLock::new(MembershipIndex::default()),
            pull_requests: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryRepository {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError> {
        let index = self.membership.read().await;
        Ok(index.users.get(user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let index = self.membership.read().await;
        let mut users: Vec<User> = index.users.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    async fn list_teams_of_user(
        &self,
        user_id: &UserId,
    ) -> Result<BTreeSet<TeamName>, RepositoryError> {
        let index = self.membership.read().await;
        Ok(index
            .teams_by_user
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_active_users_in_teams(
        &self,
        teams: &BTreeSet<TeamName>,
        excluding: &HashSet<UserId>,
    ) -> Result<Vec<User>, RepositoryError> {
        let index = self.membership.read().await;

        // BTreeSet dedups users sharing several teams and fixes the order
        let member_ids: BTreeSet<&UserId> = teams
            .iter()
            .filter_map(|team| index.members_by_team.get(team))
            .flatten()
            .filter(|id| !excluding.contains(*id))
            .collect();

        Ok(member_ids
            .into_iter()
            .filter_map(|id| index.users.get(id))
            .filter(|user| user.is_active)
            .cloned()
            .collect())
    }

    async fn get_team(&self, team_name: &TeamName) -> Result<Option<Team>, RepositoryError> {
        let index = self.membership.read().await;
        Ok(index.members_by_team.get(team_name).map(|member_ids| Team {
            team_name: team_name.clone(),
            members: member_ids
                .iter()
                .filter_map(|id| index.users.get(id).cloned())
                .collect(),
        }))
    }

    async fn create_team(
        &self,
        team_name: &TeamName,
        members: &[User],
    ) -> Result<InsertOutcome, RepositoryError> {
        let mut index = self.membership.write().await;
        if index.members_by_team.contains_key(team_name) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let mut member_ids = BTreeSet::new();
        for member in members {
            index.users.insert(member.user_id.clone(), member.clone());
            index
                .teams_by_user
                .entry(member.user_id.clone())
                .or_default()
                .insert(team_name.clone());
            member_ids.insert(member.user_id.clone());
        }
        index.members_by_team.insert(team_name.clone(), member_ids);

        Ok(InsertOutcome::Inserted)
    }

    async fn set_user_active(
        &self,
        user_id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let mut index = self.membership.write().await;
        Ok(index.users.get_mut(user_id).map(|user| {
            user.is_active = is_active;
            user.clone()
        }))
    }
}

#[async_trait]
impl PullRequestRepository for InMemoryRepository {
    async fn get_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        let prs = self.pull_requests.read().await;
        Ok(prs.get(id).cloned())
    }

    async fn insert_pull_request(
        &self,
        pr: &PullRequest,
    ) -> Result<InsertOutcome, RepositoryError> {
        use std::collections::btree_map::Entry;

        let mut prs = self.pull_requests.write().await;
        match prs.entry(pr.pull_request_id.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(pr.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn list_reviewers_of_pr(
        &self,
        id: &PullRequestId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let prs = self.pull_requests.read().await;
        Ok(prs
            .get(id)
            .map(|pr| pr.reviewers.clone())
            .unwrap_or_default())
    }

    async fn add_reviewer(
        &self,
        id: &PullRequestId,
        reviewer: &UserId,
    ) -> Result<InsertOutcome, RepositoryError> {
        let mut prs = self.pull_requests.write().await;
        let pr = prs.get_mut(id).ok_or_else(|| {
            RepositoryError::storage("add_reviewer", format!("pull request {} missing", id))
        })?;

        if pr.has_reviewer(reviewer) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        pr.reviewers.push(reviewer.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn remove_reviewer(
        &self,
        id: &PullRequestId,
        reviewer: &UserId,
    ) -> Result<bool, RepositoryError> {
        let mut prs = self.pull_requests.write().await;
        let Some(pr) = prs.get_mut(id) else {
            return Ok(false);
        };
        let before = pr.reviewers.len();
        pr.reviewers.retain(|r| r != reviewer);
        Ok(pr.reviewers.len() != before)
    }

    async fn replace_reviewer(
        &self,
        id: &PullRequestId,
        old: &UserId,
        new: &UserId,
    ) -> Result<bool, RepositoryError> {
        let mut prs = self.pull_requests.write().await;
        let Some(pr) = prs.get_mut(id) else {
            return Ok(false);
        };
        if !pr.has_reviewer(old) || pr.has_reviewer(new) {
            return Ok(false);
        }
        pr.reviewers.retain(|r| r != old);
        pr.reviewers.push(new.clone());
        Ok(true)
    }

    async fn set_merged(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut prs = self.pull_requests.write().await;
        match prs.get_mut(id) {
            Some(pr) if pr.lifecycle == PrLifecycle::Open => {
                pr.lifecycle = PrLifecycle::Merged { merged_at };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>, RepositoryError> {
        let prs = self.pull_requests.read().await;
        Ok(prs.values().cloned().collect())
    }

    async fn list_prs_reviewed_by(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let prs = self.pull_requests.read().await;
        Ok(prs
            .values()
            .filter(|pr| pr.has_reviewer(reviewer))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::PrStatus;

    fn user(id: &str, active: bool) -> User {
        User::new(id, format!("name-{}", id), active)
    }

    fn team_set(names: &[&str]) -> BTreeSet<TeamName> {
        names.iter().map(|n| TeamName::from(*n)).collect()
    }

    fn open_pr(id: &str, author: &str) -> PullRequest {
        PullRequest::open(id, format!("PR {}", id), author, Utc::now())
    }

    #[tokio::test]
    async fn test_get_user_returns_none_for_missing() {
        let repo = InMemoryRepository::new();
        let result = repo.get_user(&UserId::from("ghost")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_team_indexes_both_directions() {
        let repo = InMemoryRepository::new();
        let members = [user("u1", true), user("u2", false)];

        let outcome = repo
            .create_team(&TeamName::from("backend"), &members)
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let team = repo
            .get_team(&TeamName::from("backend"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(team.members, members.to_vec());

        let teams = repo.list_teams_of_user(&UserId::from("u2")).await.unwrap();
        assert_eq!(teams, team_set(&["backend"]));
    }

    #[tokio::test]
    async fn test_create_team_rejects_duplicate_name_without_writing() {
        let repo = InMemoryRepository::new();
        repo.create_team(&TeamName::from("backend"), &[user("u1", true)])
            .await
            .unwrap();

        let outcome = repo
            .create_team(&TeamName::from("backend"), &[user("u1", false), user("u9", true)])
            .await
            .unwrap();

        assert_eq!(outcome, InsertOutcome::AlreadyExists);
        // Neither the existing member nor the new one was touched
        assert!(repo.get_user(&UserId::from("u1")).await.unwrap().unwrap().is_active);
        assert!(repo.get_user(&UserId::from("u9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_team_upserts_existing_members() {
        let repo = InMemoryRepository::new();
        repo.create_team(&TeamName::from("backend"), &[user("u1", true)])
            .await
            .unwrap();
        repo.create_team(
            &TeamName::from("frontend"),
            &[User::new("u1", "renamed", false)],
        )
        .await
        .unwrap();

        let u1 = repo.get_user(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(u1.username, "renamed");
        assert!(!u1.is_active);
        assert_eq!(
            repo.list_teams_of_user(&UserId::from("u1")).await.unwrap(),
            team_set(&["backend", "frontend"])
        );
    }

    #[tokio::test]
    async fn test_list_active_users_in_teams_filters_and_dedups() {
        let repo = InMemoryRepository::new();
        repo.create_team(
            &TeamName::from("backend"),
            &[user("u3", true), user("u1", true), user("u2", false)],
        )
        .await
        .unwrap();
        repo.create_team(&TeamName::from("frontend"), &[user("u3", true), user("u4", true)])
            .await
            .unwrap();
        repo.create_team(&TeamName::from("infra"), &[user("u5", true)])
            .await
            .unwrap();

        let excluding = HashSet::from([UserId::from("u1")]);
        let users = repo
            .list_active_users_in_teams(&team_set(&["backend", "frontend"]), &excluding)
            .await
            .unwrap();

        let ids: Vec<&str> = users.iter().map(|u| u.user_id.0.as_str()).collect();
        // u1 excluded, u2 inactive, u3 listed once, u5 in an unrelated team
        assert_eq!(ids, vec!["u3", "u4"]);
    }

    #[tokio::test]
    async fn test_set_user_active() {
        let repo = InMemoryRepository::new();
        repo.create_team(&TeamName::from("backend"), &[user("u1", true)])
            .await
            .unwrap();

        let updated = repo
            .set_user_active(&UserId::from("u1"), false)
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_active);

        let missing = repo
            .set_user_active(&UserId::from("ghost"), false)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_pull_request_rejects_duplicate() {
        let repo = InMemoryRepository::new();
        let pr = open_pr("pr-1", "u1");

        assert_eq!(
            repo.insert_pull_request(&pr).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            repo.insert_pull_request(&open_pr("pr-1", "u2")).await.unwrap(),
            InsertOutcome::AlreadyExists
        );
        let stored = repo
            .get_pull_request(&PullRequestId::from("pr-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.author_id, UserId::from("u1"));
    }

    #[tokio::test]
    async fn test_add_reviewer_keeps_order_and_rejects_duplicates() {
        let repo = InMemoryRepository::new();
        let pr_id = PullRequestId::from("pr-1");
        repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();

        repo.add_reviewer(&pr_id, &UserId::from("u3")).await.unwrap();
        repo.add_reviewer(&pr_id, &UserId::from("u2")).await.unwrap();
        let duplicate = repo.add_reviewer(&pr_id, &UserId::from("u3")).await.unwrap();

        assert_eq!(duplicate, InsertOutcome::AlreadyExists);
        assert_eq!(
            repo.list_reviewers_of_pr(&pr_id).await.unwrap(),
            vec![UserId::from("u3"), UserId::from("u2")]
        );
    }

    #[tokio::test]
    async fn test_add_reviewer_to_missing_pr_is_an_error() {
        let repo = InMemoryRepository::new();
        let result = repo
            .add_reviewer(&PullRequestId::from("nope"), &UserId::from("u1"))
            .await;
        assert!(matches!(result, Err(RepositoryError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_remove_reviewer() {
        let repo = InMemoryRepository::new();
        let pr_id = PullRequestId::from("pr-1");
        repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();
        repo.add_reviewer(&pr_id, &UserId::from("u2")).await.unwrap();

        assert!(repo.remove_reviewer(&pr_id, &UserId::from("u2")).await.unwrap());
        assert!(!repo.remove_reviewer(&pr_id, &UserId::from("u2")).await.unwrap());
        assert!(repo.list_reviewers_of_pr(&pr_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_reviewer_is_all_or_nothing() {
        let repo = InMemoryRepository::new();
        let pr_id = PullRequestId::from("pr-1");
        repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();
        repo.add_reviewer(&pr_id, &UserId::from("u2")).await.unwrap();
        repo.add_reviewer(&pr_id, &UserId::from("u3")).await.unwrap();

        // New reviewer already assigned: nothing changes
        let replaced = repo
            .replace_reviewer(&pr_id, &UserId::from("u2"), &UserId::from("u3"))
            .await
            .unwrap();
        assert!(!replaced);

        // Old reviewer absent: nothing changes
        let replaced = repo
            .replace_reviewer(&pr_id, &UserId::from("u9"), &UserId::from("u4"))
            .await
            .unwrap();
        assert!(!replaced);
        assert_eq!(
            repo.list_reviewers_of_pr(&pr_id).await.unwrap(),
            vec![UserId::from("u2"), UserId::from("u3")]
        );

        let replaced = repo
            .replace_reviewer(&pr_id, &UserId::from("u2"), &UserId::from("u4"))
            .await
            .unwrap();
        assert!(replaced);
        assert_eq!(
            repo.list_reviewers_of_pr(&pr_id).await.unwrap(),
            vec![UserId::from("u3"), UserId::from("u4")]
        );
    }

    #[tokio::test]
    async fn test_set_merged_only_changes_open_prs() {
        let repo = InMemoryRepository::new();
        let pr_id = PullRequestId::from("pr-1");
        repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();

        let first = Utc::now();
        assert!(repo.set_merged(&pr_id, first).await.unwrap());
        assert!(!repo
            .set_merged(&pr_id, first + chrono::Duration::seconds(10))
            .await
            .unwrap());
        assert!(!repo
            .set_merged(&PullRequestId::from("missing"), first)
            .await
            .unwrap());

        let pr = repo.get_pull_request(&pr_id).await.unwrap().unwrap();
        assert_eq!(pr.status(), PrStatus::Merged);
        assert_eq!(pr.merged_at(), Some(first));
    }

    #[tokio::test]
    async fn test_list_prs_reviewed_by() {
        let repo = InMemoryRepository::new();
        for id in ["pr-2", "pr-1", "pr-3"] {
            repo.insert_pull_request(&open_pr(id, "u1")).await.unwrap();
        }
        repo.add_reviewer(&PullRequestId::from("pr-2"), &UserId::from("u2"))
            .await
            .unwrap();
        repo.add_reviewer(&PullRequestId::from("pr-1"), &UserId::from("u2"))
            .await
            .unwrap();

        let prs = repo.list_prs_reviewed_by(&UserId::from("u2")).await.unwrap();
        let ids: Vec<&str> = prs.iter().map(|p| p.pull_request_id.0.as_str()).collect();
        assert_eq!(ids, vec!["pr-1", "pr-2"]);
    }
}
