//! Tests for SQLite repository implementation.

use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, Utc};
use proptest::prelude::*;

use appoint_core::{
    InsertOutcome, MembershipRepository, PrStatus, PullRequest, PullRequestId,
    PullRequestRepository, TeamName, User, UserId,
};

use super::{SqliteRepository, CURRENT_SCHEMA_VERSION};

fn user(id: &str, active: bool) -> User {
    User::new(id, format!("name-{}", id), active)
}

fn open_pr(id: &str, author: &str) -> PullRequest {
    PullRequest::open(id, format!("PR {}", id), author, Utc::now())
}

fn team_set(names: &[&str]) -> BTreeSet<TeamName> {
    names.iter().map(|n| TeamName::from(*n)).collect()
}

fn ids(raw: &[&str]) -> Vec<UserId> {
    raw.iter().map(|s| UserId::from(*s)).collect()
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_get_user_returns_none_for_missing() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    assert!(repo.get_user(&UserId::from("ghost")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_team_then_get() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let members = [user("u2", false), user("u1", true)];

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
    // Members come back ordered by user id
    assert_eq!(team.members, vec![user("u1", true), user("u2", false)]);
    assert!(repo
        .get_team(&TeamName::from("frontend"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_team_without_members() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    repo.create_team(&TeamName::from("empty"), &[]).await.unwrap();

    let team = repo
        .get_team(&TeamName::from("empty"))
        .await
        .unwrap()
        .unwrap();
    assert!(team.members.is_empty());
}

#[tokio::test]
async fn test_duplicate_team_writes_nothing() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    repo.create_team(&TeamName::from("backend"), &[user("u1", true)])
        .await
        .unwrap();

    let outcome = repo
        .create_team(
            &TeamName::from("backend"),
            &[user("u1", false), user("u9", true)],
        )
        .await
        .unwrap();

    assert_eq!(outcome, InsertOutcome::AlreadyExists);
    assert!(repo.get_user(&UserId::from("u1")).await.unwrap().unwrap().is_active);
    assert!(repo.get_user(&UserId::from("u9")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_team_upserts_users() {
    let repo = SqliteRepository::new_in_memory().unwrap();
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
    assert_eq!(repo.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_active_users_in_teams() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    repo.create_team(
        &TeamName::from("backend"),
        &[user("u3", true), user("u1", true), user("u2", false)],
    )
    .await
    .unwrap();
    repo.create_team(
        &TeamName::from("frontend"),
        &[user("u3", true), user("u4", true)],
    )
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

    let found: Vec<UserId> = users.into_iter().map(|u| u.user_id).collect();
    assert_eq!(found, ids(&["u3", "u4"]));

    let none = repo
        .list_active_users_in_teams(&BTreeSet::new(), &HashSet::new())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_set_user_active() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    repo.create_team(&TeamName::from("backend"), &[user("u1", true)])
        .await
        .unwrap();

    let updated = repo
        .set_user_active(&UserId::from("u1"), false)
        .await
        .unwrap()
        .unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.username, "name-u1");

    assert!(repo
        .set_user_active(&UserId::from("ghost"), true)
        .await
        .unwrap()
        .is_none());
}

// =========================================================================
// Pull requests
// =========================================================================

#[tokio::test]
async fn test_insert_and_get_pull_request() {
    let repo = SqliteRepository::new_in_memory().unwrap();
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
    assert_eq!(stored, pr);
}

#[tokio::test]
async fn test_insert_pull_request_with_reviewers() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let mut pr = open_pr("pr-1", "u1");
    pr.reviewers = ids(&["u3", "u2"]);

    repo.insert_pull_request(&pr).await.unwrap();

    assert_eq!(
        repo.list_reviewers_of_pr(&PullRequestId::from("pr-1"))
            .await
            .unwrap(),
        ids(&["u3", "u2"])
    );
}

#[tokio::test]
async fn test_add_and_remove_reviewers() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let pr_id = PullRequestId::from("pr-1");
    repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();

    repo.add_reviewer(&pr_id, &UserId::from("u3")).await.unwrap();
    repo.add_reviewer(&pr_id, &UserId::from("u2")).await.unwrap();
    assert_eq!(
        repo.add_reviewer(&pr_id, &UserId::from("u3")).await.unwrap(),
        InsertOutcome::AlreadyExists
    );
    assert_eq!(
        repo.list_reviewers_of_pr(&pr_id).await.unwrap(),
        ids(&["u3", "u2"])
    );

    assert!(repo.remove_reviewer(&pr_id, &UserId::from("u3")).await.unwrap());
    assert!(!repo.remove_reviewer(&pr_id, &UserId::from("u3")).await.unwrap());
    assert_eq!(repo.list_reviewers_of_pr(&pr_id).await.unwrap(), ids(&["u2"]));
}

#[tokio::test]
async fn test_add_reviewer_to_missing_pr_fails() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let result = repo
        .add_reviewer(&PullRequestId::from("nope"), &UserId::from("u1"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_replace_reviewer_is_all_or_nothing() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let pr_id = PullRequestId::from("pr-1");
    repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();
    repo.add_reviewer(&pr_id, &UserId::from("u2")).await.unwrap();
    repo.add_reviewer(&pr_id, &UserId::from("u3")).await.unwrap();

    assert!(!repo
        .replace_reviewer(&pr_id, &UserId::from("u2"), &UserId::from("u3"))
        .await
        .unwrap());
    assert!(!repo
        .replace_reviewer(&pr_id, &UserId::from("u9"), &UserId::from("u4"))
        .await
        .unwrap());
    assert_eq!(
        repo.list_reviewers_of_pr(&pr_id).await.unwrap(),
        ids(&["u2", "u3"])
    );

    assert!(repo
        .replace_reviewer(&pr_id, &UserId::from("u2"), &UserId::from("u4"))
        .await
        .unwrap());
    assert_eq!(
        repo.list_reviewers_of_pr(&pr_id).await.unwrap(),
        ids(&["u3", "u4"])
    );
}

#[tokio::test]
async fn test_set_merged_only_once() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let pr_id = PullRequestId::from("pr-1");
    repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();

    let first = Utc::now();
    assert!(repo.set_merged(&pr_id, first).await.unwrap());
    assert!(!repo
        .set_merged(&pr_id, first + Duration::seconds(30))
        .await
        .unwrap());

    let pr = repo.get_pull_request(&pr_id).await.unwrap().unwrap();
    assert_eq!(pr.status(), PrStatus::Merged);
    assert_eq!(pr.merged_at(), Some(first));
}

#[tokio::test]
async fn test_list_queries_are_ordered() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    for id in ["pr-3", "pr-1", "pr-2"] {
        repo.insert_pull_request(&open_pr(id, "u1")).await.unwrap();
    }
    repo.add_reviewer(&PullRequestId::from("pr-3"), &UserId::from("u2"))
        .await
        .unwrap();
    repo.add_reviewer(&PullRequestId::from("pr-1"), &UserId::from("u2"))
        .await
        .unwrap();

    let all: Vec<String> = repo
        .list_pull_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|pr| pr.pull_request_id.0)
        .collect();
    assert_eq!(all, vec!["pr-1", "pr-2", "pr-3"]);

    let reviewed = repo.list_prs_reviewed_by(&UserId::from("u2")).await.unwrap();
    let reviewed_ids: Vec<&str> = reviewed
        .iter()
        .map(|pr| pr.pull_request_id.0.as_str())
        .collect();
    assert_eq!(reviewed_ids, vec!["pr-1", "pr-3"]);
    assert_eq!(reviewed[0].reviewers, ids(&["u2"]));
}

// =========================================================================
// On-disk persistence tests
// =========================================================================

#[tokio::test]
async fn test_on_disk_persistence_basic() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pr_id = PullRequestId::from("pr-1");

    {
        let repo = SqliteRepository::new(&db_path).unwrap();
        repo.create_team(&TeamName::from("dev"), &[user("u1", true), user("u2", true)])
            .await
            .unwrap();
        repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();
        repo.add_reviewer(&pr_id, &UserId::from("u2")).await.unwrap();
    }

    {
        let repo = SqliteRepository::new(&db_path).unwrap();
        let pr = repo.get_pull_request(&pr_id).await.unwrap();
        assert!(pr.is_some(), "Pull request should persist after reopen");
        assert_eq!(pr.unwrap().reviewers, ids(&["u2"]));
        assert_eq!(
            repo.list_teams_of_user(&UserId::from("u2")).await.unwrap(),
            team_set(&["dev"])
        );
    }
}

#[tokio::test]
async fn test_creates_parent_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("nested").join("state").join("test.db");

    assert!(!db_path.parent().unwrap().exists());

    let repo = SqliteRepository::new(&db_path).unwrap();
    repo.create_team(&TeamName::from("dev"), &[]).await.unwrap();

    assert!(db_path.exists());
}

#[tokio::test]
async fn test_schema_version_persisted() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let _repo = SqliteRepository::new(&db_path).unwrap();
    }

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let version: i64 = conn
        .query_row(
            "SELECT version FROM schema_version WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_newer_schema_version_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let _repo = SqliteRepository::new(&db_path).unwrap();
    }
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "UPDATE schema_version SET version = ?1 WHERE id = 1",
            [CURRENT_SCHEMA_VERSION + 1],
        )
        .unwrap();
    }

    assert!(SqliteRepository::new(&db_path).is_err());
}

#[tokio::test]
async fn test_merged_without_timestamp_is_refused_by_schema() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let conn = repo.conn.lock().unwrap();
    let result = conn.execute(
        "INSERT INTO pull_requests (pull_request_id, name, author_id, status, created_at, merged_at)
         VALUES ('pr-x', 'x', 'u1', 'MERGED', '2024-01-01 00:00:00+00:00', NULL)",
        [],
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_corrupt_row_skipped_in_list_pull_requests() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let repo = SqliteRepository::new(&db_path).unwrap();
        repo.insert_pull_request(&open_pr("pr-1", "u1")).await.unwrap();
    }

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "INSERT INTO pull_requests (pull_request_id, name, author_id, status, created_at, merged_at)
             VALUES ('pr-2', 'broken', 'u1', 'OPEN', 'not a timestamp', NULL)",
            [],
        )
        .unwrap();
    }

    let repo = SqliteRepository::new(&db_path).unwrap();
    let prs = repo.list_pull_requests().await.unwrap();
    assert_eq!(prs.len(), 1, "Should skip corrupt row and return only valid PR");
    assert_eq!(prs[0].pull_request_id, PullRequestId::from("pr-1"));
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let _repo = SqliteRepository::new(&db_path).unwrap();

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode.to_lowercase(), "wal");
}

#[cfg(unix)]
#[tokio::test]
async fn test_state_dir_has_restrictive_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempfile::tempdir().unwrap();
    let state_dir = temp_dir.path().join("state");
    let db_path = state_dir.join("test.db");

    let _repo = SqliteRepository::new(&db_path).unwrap();

    let mode = std::fs::metadata(&state_dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o700, "got {:o}", mode);

    let mode = std::fs::metadata(&db_path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600, "got {:o}", mode);
}

proptest! {
    /// Property: after any sequence of add/replace operations the reviewer
    /// list has no duplicates and matches a simple model.
    #[test]
    fn reviewer_list_matches_model(ops in proptest::collection::vec((any::<bool>(), 0u8..6, 0u8..6), 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let repo = SqliteRepository::new_in_memory().unwrap();
            let pr_id = PullRequestId::from("pr");
            repo.insert_pull_request(&open_pr("pr", "author")).await.unwrap();

            let mut model: Vec<UserId> = Vec::new();
            for (is_replace, a, b) in &ops {
                let a = UserId::from(format!("u{}", a));
                let b = UserId::from(format!("u{}", b));
                if *is_replace {
                    let applied = repo.replace_reviewer(&pr_id, &a, &b).await.unwrap();
                    let expected = model.contains(&a) && !model.contains(&b);
                    assert_eq!(applied, expected);
                    if expected {
                        model.retain(|r| r != &a);
                        model.push(b);
                    }
                } else {
                    repo.add_reviewer(&pr_id, &a).await.unwrap();
                    if !model.contains(&a) {
                        model.push(a);
                    }
                }
            }

            assert_eq!(repo.list_reviewers_of_pr(&pr_id).await.unwrap(), model);
        });
    }
}
