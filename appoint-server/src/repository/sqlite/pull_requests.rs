//! Pull requests and reviewer assignments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{error, warn};

use appoint_core::{
    InsertOutcome, PrLifecycle, PrStatus, PullRequest, PullRequestId, PullRequestRepository,
    RepositoryError, UserId,
};

use super::{sql_err, SqliteRepository};

const PR_COLUMNS: &str = "pull_request_id, name, author_id, status, created_at, merged_at";

/// A `pull_requests` row as stored, before the lifecycle is validated.
struct PrRow {
    pull_request_id: String,
    name: String,
    author_id: String,
    status: String,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

impl PrRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pull_request_id: row.get(0)?,
            name: row.get(1)?,
            author_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            merged_at: row.get(5)?,
        })
    }

    fn into_pull_request(self, reviewers: Vec<UserId>) -> Result<PullRequest, RepositoryError> {
        let status: PrStatus = self
            .status
            .parse()
            .map_err(|_| RepositoryError::corruption("pull request status"))?;
        let lifecycle = PrLifecycle::from_parts(status, self.merged_at)
            .ok_or_else(|| RepositoryError::corruption("pull request merge timestamp"))?;

        Ok(PullRequest {
            pull_request_id: PullRequestId(self.pull_request_id),
            name: self.name,
            author_id: UserId(self.author_id),
            lifecycle,
            created_at: self.created_at,
            reviewers,
        })
    }
}

fn load_reviewers(
    conn: &Connection,
    pr_id: &str,
    operation: &'static str,
) -> Result<Vec<UserId>, RepositoryError> {
    let mut stmt = conn
        .prepare("SELECT reviewer_id FROM pr_reviewers WHERE pull_request_id = ?1 ORDER BY id")
        .map_err(sql_err(operation))?;
    let rows = stmt
        .query_map(params![pr_id], |row| row.get::<_, String>(0))
        .map_err(sql_err(operation))?;

    let mut reviewers = Vec::new();
    for row in rows {
        reviewers.push(UserId(row.map_err(sql_err(operation))?));
    }
    Ok(reviewers)
}

fn is_assigned(conn: &Connection, pr_id: &str, reviewer: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pr_reviewers WHERE pull_request_id = ?1 AND reviewer_id = ?2)",
        params![pr_id, reviewer],
        |row| row.get(0),
    )
}

/// Run a pull request query and attach reviewers to each result.
///
/// Rows that cannot be read or that violate the lifecycle invariant are
/// logged and skipped so one bad row does not hide the rest.
fn query_pull_requests(
    conn: &Connection,
    sql: &str,
    query_params: &[&dyn ToSql],
    operation: &'static str,
) -> Result<Vec<PullRequest>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(sql_err(operation))?;
    let rows = stmt
        .query_map(query_params, PrRow::from_row)
        .map_err(sql_err(operation))?;

    let mut results = Vec::new();
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                error!("Failed to read pull request row in {}: {}", operation, e);
                continue;
            }
        };

        let pr_id = row.pull_request_id.clone();
        let reviewers = load_reviewers(conn, &pr_id, operation)?;
        match row.into_pull_request(reviewers) {
            Ok(pr) => results.push(pr),
            Err(e) => {
                warn!("Skipping corrupt pull request {} in {}: {}", pr_id, operation, e);
            }
        }
    }

    Ok(results)
}

#[async_trait]
impl PullRequestRepository for SqliteRepository {
    async fn get_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        let pr_id = id.0.clone();
        self.with_conn("get_pull_request", move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM pull_requests WHERE pull_request_id = ?1",
                        PR_COLUMNS
                    ),
                    params![pr_id],
                    PrRow::from_row,
                )
                .optional()
                .map_err(sql_err("get_pull_request"))?;

            match row {
                Some(row) => {
                    let reviewers = load_reviewers(conn, &pr_id, "get_pull_request")?;
                    row.into_pull_request(reviewers).map(Some)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn insert_pull_request(
        &self,
        pr: &PullRequest,
    ) -> Result<InsertOutcome, RepositoryError> {
        let pr = pr.clone();
        self.with_conn("insert_pull_request", move |conn| {
            let tx = conn.transaction().map_err(sql_err("insert_pull_request"))?;

            let inserted = tx
                .execute(
                    "INSERT INTO pull_requests
                         (pull_request_id, name, author_id, status, created_at, merged_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(pull_request_id) DO NOTHING",
                    params![
                        pr.pull_request_id.0,
                        pr.name,
                        pr.author_id.0,
                        pr.status().as_str(),
                        pr.created_at,
                        pr.merged_at()
                    ],
                )
                .map_err(sql_err("insert_pull_request"))?;
            if inserted == 0 {
                return Ok(InsertOutcome::AlreadyExists);
            }

            for reviewer in &pr.reviewers {
                tx.execute(
                    "INSERT OR IGNORE INTO pr_reviewers (pull_request_id, reviewer_id)
                     VALUES (?1, ?2)",
                    params![pr.pull_request_id.0, reviewer.0],
                )
                .map_err(sql_err("insert_pull_request reviewers"))?;
            }

            tx.commit().map_err(sql_err("insert_pull_request commit"))?;
            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    async fn list_reviewers_of_pr(
        &self,
        id: &PullRequestId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let pr_id = id.0.clone();
        self.with_conn("list_reviewers_of_pr", move |conn| {
            load_reviewers(conn, &pr_id, "list_reviewers_of_pr")
        })
        .await
    }

    async fn add_reviewer(
        &self,
        id: &PullRequestId,
        reviewer: &UserId,
    ) -> Result<InsertOutcome, RepositoryError> {
        let pr_id = id.0.clone();
        let reviewer = reviewer.0.clone();
        self.with_conn("add_reviewer", move |conn| {
            let tx = conn.transaction().map_err(sql_err("add_reviewer"))?;

            let pr_exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pull_request_id = ?1)",
                    params![pr_id],
                    |row| row.get(0),
                )
                .map_err(sql_err("add_reviewer"))?;
            if !pr_exists {
                return Err(RepositoryError::storage(
                    "add_reviewer",
                    format!("pull request {} missing", pr_id),
                ));
            }

            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO pr_reviewers (pull_request_id, reviewer_id)
                     VALUES (?1, ?2)",
                    params![pr_id, reviewer],
                )
                .map_err(sql_err("add_reviewer"))?;

            tx.commit().map_err(sql_err("add_reviewer commit"))?;
            Ok(if inserted == 0 {
                InsertOutcome::AlreadyExists
            } else {
                InsertOutcome::Inserted
            })
        })
        .await
    }

    async fn remove_reviewer(
        &self,
        id: &PullRequestId,
        reviewer: &UserId,
    ) -> Result<bool, RepositoryError> {
        let pr_id = id.0.clone();
        let reviewer = reviewer.0.clone();
        self.with_conn("remove_reviewer", move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM pr_reviewers WHERE pull_request_id = ?1 AND reviewer_id = ?2",
                    params![pr_id, reviewer],
                )
                .map_err(sql_err("remove_reviewer"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn replace_reviewer(
        &self,
        id: &PullRequestId,
        old: &UserId,
        new: &UserId,
    ) -> Result<bool, RepositoryError> {
        let pr_id = id.0.clone();
        let old = old.0.clone();
        let new = new.0.clone();
        self.with_conn("replace_reviewer", move |conn| {
            let tx = conn.transaction().map_err(sql_err("replace_reviewer"))?;

            let old_assigned =
                is_assigned(&tx, &pr_id, &old).map_err(sql_err("replace_reviewer"))?;
            let new_assigned =
                is_assigned(&tx, &pr_id, &new).map_err(sql_err("replace_reviewer"))?;
            if !old_assigned || new_assigned {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM pr_reviewers WHERE pull_request_id = ?1 AND reviewer_id = ?2",
                params![pr_id, old],
            )
            .map_err(sql_err("replace_reviewer delete"))?;
            tx.execute(
                "INSERT INTO pr_reviewers (pull_request_id, reviewer_id) VALUES (?1, ?2)",
                params![pr_id, new],
            )
            .map_err(sql_err("replace_reviewer insert"))?;

            tx.commit().map_err(sql_err("replace_reviewer commit"))?;
            Ok(true)
        })
        .await
    }

    async fn set_merged(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let pr_id = id.0.clone();
        self.with_conn("set_merged", move |conn| {
            let updated = conn
                .execute(
                    "UPDATE pull_requests SET status = 'MERGED', merged_at = ?2
                     WHERE pull_request_id = ?1 AND status = 'OPEN'",
                    params![pr_id, merged_at],
                )
                .map_err(sql_err("set_merged"))?;
            Ok(updated > 0)
        })
        .await
    }

    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>, RepositoryError> {
        self.with_conn("list_pull_requests", |conn| {
            query_pull_requests(
                conn,
                &format!(
                    "SELECT {} FROM pull_requests ORDER BY pull_request_id",
                    PR_COLUMNS
                ),
                &[],
                "list_pull_requests",
            )
        })
        .await
    }

    async fn list_prs_reviewed_by(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let reviewer = reviewer.0.clone();
        self.with_conn("list_prs_reviewed_by", move |conn| {
            query_pull_requests(
                conn,
                &format!(
                    "SELECT {} FROM pull_requests p
                     WHERE EXISTS (
                         SELECT 1 FROM pr_reviewers r
                         WHERE r.pull_request_id = p.pull_request_id AND r.reviewer_id = ?1
                     )
                     ORDER BY p.pull_request_id",
                    PR_COLUMNS
                ),
                &[&reviewer],
                "list_prs_reviewed_by",
            )
        })
        .await
    }
}
