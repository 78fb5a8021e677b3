//! Users, teams and team membership.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::error;

use appoint_core::{
    InsertOutcome, MembershipRepository, RepositoryError, Team, TeamName, User, UserId,
};

use super::{sql_err, SqliteRepository};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: UserId(row.get(0)?),
        username: row.get(1)?,
        is_active: row.get(2)?,
    })
}

/// Collect user rows, skipping any that fail to read.
fn collect_users(
    rows: impl Iterator<Item = rusqlite::Result<User>>,
    operation: &'static str,
) -> Vec<User> {
    rows.filter_map(|row| match row {
        Ok(user) => Some(user),
        Err(e) => {
            error!("Skipping unreadable user row in {}: {}", operation, e);
            None
        }
    })
    .collect()
}

#[async_trait]
impl MembershipRepository for SqliteRepository {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError> {
        let user_id = user_id.0.clone();
        self.with_conn("get_user", move |conn| {
            conn.query_row(
                "SELECT user_id, username, is_active FROM users WHERE user_id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()
            .map_err(sql_err("get_user"))
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        self.with_conn("list_users", |conn| {
            let mut stmt = conn
                .prepare("SELECT user_id, username, is_active FROM users ORDER BY user_id")
                .map_err(sql_err("list_users"))?;
            let rows = stmt
                .query_map([], user_from_row)
                .map_err(sql_err("list_users"))?;
            Ok(collect_users(rows, "list_users"))
        })
        .await
    }

    async fn list_teams_of_user(
        &self,
        user_id: &UserId,
    ) -> Result<BTreeSet<TeamName>, RepositoryError> {
        let user_id = user_id.0.clone();
        self.with_conn("list_teams_of_user", move |conn| {
            let mut stmt = conn
                .prepare("SELECT team_name FROM team_members WHERE user_id = ?1")
                .map_err(sql_err("list_teams_of_user"))?;
            let rows = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(sql_err("list_teams_of_user"))?;

            let mut teams = BTreeSet::new();
            for row in rows {
                teams.insert(TeamName(row.map_err(sql_err("list_teams_of_user"))?));
            }
            Ok(teams)
        })
        .await
    }

    async fn list_active_users_in_teams(
        &self,
        teams: &BTreeSet<TeamName>,
        excluding: &HashSet<UserId>,
    ) -> Result<Vec<User>, RepositoryError> {
        if teams.is_empty() {
            return Ok(Vec::new());
        }

        let team_names: Vec<String> = teams.iter().map(|t| t.0.clone()).collect();
        let excluding = excluding.clone();
        self.with_conn("list_active_users_in_teams", move |conn| {
            let placeholders = vec!["?"; team_names.len()].join(", ");
            let sql = format!(
                "SELECT DISTINCT u.user_id, u.username, u.is_active
                 FROM users u JOIN team_members m ON m.user_id = u.user_id
                 WHERE u.is_active = 1 AND m.team_name IN ({})
                 ORDER BY u.user_id",
                placeholders
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(sql_err("list_active_users_in_teams"))?;
            let rows = stmt
                .query_map(params_from_iter(team_names.iter()), user_from_row)
                .map_err(sql_err("list_active_users_in_teams"))?;

            let mut users = Vec::new();
            for row in rows {
                let user = row.map_err(sql_err("list_active_users_in_teams"))?;
                if !excluding.contains(&user.user_id) {
                    users.push(user);
                }
            }
            Ok(users)
        })
        .await
    }

    async fn get_team(&self, team_name: &TeamName) -> Result<Option<Team>, RepositoryError> {
        let name = team_name.clone();
        self.with_conn("get_team", move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT team_name FROM teams WHERE team_name = ?1",
                    params![name.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err("get_team"))?;
            if exists.is_none() {
                return Ok(None);
            }

            let mut stmt = conn
                .prepare(
                    "SELECT u.user_id, u.username, u.is_active
                     FROM team_members m JOIN users u ON u.user_id = m.user_id
                     WHERE m.team_name = ?1
                     ORDER BY u.user_id",
                )
                .map_err(sql_err("get_team"))?;
            let rows = stmt
                .query_map(params![name.0], user_from_row)
                .map_err(sql_err("get_team"))?;
            let members = collect_users(rows, "get_team");

            Ok(Some(Team {
                team_name: name,
                members,
            }))
        })
        .await
    }

    async fn create_team(
        &self,
        team_name: &TeamName,
        members: &[User],
    ) -> Result<InsertOutcome, RepositoryError> {
        let name = team_name.0.clone();
        let members = members.to_vec();
        self.with_conn("create_team", move |conn| {
            let tx = conn.transaction().map_err(sql_err("create_team"))?;

            let inserted = tx
                .execute(
                    "INSERT INTO teams (team_name) VALUES (?1) ON CONFLICT(team_name) DO NOTHING",
                    params![name],
                )
                .map_err(sql_err("create_team"))?;
            if inserted == 0 {
                // Dropping the transaction rolls it back
                return Ok(InsertOutcome::AlreadyExists);
            }

            for member in &members {
                tx.execute(
                    "INSERT INTO users (user_id, username, is_active) VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_id) DO UPDATE SET
                         username = excluded.username,
                         is_active = excluded.is_active",
                    params![member.user_id.0, member.username, member.is_active],
                )
                .map_err(sql_err("create_team upsert user"))?;
                tx.execute(
                    "INSERT OR IGNORE INTO team_members (team_name, user_id) VALUES (?1, ?2)",
                    params![name, member.user_id.0],
                )
                .map_err(sql_err("create_team add member"))?;
            }

            tx.commit().map_err(sql_err("create_team commit"))?;
            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    async fn set_user_active(
        &self,
        user_id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let user_id = user_id.0.clone();
        self.with_conn("set_user_active", move |conn| {
            conn.query_row(
                "UPDATE users SET is_active = ?2 WHERE user_id = ?1
                 RETURNING user_id, username, is_active",
                params![user_id, is_active],
                user_from_row,
            )
            .optional()
            .map_err(sql_err("set_user_active"))
        })
        .await
    }
}
