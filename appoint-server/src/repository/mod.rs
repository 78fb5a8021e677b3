//! Store backends for the server.

mod sqlite;

pub use sqlite::SqliteRepository;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use appoint_core::{InMemoryRepository, MembershipRepository, PullRequestRepository};

use crate::config::{Config, StorageBackend};

/// File name of the SQLite database inside the state directory.
pub const DATABASE_FILE: &str = "appoint-state.db";

/// Both repository handles, backed by the same store.
#[derive(Clone)]
pub struct Stores {
    pub membership: Arc<dyn MembershipRepository>,
    pub pull_requests: Arc<dyn PullRequestRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        Self {
            membership: repo.clone(),
            pull_requests: repo,
        }
    }

    pub fn sqlite(repo: SqliteRepository) -> Self {
        let repo = Arc::new(repo);
        Self {
            membership: repo.clone(),
            pull_requests: repo,
        }
    }

    /// Open the backend selected by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage; state is lost on restart");
                Ok(Self::in_memory())
            }
            StorageBackend::Sqlite => {
                let db_path = config.state_dir.join(DATABASE_FILE);
                info!("Using SQLite storage at {}", db_path.display());
                let repo = SqliteRepository::new(&db_path).with_context(|| {
                    format!("Failed to open SQLite database at {}", db_path.display())
                })?;
                Ok(Self::sqlite(repo))
            }
        }
    }
}
