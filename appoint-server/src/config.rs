use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// Which store backend the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Seed for reviewer selection. Unset means an OS-seeded generator.
    pub rng_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let storage_backend = parse_storage_backend(env::var("STORAGE_BACKEND").ok())
            .context("STORAGE_BACKEND is invalid")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let rng_seed =
            parse_rng_seed(env::var("RNG_SEED").ok()).context("RNG_SEED must be a u64")?;

        Ok(Config {
            port,
            storage_backend,
            state_dir,
            rng_seed,
        })
    }
}

/// Parse STORAGE_BACKEND. Missing or blank selects SQLite.
pub fn parse_storage_backend(value: Option<String>) -> Result<StorageBackend> {
    let Some(value) = value.filter(|s| !s.trim().is_empty()) else {
        return Ok(StorageBackend::Sqlite);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "sqlite" => Ok(StorageBackend::Sqlite),
        "memory" => Ok(StorageBackend::Memory),
        other => bail!("unknown storage backend '{}', expected 'sqlite' or 'memory'", other),
    }
}

/// Parse RNG_SEED. Missing or blank means no fixed seed.
pub fn parse_rng_seed(value: Option<String>) -> Result<Option<u64>> {
    match value.filter(|s| !s.trim().is_empty()) {
        None => Ok(None),
        Some(s) => Ok(Some(s.trim().parse::<u64>()?)),
    }
}
