//! SQLite access for docvault.
//!
//! One pool per process. WAL journaling keeps uploads and retrieval reads
//! from blocking each other; the schema itself lives in [`crate::migrate`].

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::error::Result;

/// Opens the docvault database, creating the file and its parent directory
/// on first use.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    if let Some(parent) = config.db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options =
        SqliteConnectOptions::from_str(&format!("sqlite:{}", config.db.path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
