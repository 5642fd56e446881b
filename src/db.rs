use crate::config::{env_non_empty, env_u64};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/querydesk.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Opens the SQLite pool named by `DATABASE_URL`
///
/// Foreign keys are enforced so deleting a user detaches their search history.
pub async fn create_pool() -> Result<SqlitePool, sqlx::Error> {
    let database_url =
        env_non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let max_connections = env_u64("DB_MAX_CONNECTIONS")
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);

    tracing::debug!(url = %database_url, max_connections, "Opening database");

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}
