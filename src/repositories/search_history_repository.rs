use crate::models::search_history::{SearchHistoryEntry, SearchHistoryRow, SearchResult};
use crate::repositories::user_repository::{
    is_foreign_key_violation, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

const HISTORY_COLUMNS: &str = "id, user_id, query, result_count, results, created_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SearchHistoryRepository: Send + Sync {
    async fn record(
        &self,
        user_id: Option<i64>,
        query: &str,
        results: &[SearchResult],
    ) -> RepositoryResult<SearchHistoryEntry>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<SearchHistoryEntry>>;
    async fn list(
        &self,
        user_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<SearchHistoryEntry>>;
    async fn delete(&self, id: i64) -> RepositoryResult<()>;
}

pub struct SqliteSearchHistoryRepository {
    pool: SqlitePool,
}

impl SqliteSearchHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchHistoryRepository for SqliteSearchHistoryRepository {
    async fn record(
        &self,
        user_id: Option<i64>,
        query: &str,
        results: &[SearchResult],
    ) -> RepositoryResult<SearchHistoryEntry> {
        let encoded = serde_json::to_string(results).unwrap_or_else(|_| "[]".to_string());
        let count = results.len() as i64;

        let res = sqlx::query(
            "INSERT INTO search_history (user_id, query, result_count, results) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(query)
        .bind(count)
        .bind(encoded)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                RepositoryError::MissingReference
            } else {
                RepositoryError::Database(e)
            }
        })?;

        self.find_by_id(res.last_insert_rowid())
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<SearchHistoryEntry>> {
        let row = sqlx::query_as::<_, SearchHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM search_history WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SearchHistoryEntry::from))
    }

    async fn list(
        &self,
        user_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<SearchHistoryEntry>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, SearchHistoryRow>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM search_history WHERE user_id = ? \
                     ORDER BY id DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SearchHistoryRow>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM search_history ORDER BY id DESC LIMIT ? OFFSET ?"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(SearchHistoryEntry::from).collect())
    }

    async fn delete(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM search_history WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
