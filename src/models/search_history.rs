use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single hit returned by the web search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Row shape of the `search_history` table.
#[derive(Debug, Clone, FromRow)]
pub struct SearchHistoryRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub query: String,
    pub result_count: i64,
    pub results: String,
    pub created_at: String,
}

/// A recorded search with its decoded results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub query: String,
    pub result_count: i64,
    pub results: Vec<SearchResult>,
    pub created_at: String,
}

impl From<SearchHistoryRow> for SearchHistoryEntry {
    fn from(row: SearchHistoryRow) -> Self {
        // A corrupt results column degrades to an empty list rather than hiding the entry
        let results = serde_json::from_str(&row.results).unwrap_or_else(|e| {
            tracing::warn!(history_id = row.id, error = %e, "Unreadable search results column");
            Vec::new()
        });

        Self {
            id: row.id,
            user_id: row.user_id,
            query: row.query,
            result_count: row.result_count,
            results,
            created_at: row.created_at,
        }
    }
}
