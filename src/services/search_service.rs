//! Web search with recorded history
//!
//! [`SearchService`] runs queries against a [`SearchProvider`] and, unless the
//! caller opts out, records each query and its hits through the
//! [`SearchHistoryRepository`]. The bundled [`HttpSearchProvider`] talks to a
//! JSON search API configured by [`SearchConfig`]:
//!
//! ```text
//! GET {SEARCH_API_URL}?q=<query>&count=<limit>
//! Authorization: Bearer {SEARCH_API_KEY}
//!
//! {"results": [{"title": "...", "url": "...", "snippet": "..."}]}
//! ```
//!
//! `link` is accepted for `url`, and `content`/`description` for `snippet`.

use crate::config::SearchConfig;
use crate::models::search_history::{SearchHistoryEntry, SearchResult};
use crate::repositories::search_history_repository::SearchHistoryRepository;
use crate::repositories::user_repository::RepositoryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_RESULTS: usize = 20;
pub const MAX_HISTORY_PAGE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum SearchServiceError {
    #[error("Search query must not be empty")]
    EmptyQuery,
    #[error("Result limit must be between 1 and {MAX_RESULTS}")]
    InvalidLimit,
    #[error("Web search is not configured")]
    NotConfigured,
    #[error("Search provider request failed: {0}")]
    Provider(#[from] reqwest::Error),
    #[error("Search provider returned HTTP {0}")]
    ProviderStatus(u16),
    #[error("Search history entry not found")]
    HistoryNotFound,
    #[error("User not found")]
    UnknownUser,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchServiceError>;
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    results: Vec<ProviderHit>,
}

#[derive(Debug, Deserialize)]
struct ProviderHit {
    #[serde(default)]
    title: String,
    #[serde(alias = "link")]
    url: String,
    #[serde(default, alias = "content", alias = "description")]
    snippet: String,
}

/// [`SearchProvider`] backed by an HTTP JSON API
#[derive(Clone)]
pub struct HttpSearchProvider {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpSearchProvider {
    pub fn new(config: SearchConfig) -> Result<Self, SearchServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("querydesk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchServiceError> {
        let api_url = self
            .config
            .api_url
            .as_deref()
            .ok_or(SearchServiceError::NotConfigured)?;

        let count = limit.to_string();
        let mut request = self
            .client
            .get(api_url)
            .query(&[("q", query), ("count", count.as_str())]);

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Search provider rejected query");
            return Err(SearchServiceError::ProviderStatus(status.as_u16()));
        }

        let body: ProviderResponse = response.json().await?;

        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(|hit| SearchResult {
                title: hit.title,
                url: hit.url,
                snippet: hit.snippet,
            })
            .collect())
    }
}

/// Outcome of a web search as exposed to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<i64>,
}

pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub user_id: Option<i64>,
    pub save_history: bool,
}

pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    history: Arc<dyn SearchHistoryRepository>,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        history: Arc<dyn SearchHistoryRepository>,
    ) -> Self {
        Self { provider, history }
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, SearchServiceError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchServiceError::EmptyQuery);
        }
        if request.limit == 0 || request.limit > MAX_RESULTS {
            return Err(SearchServiceError::InvalidLimit);
        }

        let results = self.provider.search(query, request.limit).await?;

        let history_id = if request.save_history {
            let entry = self
                .history
                .record(request.user_id, query, &results)
                .await
                .map_err(|e| match e {
                    RepositoryError::MissingReference => SearchServiceError::UnknownUser,
                    other => SearchServiceError::Repository(other),
                })?;
            Some(entry.id)
        } else {
            None
        };

        tracing::debug!(query, hits = results.len(), ?history_id, "Web search completed");

        Ok(SearchOutcome {
            query: query.to_string(),
            results,
            history_id,
        })
    }

    pub async fn list_history(
        &self,
        user_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchHistoryEntry>, SearchServiceError> {
        let limit = limit.clamp(1, MAX_HISTORY_PAGE);
        let offset = offset.max(0);
        Ok(self.history.list(user_id, limit, offset).await?)
    }

    pub async fn get_history(&self, id: i64) -> Result<SearchHistoryEntry, SearchServiceError> {
        self.history
            .find_by_id(id)
            .await?
            .ok_or(SearchServiceError::HistoryNotFound)
    }

    pub async fn delete_history(&self, id: i64) -> Result<(), SearchServiceError> {
        match self.history.delete(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(SearchServiceError::HistoryNotFound),
            Err(e) => Err(SearchServiceError::Repository(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::search_history_repository::MockSearchHistoryRepository;
    use mockall::predicate::*;

    fn hit(n: usize) -> SearchResult {
        SearchResult {
            title: format!("Result {}", n),
            url: format!("https://example.com/{}", n),
            snippet: String::new(),
        }
    }

    #[tokio::test]
    async fn test_search_records_history() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .with(eq("rust async"), eq(2))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(vec![hit(1), hit(2)]) }));

        let mut history = MockSearchHistoryRepository::new();
        history.expect_record().times(1).returning(|user_id, query, results| {
            let entry = SearchHistoryEntry {
                id: 11,
                user_id,
                query: query.to_string(),
                result_count: results.len() as i64,
                results: results.to_vec(),
                created_at: "2025-01-01T00:00:00Z".to_string(),
            };
            Box::pin(async move { Ok(entry) })
        });

        let service = SearchService::new(Arc::new(provider), Arc::new(history));
        let outcome = service
            .search(SearchRequest {
                query: "  rust async ".to_string(),
                limit: 2,
                user_id: Some(3),
                save_history: true,
            })
            .await
            .expect("search succeeds");

        assert_eq!(outcome.query, "rust async");
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.history_id, Some(11));
    }

    #[tokio::test]
    async fn test_search_without_history() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .returning(|_, _| Box::pin(async { Ok(vec![hit(1)]) }));

        // No expectation on record: calling it would panic
        let history = MockSearchHistoryRepository::new();

        let service = SearchService::new(Arc::new(provider), Arc::new(history));
        let outcome = service
            .search(SearchRequest {
                query: "tokio".to_string(),
                limit: 5,
                user_id: None,
                save_history: false,
            })
            .await
            .expect("search succeeds");

        assert!(outcome.history_id.is_none());
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query_and_bad_limit() {
        let service = SearchService::new(
            Arc::new(MockSearchProvider::new()),
            Arc::new(MockSearchHistoryRepository::new()),
        );

        let blank = service
            .search(SearchRequest {
                query: "   ".to_string(),
                limit: 5,
                user_id: None,
                save_history: true,
            })
            .await;
        assert!(matches!(blank, Err(SearchServiceError::EmptyQuery)));

        let too_many = service
            .search(SearchRequest {
                query: "rust".to_string(),
                limit: MAX_RESULTS + 1,
                user_id: None,
                save_history: true,
            })
            .await;
        assert!(matches!(too_many, Err(SearchServiceError::InvalidLimit)));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = HttpSearchProvider::new(SearchConfig::default()).expect("client");
        let result = provider.search("anything", 3).await;
        assert!(matches!(result, Err(SearchServiceError::NotConfigured)));
    }
}
