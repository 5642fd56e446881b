pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::Router;
use config::{McpConfig, SearchConfig};
use mcp::{mcp_router, McpState, SessionTable};
use repositories::{SqliteSearchHistoryRepository, SqliteUserRepository};
use services::{HttpSearchProvider, SearchProvider, SearchService, UserService};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub search_service: Arc<SearchService>,
    pub sessions: Arc<SessionTable>,
    pub mcp_config: McpConfig,
}

impl AppState {
    /// Wires repositories, services and the tool registry over `pool`
    pub fn new(
        pool: SqlitePool,
        mcp_config: McpConfig,
        search_config: SearchConfig,
    ) -> anyhow::Result<Self> {
        let provider = Arc::new(HttpSearchProvider::new(search_config)?);
        Self::with_search_provider(pool, mcp_config, provider)
    }

    pub fn with_search_provider(
        pool: SqlitePool,
        mcp_config: McpConfig,
        provider: Arc<dyn SearchProvider>,
    ) -> anyhow::Result<Self> {
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let history_repository = Arc::new(SqliteSearchHistoryRepository::new(pool));

        let user_service = Arc::new(UserService::new(user_repository));
        let search_service = Arc::new(SearchService::new(provider, history_repository));

        let registry = mcp::tools::build_registry(
            Arc::clone(&user_service),
            Arc::clone(&search_service),
        )?;
        tracing::debug!(tools = registry.len(), "Tool registry built");

        let sessions = Arc::new(SessionTable::new(Arc::new(registry), &mcp_config));

        Ok(Self {
            user_service,
            search_service,
            sessions,
            mcp_config,
        })
    }

    pub fn router(&self) -> Router {
        mcp_router(McpState::new(Arc::clone(&self.sessions)), &self.mcp_config.path)
            .layer(TraceLayer::new_for_http())
    }
}
