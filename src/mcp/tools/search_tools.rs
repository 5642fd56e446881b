//! Web search and search history tools

use super::parse_args;
use crate::error::ToolError;
use crate::mcp::registry::ToolDefinition;
use crate::mcp::schema::{ObjectSchema, Schema};
use crate::services::search_service::{SearchRequest, SearchService, MAX_HISTORY_PAGE, MAX_RESULTS};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_RESULTS: usize = 5;
const DEFAULT_HISTORY_PAGE: i64 = 20;

pub fn tools(service: Arc<SearchService>) -> Vec<ToolDefinition> {
    vec![
        search_web(Arc::clone(&service)),
        search_history_list(Arc::clone(&service)),
        search_history_get(Arc::clone(&service)),
        search_history_delete(service),
    ]
}

fn result_schema() -> ObjectSchema {
    ObjectSchema::new()
        .required("title", Schema::string())
        .required("url", Schema::string().format("uri"))
        .required("snippet", Schema::string())
}

fn history_entry_schema() -> ObjectSchema {
    ObjectSchema::new()
        .required("id", Schema::integer())
        .required("userId", Schema::integer().nullable())
        .required("query", Schema::string())
        .required("resultCount", Schema::integer())
        .required("results", Schema::array(Schema::object(result_schema())))
        .required("createdAt", Schema::string())
}

fn default_results() -> usize {
    DEFAULT_RESULTS
}

fn default_true() -> bool {
    true
}

fn default_history_page() -> i64 {
    DEFAULT_HISTORY_PAGE
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_results")]
    limit: usize,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default = "default_true")]
    save_history: bool,
}

fn search_web(service: Arc<SearchService>) -> ToolDefinition {
    ToolDefinition::new(
        "search_web",
        "Web search",
        "Searches the web and records the query in the search history",
        ObjectSchema::new()
            .required(
                "query",
                Schema::string().min_length(1).describe("Search terms"),
            )
            .optional(
                "limit",
                Schema::integer()
                    .range(Some(1), Some(MAX_RESULTS as i64))
                    .default_value(json!(DEFAULT_RESULTS)),
            )
            .optional(
                "userId",
                Schema::integer().describe("User the search is recorded for"),
            )
            .optional(
                "saveHistory",
                Schema::boolean().default_value(json!(true)),
            ),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: SearchArgs = parse_args(args)?;
                let outcome = service
                    .search(SearchRequest {
                        query: args.query,
                        limit: args.limit,
                        user_id: args.user_id,
                        save_history: args.save_history,
                    })
                    .await?;
                Ok::<_, ToolError>(json!(outcome))
            }
        },
    )
    .with_output_schema(
        ObjectSchema::new()
            .required("query", Schema::string())
            .required("results", Schema::array(Schema::object(result_schema())))
            .optional("historyId", Schema::integer()),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HistoryListArgs {
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default = "default_history_page")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn search_history_list(service: Arc<SearchService>) -> ToolDefinition {
    ToolDefinition::new(
        "search_history_list",
        "List search history",
        "Lists recorded searches, newest first, optionally for one user",
        ObjectSchema::new()
            .optional("userId", Schema::integer())
            .optional(
                "limit",
                Schema::integer()
                    .range(Some(1), Some(MAX_HISTORY_PAGE))
                    .default_value(json!(DEFAULT_HISTORY_PAGE)),
            )
            .optional(
                "offset",
                Schema::integer()
                    .range(Some(0), None)
                    .default_value(json!(0)),
            ),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: HistoryListArgs = parse_args(args)?;
                let entries = service
                    .list_history(args.user_id, args.limit, args.offset)
                    .await?;
                Ok::<_, ToolError>(json!({ "count": entries.len(), "entries": entries }))
            }
        },
    )
    .with_output_schema(
        ObjectSchema::new()
            .required("count", Schema::integer())
            .required(
                "entries",
                Schema::array(Schema::object(history_entry_schema())),
            ),
    )
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HistoryIdArgs {
    id: i64,
}

fn search_history_get(service: Arc<SearchService>) -> ToolDefinition {
    ToolDefinition::new(
        "search_history_get",
        "Get search history entry",
        "Fetches one recorded search with its results",
        ObjectSchema::new().required("id", Schema::integer().range(Some(1), None)),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: HistoryIdArgs = parse_args(args)?;
                let entry = service.get_history(args.id).await?;
                Ok::<_, ToolError>(json!(entry))
            }
        },
    )
    .with_output_schema(history_entry_schema())
}

fn search_history_delete(service: Arc<SearchService>) -> ToolDefinition {
    ToolDefinition::new(
        "search_history_delete",
        "Delete search history entry",
        "Removes one recorded search",
        ObjectSchema::new().required("id", Schema::integer().range(Some(1), None)),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: HistoryIdArgs = parse_args(args)?;
                service.delete_history(args.id).await?;
                Ok::<_, ToolError>(json!({ "deleted": true, "id": args.id }))
            }
        },
    )
    .with_output_schema(
        ObjectSchema::new()
            .required("deleted", Schema::boolean())
            .required("id", Schema::integer()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::{ToolRegistry, ToolResult};
    use crate::models::search_history::SearchResult;
    use crate::repositories::search_history_repository::SqliteSearchHistoryRepository;
    use crate::services::search_service::MockSearchProvider;
    use crate::test_utils::create_test_pool;

    fn hit(n: usize) -> SearchResult {
        SearchResult {
            title: format!("Result {}", n),
            url: format!("https://example.com/{}", n),
            snippet: String::new(),
        }
    }

    async fn registry(provider: MockSearchProvider) -> ToolRegistry {
        let pool = create_test_pool().await;
        let history = Arc::new(SqliteSearchHistoryRepository::new(pool));
        let service = Arc::new(SearchService::new(Arc::new(provider), history));
        ToolRegistry::new(tools(service)).expect("registry")
    }

    async fn call(registry: &ToolRegistry, id: &str, args: serde_json::Value) -> ToolResult {
        registry.dispatch(id, args).expect("registered").await
    }

    #[tokio::test]
    async fn test_search_records_history_by_default() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .withf(|_, limit| *limit == DEFAULT_RESULTS)
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(vec![hit(1), hit(2)]) }));
        let registry = registry(provider).await;

        let outcome = call(&registry, "search_web", json!({"query": "  rust async "}))
            .await
            .expect("search");
        assert_eq!(outcome["query"], "rust async");
        assert_eq!(outcome["results"].as_array().map(Vec::len), Some(2));
        let history_id = outcome["historyId"].as_i64().expect("recorded");

        let entry = call(&registry, "search_history_get", json!({"id": history_id}))
            .await
            .expect("entry");
        assert_eq!(entry["resultCount"], 2);
        assert_eq!(entry["results"][1]["url"], "https://example.com/2");

        let listed = call(&registry, "search_history_list", json!({}))
            .await
            .expect("list");
        assert_eq!(listed["count"], 1);
    }

    #[tokio::test]
    async fn test_search_without_history() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .returning(|_, _| Box::pin(async { Ok(vec![hit(1)]) }));
        let registry = registry(provider).await;

        let outcome = call(
            &registry,
            "search_web",
            json!({"query": "sqlite", "saveHistory": false, "limit": 3}),
        )
        .await
        .expect("search");
        assert!(outcome.get("historyId").is_none());

        let listed = call(&registry, "search_history_list", json!({"limit": 500}))
            .await
            .expect("list");
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_input_as_tool_errors() {
        let mut provider = MockSearchProvider::new();
        provider.expect_search().never();
        let registry = registry(provider).await;

        let err = call(&registry, "search_web", json!({"query": "   "}))
            .await
            .expect_err("empty");
        assert_eq!(err.wire_message(), "Search query must not be empty");

        let err = call(&registry, "search_web", json!({"query": "x", "limit": 0}))
            .await
            .expect_err("limit");
        assert!(err.wire_message().starts_with("Result limit must be between 1 and"));

        let err = call(&registry, "search_web", json!({"q": "x"}))
            .await
            .expect_err("wrong field");
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_search_for_unknown_user_names_the_user() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .returning(|_, _| Box::pin(async { Ok(vec![hit(1)]) }));
        let registry = registry(provider).await;

        let err = call(
            &registry,
            "search_web",
            json!({"query": "rust", "userId": 404}),
        )
        .await
        .expect_err("unknown user");
        assert_eq!(err.wire_message(), "User not found");

        // Without history the user id is never checked
        call(
            &registry,
            "search_web",
            json!({"query": "rust", "userId": 404, "saveHistory": false}),
        )
        .await
        .expect("search");
    }

    #[tokio::test]
    async fn test_history_missing_entries() {
        let registry = registry(MockSearchProvider::new()).await;

        let err = call(&registry, "search_history_get", json!({"id": 99}))
            .await
            .expect_err("missing");
        assert_eq!(err.wire_message(), "Search history entry not found");

        let err = call(&registry, "search_history_delete", json!({"id": 99}))
            .await
            .expect_err("missing");
        assert_eq!(err.wire_message(), "Search history entry not found");
    }
}
