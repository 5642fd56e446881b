use std::time::Duration;

use super::{env_non_empty, env_u64};

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Provider endpoint; when unset `search_web` reports that search is unavailable
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            timeout: Duration::from_millis(10_000),
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env_non_empty("SEARCH_API_URL"),
            api_key: env_non_empty("SEARCH_API_KEY"),
            timeout: env_u64("SEARCH_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or_else(|| Self::default().timeout),
        }
    }
}
