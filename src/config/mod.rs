pub mod mcp;
pub mod search;

pub use mcp::McpConfig;
pub use search::SearchConfig;

use std::env;
use std::time::Duration;

/// Reads an integer number of seconds; unset, unparsable or zero yields `None`.
pub(crate) fn env_secs(key: &str) -> Option<Duration> {
    env_u64(key).filter(|secs| *secs > 0).map(Duration::from_secs)
}

pub(crate) fn env_u64(key: &str) -> Option<u64> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring non-numeric configuration value");
                None
            }
        },
        Err(_) => None,
    }
}

pub(crate) fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
