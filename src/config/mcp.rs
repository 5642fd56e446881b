use std::time::Duration;

use super::{env_non_empty, env_secs, env_u64};

/// Settings for the session-multiplexed MCP endpoint.
#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Route the endpoint is mounted on
    pub path: String,
    /// Sessions idle for longer than this are closed; `None` keeps them forever
    pub idle_timeout: Option<Duration>,
    /// How often the idle sweeper runs
    pub sweep_interval: Duration,
    /// Upper bound on a single tool handler; `None` lets handlers run unbounded
    pub tool_timeout: Option<Duration>,
    /// Keep-alive comment interval on the server-to-client stream
    pub stream_keep_alive: Duration,
    pub server_name: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            path: "/mcp".to_string(),
            idle_timeout: None,
            sweep_interval: Duration::from_secs(60),
            tool_timeout: None,
            stream_keep_alive: Duration::from_secs(15),
            server_name: "querydesk".to_string(),
        }
    }
}

impl McpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let path = env_non_empty("MCP_PATH")
            .map(|p| if p.starts_with('/') { p } else { format!("/{}", p) })
            .unwrap_or(defaults.path);

        Self {
            path,
            idle_timeout: env_secs("MCP_SESSION_IDLE_TIMEOUT_SECS"),
            sweep_interval: env_secs("MCP_SESSION_SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval),
            tool_timeout: env_secs("MCP_TOOL_TIMEOUT_SECS"),
            stream_keep_alive: env_u64("MCP_STREAM_KEEP_ALIVE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.stream_keep_alive),
            server_name: env_non_empty("MCP_SERVER_NAME").unwrap_or(defaults.server_name),
        }
    }
}
