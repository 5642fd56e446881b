//! Protocol server instance bound to one session
//!
//! A [`ProtocolServer`] answers the request kinds of [`McpRequest`] on behalf
//! of exactly one session. It holds nothing but a shared reference to the
//! [`ToolRegistry`] and its identity, so two sessions never observe each
//! other through it.
//!
//! # Fault channels
//!
//! ```text
//! tools/call "unknown"        -> Err(ProtocolFault::MethodNotFound)   JSON-RPC error
//! tools/call handler Err(..)  -> Ok({isError: true, content: [..]})   JSON-RPC result
//! tools/call handler Ok(v)    -> Ok({content: [text(v)], structuredContent: v})
//! ```

use crate::error::{ProtocolFault, ToolError};
use crate::mcp::protocol::{
    negotiate_version, CallToolParams, InitializeParams, McpNotification, McpRequest,
    NOTIFICATION_PROGRESS,
};
use crate::mcp::registry::ToolRegistry;
use crate::mcp::transport::Notifier;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Name and greeting advertised in the `initialize` result
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl ServerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            instructions: Some(format!(
                "{} exposes user administration and web search tools",
                name
            )),
            name,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Per-call view of the owning session
pub struct RequestContext<'a> {
    pub session_id: &'a str,
    pub notifier: &'a Notifier,
}

pub struct ProtocolServer {
    registry: Arc<ToolRegistry>,
    identity: ServerIdentity,
    tool_timeout: Option<Duration>,
}

impl ProtocolServer {
    pub fn new(
        registry: Arc<ToolRegistry>,
        identity: ServerIdentity,
        tool_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            identity,
            tool_timeout,
        }
    }

    /// Answers one request with the `result` member of the reply
    ///
    /// # Errors
    ///
    /// * `ProtocolFault::MethodNotFound` - `tools/call` names no registered tool
    /// * `ProtocolFault::Internal` - result could not be serialized
    pub async fn handle_request(
        &self,
        request: McpRequest,
        ctx: &RequestContext<'_>,
    ) -> Result<Value, ProtocolFault> {
        match request {
            McpRequest::Initialize(params) => self.initialize(params, ctx),
            McpRequest::Ping => Ok(json!({})),
            McpRequest::ListTools => Ok(self.list_tools()),
            McpRequest::CallTool(params) => self.call_tool(params, ctx).await,
        }
    }

    pub fn handle_notification(&self, notification: McpNotification, ctx: &RequestContext<'_>) {
        match notification {
            McpNotification::Initialized => {
                tracing::debug!(session_id = %ctx.session_id, "Client finished initialization");
            }
            // In-flight handlers run to completion; their result is discarded
            McpNotification::Cancelled { request_id } => {
                tracing::debug!(
                    session_id = %ctx.session_id,
                    request_id = ?request_id,
                    "Client cancelled request"
                );
            }
            McpNotification::Other(method) => {
                tracing::debug!(session_id = %ctx.session_id, method = %method, "Ignoring notification");
            }
        }
    }

    fn initialize(
        &self,
        params: InitializeParams,
        ctx: &RequestContext<'_>,
    ) -> Result<Value, ProtocolFault> {
        let version = negotiate_version(params.protocol_version.as_deref());
        let client = params
            .client_info
            .as_ref()
            .map(|info| info.name.as_str())
            .unwrap_or("unknown");

        tracing::info!(
            session_id = %ctx.session_id,
            client = %client,
            protocol_version = %version,
            "Session initialized"
        );

        let server_info = Implementation {
            name: self.identity.name.clone(),
            version: self.identity.version.clone(),
            title: None,
            website_url: None,
            icons: None,
        };

        Ok(json!({
            "protocolVersion": version,
            "capabilities": ServerCapabilities::builder().enable_tools().build(),
            "serverInfo": server_info,
            "instructions": self.identity.instructions,
        }))
    }

    /// Full catalogue; identical on every call
    pub fn list_tools(&self) -> Value {
        json!({ "tools": self.registry.list_tools() })
    }

    async fn call_tool(
        &self,
        params: CallToolParams,
        ctx: &RequestContext<'_>,
    ) -> Result<Value, ProtocolFault> {
        let tool = params.name.as_str();
        let arguments = params.arguments.clone().unwrap_or_else(|| json!({}));

        let pending = self.registry.dispatch(tool, arguments).map_err(|fault| {
            tracing::warn!(session_id = %ctx.session_id, tool = %tool, "Call to unknown tool");
            fault
        })?;

        let progress_token = params.progress_token();
        if let Some(token) = progress_token {
            ctx.notifier.notify(
                NOTIFICATION_PROGRESS,
                json!({"progressToken": token, "progress": 0}),
            );
        }

        let outcome = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .unwrap_or(Err(ToolError::TimedOut(limit))),
            None => pending.await,
        };

        if let Some(token) = progress_token {
            ctx.notifier.notify(
                NOTIFICATION_PROGRESS,
                json!({"progressToken": token, "progress": 1, "total": 1}),
            );
        }

        let result = match outcome {
            Ok(value) => {
                tracing::info!(session_id = %ctx.session_id, tool = %tool, "Tool call succeeded");
                success_result(value)?
            }
            Err(err) => {
                if let ToolError::Internal(source) = &err {
                    tracing::error!(
                        session_id = %ctx.session_id,
                        tool = %tool,
                        error = ?source,
                        "Tool call failed"
                    );
                } else {
                    tracing::warn!(
                        session_id = %ctx.session_id,
                        tool = %tool,
                        error = %err,
                        "Tool call failed"
                    );
                }
                failure_result(&err)?
            }
        };

        serde_json::to_value(&result).map_err(ProtocolFault::internal)
    }
}

fn success_result(value: Value) -> Result<CallToolResult, ProtocolFault> {
    let text = serde_json::to_string(&value).map_err(ProtocolFault::internal)?;
    let mut result = CallToolResult::success(vec![Content::text(text)]);
    result.structured_content = Some(value);
    Ok(result)
}

fn failure_result(err: &ToolError) -> Result<CallToolResult, ProtocolFault> {
    let text = serde_json::to_string(&json!({ "error": err.wire_message() }))
        .map_err(ProtocolFault::internal)?;
    Ok(CallToolResult::error(vec![Content::text(text)]))
}
