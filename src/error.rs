use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use rmcp::model::{ErrorCode, ErrorData};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::mcp::transport::SESSION_ID_HEADER;
use crate::services::search_service::SearchServiceError;
use crate::services::user_service::UserServiceError;

/// Fallback wire message for an application fault with an empty message
pub const UNKNOWN_TOOL_ERROR: &str = "Unknown error";

/// Code used when a session identifier does not resolve to a live session
pub const SESSION_NOT_FOUND: ErrorCode = ErrorCode(-32001);

/// Code used when a second server-to-client stream is opened for one session
pub const STREAM_CONFLICT: ErrorCode = ErrorCode(-32000);

/// JSON-RPC level faults
///
/// These travel in the `error` member of a JSON-RPC envelope and never touch
/// session state. Tool handler failures are NOT protocol faults; see
/// [`ToolError`].
///
/// | Variant         | JSON-RPC code | HTTP status |
/// |-----------------|---------------|-------------|
/// | ParseError      | -32700        | 400         |
/// | InvalidRequest  | -32600        | 400         |
/// | SessionNotFound | -32001        | 404         |
/// | StreamConflict  | -32000        | 409         |
/// | MethodNotFound  | -32601        | 200         |
/// | InvalidParams   | -32602        | 200         |
/// | Internal        | -32603        | 500         |
#[derive(Debug, Error)]
pub enum ProtocolFault {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Conflict: {0}")]
    StreamConflict(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Bug in routing or transport; details stay in the server log
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl ProtocolFault {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        ProtocolFault::Internal(err.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ProtocolFault::ParseError(_) => ErrorCode::PARSE_ERROR,
            ProtocolFault::InvalidRequest(_) => ErrorCode::INVALID_REQUEST,
            ProtocolFault::SessionNotFound => SESSION_NOT_FOUND,
            ProtocolFault::StreamConflict(_) => STREAM_CONFLICT,
            ProtocolFault::MethodNotFound(_) => ErrorCode::METHOD_NOT_FOUND,
            ProtocolFault::InvalidParams(_) => ErrorCode::INVALID_PARAMS,
            ProtocolFault::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// HTTP status of a reply that carries only this fault
    pub fn status(&self) -> StatusCode {
        match self {
            ProtocolFault::ParseError(_) | ProtocolFault::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ProtocolFault::SessionNotFound => StatusCode::NOT_FOUND,
            ProtocolFault::StreamConflict(_) => StatusCode::CONFLICT,
            ProtocolFault::MethodNotFound(_) | ProtocolFault::InvalidParams(_) => StatusCode::OK,
            ProtocolFault::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_data(&self) -> ErrorData {
        ErrorData {
            code: self.code(),
            message: self.to_string().into(),
            data: None,
        }
    }

    /// Full JSON-RPC error envelope echoing `id` (or `null`)
    pub fn to_envelope(&self, id: Option<&Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id.cloned().unwrap_or(Value::Null),
            "error": self.to_error_data(),
        })
    }

    /// Attaches the originating request id for rendering as an HTTP reply
    pub fn with_id(self, id: Option<Value>) -> RpcFault {
        RpcFault {
            id,
            fault: self,
            session_id: None,
        }
    }
}

/// A [`ProtocolFault`] paired with the request id it answers
///
/// Faults raised inside a live session also carry its id, which is echoed in
/// the `mcp-session-id` header like any other reply of that session.
#[derive(Debug)]
pub struct RpcFault {
    pub id: Option<Value>,
    pub fault: ProtocolFault,
    pub session_id: Option<String>,
}

impl RpcFault {
    pub fn in_session(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }
}

impl From<ProtocolFault> for RpcFault {
    fn from(fault: ProtocolFault) -> Self {
        fault.with_id(None)
    }
}

impl IntoResponse for RpcFault {
    fn into_response(self) -> Response {
        match &self.fault {
            ProtocolFault::Internal(source) => {
                tracing::error!(error = ?source, "Internal fault on MCP endpoint");
            }
            other => tracing::debug!(fault = %other, "Rejected MCP request"),
        }

        let body = self.fault.to_envelope(self.id.as_ref());
        let mut response = (self.fault.status(), Json(body)).into_response();
        if let Some(value) = self
            .session_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        response
    }
}

impl IntoResponse for ProtocolFault {
    fn into_response(self) -> Response {
        RpcFault::from(self).into_response()
    }
}

/// Application-level failure raised by a tool handler
///
/// Converted by the protocol server into a successful JSON-RPC result with
/// `isError: true`; the session stays usable.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),

    #[error("Tool timed out after {0:?}")]
    TimedOut(Duration),

    /// Unexpected failure; only a generic message reaches the client
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Failed(message.into())
    }

    /// Message surfaced on the wire, never empty
    pub fn wire_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            UNKNOWN_TOOL_ERROR.to_string()
        } else {
            message
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}

impl From<UserServiceError> for ToolError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::RepositoryError(e) => ToolError::Internal(e.into()),
            UserServiceError::HashingError(msg) => ToolError::Internal(anyhow::anyhow!(msg)),
            other => ToolError::Failed(other.to_string()),
        }
    }
}

impl From<SearchServiceError> for ToolError {
    fn from(err: SearchServiceError) -> Self {
        match err {
            SearchServiceError::Repository(e) => ToolError::Internal(e.into()),
            other => ToolError::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_codes_and_statuses() {
        let cases = [
            (ProtocolFault::ParseError("x".into()), -32700, 400),
            (ProtocolFault::InvalidRequest("x".into()), -32600, 400),
            (ProtocolFault::SessionNotFound, -32001, 404),
            (ProtocolFault::StreamConflict("x".into()), -32000, 409),
            (ProtocolFault::MethodNotFound("x".into()), -32601, 200),
            (ProtocolFault::InvalidParams("x".into()), -32602, 200),
            (ProtocolFault::internal(anyhow::anyhow!("boom")), -32603, 500),
        ];

        for (fault, code, status) in cases {
            assert_eq!(fault.code().0, code, "{fault}");
            assert_eq!(fault.status().as_u16(), status, "{fault}");
        }
    }

    #[test]
    fn test_envelope_echoes_id_or_null() {
        let fault = ProtocolFault::InvalidRequest("No valid session ID provided".into());

        let with_id = fault.to_envelope(Some(&json!(5)));
        assert_eq!(with_id["id"], 5);
        assert_eq!(with_id["jsonrpc"], "2.0");
        assert_eq!(with_id["error"]["code"], -32600);

        let without_id = fault.to_envelope(None);
        assert!(without_id["id"].is_null());
    }

    #[test]
    fn test_fault_in_session_carries_header() {
        let response = ProtocolFault::MethodNotFound("unknown tool 'nope'".into())
            .with_id(Some(json!(5)))
            .in_session(Some("abc123"))
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok()),
            Some("abc123")
        );

        let response = ProtocolFault::SessionNotFound.into_response();
        assert!(response.headers().get(SESSION_ID_HEADER).is_none());
    }

    #[test]
    fn test_internal_fault_hides_details() {
        let fault = ProtocolFault::internal(anyhow::anyhow!("serializer exploded at byte 17"));
        let envelope = fault.to_envelope(None);
        assert_eq!(envelope["error"]["message"], "Internal error");
    }

    #[test]
    fn test_tool_error_wire_message() {
        assert_eq!(ToolError::failed("User not found").wire_message(), "User not found");
        assert_eq!(ToolError::failed("  ").wire_message(), UNKNOWN_TOOL_ERROR);
        assert_eq!(
            ToolError::TimedOut(Duration::from_secs(30)).wire_message(),
            "Tool timed out after 30s"
        );
        assert_eq!(
            ToolError::Internal(anyhow::anyhow!("disk on fire")).wire_message(),
            "Internal error"
        );
    }

    #[test]
    fn test_user_service_errors_map_to_tool_errors() {
        let err: ToolError = UserServiceError::UserNotFound.into();
        assert_eq!(err.wire_message(), "User not found");

        let err: ToolError = UserServiceError::RepositoryError(
            crate::repositories::RepositoryError::Database(sqlx::Error::PoolClosed),
        )
        .into();
        assert_eq!(err.wire_message(), "Internal error");
    }
}
