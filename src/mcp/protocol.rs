//! JSON-RPC 2.0 message model for the MCP endpoint
//!
//! Incoming bodies are first read as a loose [`Envelope`] (so the request id
//! can be echoed even when the message is invalid) and then classified into
//! the closed set of messages this server understands, [`ClientMessage`].

use crate::error::ProtocolFault;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// Newest first; the first entry is offered when a client asks for an
/// unsupported version.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_PING: &str = "ping";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";
pub const NOTIFICATION_PROGRESS: &str = "notifications/progress";

pub fn latest_protocol_version() -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS[0]
}

pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// Echo the client's version when we speak it, otherwise offer the latest
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|req| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|v| *v == req)
        })
        .unwrap_or_else(latest_protocol_version)
}

/// Loosely-typed view of a JSON-RPC object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Envelope {
    /// Parses a raw HTTP body
    ///
    /// # Errors
    ///
    /// * `ProtocolFault::ParseError` - body is not JSON
    /// * `ProtocolFault::InvalidRequest` - body is a batch or not an object
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolFault> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolFault::InvalidRequest("Empty request body".into()));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ProtocolFault::ParseError(e.to_string()))?;

        match value {
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| ProtocolFault::InvalidRequest(e.to_string())),
            Value::Array(_) => Err(ProtocolFault::InvalidRequest(
                "Batch requests are not supported".into(),
            )),
            _ => Err(ProtocolFault::InvalidRequest(
                "Expected a JSON-RPC object".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default)]
    pub progress_token: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default, rename = "_meta")]
    pub meta: Option<RequestMeta>,
}

impl CallToolParams {
    pub fn progress_token(&self) -> Option<&Value> {
        self.meta.as_ref().and_then(|m| m.progress_token.as_ref())
    }
}

/// Requests answered by a protocol server instance
#[derive(Debug, Clone)]
pub enum McpRequest {
    Initialize(InitializeParams),
    Ping,
    ListTools,
    CallTool(CallToolParams),
}

impl McpRequest {
    fn from_method(method: &str, params: Option<Value>) -> Result<Self, ProtocolFault> {
        match method {
            METHOD_INITIALIZE => Ok(McpRequest::Initialize(parse_params(params)?)),
            METHOD_PING => Ok(McpRequest::Ping),
            METHOD_TOOLS_LIST => Ok(McpRequest::ListTools),
            METHOD_TOOLS_CALL => Ok(McpRequest::CallTool(parse_params(params)?)),
            other => Err(ProtocolFault::MethodNotFound(other.to_string())),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            McpRequest::Initialize(_) => METHOD_INITIALIZE,
            McpRequest::Ping => METHOD_PING,
            McpRequest::ListTools => METHOD_TOOLS_LIST,
            McpRequest::CallTool(_) => METHOD_TOOLS_CALL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum McpNotification {
    Initialized,
    Cancelled { request_id: Option<Value> },
    Other(String),
}

impl McpNotification {
    fn from_method(method: &str, params: Option<Value>) -> Self {
        match method {
            NOTIFICATION_INITIALIZED => McpNotification::Initialized,
            NOTIFICATION_CANCELLED => McpNotification::Cancelled {
                request_id: params.and_then(|p| p.get("requestId").cloned()),
            },
            other => McpNotification::Other(other.to_string()),
        }
    }
}

/// Every message a client may POST
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Request { id: Value, request: McpRequest },
    Notification(McpNotification),
    /// Reply to a server-initiated request
    Response { id: Value },
}

impl ClientMessage {
    /// Classifies an envelope
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - wrong `jsonrpc` version or no `method`
    /// * `MethodNotFound` - unknown request method
    /// * `InvalidParams` - params do not fit the method
    pub fn classify(envelope: Envelope) -> Result<Self, ProtocolFault> {
        if envelope.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err(ProtocolFault::InvalidRequest(
                "jsonrpc must be \"2.0\"".into(),
            ));
        }

        match (envelope.method, envelope.id) {
            (Some(method), Some(id)) => Ok(ClientMessage::Request {
                request: McpRequest::from_method(&method, envelope.params)?,
                id,
            }),
            (Some(method), None) => Ok(ClientMessage::Notification(
                McpNotification::from_method(&method, envelope.params),
            )),
            (None, Some(id)) if envelope.result.is_some() || envelope.error.is_some() => {
                Ok(ClientMessage::Response { id })
            }
            (None, _) => Err(ProtocolFault::InvalidRequest("Missing method field".into())),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, ProtocolFault> {
    let params = params.unwrap_or_else(|| json!({}));
    serde_json::from_value(params).map_err(|e| ProtocolFault::InvalidParams(e.to_string()))
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub fn notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(value: Value) -> Envelope {
        Envelope::from_slice(value.to_string().as_bytes()).expect("envelope")
    }

    #[test]
    fn test_classify_requests() {
        let msg = ClientMessage::classify(envelope(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "user_get_by_id", "arguments": {"userId": 7}}
        })))
        .expect("valid");

        match msg {
            ClientMessage::Request {
                id,
                request: McpRequest::CallTool(params),
            } => {
                assert_eq!(id, json!(2));
                assert_eq!(params.name, "user_get_by_id");
                assert_eq!(params.arguments, Some(json!({"userId": 7})));
            }
            other => panic!("unexpected {:?}", other),
        }

        let list = ClientMessage::classify(envelope(
            json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}),
        ))
        .expect("valid");
        assert!(matches!(
            list,
            ClientMessage::Request {
                request: McpRequest::ListTools,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_notifications_and_responses() {
        let init = ClientMessage::classify(envelope(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ))
        .expect("valid");
        assert!(matches!(
            init,
            ClientMessage::Notification(McpNotification::Initialized)
        ));

        let cancelled = ClientMessage::classify(envelope(json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": 9, "reason": "user aborted"}
        })))
        .expect("valid");
        assert!(matches!(
            cancelled,
            ClientMessage::Notification(McpNotification::Cancelled { request_id: Some(ref id) }) if *id == json!(9)
        ));

        let reply = ClientMessage::classify(envelope(
            json!({"jsonrpc": "2.0", "id": 4, "result": {}}),
        ))
        .expect("valid");
        assert!(matches!(reply, ClientMessage::Response { .. }));
    }

    #[test]
    fn test_classify_faults() {
        let missing_method =
            ClientMessage::classify(envelope(json!({"jsonrpc": "2.0", "id": 1})));
        assert!(matches!(
            missing_method,
            Err(ProtocolFault::InvalidRequest(_))
        ));

        let wrong_version = ClientMessage::classify(envelope(
            json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}),
        ));
        assert!(matches!(wrong_version, Err(ProtocolFault::InvalidRequest(_))));

        let unknown = ClientMessage::classify(envelope(
            json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}),
        ));
        assert!(matches!(unknown, Err(ProtocolFault::MethodNotFound(m)) if m == "resources/list"));

        let bad_params = ClientMessage::classify(envelope(
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"arguments": {}}}),
        ));
        assert!(matches!(bad_params, Err(ProtocolFault::InvalidParams(_))));
    }

    #[test]
    fn test_envelope_rejects_non_objects() {
        assert!(matches!(
            Envelope::from_slice(b"{not json"),
            Err(ProtocolFault::ParseError(_))
        ));
        assert!(matches!(
            Envelope::from_slice(b"[]"),
            Err(ProtocolFault::InvalidRequest(_))
        ));
        assert!(matches!(
            Envelope::from_slice(b"   "),
            Err(ProtocolFault::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_version_negotiation() {
        assert_eq!(negotiate_version(Some("2025-03-26")), "2025-03-26");
        assert_eq!(negotiate_version(Some("1999-01-01")), latest_protocol_version());
        assert_eq!(negotiate_version(None), latest_protocol_version());
        assert!(is_supported_version("2024-11-05"));
        assert!(!is_supported_version("2024-01-01"));
    }
}
