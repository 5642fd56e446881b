//! HTTP entry points of the MCP endpoint
//!
//! One path, three verbs:
//!
//! | Verb     | Session header | Effect                                          |
//! |----------|----------------|-------------------------------------------------|
//! | `POST`   | absent         | `initialize` creates a session, anything else 400 |
//! | `POST`   | present        | message for the live session, unknown id 400    |
//! | `GET`    | required       | opens the session's event stream, unknown id 404 |
//! | `DELETE` | required       | closes the session, unknown id 404              |
//!
//! Rejected requests never touch the session table.

use crate::error::{ProtocolFault, RpcFault};
use crate::mcp::protocol::{is_supported_version, ClientMessage, Envelope, McpRequest};
use crate::mcp::session::{Session, SessionTable};
use crate::mcp::transport::{TransportRequest, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct McpState {
    pub sessions: Arc<SessionTable>,
}

impl McpState {
    pub fn new(sessions: Arc<SessionTable>) -> Self {
        Self { sessions }
    }
}

/// Router serving the endpoint at `path` plus `GET /health`
pub fn mcp_router(state: McpState, path: &str) -> Router {
    Router::new()
        .route(
            path,
            post(mcp_post_handler)
                .get(mcp_get_handler)
                .delete(mcp_delete_handler),
        )
        .route("/health", get(health_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            HeaderName::from_static(SESSION_ID_HEADER),
            HeaderName::from_static(PROTOCOL_VERSION_HEADER),
        ])
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
        .max_age(std::time::Duration::from_secs(3600))
}

/// POST - create a session or deliver a message to one
///
/// The request `id` is echoed in any error envelope, `null` when absent.
/// An unknown session id is reported before anything about the body.
pub async fn mcp_post_handler(
    State(state): State<McpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RpcFault> {
    match session_header(&headers).map_err(|f| f.with_id(request_id(&body)))? {
        Some(session_id) => {
            let session = state
                .sessions
                .get(&session_id)
                .await
                .ok_or_else(|| no_valid_session(request_id(&body)))?;

            deliver(&session, &headers, &body).await.map_err(|fault| {
                if session.transport.is_closed() {
                    fault
                } else {
                    fault.in_session(session.id())
                }
            })
        }
        None => {
            let envelope = Envelope::from_slice(&body)?;
            let id = envelope.id.clone();

            let message = match ClientMessage::classify(envelope) {
                Ok(
                    message @ ClientMessage::Request {
                        request: McpRequest::Initialize(_),
                        ..
                    },
                ) => message,
                _ => return Err(no_valid_session(id)),
            };

            let session = state
                .sessions
                .create()
                .await
                .map_err(|f| f.with_id(id.clone()))?;
            let reply = session.handle(TransportRequest::Message(message)).await;

            // A failed handshake leaves nothing behind
            match reply {
                Ok(response) => Ok(response),
                Err(fault) => {
                    discard(&state.sessions, &session).await;
                    Err(fault.in_session(None))
                }
            }
        }
    }
}

async fn deliver(session: &Session, headers: &HeaderMap, body: &[u8]) -> Result<Response, RpcFault> {
    let envelope = Envelope::from_slice(body)?;
    let id = envelope.id.clone();
    check_protocol_version(headers).map_err(|f| f.with_id(id.clone()))?;

    let message = ClientMessage::classify(envelope).map_err(|f| f.with_id(id))?;
    session.handle(TransportRequest::Message(message)).await
}

/// Best-effort `id` of a body that may not parse
fn request_id(body: &[u8]) -> Option<Value> {
    Envelope::from_slice(body).ok().and_then(|envelope| envelope.id)
}

/// GET - open the server-to-client event stream
pub async fn mcp_get_handler(
    State(state): State<McpState>,
    headers: HeaderMap,
) -> Result<Response, RpcFault> {
    let session = require_session(&state, &headers).await?;
    check_protocol_version(&headers).map_err(|f| RpcFault::from(f).in_session(session.id()))?;
    session.handle(TransportRequest::OpenStream).await
}

/// DELETE - terminate the session
pub async fn mcp_delete_handler(
    State(state): State<McpState>,
    headers: HeaderMap,
) -> Result<Response, RpcFault> {
    let session = require_session(&state, &headers).await?;
    check_protocol_version(&headers).map_err(|f| RpcFault::from(f).in_session(session.id()))?;
    session.handle(TransportRequest::Terminate).await
}

pub async fn health_handler(State(state): State<McpState>) -> Response {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len().await,
    }))
    .into_response()
}

fn no_valid_session(id: Option<Value>) -> RpcFault {
    ProtocolFault::InvalidRequest("Bad Request: No valid session ID provided".into()).with_id(id)
}

fn session_header(headers: &HeaderMap) -> Result<Option<String>, ProtocolFault> {
    match headers.get(SESSION_ID_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Some(v.to_string()))
            .ok_or_else(|| {
                ProtocolFault::InvalidRequest(format!("Malformed {} header", SESSION_ID_HEADER))
            }),
    }
}

async fn require_session(state: &McpState, headers: &HeaderMap) -> Result<Session, ProtocolFault> {
    let session_id = session_header(headers)?.ok_or_else(|| {
        ProtocolFault::InvalidRequest(format!("Missing {} header", SESSION_ID_HEADER))
    })?;

    state.sessions.get(&session_id).await.ok_or_else(|| {
        tracing::debug!(session_id = %session_id, "Unknown session");
        ProtocolFault::SessionNotFound
    })
}

fn check_protocol_version(headers: &HeaderMap) -> Result<(), ProtocolFault> {
    match headers.get(PROTOCOL_VERSION_HEADER).map(|v| v.to_str()) {
        None => Ok(()),
        Some(Ok(version)) if is_supported_version(version.trim()) => Ok(()),
        Some(Ok(version)) => Err(ProtocolFault::InvalidRequest(format!(
            "Unsupported protocol version: {}",
            version
        ))),
        Some(Err(_)) => Err(ProtocolFault::InvalidRequest(format!(
            "Malformed {} header",
            PROTOCOL_VERSION_HEADER
        ))),
    }
}

async fn discard(sessions: &SessionTable, session: &Session) {
    if let Some(id) = session.id() {
        tracing::debug!(session_id = %id, "Discarding session after failed initialization");
        sessions.close(id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(session_header(&headers), Ok(None)));

        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("abc123"));
        assert_eq!(
            session_header(&headers).expect("valid").as_deref(),
            Some("abc123")
        );

        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("  "));
        assert!(matches!(
            session_header(&headers),
            Err(ProtocolFault::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_protocol_version_header() {
        let mut headers = HeaderMap::new();
        assert!(check_protocol_version(&headers).is_ok());

        headers.insert(PROTOCOL_VERSION_HEADER, HeaderValue::from_static("2025-06-18"));
        assert!(check_protocol_version(&headers).is_ok());

        headers.insert(PROTOCOL_VERSION_HEADER, HeaderValue::from_static("2023-01-01"));
        assert!(matches!(
            check_protocol_version(&headers),
            Err(ProtocolFault::InvalidRequest(_))
        ));
    }
}
