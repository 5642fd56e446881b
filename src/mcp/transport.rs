//! Per-session message channel
//!
//! [`SessionTransport`] turns HTTP traffic for one session into protocol
//! messages for its [`ProtocolServer`] and back:
//!
//! - `POST` bodies become [`TransportRequest::Message`] and are answered with
//!   a JSON reply (requests) or `202 Accepted` (notifications).
//! - `GET` becomes [`TransportRequest::OpenStream`], the single
//!   server-to-client SSE stream of the session. Notifications queued before
//!   the stream is opened are delivered first.
//! - `DELETE` becomes [`TransportRequest::Terminate`].
//!
//! The transport owns the session id once assigned and signals closure
//! exactly once through its close hook, whether closure came from `DELETE`,
//! the stream being dropped by the client, idle eviction or shutdown.

use crate::error::{ProtocolFault, RpcFault};
use crate::mcp::protocol::{notification, success_response, ClientMessage, McpRequest};
use crate::mcp::server::{ProtocolServer, RequestContext};
use axum::{
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const SESSION_ID_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Server-to-client messages held while no stream is attached
const NOTIFICATION_BACKLOG: usize = 64;

pub type CloseHook = Box<dyn FnOnce(String) -> BoxFuture<'static, ()> + Send>;

pub enum TransportRequest {
    Message(ClientMessage),
    OpenStream,
    Terminate,
}

/// Sending half of the server-to-client channel
///
/// Messages that do not fit the backlog are dropped; notifications are
/// advisory and must never block a tool call.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Value>,
}

impl Notifier {
    pub fn notify(&self, method: &str, params: Value) {
        match self.tx.try_send(notification(method, params)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(method, "Notification backlog full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(method, "Notification stream closed, dropping message");
            }
        }
    }
}

pub struct SessionTransport {
    session_id: OnceLock<String>,
    initialized: AtomicBool,
    closed: CancellationToken,
    notifier: Notifier,
    stream_rx: Mutex<Option<mpsc::Receiver<Value>>>,
    keep_alive: Duration,
    created: Instant,
    last_seen_ms: AtomicU64,
    on_close: Mutex<Option<CloseHook>>,
}

impl Default for SessionTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTransport {
    pub fn new() -> Self {
        Self::with_keep_alive(Duration::from_secs(15))
    }

    pub fn with_keep_alive(keep_alive: Duration) -> Self {
        let (tx, rx) = mpsc::channel(NOTIFICATION_BACKLOG);
        Self {
            session_id: OnceLock::new(),
            initialized: AtomicBool::new(false),
            closed: CancellationToken::new(),
            notifier: Notifier { tx },
            stream_rx: Mutex::new(Some(rx)),
            keep_alive,
            created: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
            on_close: Mutex::new(None),
        }
    }

    /// Fixes the session id; a second assignment is refused
    pub fn assign_id(&self, id: String) -> Result<(), ProtocolFault> {
        self.session_id.set(id).map_err(|_| {
            ProtocolFault::internal(anyhow::anyhow!("session id assigned twice"))
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.get().map(String::as_str)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn set_close_hook(&self, hook: CloseHook) {
        if let Ok(mut slot) = self.on_close.lock() {
            *slot = Some(hook);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// True while a client holds the server-to-client stream
    pub fn has_stream(&self) -> bool {
        self.stream_rx
            .lock()
            .map(|rx| rx.is_none())
            .unwrap_or(false)
    }

    pub fn touch(&self) {
        let elapsed = self.created.elapsed().as_millis() as u64;
        self.last_seen_ms.store(elapsed, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last_seen)
    }

    /// Closes the transport and fires the close hook once
    pub async fn close(&self) {
        self.closed.cancel();

        let hook = self.on_close.lock().ok().and_then(|mut slot| slot.take());
        if let (Some(hook), Some(id)) = (hook, self.session_id.get()) {
            hook(id.clone()).await;
        }
    }

    pub async fn handle(
        self: &Arc<Self>,
        request: TransportRequest,
        server: &ProtocolServer,
    ) -> Result<Response, RpcFault> {
        if self.is_closed() {
            return Err(ProtocolFault::SessionNotFound.into());
        }
        self.touch();

        let reply = match request {
            TransportRequest::Message(message) => self.handle_message(message, server).await,
            TransportRequest::OpenStream => self.open_stream().map_err(RpcFault::from),
            TransportRequest::Terminate => {
                self.close().await;
                Ok(self.with_session_header(StatusCode::NO_CONTENT.into_response()))
            }
        };
        reply.map_err(|fault| fault.in_session(self.session_id()))
    }

    async fn handle_message(
        &self,
        message: ClientMessage,
        server: &ProtocolServer,
    ) -> Result<Response, RpcFault> {
        let session_id = self.session_id().unwrap_or_default();
        let ctx = RequestContext {
            session_id,
            notifier: &self.notifier,
        };

        match message {
            ClientMessage::Request { id, request } => {
                if matches!(request, McpRequest::Initialize(_))
                    && self.initialized.swap(true, Ordering::AcqRel)
                {
                    return Err(ProtocolFault::InvalidRequest(
                        "Server already initialized".into(),
                    )
                    .with_id(Some(id)));
                }

                let method = request.method();
                tracing::debug!(session_id = %session_id, method, "Handling request");

                let result = server
                    .handle_request(request, &ctx)
                    .await
                    .map_err(|fault| fault.with_id(Some(id.clone())))?;

                let body = Json(success_response(id, result));
                Ok(self.with_session_header((StatusCode::OK, body).into_response()))
            }
            ClientMessage::Notification(notification) => {
                server.handle_notification(notification, &ctx);
                Ok(self.with_session_header(StatusCode::ACCEPTED.into_response()))
            }
            ClientMessage::Response { id } => {
                tracing::debug!(session_id = %session_id, id = %id, "Ignoring client response");
                Ok(self.with_session_header(StatusCode::ACCEPTED.into_response()))
            }
        }
    }

    fn open_stream(self: &Arc<Self>) -> Result<Response, ProtocolFault> {
        let rx = self
            .stream_rx
            .lock()
            .map_err(|_| ProtocolFault::internal(anyhow::anyhow!("stream lock poisoned")))?
            .take()
            .ok_or_else(|| {
                ProtocolFault::StreamConflict(
                    "Only one server-to-client stream is allowed per session".into(),
                )
            })?;

        tracing::debug!(session_id = %self.session_id().unwrap_or_default(), "Opened event stream");

        let state = StreamState {
            rx,
            closed: self.closed.clone(),
            _guard: StreamGuard {
                transport: Arc::clone(self),
            },
        };

        let events = futures::stream::unfold(state, |mut state| async move {
            let next = tokio::select! {
                _ = state.closed.cancelled() => None,
                message = state.rx.recv() => message,
            };
            let event = Event::default().event("message").data(next?.to_string());
            Some((Ok::<Event, Infallible>(event), state))
        });

        let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(self.keep_alive));
        Ok(self.with_session_header(sse.into_response()))
    }

    fn with_session_header(&self, mut response: Response) -> Response {
        if let Some(value) = self
            .session_id()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        response
    }

    #[cfg(test)]
    pub(crate) fn drain_pending(&self) -> Vec<Value> {
        let mut drained = Vec::new();
        if let Ok(mut slot) = self.stream_rx.lock() {
            if let Some(rx) = slot.as_mut() {
                while let Ok(message) = rx.try_recv() {
                    drained.push(message);
                }
            }
        }
        drained
    }
}

struct StreamState {
    rx: mpsc::Receiver<Value>,
    closed: CancellationToken,
    _guard: StreamGuard,
}

/// Closes the session when the client drops its stream
struct StreamGuard {
    transport: Arc<SessionTransport>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.transport.is_closed() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                tracing::info!(
                    session_id = %transport.session_id().unwrap_or_default(),
                    "Client dropped event stream"
                );
                transport.close().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_close_fires_hook_once() {
        let transport = SessionTransport::new();
        transport.assign_id("abc".into()).expect("assign");

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        transport.set_close_hook(Box::new(move |id: String| {
            async move {
                assert_eq!(id, "abc");
                seen.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }));

        transport.close().await;
        transport.close().await;

        assert!(transport.is_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_id_assigned_once() {
        let transport = SessionTransport::new();
        assert!(transport.session_id().is_none());
        transport.assign_id("first".into()).expect("assign");
        assert!(transport.assign_id("second".into()).is_err());
        assert_eq!(transport.session_id(), Some("first"));
    }

    #[test]
    fn test_notifications_queue_until_stream_opens() {
        let transport = SessionTransport::new();
        transport
            .notifier()
            .notify("notifications/message", serde_json::json!({"level": "info"}));

        let pending = transport.drain_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["jsonrpc"], "2.0");
        assert_eq!(pending[0]["method"], "notifications/message");
    }

    #[tokio::test]
    async fn test_touch_resets_idle_time() {
        let transport = SessionTransport::new();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(transport.idle_for() >= Duration::from_millis(30));
        transport.touch();
        assert!(transport.idle_for() < Duration::from_millis(30));
    }
}
