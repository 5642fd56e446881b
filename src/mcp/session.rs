//! Session table
//!
//! Maps session ids to the `(transport, server)` pair bound at creation.
//! The table is the single source of truth for "does this session exist":
//! an id without an entry behaves exactly like one that was never issued.
//!
//! # Lifecycle
//!
//! ```text
//! NoSession --initialize--> Initializing --id assigned + inserted--> Active
//! Active --DELETE / stream dropped / idle / shutdown--> Closed (entry removed)
//! ```
//!
//! Every closure path goes through [`SessionTransport::close`], whose close
//! hook removes the entry, so the table is updated in exactly one place.

use crate::config::McpConfig;
use crate::error::{ProtocolFault, RpcFault};
use crate::mcp::registry::ToolRegistry;
use crate::mcp::server::{ProtocolServer, ServerIdentity};
use crate::mcp::transport::{SessionTransport, TransportRequest};
use async_trait::async_trait;
use axum::response::Response;
use futures::FutureExt;
use rand::RngCore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session id already in use: {0}")]
    DuplicateId(String),
}

/// Source of session ids
pub trait SessionIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 32 bytes from the OS random source, hex encoded
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSessionIdGenerator;

impl SessionIdGenerator for RandomSessionIdGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// One live session; the binding never changes after creation
#[derive(Clone)]
pub struct Session {
    pub transport: Arc<SessionTransport>,
    pub server: Arc<ProtocolServer>,
}

impl Session {
    pub fn id(&self) -> Option<&str> {
        self.transport.session_id()
    }

    pub async fn handle(&self, request: TransportRequest) -> Result<Response, RpcFault> {
        self.transport.handle(request, &self.server).await
    }
}

/// Concurrent storage behind the session table
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts only if `id` is vacant
    async fn insert(&self, id: String, session: Session) -> Result<(), SessionError>;
    async fn get(&self, id: &str) -> Option<Session>;
    /// Removes `id` only while it is still bound to `transport`
    async fn remove_bound(
        &self,
        id: &str,
        transport: &Weak<SessionTransport>,
    ) -> Option<Session>;
    async fn len(&self) -> usize;
    async fn snapshot(&self) -> Vec<Session>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, id: String, session: Session) -> Result<(), SessionError> {
        match self.sessions.write().await.entry(id) {
            Entry::Occupied(entry) => Err(SessionError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove_bound(
        &self,
        id: &str,
        transport: &Weak<SessionTransport>,
    ) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(session) if std::ptr::eq(Arc::as_ptr(&session.transport), transport.as_ptr()) => {
                sessions.remove(id)
            }
            _ => None,
        }
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn snapshot(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }
}

/// Creates, finds and retires sessions
pub struct SessionTable {
    store: Arc<dyn SessionStore>,
    ids: Arc<dyn SessionIdGenerator>,
    registry: Arc<ToolRegistry>,
    identity: ServerIdentity,
    tool_timeout: Option<Duration>,
    stream_keep_alive: Duration,
}

impl SessionTable {
    pub fn new(registry: Arc<ToolRegistry>, config: &McpConfig) -> Self {
        Self::with_parts(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(RandomSessionIdGenerator),
            registry,
            config,
        )
    }

    pub fn with_parts(
        store: Arc<dyn SessionStore>,
        ids: Arc<dyn SessionIdGenerator>,
        registry: Arc<ToolRegistry>,
        config: &McpConfig,
    ) -> Self {
        Self {
            store,
            ids,
            registry,
            identity: ServerIdentity::new(config.server_name.clone()),
            tool_timeout: config.tool_timeout,
            stream_keep_alive: config.stream_keep_alive,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Allocates and registers a fresh session
    ///
    /// The entry is inserted only after the transport holds its final id and
    /// its close hook. The hook removes the entry only while it still points
    /// at this transport, so a refused duplicate cannot evict the session it
    /// collided with.
    ///
    /// # Errors
    ///
    /// * `ProtocolFault::Internal` - generated id collided with a live session
    pub async fn create(&self) -> Result<Session, ProtocolFault> {
        let session = Session {
            transport: Arc::new(SessionTransport::with_keep_alive(self.stream_keep_alive)),
            server: Arc::new(ProtocolServer::new(
                Arc::clone(&self.registry),
                self.identity.clone(),
                self.tool_timeout,
            )),
        };

        let id = self.ids.generate();
        session.transport.assign_id(id.clone())?;

        let store: Weak<dyn SessionStore> = Arc::downgrade(&self.store);
        let owner = Arc::downgrade(&session.transport);
        session.transport.set_close_hook(Box::new(move |id: String| {
            async move {
                if let Some(store) = store.upgrade() {
                    if store.remove_bound(&id, &owner).await.is_some() {
                        tracing::info!(session_id = %id, "Session closed");
                    }
                }
            }
            .boxed()
        }));

        self.store
            .insert(id.clone(), session.clone())
            .await
            .map_err(ProtocolFault::internal)?;

        tracing::info!(session_id = %id, "Session created");
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.store.get(id).await
    }

    /// Closes a session by id; `false` if it was not live
    pub async fn close(&self, id: &str) -> bool {
        match self.store.get(id).await {
            Some(session) => {
                session.transport.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Closes sessions without traffic for `max_idle`
    ///
    /// Sessions holding an open event stream are never idle.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut evicted = 0;
        for session in self.store.snapshot().await {
            let transport = &session.transport;
            if transport.has_stream() || transport.idle_for() < max_idle {
                continue;
            }
            tracing::info!(
                session_id = %transport.session_id().unwrap_or_default(),
                idle_secs = transport.idle_for().as_secs(),
                "Evicting idle session"
            );
            transport.close().await;
            evicted += 1;
        }
        evicted
    }

    /// Closes every live session
    pub async fn close_all(&self) -> usize {
        let sessions = self.store.snapshot().await;
        let count = sessions.len();
        for session in sessions {
            session.transport.close().await;
        }
        if count > 0 {
            tracing::info!(count, "Closed all sessions");
        }
        count
    }

    /// Runs [`Self::evict_idle`] every `interval` until `shutdown` fires
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let table = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = table.evict_idle(max_idle).await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "Idle sweep finished");
                        }
                    }
                }
            }
        })
    }
}
