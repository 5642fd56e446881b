//! Session-multiplexed MCP endpoint
//!
//! Clients talk JSON-RPC 2.0 over one HTTP path. The first `initialize`
//! request creates a session; every later request carries the session id in
//! the `mcp-session-id` header and is routed to that session's own protocol
//! server instance. Sessions live only in process memory.
//!
//! # Architecture
//!
//! ```text
//! POST/GET/DELETE ──> handlers ──> SessionTable ──> Session
//!                                                   ├─ SessionTransport (HTTP <-> messages, SSE)
//!                                                   └─ ProtocolServer  ──> ToolRegistry (shared)
//!                                                                            └─ tools::{user, search}
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use querydesk::config::McpConfig;
//! use querydesk::mcp::{mcp_router, McpState, SessionTable, ToolRegistry};
//! use std::sync::Arc;
//!
//! let config = McpConfig::default();
//! let registry = Arc::new(ToolRegistry::new(Vec::new()).expect("no duplicates"));
//! let sessions = Arc::new(SessionTable::new(registry, &config));
//! let app: axum::Router = mcp_router(McpState::new(sessions), &config.path);
//! ```

pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use handlers::{mcp_router, McpState};
pub use registry::{RegistryError, ToolDefinition, ToolRegistry};
pub use schema::{ObjectSchema, Schema};
pub use server::ProtocolServer;
pub use session::{Session, SessionIdGenerator, SessionStore, SessionTable};
pub use transport::{SessionTransport, SESSION_ID_HEADER};
