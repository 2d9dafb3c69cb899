//! # Hotline Server
//!
//! The server core: everything between the two TCP listeners and the
//! stores.
//!
//! A control-port connection becomes a [`session::Session`] and runs the
//! handshake → login → agreed state machine, with one reader task feeding
//! the [`dispatch`] table and one writer task draining the session's
//! bounded outbound queue. Handlers operate on the shared [`Server`]:
//! session and chat registries, transfer tickets, accounts, news and the
//! sandboxed file store.
//!
//! A transfer-port connection authenticates with a one-shot reference
//! number and runs exactly one of the [`xfer`] drivers: file download or
//! upload, folder download or upload, or the banner fetch.
//!
//! ## Module Structure
//!
//! - [`server`]: shared state, broadcast fan-out, accept loops
//! - [`session`]: per-connection state machine and queues
//! - [`dispatch`]: transaction type → handler table with access gating
//! - [`handlers`]: the handlers themselves, split by domain
//! - [`chat`]: chat room registry
//! - [`tickets`]: transfer ticket registry
//! - [`xfer`]: transfer-port drivers
//! - [`accounts`]: account records and per-login YAML persistence
//! - [`tracker`]: tracker announce task and listing client
//! - [`stats`]: process-wide counters
//! - [`config`]: server configuration and config-directory layout

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accounts;
pub mod chat;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;
pub mod stats;
pub mod tickets;
pub mod tracker;
pub mod xfer;

pub use config::{Config, ConfigPaths};
pub use error::{HandlerError, ServerError};
pub use server::Server;
pub use session::{Session, SessionState};

/// Idle seconds before the server emits a keepalive
pub const KEEPALIVE_IDLE_SECS: u64 = 300;

/// Seconds a client gets to complete the control handshake
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Seconds a transfer ticket stays valid
pub const TICKET_TTL_SECS: u64 = 60;

/// Seconds to wait for a folder-transfer next-action code
pub const NEXT_ACTION_TIMEOUT_SECS: u64 = 30;

/// Outbound transactions a session may queue before it is dropped
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;
