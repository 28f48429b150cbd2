//! Strictly Tables - real-time gomoku table host.
//!
//! Many connections create tables, take and give up seats, watch, chat and
//! play, while everyone at a table sees one consistently ordered view of it.
//!
//! # Architecture
//!
//! - **Session**: one table; every change is serialized on its own mutex
//! - **Registry**: the directory of live tables and lobby subscribers
//! - **Dispatcher**: the single inbound operation contract
//! - **Server**: a thin WebSocket adapter around the dispatcher
//!
//! # Example
//!
//! ```
//! use strictly_tables::{SessionConfig, SessionRegistry, SessionStatus};
//!
//! let registry = SessionRegistry::new(SessionConfig::default());
//! let table = registry.create("Friday night").expect("valid name");
//! table.with(|s| s.join("alice", "Alice", None, None, None)).expect("open seat");
//! table.with(|s| s.join("bob", "Bob", None, None, None)).expect("open seat");
//! assert_eq!(table.snapshot().unwrap().status, SessionStatus::Active);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chat;
mod collaborators;
mod config;
mod connection;
mod dispatcher;
mod error;
mod events;
mod rate_limit;
mod registry;
mod server;
mod session;
mod snapshot;

pub use chat::{ChatMessage, escape_markup, sanitize_text};
pub use collaborators::{
    CollaboratorError, InMemoryLedger, MatchRecorder, PlayerProfile, PlayerStats, ProfileLookup,
};
pub use config::{
    AppConfig, ConfigError, ENV_PREFIX, ProfilesConfig, RateLimitConfig, ServerConfig,
    SessionConfig,
};
pub use connection::{
    ChannelConnection, ConnectionHandle, ConnectionId, Outbound, SharedConnection,
    next_connection_id,
};
pub use dispatcher::{Dispatcher, ErrorBody, OpName, Request, Response};
pub use error::{ErrorCategory, ErrorKind, SessionError};
pub use events::{PushEvent, Role};
pub use rate_limit::RateLimiter;
pub use registry::SessionRegistry;
pub use server::{router, serve};
pub use session::{
    Identity, MoveOutcome, Session, SessionId, SessionStatus, SharedSession, SlotOccupant,
    Spectator,
};
pub use snapshot::{
    MatchParticipant, MatchRecord, SessionSnapshot, SessionSummary, SlotView, SpectatorView,
};
