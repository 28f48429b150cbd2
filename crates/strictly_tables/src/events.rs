//! Push events delivered to session members and lobby subscribers.

use crate::chat::ChatMessage;
use crate::session::{Identity, SessionId};
use crate::snapshot::{SessionSnapshot, SessionSummary};
use serde::Serialize;
use strictly_gomoku::Mark;

/// Where a member sits in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Seated in the slot playing `mark`.
    Player {
        /// Mark of the slot.
        mark: Mark,
    },
    /// Watching.
    Spectator,
}

/// Event pushed to connections without a request.
///
/// Serialized as `{"event": "<snake_case>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PushEvent {
    /// Full session state after a change.
    StateUpdated(Box<SessionSnapshot>),

    /// A chat line was appended.
    ChatAppended {
        /// Session the chat belongs to.
        session_id: SessionId,
        /// The appended message.
        message: ChatMessage,
    },

    /// Someone took a seat or started watching.
    MemberJoined {
        /// Session joined.
        session_id: SessionId,
        /// Who joined.
        identity: Identity,
        /// Their display name.
        display_name: String,
        /// Where they sit.
        role: Role,
    },

    /// Someone left a seat or stopped watching.
    MemberLeft {
        /// Session left.
        session_id: SessionId,
        /// Who left.
        identity: Identity,
        /// Their display name.
        display_name: String,
        /// Where they sat.
        role: Role,
    },

    /// The session was closed and will accept no further operations.
    SessionClosed {
        /// Closed session.
        session_id: SessionId,
        /// Identity that closed it.
        closed_by: Identity,
    },

    /// Lobby listing changed.
    SessionListChanged {
        /// Current listing.
        sessions: Vec<SessionSummary>,
    },
}

impl PushEvent {
    /// Snake-case event name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::StateUpdated(_) => "state_updated",
            PushEvent::ChatAppended { .. } => "chat_appended",
            PushEvent::MemberJoined { .. } => "member_joined",
            PushEvent::MemberLeft { .. } => "member_left",
            PushEvent::SessionClosed { .. } => "session_closed",
            PushEvent::SessionListChanged { .. } => "session_list_changed",
        }
    }
}
