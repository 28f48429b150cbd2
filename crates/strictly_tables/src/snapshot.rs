//! Read-only copies of session state handed out to callers.

use crate::chat::ChatMessage;
use crate::collaborators::PlayerStats;
use crate::session::{Identity, SessionId, SessionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use strictly_gomoku::{MatchId, MatchSnapshot, Mark, Outcome};

/// A seated player as others see them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    /// Occupant identity.
    pub identity: Identity,
    /// Display name.
    pub display_name: String,
    /// Mark of the slot.
    pub mark: Mark,
    /// False while the occupant has no live connection.
    pub connected: bool,
    /// Statistics, when the profile service supplied them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PlayerStats>,
}

/// A spectator as others see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpectatorView {
    /// Spectator identity.
    pub identity: Identity,
    /// Display name.
    pub display_name: String,
}

/// Complete copy of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: SessionId,
    /// Session display name.
    pub name: String,
    /// Derived status.
    pub status: SessionStatus,
    /// First identity seated as Black.
    pub creator: Option<Identity>,
    /// Black slot.
    pub black: Option<SlotView>,
    /// White slot.
    pub white: Option<SlotView>,
    /// Spectators ordered by identity.
    pub spectators: Vec<SpectatorView>,
    /// Current match, if both slots are filled.
    #[serde(rename = "match")]
    pub game: Option<MatchSnapshot>,
    /// Most recent chat lines, oldest first.
    pub chat: Vec<ChatMessage>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Returns the slot view for `mark`.
    pub fn slot(&self, mark: Mark) -> Option<&SlotView> {
        match mark {
            Mark::Black => self.black.as_ref(),
            Mark::White => self.white.as_ref(),
        }
    }

    /// Number of occupied slots.
    pub fn player_count(&self) -> usize {
        self.black.iter().count() + self.white.iter().count()
    }
}

/// One row of the lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: SessionId,
    /// Session display name.
    pub name: String,
    /// Derived status.
    pub status: SessionStatus,
    /// Occupied slots.
    pub players: usize,
    /// Spectator count.
    pub spectators: usize,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// A player in a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchParticipant {
    /// Player identity.
    pub identity: Identity,
    /// Display name during the match.
    pub display_name: String,
}

/// Summary of a finished match, handed to the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    /// Session the match was played in.
    pub session_id: SessionId,
    /// Match identifier.
    pub match_id: MatchId,
    /// Black player.
    pub black: MatchParticipant,
    /// White player.
    pub white: MatchParticipant,
    /// Terminal outcome.
    pub outcome: Outcome,
    /// Number of stones placed.
    pub move_count: usize,
    /// When the match started.
    pub started_at: DateTime<Utc>,
    /// When the match finished.
    pub finished_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Identity of the winner, if any.
    pub fn winner(&self) -> Option<&Identity> {
        match self.outcome.winner()? {
            Mark::Black => Some(&self.black.identity),
            Mark::White => Some(&self.white.identity),
        }
    }
}
