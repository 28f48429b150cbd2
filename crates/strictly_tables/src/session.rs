//! One gomoku table: two slots, spectators, chat and at most one live match.
//!
//! Every state change goes through [`SharedSession::with`], which holds the
//! session's mutex for the whole operation, broadcasts while still holding
//! it, and re-checks the session invariants before releasing.

use crate::chat::{ChatMessage, name_key, sanitize_text};
use crate::collaborators::PlayerStats;
use crate::config::SessionConfig;
use crate::connection::{ConnectionId, SharedConnection};
use crate::error::{ErrorKind, SessionError};
use crate::events::{PushEvent, Role};
use crate::snapshot::{
    MatchParticipant, MatchRecord, SessionSnapshot, SessionSummary, SlotView, SpectatorView,
};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use strictly_gomoku::{InvariantViolation, Mark, Match};
use tracing::{debug, error, info, instrument, warn};

/// Unique identifier for a session.
pub type SessionId = String;

/// Stable participant reference, independent of any connection.
pub type Identity = String;

/// Session status, always derived from slots and match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    /// Fewer than two players seated.
    Waiting,
    /// Match in progress.
    Active,
    /// Match reached a terminal outcome.
    Finished,
}

/// A seated player.
#[derive(Debug, Clone)]
pub struct SlotOccupant {
    /// Occupant identity.
    pub identity: Identity,
    /// Escaped display name.
    pub display_name: String,
    /// Live connection; `None` while disconnected.
    pub connection: Option<SharedConnection>,
    /// Statistics from the profile service.
    pub stats: Option<PlayerStats>,
}

/// A watching member.
#[derive(Debug, Clone)]
pub struct Spectator {
    /// Spectator identity.
    pub identity: Identity,
    /// Escaped display name.
    pub display_name: String,
    /// Live connection.
    pub connection: Option<SharedConnection>,
}

/// Result of an accepted move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Session state after the move.
    pub snapshot: SessionSnapshot,
    /// Present when the move finished the match.
    pub record: Option<MatchRecord>,
}

fn slot_index(mark: Mark) -> usize {
    match mark {
        Mark::Black => 0,
        Mark::White => 1,
    }
}

fn slot_mark(index: usize) -> Mark {
    if index == 0 { Mark::Black } else { Mark::White }
}

/// A table.
#[derive(Debug, Getters)]
pub struct Session {
    /// Session identifier.
    id: SessionId,
    /// Display name.
    name: String,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// Identity that hosted the table, else the first one seated as Black.
    creator: Option<Identity>,
    /// Black and White slots, in that order.
    #[getter(skip)]
    slots: [Option<SlotOccupant>; 2],
    /// Spectators keyed by identity.
    spectators: BTreeMap<Identity, Spectator>,
    #[getter(skip)]
    chat: Vec<ChatMessage>,
    /// Live match; present iff both slots are occupied.
    game: Option<Match>,
    /// Limits applied to this session.
    settings: SessionConfig,
    #[getter(skip)]
    match_seq: u32,
    #[getter(skip)]
    closed: bool,
    #[getter(skip)]
    faulted: bool,
}

impl Session {
    /// Creates an empty session.
    #[instrument(skip(name, settings))]
    pub fn new(id: SessionId, name: String, settings: SessionConfig) -> Self {
        info!(session_id = %id, name = %name, "Creating new session");
        Self {
            id,
            name,
            created_at: Utc::now(),
            creator: None,
            slots: [None, None],
            spectators: BTreeMap::new(),
            chat: Vec::new(),
            game: None,
            settings,
            match_seq: 0,
            closed: false,
            faulted: false,
        }
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        match &self.game {
            None => SessionStatus::Waiting,
            Some(game) if game.is_active() => SessionStatus::Active,
            Some(_) => SessionStatus::Finished,
        }
    }

    /// Occupant of the slot playing `mark`.
    pub fn slot(&self, mark: Mark) -> Option<&SlotOccupant> {
        self.slots[slot_index(mark)].as_ref()
    }

    /// Mark of the slot `identity` occupies.
    pub fn seat_of(&self, identity: &str) -> Option<Mark> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|o| o.identity == identity))
            .map(slot_mark)
    }

    /// True if `identity` is seated or watching.
    pub fn is_member(&self, identity: &str) -> bool {
        self.seat_of(identity).is_some() || self.spectators.contains_key(identity)
    }

    /// Full chat log, oldest first.
    pub fn chat_log(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// True once [`Session::close`] succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once an invariant violation took the session out of service.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn start_match(&mut self) {
        self.match_seq += 1;
        let match_id = format!("{}-{}", self.id, self.match_seq);
        info!(session_id = %self.id, match_id = %match_id, "Match started");
        self.game = Some(Match::new(match_id));
    }

    fn end_match(&mut self) {
        if let Some(game) = self.game.take() {
            info!(session_id = %self.id, match_id = %game.id(), "Match discarded");
        }
    }

    /// Seats `identity`, or reconnects it if it is already seated.
    ///
    /// A spectator moves into the slot atomically. Filling the second slot
    /// starts a fresh match before this returns.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad display name, `NameConflict`, `SessionFull`
    /// or `SlotTaken`.
    pub fn join(
        &mut self,
        identity: &str,
        display_name: &str,
        preferred: Option<Mark>,
        connection: Option<SharedConnection>,
        stats: Option<PlayerStats>,
    ) -> Result<Mark, SessionError> {
        self.seat(identity, display_name, preferred, connection, stats, false)
    }

    /// Seats the identity that created the table and records it as creator,
    /// whichever slot it picks.
    ///
    /// # Errors
    ///
    /// As [`Session::join`].
    pub fn host(
        &mut self,
        identity: &str,
        display_name: &str,
        preferred: Option<Mark>,
        connection: Option<SharedConnection>,
        stats: Option<PlayerStats>,
    ) -> Result<Mark, SessionError> {
        self.seat(identity, display_name, preferred, connection, stats, true)
    }

    #[instrument(skip(self, connection, stats), fields(session_id = %self.id))]
    fn seat(
        &mut self,
        identity: &str,
        display_name: &str,
        preferred: Option<Mark>,
        connection: Option<SharedConnection>,
        stats: Option<PlayerStats>,
        hosting: bool,
    ) -> Result<Mark, SessionError> {
        if let Some(mark) = self.seat_of(identity) {
            if let Some(occupant) = self.slots[slot_index(mark)].as_mut() {
                if connection.is_some() {
                    occupant.connection = connection;
                }
                if stats.is_some() {
                    occupant.stats = stats;
                }
            }
            info!(identity, %mark, "Player reconnected");
            self.broadcast_state();
            return Ok(mark);
        }

        let display_name = sanitize_text(
            display_name,
            *self.settings.max_display_name_length(),
            "Display name",
        )?;
        let key = name_key(&display_name);
        if self
            .slots
            .iter()
            .flatten()
            .any(|o| o.identity != identity && name_key(&o.display_name) == key)
        {
            return Err(SessionError::new(
                ErrorKind::NameConflict,
                format!("Display name '{}' is already seated", display_name),
            ));
        }

        if self.occupied() == 2 {
            return Err(SessionError::new(ErrorKind::SessionFull, "Both slots are occupied"));
        }
        let mark = match preferred {
            Some(mark) if self.slots[slot_index(mark)].is_some() => {
                return Err(SessionError::new(
                    ErrorKind::SlotTaken,
                    format!("The {} slot is occupied", mark),
                ));
            }
            Some(mark) => mark,
            None if self.slots[0].is_none() => Mark::Black,
            None => Mark::White,
        };

        let connection = match self.spectators.remove(identity) {
            Some(spectator) => {
                debug!(identity, "Spectator taking a seat");
                connection.or(spectator.connection)
            }
            None => connection,
        };

        self.slots[slot_index(mark)] = Some(SlotOccupant {
            identity: identity.to_string(),
            display_name: display_name.clone(),
            connection,
            stats,
        });
        if hosting || (mark == Mark::Black && self.creator.is_none()) {
            self.creator = Some(identity.to_string());
        }
        info!(identity, %mark, "Player seated");

        if self.occupied() == 2 && self.game.is_none() {
            self.start_match();
        }

        self.broadcast(&PushEvent::MemberJoined {
            session_id: self.id.clone(),
            identity: identity.to_string(),
            display_name,
            role: Role::Player { mark },
        });
        self.broadcast_state();
        Ok(mark)
    }

    /// Adds `identity` to the spectators.
    ///
    /// A seated identity gives up its slot; a current spectator just
    /// re-associates its connection.
    #[instrument(skip(self, connection), fields(session_id = %self.id))]
    pub fn spectate(
        &mut self,
        identity: &str,
        display_name: &str,
        connection: Option<SharedConnection>,
    ) -> Result<(), SessionError> {
        if self.seat_of(identity).is_some() {
            self.switch_to_spectator(identity)?;
            if let (Some(connection), Some(spectator)) =
                (connection, self.spectators.get_mut(identity))
            {
                spectator.connection = Some(connection);
            }
            return Ok(());
        }

        if let Some(spectator) = self.spectators.get_mut(identity) {
            if connection.is_some() {
                spectator.connection = connection;
            }
            debug!(identity, "Spectator reconnected");
            self.broadcast_state();
            return Ok(());
        }

        let display_name = sanitize_text(
            display_name,
            *self.settings.max_display_name_length(),
            "Display name",
        )?;
        self.spectators.insert(
            identity.to_string(),
            Spectator {
                identity: identity.to_string(),
                display_name: display_name.clone(),
                connection,
            },
        );
        info!(identity, "Spectator joined");

        self.broadcast(&PushEvent::MemberJoined {
            session_id: self.id.clone(),
            identity: identity.to_string(),
            display_name,
            role: Role::Spectator,
        });
        self.broadcast_state();
        Ok(())
    }

    /// Vacates the caller's slot or spectator place.
    ///
    /// Leaving a slot discards the current match and its log.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn leave(&mut self, identity: &str) -> Result<(), SessionError> {
        let (display_name, role) = if let Some(mark) = self.seat_of(identity) {
            let occupant = self.slots[slot_index(mark)]
                .take()
                .ok_or_else(|| SessionError::internal("Seat vanished during leave"))?;
            self.end_match();
            (occupant.display_name, Role::Player { mark })
        } else if let Some(spectator) = self.spectators.remove(identity) {
            (spectator.display_name, Role::Spectator)
        } else {
            return Err(SessionError::not_a_participant(identity));
        };
        info!(identity, ?role, "Member left");

        self.broadcast(&PushEvent::MemberLeft {
            session_id: self.id.clone(),
            identity: identity.to_string(),
            display_name,
            role,
        });
        self.broadcast_state();
        Ok(())
    }

    /// Moves a seated identity to the spectators in one step.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn switch_to_spectator(&mut self, identity: &str) -> Result<(), SessionError> {
        let mark = self
            .seat_of(identity)
            .ok_or_else(|| SessionError::not_a_participant(identity))?;
        let occupant = self.slots[slot_index(mark)]
            .take()
            .ok_or_else(|| SessionError::internal("Seat vanished during switch"))?;
        self.end_match();

        let display_name = occupant.display_name.clone();
        self.spectators.insert(
            occupant.identity.clone(),
            Spectator {
                identity: occupant.identity,
                display_name: occupant.display_name,
                connection: occupant.connection,
            },
        );
        info!(identity, %mark, "Player moved to spectators");

        self.broadcast(&PushEvent::MemberLeft {
            session_id: self.id.clone(),
            identity: identity.to_string(),
            display_name: display_name.clone(),
            role: Role::Player { mark },
        });
        self.broadcast(&PushEvent::MemberJoined {
            session_id: self.id.clone(),
            identity: identity.to_string(),
            display_name,
            role: Role::Spectator,
        });
        self.broadcast_state();
        Ok(())
    }

    /// Places the caller's stone at `(x, y)`.
    ///
    /// # Errors
    ///
    /// `NotAParticipant` for anyone not seated, `MatchNotActive` without a
    /// running match, and the match's own `OutOfTurn`/`InvalidCell`.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn make_move(
        &mut self,
        identity: &str,
        x: usize,
        y: usize,
    ) -> Result<MoveOutcome, SessionError> {
        let mark = self
            .seat_of(identity)
            .ok_or_else(|| SessionError::not_a_participant(identity))?;
        let game = self.game.as_mut().ok_or_else(|| {
            SessionError::new(ErrorKind::MatchNotActive, "Waiting for an opponent")
        })?;

        game.apply_move(mark, x, y)?;
        debug!(identity, %mark, x, y, "Move applied");

        let record = self.match_record();
        if let Some(record) = &record {
            info!(match_id = %record.match_id, outcome = %record.outcome, "Match finished");
        }

        let snapshot = self.snapshot();
        self.broadcast(&PushEvent::StateUpdated(Box::new(snapshot.clone())));
        Ok(MoveOutcome { snapshot, record })
    }

    /// Appends a chat line from a member.
    #[instrument(skip(self, text), fields(session_id = %self.id))]
    pub fn chat(&mut self, identity: &str, text: &str) -> Result<ChatMessage, SessionError> {
        let display_name = if let Some(mark) = self.seat_of(identity) {
            self.slot(mark).map(|o| o.display_name.clone())
        } else {
            self.spectators.get(identity).map(|s| s.display_name.clone())
        }
        .ok_or_else(|| SessionError::not_a_participant(identity))?;

        let text = sanitize_text(text, *self.settings.max_chat_length(), "Chat message")?;
        let message = ChatMessage::new(identity.to_string(), display_name, text, Utc::now());
        self.chat.push(message.clone());
        debug!(identity, chat_len = self.chat.len(), "Chat appended");

        self.broadcast(&PushEvent::ChatAppended {
            session_id: self.id.clone(),
            message: message.clone(),
        });
        self.broadcast_state();
        Ok(message)
    }

    /// Starts a brand-new match with the current occupants.
    ///
    /// With a slot open this changes nothing and the session stays Waiting.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn restart(
        &mut self,
        identity: &str,
        elevated: bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let allowed = self.seat_of(identity).is_some()
            || self.creator.as_deref() == Some(identity)
            || elevated;
        if !allowed {
            return Err(SessionError::not_a_participant(identity));
        }

        if self.occupied() < 2 {
            debug!(identity, "Restart ignored, waiting for an opponent");
            return Ok(self.snapshot());
        }

        self.end_match();
        self.start_match();
        self.broadcast_state();
        Ok(self.snapshot())
    }

    /// Closes the session for good.
    ///
    /// Only the creator or an elevated caller may close.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn close(&mut self, identity: &str, elevated: bool) -> Result<(), SessionError> {
        if !elevated && self.creator.as_deref() != Some(identity) {
            return Err(SessionError::permission(format!(
                "'{}' may not close session '{}'",
                identity, self.id
            )));
        }

        self.closed = true;
        info!(identity, "Session closed");
        self.broadcast(&PushEvent::SessionClosed {
            session_id: self.id.clone(),
            closed_by: identity.to_string(),
        });
        Ok(())
    }

    /// Handles a dropped connection.
    ///
    /// Seated players keep their slot without a connection; spectators on
    /// the connection are removed. Returns true if anything changed.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> bool {
        let mut changed = false;
        for occupant in self.slots.iter_mut().flatten() {
            if occupant.connection.as_ref().is_some_and(|c| c.id() == connection_id) {
                occupant.connection = None;
                info!(identity = %occupant.identity, "Player disconnected, seat kept");
                changed = true;
            }
        }

        let dropped: Vec<Identity> = self
            .spectators
            .values()
            .filter(|s| s.connection.as_ref().is_some_and(|c| c.id() == connection_id))
            .map(|s| s.identity.clone())
            .collect();
        for identity in dropped {
            if let Some(spectator) = self.spectators.remove(&identity) {
                debug!(identity = %identity, "Spectator disconnected");
                self.broadcast(&PushEvent::MemberLeft {
                    session_id: self.id.clone(),
                    identity,
                    display_name: spectator.display_name,
                    role: Role::Spectator,
                });
                changed = true;
            }
        }

        if changed {
            self.broadcast_state();
        }
        changed
    }

    /// Record of the current match, if it has finished.
    pub fn match_record(&self) -> Option<MatchRecord> {
        let game = self.game.as_ref()?;
        let outcome = game.outcome()?;
        let participant = |mark: Mark| {
            self.slot(mark).map(|o| MatchParticipant {
                identity: o.identity.clone(),
                display_name: o.display_name.clone(),
            })
        };
        Some(MatchRecord {
            session_id: self.id.clone(),
            match_id: game.id().clone(),
            black: participant(Mark::Black)?,
            white: participant(Mark::White)?,
            outcome,
            move_count: game.moves().len(),
            started_at: *game.started_at(),
            finished_at: (*game.finished_at())?,
        })
    }

    /// Copy of the full session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let view = |mark: Mark| {
            self.slot(mark).map(|o| SlotView {
                identity: o.identity.clone(),
                display_name: o.display_name.clone(),
                mark,
                connected: o.connection.is_some(),
                stats: o.stats,
            })
        };
        let keep = self.settings.chat_history_in_snapshot();
        let chat_start = self.chat.len().saturating_sub(*keep);

        SessionSnapshot {
            session_id: self.id.clone(),
            name: self.name.clone(),
            status: self.status(),
            creator: self.creator.clone(),
            black: view(Mark::Black),
            white: view(Mark::White),
            spectators: self
                .spectators
                .values()
                .map(|s| SpectatorView {
                    identity: s.identity.clone(),
                    display_name: s.display_name.clone(),
                })
                .collect(),
            game: self.game.as_ref().map(Match::snapshot),
            chat: self.chat[chat_start..].to_vec(),
            created_at: self.created_at,
        }
    }

    /// Lobby row for this session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            name: self.name.clone(),
            status: self.status(),
            players: self.occupied(),
            spectators: self.spectators.len(),
            created_at: self.created_at,
        }
    }

    /// Checks session-level and match invariants.
    ///
    /// # Errors
    ///
    /// Returns every violated invariant.
    pub fn check_invariants(&self) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        let identities = self
            .slots
            .iter()
            .flatten()
            .map(|o| &o.identity)
            .chain(self.spectators.keys());
        if !identities.into_iter().all(|identity| seen.insert(identity)) {
            violations.push(InvariantViolation::new(
                "An identity occupies at most one of slot A, slot B, spectators",
            ));
        }

        if self.game.is_some() != (self.occupied() == 2) {
            violations.push(InvariantViolation::new(
                "A match exists exactly when both slots are occupied",
            ));
        }

        if let Some(Err(mut match_violations)) = self.game.as_ref().map(Match::check_invariants) {
            violations.append(&mut match_violations);
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    fn broadcast_state(&self) {
        self.broadcast(&PushEvent::StateUpdated(Box::new(self.snapshot())));
    }

    /// Sends `event` to every member connection, once per connection.
    fn broadcast(&self, event: &PushEvent) {
        let mut sent = HashSet::new();
        let connections = self
            .slots
            .iter()
            .flatten()
            .filter_map(|o| o.connection.as_ref())
            .chain(self.spectators.values().filter_map(|s| s.connection.as_ref()));
        for connection in connections {
            if sent.insert(connection.id()) && !connection.send(event) {
                debug!(conn_id = connection.id(), event = event.name(), "Push not delivered");
            }
        }
    }
}

/// Shared handle to a session and its mutex.
///
/// Cloning the handle is cheap; all clones serialize on the same lock.
#[derive(Debug, Clone)]
pub struct SharedSession {
    id: SessionId,
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    /// Wraps a session.
    pub fn new(session: Session) -> Self {
        Self {
            id: session.id.clone(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, SessionError> {
        self.inner.lock().map_err(|_| {
            error!(session_id = %self.id, "Session lock poisoned");
            SessionError::internal(format!("Session '{}' is unavailable", self.id))
        })
    }

    fn admit(&self, guard: &Session) -> Result<(), SessionError> {
        if guard.closed {
            return Err(SessionError::not_found(&self.id));
        }
        if guard.faulted {
            return Err(SessionError::internal(format!(
                "Session '{}' is out of service",
                self.id
            )));
        }
        Ok(())
    }

    /// Runs a state-changing operation under the session lock.
    ///
    /// After the operation the invariants are re-checked; a violation takes
    /// the session out of service and the caller gets `Internal`.
    pub fn with<T>(
        &self,
        op: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut guard = self.lock()?;
        self.admit(&guard)?;

        let result = op(&mut guard);

        if let Err(violations) = guard.check_invariants() {
            let described: Vec<String> = violations.iter().map(ToString::to_string).collect();
            error!(session_id = %self.id, violations = ?described, "Session invariant violated");
            guard.faulted = true;
            return Err(SessionError::internal(format!(
                "Session '{}' is out of service",
                self.id
            )));
        }

        if let Err(e) = &result {
            warn!(
                session_id = %self.id,
                kind = %e.kind,
                message = %e.message,
                "Operation rejected"
            );
        }
        result
    }

    /// Closes the session, even one that is out of service.
    ///
    /// A poisoned lock or a faulted session still honours the creator and
    /// elevated callers so the registry can let go of it.
    ///
    /// # Errors
    ///
    /// `NotFound` if already closed, `Permission` as [`Session::close`].
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn close(&self, identity: &str, elevated: bool) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Closing a session whose lock was poisoned");
            poisoned.into_inner()
        });
        if guard.closed {
            return Err(SessionError::not_found(&self.id));
        }
        if guard.faulted {
            warn!(identity, "Closing a faulted session");
        }
        guard.close(identity, elevated)
    }

    /// Reads the session under its lock.
    pub fn read<T>(&self, view: impl FnOnce(&Session) -> T) -> Result<T, SessionError> {
        let guard = self.lock()?;
        self.admit(&guard)?;
        Ok(view(&guard))
    }

    /// Snapshot of the session.
    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.read(Session::snapshot)
    }
}
