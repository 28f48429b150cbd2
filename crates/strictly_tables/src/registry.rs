//! Directory of live sessions and lobby subscribers.

use crate::chat::sanitize_text;
use crate::config::SessionConfig;
use crate::connection::{ConnectionId, SharedConnection};
use crate::error::SessionError;
use crate::events::PushEvent;
use crate::session::{Session, SessionId, SessionStatus, SharedSession};
use crate::snapshot::SessionSummary;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Default)]
struct Directory {
    /// Live sessions with their creation sequence number.
    sessions: HashMap<SessionId, (u64, SharedSession)>,
    issued: HashSet<SessionId>,
    created: u64,
}

#[derive(Debug)]
struct RegistryInner {
    directory: RwLock<Directory>,
    lobby: Mutex<HashMap<ConnectionId, SharedConnection>>,
    settings: SessionConfig,
}

/// Concurrency-safe directory of sessions.
///
/// Cloning shares the same directory. The directory lock is never held
/// while a session lock is taken.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

/// Eight lowercase hex digits drawn from a v4 UUID.
fn generate_session_id() -> SessionId {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(settings: SessionConfig) -> Self {
        info!(max_sessions = settings.max_sessions(), "Creating session registry");
        Self {
            inner: Arc::new(RegistryInner {
                directory: RwLock::new(Directory::default()),
                lobby: Mutex::new(HashMap::new()),
                settings,
            }),
        }
    }

    /// Limits applied to new sessions.
    pub fn settings(&self) -> &SessionConfig {
        &self.inner.settings
    }

    fn poisoned(what: &str) -> SessionError {
        error!(lock = what, "Registry lock poisoned");
        SessionError::internal(format!("Registry {} unavailable", what))
    }

    /// Creates a session with a fresh id, never reused in this process.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad name or when the live-session cap is reached.
    #[instrument(skip(self))]
    pub fn create(&self, name: &str) -> Result<SharedSession, SessionError> {
        let settings = self.inner.settings;
        let name = sanitize_text(name, *settings.max_session_name_length(), "Session name")?;

        let mut directory = self
            .inner
            .directory
            .write()
            .map_err(|_| Self::poisoned("directory"))?;
        if directory.sessions.len() >= *settings.max_sessions() {
            return Err(SessionError::validation(format!(
                "Session limit of {} reached",
                settings.max_sessions()
            )));
        }

        let id = loop {
            let candidate = generate_session_id();
            if directory.issued.insert(candidate.clone()) {
                break candidate;
            }
            debug!(candidate = %candidate, "Session id collision, retrying");
        };

        let session = SharedSession::new(Session::new(id.clone(), name, settings));
        directory.created += 1;
        let seq = directory.created;
        directory.sessions.insert(id, (seq, session.clone()));
        info!(session_id = %session.id(), live = directory.sessions.len(), "Session registered");
        Ok(session)
    }

    /// Looks up a live session.
    pub fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        let directory = self
            .inner
            .directory
            .read()
            .map_err(|_| Self::poisoned("directory"))?;
        directory
            .sessions
            .get(id)
            .map(|(_, session)| session.clone())
            .ok_or_else(|| SessionError::not_found(id))
    }

    /// Removes a session. Returns false if it was already gone.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> bool {
        match self.inner.directory.write() {
            Ok(mut directory) => {
                let removed = directory.sessions.remove(id).is_some();
                debug!(removed, "Session removal");
                removed
            }
            Err(_) => {
                Self::poisoned("directory");
                false
            }
        }
    }

    /// Handles to every live session in creation order.
    fn handles(&self) -> Result<Vec<SharedSession>, SessionError> {
        let directory = self
            .inner
            .directory
            .read()
            .map_err(|_| Self::poisoned("directory"))?;
        let mut entries: Vec<&(u64, SharedSession)> = directory.sessions.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, session)| session.clone()).collect())
    }

    /// Lobby listing: every session not Finished, oldest first.
    ///
    /// Full and Active sessions are included.
    pub fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(self
            .handles()?
            .iter()
            .filter_map(|session| session.read(Session::summary).ok())
            .filter(|summary| summary.status != SessionStatus::Finished)
            .collect())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner
            .directory
            .read()
            .map(|directory| directory.sessions.len())
            .unwrap_or(0)
    }

    /// True when no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes a session and removes it from the directory.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Permission` unless `requester` created
    /// the session or `elevated` is set.
    #[instrument(skip(self))]
    pub fn close(&self, id: &str, requester: &str, elevated: bool) -> Result<(), SessionError> {
        let session = self.get(id)?;
        session.close(requester, elevated)?;
        self.remove(id);
        self.publish_list();
        Ok(())
    }

    /// Subscribes a connection to lobby updates and returns the current listing.
    #[instrument(skip(self, connection), fields(conn_id = connection.id()))]
    pub fn subscribe_lobby(
        &self,
        connection: SharedConnection,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        self.inner
            .lobby
            .lock()
            .map_err(|_| Self::poisoned("lobby"))?
            .insert(connection.id(), connection);
        self.list()
    }

    /// Drops a lobby subscription. Returns false if there was none.
    pub fn unsubscribe_lobby(&self, connection_id: ConnectionId) -> bool {
        match self.inner.lobby.lock() {
            Ok(mut lobby) => lobby.remove(&connection_id).is_some(),
            Err(_) => {
                Self::poisoned("lobby");
                false
            }
        }
    }

    /// Pushes the current listing to every lobby subscriber.
    ///
    /// Subscribers whose connection is gone are dropped.
    pub fn publish_list(&self) {
        let sessions = match self.list() {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, "Could not build lobby listing");
                return;
            }
        };
        let event = PushEvent::SessionListChanged { sessions };

        let Ok(mut lobby) = self.inner.lobby.lock() else {
            Self::poisoned("lobby");
            return;
        };
        lobby.retain(|conn_id, connection| {
            let delivered = connection.send(&event);
            if !delivered {
                debug!(conn_id, "Dropping lobby subscriber");
            }
            delivered
        });
    }

    /// Propagates a dropped connection to every session and the lobby.
    ///
    /// Returns the number of sessions that changed.
    #[instrument(skip(self))]
    pub fn disconnect(&self, connection_id: ConnectionId) -> usize {
        self.unsubscribe_lobby(connection_id);
        let handles = match self.handles() {
            Ok(handles) => handles,
            Err(_) => return 0,
        };
        let changed = handles
            .iter()
            .filter(|session| {
                session
                    .with(|s| Ok(s.disconnect(connection_id)))
                    .unwrap_or(false)
            })
            .count();
        if changed > 0 {
            info!(changed, "Connection dropped from sessions");
        }
        changed
    }
}
