//! External collaborators: match recording and profile lookup.
//!
//! Both are called outside any session lock. Failures degrade gracefully:
//! a recorder error is logged, a lookup error means "no stats".

use crate::session::Identity;
use crate::snapshot::MatchRecord;
use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use strictly_gomoku::{Mark, Outcome};
use tracing::{debug, info, instrument};

/// Win/loss/draw totals for one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Matches won.
    pub wins: u32,
    /// Matches lost.
    pub losses: u32,
    /// Matches drawn.
    pub draws: u32,
}

impl PlayerStats {
    /// Total matches counted.
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Win rate as a fraction in `0.0..=1.0`.
    pub fn win_rate(&self) -> f64 {
        if self.games() == 0 {
            0.0
        } else {
            self.wins as f64 / self.games() as f64
        }
    }
}

/// What the profile service knows about an identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Preferred display name.
    pub display_name: Option<String>,
    /// Historical statistics.
    pub stats: Option<PlayerStats>,
}

/// Collaborator failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Collaborator error: {} at {}:{}", message, file, line)]
pub struct CollaboratorError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl CollaboratorError {
    /// Creates a new collaborator error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Persists finished matches.
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    /// Records one finished match.
    async fn record_match(&self, record: MatchRecord) -> Result<(), CollaboratorError>;
}

/// Resolves identities to display names and statistics.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Looks up an identity. `Ok(None)` means unknown.
    async fn lookup(&self, identity: &str) -> Result<Option<PlayerProfile>, CollaboratorError>;
}

/// Process-local ledger implementing both collaborators.
///
/// Recording a match updates the totals later lookups return.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    profiles: Mutex<HashMap<Identity, PlayerProfile>>,
    records: Mutex<Vec<MatchRecord>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a preferred display name for an identity.
    pub fn register(
        &self,
        identity: impl Into<Identity>,
        display_name: impl Into<String>,
    ) -> Result<(), CollaboratorError> {
        let mut profiles = self
            .profiles
            .lock()
            .map_err(|_| CollaboratorError::new("Profile table lock poisoned"))?;
        profiles.entry(identity.into()).or_default().display_name = Some(display_name.into());
        Ok(())
    }

    /// Returns every recorded match, oldest first.
    pub fn records(&self) -> Result<Vec<MatchRecord>, CollaboratorError> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|_| CollaboratorError::new("Record log lock poisoned"))
    }
}

fn tally(
    profiles: &mut HashMap<Identity, PlayerProfile>,
    identity: &str,
    apply: impl FnOnce(&mut PlayerStats),
) {
    let profile = profiles.entry(identity.to_string()).or_default();
    apply(profile.stats.get_or_insert_with(PlayerStats::default));
}

#[async_trait]
impl MatchRecorder for InMemoryLedger {
    #[instrument(
        skip(self, record),
        fields(session_id = %record.session_id, match_id = %record.match_id)
    )]
    async fn record_match(&self, record: MatchRecord) -> Result<(), CollaboratorError> {
        {
            let mut profiles = self
                .profiles
                .lock()
                .map_err(|_| CollaboratorError::new("Profile table lock poisoned"))?;
            let (black, white) = (&record.black.identity, &record.white.identity);
            match record.outcome {
                Outcome::Winner(Mark::Black) => {
                    tally(&mut profiles, black, |s| s.wins += 1);
                    tally(&mut profiles, white, |s| s.losses += 1);
                }
                Outcome::Winner(Mark::White) => {
                    tally(&mut profiles, white, |s| s.wins += 1);
                    tally(&mut profiles, black, |s| s.losses += 1);
                }
                Outcome::Draw => {
                    tally(&mut profiles, black, |s| s.draws += 1);
                    tally(&mut profiles, white, |s| s.draws += 1);
                }
            }
        }

        info!(outcome = %record.outcome, moves = record.move_count, "Match recorded");
        self.records
            .lock()
            .map_err(|_| CollaboratorError::new("Record log lock poisoned"))?
            .push(record);
        Ok(())
    }
}

#[async_trait]
impl ProfileLookup for InMemoryLedger {
    async fn lookup(&self, identity: &str) -> Result<Option<PlayerProfile>, CollaboratorError> {
        let profiles = self
            .profiles
            .lock()
            .map_err(|_| CollaboratorError::new("Profile table lock poisoned"))?;
        let profile = profiles.get(identity).cloned();
        debug!(identity, found = profile.is_some(), "Profile lookup");
        Ok(profile)
    }
}
