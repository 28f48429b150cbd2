//! Session error types.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use strictly_gomoku::MoveError;
use tracing::instrument;

/// What went wrong, as reported to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ErrorKind {
    /// Malformed input: coordinates, text, names, payloads.
    Validation,
    /// The cell is off the board or already taken.
    InvalidCell,
    /// The caller holds no slot (or no membership) in the session.
    NotAParticipant,
    /// It is the other mark's turn.
    OutOfTurn,
    /// The requested slot is occupied.
    SlotTaken,
    /// Both slots are occupied.
    SessionFull,
    /// Another identity in a slot already uses this display name.
    NameConflict,
    /// There is no active match to play in.
    MatchNotActive,
    /// Unknown or closed session.
    NotFound,
    /// The caller may not perform this operation.
    Permission,
    /// The connection exceeded its operation budget.
    RateLimited,
    /// An internal invariant broke; the session is out of service.
    Internal,
}

/// Error families used for reporting and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum ErrorCategory {
    /// Malformed input.
    Validation,
    /// Seat, turn and membership rules.
    Participation,
    /// Missing session.
    NotFound,
    /// Authorization.
    Permission,
    /// Operation budget.
    RateLimit,
    /// Defect inside the host.
    Internal,
}

impl ErrorKind {
    /// Returns the family this kind belongs to.
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::Validation | ErrorKind::InvalidCell => ErrorCategory::Validation,
            ErrorKind::NotAParticipant
            | ErrorKind::OutOfTurn
            | ErrorKind::SlotTaken
            | ErrorKind::SessionFull
            | ErrorKind::NameConflict
            | ErrorKind::MatchNotActive => ErrorCategory::Participation,
            ErrorKind::NotFound => ErrorCategory::NotFound,
            ErrorKind::Permission => ErrorCategory::Permission,
            ErrorKind::RateLimited => ErrorCategory::RateLimit,
            ErrorKind::Internal => ErrorCategory::Internal,
        }
    }
}

/// Session error with location tracking.
///
/// Every variant is an expected, recoverable outcome except
/// [`ErrorKind::Internal`].
#[derive(Debug, Clone, Display, Error)]
#[display("{}: {} at {}:{}", kind, message, file, line)]
pub struct SessionError {
    /// Error kind.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Malformed input.
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Caller is not seated (or not a member).
    #[track_caller]
    pub fn not_a_participant(identity: &str) -> Self {
        Self::new(
            ErrorKind::NotAParticipant,
            format!("'{}' is not a participant in this session", identity),
        )
    }

    /// Unknown or closed session.
    #[track_caller]
    pub fn not_found(session_id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("Session '{}' not found", session_id))
    }

    /// Caller lacks permission.
    #[track_caller]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// Internal defect.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns the error family.
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl From<MoveError> for SessionError {
    #[track_caller]
    fn from(err: MoveError) -> Self {
        let kind = match err {
            MoveError::OutOfTurn { .. } => ErrorKind::OutOfTurn,
            MoveError::InvalidCell(_) => ErrorKind::InvalidCell,
            MoveError::MatchFinished => ErrorKind::MatchNotActive,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_gomoku::{Coord, Mark};

    #[test]
    fn test_move_errors_map_to_kinds() {
        let err: SessionError = MoveError::OutOfTurn {
            expected: Mark::Black,
            actual: Mark::White,
        }
        .into();
        assert_eq!(err.kind, ErrorKind::OutOfTurn);
        assert_eq!(err.category(), ErrorCategory::Participation);

        let err: SessionError = MoveError::InvalidCell(Coord::new(20, 1)).into();
        assert_eq!(err.kind, ErrorKind::InvalidCell);
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_error_records_location() {
        let err = SessionError::not_found("abc");
        assert!(err.file.ends_with("error.rs"));
        assert!(err.to_string().contains("NotFound"));
    }
}
