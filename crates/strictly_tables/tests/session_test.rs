//! Tests for the session state machine.

mod common;

use common::RecordingConnection;
use std::sync::Arc;
use strictly_gomoku::{Mark, MatchStatus, Outcome};
use strictly_tables::{
    ConnectionHandle, ErrorKind, PushEvent, Role, Session, SessionConfig, SessionStatus,
    SharedSession,
};

fn table() -> SharedSession {
    SharedSession::new(Session::new(
        "t0000001".to_string(),
        "Test table".to_string(),
        SessionConfig::default(),
    ))
}

fn seat(table: &SharedSession, identity: &str, conn: &Arc<RecordingConnection>) -> Mark {
    table
        .with(|s| s.join(identity, identity, None, Some(conn.shared()), None))
        .expect("seat available")
}

fn play(table: &SharedSession, identity: &str, x: usize, y: usize) -> Result<(), ErrorKind> {
    table
        .with(|s| s.make_move(identity, x, y))
        .map(|_| ())
        .map_err(|e| e.kind)
}

fn moves_in(event: &PushEvent) -> Option<usize> {
    match event {
        PushEvent::StateUpdated(snapshot) => {
            Some(snapshot.game.as_ref().map_or(0, |g| g.moves.len()))
        }
        _ => None,
    }
}

#[test]
fn test_one_player_waits_two_players_start_a_match() {
    let t = table();
    let alice = RecordingConnection::new();
    let bob = RecordingConnection::new();

    assert_eq!(seat(&t, "alice", &alice), Mark::Black);
    let snap = t.snapshot().unwrap();
    assert_eq!(snap.status, SessionStatus::Waiting);
    assert!(snap.game.is_none());

    assert_eq!(seat(&t, "bob", &bob), Mark::White);
    let snap = t.snapshot().unwrap();
    assert_eq!(snap.status, SessionStatus::Active);
    let game = snap.game.expect("match created on second join");
    assert!(game.moves.is_empty());
    assert_eq!(game.current_turn, Mark::Black);
}

#[test]
fn test_join_is_idempotent_for_reconnecting_identity() {
    let t = table();
    let first = RecordingConnection::new();
    let second = RecordingConnection::new();
    seat(&t, "alice", &first);
    seat(&t, "bob", &RecordingConnection::new());
    play(&t, "alice", 7, 7).unwrap();

    let before = t.snapshot().unwrap();
    assert_eq!(seat(&t, "alice", &second), Mark::Black);
    let after = t.snapshot().unwrap();

    assert_eq!(after.game, before.game);
    assert_eq!(after.black, before.black);
    assert_eq!(after.player_count(), 2);
    assert!(matches!(second.events().last(), Some(PushEvent::StateUpdated(_))));
}

#[test]
fn test_participation_errors() {
    let t = table();
    t.with(|s| s.join("alice", "Alice", None, None, None)).unwrap();

    let err = t.with(|s| s.join("mallory", "  ALICE ", None, None, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameConflict);

    let err = t.with(|s| s.join("bob", "Bob", Some(Mark::Black), None, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SlotTaken);

    t.with(|s| s.join("bob", "Bob", Some(Mark::White), None, None)).unwrap();
    let err = t.with(|s| s.join("carol", "Carol", None, None, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionFull);

    let err = t.with(|s| s.join("dave", "", None, None, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[test]
fn test_leave_destroys_match_but_not_session() {
    let t = table();
    seat(&t, "alice", &RecordingConnection::new());
    seat(&t, "bob", &RecordingConnection::new());
    play(&t, "alice", 0, 0).unwrap();

    t.with(|s| s.leave("bob")).unwrap();
    let snap = t.snapshot().unwrap();
    assert_eq!(snap.status, SessionStatus::Waiting);
    assert!(snap.game.is_none());

    t.with(|s| s.leave("alice")).unwrap();
    assert_eq!(t.snapshot().unwrap().player_count(), 0);

    let err = t.with(|s| s.leave("alice")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAParticipant);
}

#[test]
fn test_switch_to_spectator_and_back() {
    let t = table();
    let alice = RecordingConnection::new();
    seat(&t, "alice", &alice);
    seat(&t, "bob", &RecordingConnection::new());

    t.with(|s| s.switch_to_spectator("bob")).unwrap();
    let snap = t.snapshot().unwrap();
    assert!(snap.white.is_none());
    assert!(snap.game.is_none());
    assert_eq!(snap.spectators.len(), 1);
    assert_eq!(snap.spectators[0].identity, "bob");

    let names = alice.event_names();
    assert!(names.ends_with(&["member_left", "member_joined", "state_updated"]));

    assert_eq!(
        t.with(|s| s.join("bob", "bob", None, None, None)).unwrap(),
        Mark::White
    );
    let snap = t.snapshot().unwrap();
    assert!(snap.spectators.is_empty());
    assert_eq!(snap.status, SessionStatus::Active);

    let err = t.with(|s| s.switch_to_spectator("nobody")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAParticipant);
}

#[test]
fn test_spectate_by_seated_player_gives_up_seat() {
    let t = table();
    seat(&t, "alice", &RecordingConnection::new());
    t.with(|s| s.spectate("alice", "Alice", None)).unwrap();

    let snap = t.snapshot().unwrap();
    assert!(snap.black.is_none());
    assert_eq!(snap.spectators.len(), 1);

    t.with(|s| s.spectate("alice", "Alice", None)).unwrap();
    assert_eq!(t.snapshot().unwrap().spectators.len(), 1);
}

#[test]
fn test_row_seven_win_through_session() {
    let t = table();
    let watcher = RecordingConnection::new();
    seat(&t, "alice", &RecordingConnection::new());
    seat(&t, "bob", &RecordingConnection::new());
    t.with(|s| s.spectate("carol", "Carol", Some(watcher.shared()))).unwrap();

    for x in 3..7 {
        play(&t, "alice", x, 7).unwrap();
        play(&t, "bob", x, 8).unwrap();
    }
    let outcome = t.with(|s| s.make_move("alice", 7, 7)).unwrap();

    let game = outcome.snapshot.game.as_ref().unwrap();
    assert_eq!(
        game.status,
        MatchStatus::Finished {
            outcome: Outcome::Winner(Mark::Black)
        }
    );
    assert_eq!(outcome.snapshot.status, SessionStatus::Finished);

    let record = outcome.record.expect("finished match yields a record");
    assert_eq!(record.winner().map(String::as_str), Some("alice"));
    assert_eq!(record.move_count, 9);
    assert_eq!(record.white.identity, "bob");

    assert_eq!(play(&t, "bob", 0, 0), Err(ErrorKind::MatchNotActive));
    assert!(matches!(watcher.events().last(), Some(PushEvent::StateUpdated(_))));
}

#[test]
fn test_rejected_moves_change_nothing_and_broadcast_nothing() {
    let t = table();
    let alice = RecordingConnection::new();
    let bob = RecordingConnection::new();
    seat(&t, "alice", &alice);
    seat(&t, "bob", &bob);
    play(&t, "alice", 7, 7).unwrap();

    alice.clear();
    bob.clear();
    let before = t.snapshot().unwrap();

    assert_eq!(play(&t, "alice", 8, 8), Err(ErrorKind::OutOfTurn));
    assert_eq!(play(&t, "bob", 7, 7), Err(ErrorKind::InvalidCell));
    assert_eq!(play(&t, "bob", 15, 0), Err(ErrorKind::InvalidCell));
    assert_eq!(play(&t, "carol", 1, 1), Err(ErrorKind::NotAParticipant));

    assert_eq!(t.snapshot().unwrap(), before);
    assert!(alice.events().is_empty());
    assert!(bob.events().is_empty());
}

#[test]
fn test_move_before_opponent_joins() {
    let t = table();
    seat(&t, "alice", &RecordingConnection::new());
    assert_eq!(play(&t, "alice", 7, 7), Err(ErrorKind::MatchNotActive));
}

#[test]
fn test_broadcast_order_follows_admission_order() {
    let t = table();
    let watcher = RecordingConnection::new();
    seat(&t, "alice", &RecordingConnection::new());
    seat(&t, "bob", &RecordingConnection::new());
    t.with(|s| s.spectate("carol", "Carol", Some(watcher.shared()))).unwrap();
    watcher.clear();

    for i in 0..6 {
        let (who, y) = if i % 2 == 0 { ("alice", 0) } else { ("bob", 1) };
        play(&t, who, i, y).unwrap();
    }

    let counts: Vec<usize> = watcher.events().iter().filter_map(moves_in).collect();
    assert_eq!(counts, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_chat_is_members_only_and_escaped() {
    let t = table();
    let alice = RecordingConnection::new();
    seat(&t, "alice", &alice);
    t.with(|s| s.spectate("carol", "Carol", None)).unwrap();

    let message = t.with(|s| s.chat("alice", "<script>hi</script>")).unwrap();
    assert_eq!(message.text, "&lt;script&gt;hi&lt;/script&gt;");
    t.with(|s| s.chat("carol", "watching")).unwrap();

    let err = t.with(|s| s.chat("stranger", "hello")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAParticipant);
    let err = t.with(|s| s.chat("alice", &"x".repeat(501))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let snap = t.snapshot().unwrap();
    assert_eq!(snap.chat.len(), 2);
    assert_eq!(snap.chat[1].display_name, "Carol");
    assert!(alice.event_names().contains(&"chat_appended"));
}

#[test]
fn test_restart_after_finish_and_with_open_slot() {
    let t = table();
    seat(&t, "alice", &RecordingConnection::new());
    seat(&t, "bob", &RecordingConnection::new());
    for x in 0..4 {
        play(&t, "alice", x, 0).unwrap();
        play(&t, "bob", x, 1).unwrap();
    }
    play(&t, "alice", 4, 0).unwrap();
    assert_eq!(t.snapshot().unwrap().status, SessionStatus::Finished);

    let err = t.with(|s| s.restart("stranger", false)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAParticipant);

    let snap = t.with(|s| s.restart("bob", false)).unwrap();
    assert_eq!(snap.status, SessionStatus::Active);
    assert!(snap.game.as_ref().unwrap().moves.is_empty());
    assert_eq!(snap.black.as_ref().unwrap().identity, "alice");

    t.with(|s| s.leave("bob")).unwrap();
    let snap = t.with(|s| s.restart("alice", false)).unwrap();
    assert_eq!(snap.status, SessionStatus::Waiting);
    assert!(snap.game.is_none());
}

#[test]
fn test_close_requires_creator_or_elevation() {
    let t = table();
    let bob = RecordingConnection::new();
    seat(&t, "alice", &RecordingConnection::new());
    seat(&t, "bob", &bob);
    bob.clear();

    let err = t.with(|s| s.close("bob", false)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Permission);
    assert!(bob.events().is_empty());
    assert_eq!(t.snapshot().unwrap().status, SessionStatus::Active);

    t.with(|s| s.close("bob", true)).unwrap();
    assert!(matches!(
        bob.events().last(),
        Some(PushEvent::SessionClosed { closed_by, .. }) if closed_by == "bob"
    ));
    assert_eq!(t.snapshot().unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(play(&t, "alice", 0, 0), Err(ErrorKind::NotFound));
}

#[test]
fn test_disconnect_keeps_seat_and_drops_spectator() {
    let t = table();
    let alice = RecordingConnection::new();
    let bob = RecordingConnection::new();
    let watcher = RecordingConnection::new();
    seat(&t, "alice", &alice);
    seat(&t, "bob", &bob);
    t.with(|s| s.spectate("carol", "Carol", Some(watcher.shared()))).unwrap();

    assert!(t.with(|s| Ok(s.disconnect(alice.id()))).unwrap());
    let snap = t.snapshot().unwrap();
    assert!(!snap.black.as_ref().unwrap().connected);
    assert!(snap.white.as_ref().unwrap().connected);
    assert_eq!(snap.status, SessionStatus::Active);

    assert!(t.with(|s| Ok(s.disconnect(watcher.id()))).unwrap());
    let snap = t.snapshot().unwrap();
    assert!(snap.spectators.is_empty());
    assert!(bob.events().iter().any(|e| matches!(
        e,
        PushEvent::MemberLeft { role: Role::Spectator, identity, .. } if identity == "carol"
    )));

    assert_eq!(seat(&t, "alice", &RecordingConnection::new()), Mark::Black);
    assert!(t.snapshot().unwrap().black.unwrap().connected);
    assert!(!t.with(|s| Ok(s.disconnect(alice.id()))).unwrap());
}
