//! Shared test doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use strictly_tables::{
    ConnectionHandle, ConnectionId, PushEvent, SharedConnection, next_connection_id,
};

/// Connection that records every pushed event.
#[derive(Debug)]
pub struct RecordingConnection {
    id: ConnectionId,
    events: Mutex<Vec<PushEvent>>,
    closed: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: next_connection_id(),
            events: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn shared(self: &Arc<Self>) -> SharedConnection {
        self.clone()
    }

    pub fn events(&self) -> Vec<PushEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(PushEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Simulates the peer going away: later sends report failure.
    pub fn hang_up(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ConnectionHandle for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, event: &PushEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        self.events.lock().unwrap().push(event.clone());
        true
    }

    fn close(&self) {
        self.hang_up();
    }
}
