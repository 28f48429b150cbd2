//! Connection handles: the narrow push interface a session sees.

use crate::dispatcher::Response;
use crate::events::PushEvent;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifier of one live transport connection.
pub type ConnectionId = u64;

/// One live connection, as seen by sessions and the registry.
///
/// `send` must never block: sessions call it while holding their lock.
pub trait ConnectionHandle: Send + Sync + Debug {
    /// Returns the connection identifier.
    fn id(&self) -> ConnectionId;

    /// Enqueues a push event. Returns false once the connection is gone.
    fn send(&self, event: &PushEvent) -> bool;

    /// Asks the transport to close the connection.
    fn close(&self);
}

/// Shared handle to a connection.
pub type SharedConnection = Arc<dyn ConnectionHandle>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique connection id.
pub fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Frame queued for a connection's writer.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Push event.
    Event(PushEvent),
    /// Response to one of this connection's requests.
    Response(Response),
    /// Stop writing and close the socket.
    Close,
}

/// Connection backed by an unbounded channel drained by a writer task.
///
/// Responses and pushes share the channel, so a client sees them in the
/// order they were produced.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelConnection {
    /// Wraps a sender with a fresh connection id.
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: next_connection_id(),
            tx,
        }
    }

    /// Enqueues a response frame.
    pub fn reply(&self, response: Response) -> bool {
        self.tx.send(Outbound::Response(response)).is_ok()
    }
}

impl ConnectionHandle for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, event: &PushEvent) -> bool {
        let delivered = self.tx.send(Outbound::Event(event.clone())).is_ok();
        if !delivered {
            debug!(conn_id = self.id, "Dropped push for closed connection");
        }
        delivered
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PushEvent;

    #[test]
    fn test_ids_are_unique() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = ChannelConnection::new(tx.clone());
        let b = ChannelConnection::new(tx);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_frames_keep_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ChannelConnection::new(tx);
        let event = PushEvent::SessionListChanged { sessions: vec![] };

        assert!(conn.send(&event));
        assert!(conn.reply(Response::ok(Some(7), serde_json::Value::Null)));
        conn.close();

        assert!(matches!(rx.try_recv(), Ok(Outbound::Event(_))));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Response(r)) if r.request_id == Some(7)));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Close)));
    }

    #[test]
    fn test_send_after_receiver_dropped_reports_failure() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ChannelConnection::new(tx);
        drop(rx);
        assert!(!conn.send(&PushEvent::SessionListChanged { sessions: vec![] }));
    }
}
