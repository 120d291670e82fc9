//! Per-connection session plumbing.

use chrono::{DateTime, Utc};
use pbx_proto::Reply;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ConnId;

/// The telephone unit's view of its network session.
///
/// A unit only ever writes to its session: replies go out through an
/// unbounded channel drained by the connection task, and the teardown
/// token lets the exchange force the transport closed (the moral
/// equivalent of `shutdown(2)` on the socket). Reading from the
/// connection is the session layer's business alone.
pub struct SessionHandle {
    id: ConnId,
    tx: mpsc::UnboundedSender<Reply>,
    teardown: CancellationToken,
    connected_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Create a handle for a freshly accepted connection.
    pub fn new(id: ConnId, tx: mpsc::UnboundedSender<Reply>) -> Self {
        Self {
            id,
            tx,
            teardown: CancellationToken::new(),
            connected_at: Utc::now(),
        }
    }

    /// The session identifier, reported to call peers on the wire.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queue a reply line for delivery. A session that has already gone
    /// away simply drops it.
    pub fn notify(&self, reply: Reply) {
        let _ = self.tx.send(reply);
    }

    /// A token the connection task watches to learn its transport is
    /// being torn down.
    pub fn teardown_token(&self) -> CancellationToken {
        self.teardown.clone()
    }

    /// Force the underlying transport to close.
    pub fn force_close(&self) {
        self.teardown.cancel();
    }

    /// When the connection was accepted.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}
