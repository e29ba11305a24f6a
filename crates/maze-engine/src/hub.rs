//! Per-session connection membership and ordered fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use maze_core::{ConnectionId, SessionId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Observer,
}

impl Role {
    /// Wire label used in the open notice.
    pub fn label(self) -> &'static str {
        match self {
            Self::Player => "jogador",
            Self::Observer => "observador",
        }
    }
}

/// Sending half of one connection's outbound queue.
///
/// Enqueueing never blocks: a full or closed queue is a failed delivery.
/// The writer task on the other end owns the socket.
#[derive(Debug)]
pub struct Outbox {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl Outbox {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<str>>, cancel: CancellationToken) -> Self {
        Self {
            id,
            tx,
            cancel,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Returns `false` if the queue is full or closed, or the connection
    /// has been cancelled.
    pub fn send(&self, message: Arc<str>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn send_text(&self, text: impl Into<Arc<str>>) -> bool {
        self.send(text.into())
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Ask the connection task to wind down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

#[derive(Debug)]
struct Member {
    outbox: Outbox,
    role: Role,
}

/// Connections attached to one session, in attach order.
#[derive(Debug, Default)]
pub struct Membership {
    members: Vec<Member>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and decide its role. A non-observer request
    /// takes the Player slot only while it is vacant.
    pub fn attach(&mut self, outbox: Outbox, wants_observer: bool) -> Role {
        let role = if !wants_observer && !self.has_player() {
            Role::Player
        } else {
            Role::Observer
        };
        self.members.push(Member { outbox, role });
        role
    }

    /// Remove a connection. Returns its role if it was attached.
    pub fn detach(&mut self, id: &ConnectionId) -> Option<Role> {
        let pos = self.members.iter().position(|m| m.outbox.id() == id)?;
        Some(self.members.remove(pos).role)
    }

    pub fn role_of(&self, id: &ConnectionId) -> Option<Role> {
        self.members
            .iter()
            .find(|m| m.outbox.id() == id)
            .map(|m| m.role)
    }

    /// Send to one member. A failed delivery detaches it.
    pub fn send_to(&mut self, session_id: SessionId, id: &ConnectionId, message: Arc<str>) -> bool {
        let Some(pos) = self.members.iter().position(|m| m.outbox.id() == id) else {
            return false;
        };
        if self.members[pos].outbox.send(message) {
            return true;
        }
        let member = self.members.remove(pos);
        warn!(%session_id, connection_id = %id, "delivery failed, detaching connection");
        member.outbox.close();
        false
    }

    /// Deliver to every member in attach order. Members whose delivery
    /// fails are detached and their ids returned; the rest still receive
    /// the message.
    pub fn broadcast(&mut self, session_id: SessionId, message: &Arc<str>) -> Vec<ConnectionId> {
        let mut failed = Vec::new();
        self.members.retain(|m| {
            if m.outbox.send(Arc::clone(message)) {
                true
            } else {
                warn!(
                    %session_id,
                    connection_id = %m.outbox.id(),
                    dropped = m.outbox.drop_count(),
                    "broadcast delivery failed, detaching connection"
                );
                m.outbox.close();
                failed.push(m.outbox.id().clone());
                false
            }
        });
        debug!(%session_id, recipients = self.members.len(), failed = failed.len(), "broadcast");
        failed
    }

    /// Cancel every member and empty the set.
    pub fn close_all(&mut self) {
        for m in self.members.drain(..) {
            m.outbox.close();
        }
    }

    pub fn has_player(&self) -> bool {
        self.members.iter().any(|m| m.role == Role::Player)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.role == Role::Observer)
            .count()
    }
}
