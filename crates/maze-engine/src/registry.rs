//! Arena of live sessions keyed by id.
//!
//! Each session lives in its own `parking_lot::Mutex` cell together with its
//! connection membership, so every mutation and the broadcast that follows
//! it happen under one lock. Distinct sessions never contend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use maze_core::{Graph, GroupId, MazeError, MazeId, SessionId, SessionOutcome, VertexId};

use crate::exploration;
use crate::hub::Membership;
use crate::session::Session;

#[derive(Debug)]
pub struct SessionCell {
    pub session: Session,
    pub members: Membership,
    /// Set when the session hit an internal-consistency failure.
    pub flagged: bool,
}

impl SessionCell {
    fn new(session: Session) -> Self {
        Self {
            session,
            members: Membership::new(),
            flagged: false,
        }
    }
}

pub type SharedCell = Arc<Mutex<SessionCell>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub group_id: GroupId,
    pub maze_id: MazeId,
    pub current_vertex: VertexId,
    pub steps: u64,
    pub connections: usize,
    pub observers: usize,
    pub has_player: bool,
}

pub struct SessionRegistry {
    cells: DashMap<SessionId, SharedCell>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate an id, seed the session at the entrance, and run `init` on
    /// the cell before any other caller can see it.
    pub fn create_session_with<R>(
        &self,
        group_id: GroupId,
        graph: Arc<Graph>,
        init: impl FnOnce(&mut SessionCell) -> R,
    ) -> (SessionId, SharedCell, R) {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut cell = SessionCell::new(Session::new(id, group_id, graph));
        let out = init(&mut cell);
        let shared = Arc::new(Mutex::new(cell));
        let _ = self.cells.insert(id, Arc::clone(&shared));
        (id, shared, out)
    }

    pub fn create_session(&self, group_id: GroupId, graph: Arc<Graph>) -> SessionId {
        self.create_session_with(group_id, graph, |_| ()).0
    }

    /// Ids below the counter were issued once, so a miss on them means the
    /// session already ended.
    pub fn get(&self, id: SessionId) -> Result<SharedCell, MazeError> {
        if let Some(cell) = self.cells.get(&id) {
            return Ok(Arc::clone(cell.value()));
        }
        if id.get() >= 1 && id.get() < self.next_id.load(Ordering::SeqCst) {
            Err(MazeError::SessionClosed(id))
        } else {
            Err(MazeError::SessionNotFound(id))
        }
    }

    pub fn append_move(&self, id: SessionId, vertex: VertexId) -> Result<(), MazeError> {
        let cell = self.get(id)?;
        let mut cell = cell.lock();
        cell.session.append_move(vertex)
    }

    pub fn remove_session(&self, id: SessionId) -> Option<SharedCell> {
        self.cells.remove(&id).map(|(_, cell)| cell)
    }

    /// Close the session held in `cell`, cancel its remaining connections and
    /// unregister it. Returns the outcome to persist, or `None` if it was
    /// already closed. Caller holds the cell lock.
    pub fn retire(&self, cell: &mut SessionCell) -> Option<SessionOutcome> {
        if cell.session.is_closed() {
            return None;
        }
        cell.session.close();
        cell.members.close_all();
        let _ = self.remove_session(cell.session.id());
        Some(exploration::outcome_for(&cell.session, cell.flagged))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Live sessions ordered by id.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let cells: Vec<SharedCell> = self
            .cells
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut out: Vec<SessionSnapshot> = cells
            .iter()
            .filter_map(|cell| {
                let cell = cell.lock();
                if cell.session.is_closed() {
                    return None;
                }
                Some(SessionSnapshot {
                    session_id: cell.session.id(),
                    group_id: cell.session.group_id(),
                    maze_id: cell.session.maze_id(),
                    current_vertex: cell.session.current(),
                    steps: cell.session.steps(),
                    connections: cell.members.len(),
                    observers: cell.members.observer_count(),
                    has_player: cell.members.has_player(),
                })
            })
            .collect();
        out.sort_by_key(|s| s.session_id);
        out
    }
}
