//! Live traversal state of one session.

use std::sync::Arc;

use maze_core::{Graph, GroupId, MazeError, MazeId, SessionId, VertexId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closed,
}

/// Current position and append-only history. Mutated only through
/// [`Session::append_move`], which the movement engine calls under the
/// session lock.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    group_id: GroupId,
    graph: Arc<Graph>,
    current: VertexId,
    history: Vec<VertexId>,
    state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, group_id: GroupId, graph: Arc<Graph>) -> Self {
        let entrance = graph.entrance();
        Self {
            id,
            group_id,
            graph,
            current: entrance,
            history: vec![entrance],
            state: SessionState::Active,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn maze_id(&self) -> MazeId {
        self.graph.maze_id()
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn current(&self) -> VertexId {
        self.current
    }

    pub fn history(&self) -> &[VertexId] {
        &self.history
    }

    /// Moves made so far: `len(history) - 1`.
    pub fn steps(&self) -> u64 {
        self.history.len().saturating_sub(1) as u64
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Record a move. Adjacency is the caller's concern; this only rejects
    /// targets outside the graph and mutations after close.
    pub fn append_move(&mut self, vertex: VertexId) -> Result<(), MazeError> {
        if self.is_closed() {
            return Err(MazeError::SessionClosed(self.id));
        }
        if !self.graph.contains(vertex) {
            return Err(MazeError::VertexNotFound {
                maze: self.maze_id(),
                vertex,
            });
        }
        self.history.push(vertex);
        self.current = vertex;
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
