//! Move validation and application against a locked session cell.

use maze_core::{ConnectionId, MazeError, VertexId};

use crate::hub::Role;
use crate::protocol;
use crate::registry::SessionCell;
use crate::session::Session;

/// Render the "current vertex + adjacency" state line for a session.
pub fn state_message(session: &Session) -> Result<String, MazeError> {
    let graph = session.graph();
    let current = session.current();
    let vertex = graph.vertex(current).ok_or(MazeError::VertexNotFound {
        maze: session.maze_id(),
        vertex: current,
    })?;
    let adjacent = graph.adjacent_of(current)?;
    Ok(protocol::render_state(current, vertex.kind, adjacent))
}

/// Apply `requester`'s move to `target`, returning the state line to
/// broadcast. Rejections leave the session untouched.
pub fn apply_move(
    cell: &mut SessionCell,
    requester: &ConnectionId,
    target: VertexId,
) -> Result<String, MazeError> {
    if cell.members.role_of(requester) != Some(Role::Player) {
        return Err(MazeError::IllegalRole);
    }

    let session = &mut cell.session;
    let from = session.current();
    let adjacent = session.graph().adjacent_of(from)?;
    if !adjacent.iter().any(|&(dest, _)| dest == target) {
        return Err(MazeError::InvalidMove { from, to: target });
    }

    session.append_move(target)?;
    state_message(session)
}
