//! Offline check of submitted solution paths.

use std::sync::Arc;

use tracing::{info, instrument};

use maze_core::{CompletionLedger, Graph, GroupId, MazeError, MazeId, PathRejection, VertexId};

use crate::graph_store::GraphStore;

/// Walk `path` over `graph`, stopping at the first violation.
pub fn validate(graph: &Graph, path: &[VertexId]) -> Result<(), PathRejection> {
    let (first, last) = match (path.first(), path.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(PathRejection::Empty),
    };
    if first != graph.entrance() {
        return Err(PathRejection::WrongStart {
            expected: graph.entrance(),
            found: first,
        });
    }
    if !graph.is_exit(last) {
        return Err(PathRejection::NotAnExit { found: last });
    }
    for pair in path.windows(2) {
        if !graph.has_edge(pair[0], pair[1]) {
            return Err(PathRejection::MissingEdge {
                from: pair[0],
                to: pair[1],
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Path accepted; the maze joined the group's completed set.
    Completed,
    /// Maze was already completed; the path was not checked.
    AlreadyCompleted,
}

pub struct PathValidator {
    graphs: Arc<GraphStore>,
    ledger: Arc<dyn CompletionLedger>,
}

impl PathValidator {
    pub fn new(graphs: Arc<GraphStore>, ledger: Arc<dyn CompletionLedger>) -> Self {
        Self { graphs, ledger }
    }

    pub fn validate(&self, maze_id: MazeId, path: &[VertexId]) -> Result<(), MazeError> {
        let graph = self.graphs.load(maze_id)?;
        validate(&graph, path).map_err(MazeError::PathRejected)
    }

    /// Check and record a group's answer for a maze.
    #[instrument(skip(self, path), fields(group_id = %group_id, maze_id = %maze_id, len = path.len()))]
    pub fn submit(
        &self,
        group_id: GroupId,
        maze_id: MazeId,
        path: &[VertexId],
    ) -> Result<Submission, MazeError> {
        if !self.ledger.group_exists(group_id)? {
            return Err(MazeError::GroupNotFound(group_id));
        }
        let graph = self.graphs.load(maze_id)?;
        if self.ledger.is_completed(group_id, maze_id)? {
            info!("maze already completed, skipping validation");
            return Ok(Submission::AlreadyCompleted);
        }
        validate(&graph, path).map_err(MazeError::PathRejected)?;
        if self.ledger.mark_completed(group_id, maze_id)? {
            info!("maze completed");
            Ok(Submission::Completed)
        } else {
            Ok(Submission::AlreadyCompleted)
        }
    }
}
