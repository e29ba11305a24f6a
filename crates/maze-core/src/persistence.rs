//! Collaborator seams between the engine and durable storage.

use serde::{Deserialize, Serialize};

use crate::errors::MazeError;
use crate::graph::Graph;
use crate::ids::{GroupId, MazeId, SessionId};

/// Summary handed to the metrics sink when a session finalizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub group_id: GroupId,
    pub maze_id: MazeId,
    pub session_id: SessionId,
    pub steps: u64,
    /// `None` when the ratio could not be computed (zero-vertex maze).
    pub exploration: Option<f64>,
    /// Set when the session ended on an internal-consistency failure.
    pub flagged: bool,
}

/// Source of maze graphs for the graph store cache.
pub trait GraphSource: Send + Sync {
    fn load_graph(&self, maze_id: MazeId) -> Result<Graph, MazeError>;
}

/// Receives one record per finalized session.
pub trait OutcomeSink: Send + Sync {
    fn record_session_outcome(&self, outcome: &SessionOutcome) -> Result<(), MazeError>;
}

/// Group lookup and the completed-mazes set.
pub trait CompletionLedger: Send + Sync {
    fn group_exists(&self, group_id: GroupId) -> Result<bool, MazeError>;
    fn is_completed(&self, group_id: GroupId, maze_id: MazeId) -> Result<bool, MazeError>;
    /// Union the maze into the group's set. Returns `true` when it was newly added.
    fn mark_completed(&self, group_id: GroupId, maze_id: MazeId) -> Result<bool, MazeError>;
}
