use std::fmt;

use crate::ids::{GroupId, MazeId, SessionId, VertexId};

/// Why a submitted path was not accepted. Only the first violation is reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    WrongStart { expected: VertexId, found: VertexId },
    NotAnExit { found: VertexId },
    MissingEdge { from: VertexId, to: VertexId },
}

impl PathRejection {
    /// The consecutive pair that broke the walk, when the failure is an edge check.
    pub fn offending_pair(&self) -> Option<(VertexId, VertexId)> {
        match self {
            Self::MissingEdge { from, to } => Some((*from, *to)),
            _ => None,
        }
    }
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("path is empty"),
            Self::WrongStart { expected, found } => {
                write!(f, "path starts at {found}, expected entrance {expected}")
            }
            Self::NotAnExit { found } => write!(f, "path ends at {found}, which is not an exit"),
            Self::MissingEdge { from, to } => write!(f, "no edge from {from} to {to}"),
        }
    }
}

/// Error taxonomy shared by the graph store, session engine and validator.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MazeError {
    #[error("maze {0} not found")]
    GraphNotFound(MazeId),
    #[error("vertex {vertex} not found in maze {maze}")]
    VertexNotFound { maze: MazeId, vertex: VertexId },
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
    #[error("group {0} not found")]
    GroupNotFound(GroupId),
    #[error("only the player may move")]
    IllegalRole,
    #[error("vertex {to} is not adjacent to {from}")]
    InvalidMove { from: VertexId, to: VertexId },
    #[error("malformed command: {0}")]
    MalformedCommand(String),
    #[error("path rejected: {0}")]
    PathRejected(PathRejection),
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    #[error("internal inconsistency: {0}")]
    Inconsistent(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl MazeError {
    /// Reported to the requester only; the session carries on untouched.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::IllegalRole | Self::InvalidMove { .. } | Self::MalformedCommand(_)
        )
    }

    /// Ends the requesting connection's interaction with its session.
    pub fn terminates_connection(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_) | Self::SessionClosed(_) | Self::GraphNotFound(_)
        )
    }

    /// Closes the whole session and flags its metrics record.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, Self::VertexNotFound { .. } | Self::Inconsistent(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::GraphNotFound(_) => "graph_not_found",
            Self::VertexNotFound { .. } => "vertex_not_found",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionClosed(_) => "session_closed",
            Self::GroupNotFound(_) => "group_not_found",
            Self::IllegalRole => "illegal_role",
            Self::InvalidMove { .. } => "invalid_move",
            Self::MalformedCommand(_) => "malformed_command",
            Self::PathRejected(_) => "path_rejected",
            Self::InvalidGraph(_) => "invalid_graph",
            Self::Inconsistent(_) => "inconsistent",
            Self::Storage(_) => "storage",
        }
    }
}
