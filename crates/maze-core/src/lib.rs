//! Shared domain types for the maze server: identifiers, the immutable maze
//! graph, the error taxonomy, and the traits the engine uses to reach its
//! persistence collaborators.

pub mod errors;
pub mod graph;
pub mod ids;
pub mod persistence;

pub use errors::{MazeError, PathRejection};
pub use graph::{Edge, Graph, Vertex, VertexKind};
pub use ids::{ConnectionId, GroupId, MazeId, SessionId, VertexId};
pub use persistence::{CompletionLedger, GraphSource, OutcomeSink, SessionOutcome};
