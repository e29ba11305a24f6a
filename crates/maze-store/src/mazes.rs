use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::instrument;

use maze_core::{Edge, Graph, GraphSource, MazeError, MazeId, Vertex, VertexId, VertexKind};

use crate::database::Database;
use crate::error::StoreError;

#[derive(Clone)]
pub struct MazeRepo {
    db: Database,
}

impl MazeRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a validated graph under a freshly allocated maze id. The id
    /// carried by `graph` is ignored.
    #[instrument(skip(self, graph), fields(vertices = graph.vertex_count(), edges = graph.edge_count()))]
    pub fn create(&self, graph: &Graph, difficulty: &str) -> Result<MazeId, StoreError> {
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO mazes (entrance, difficulty, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![graph.entrance().get(), difficulty, Utc::now().to_rfc3339()],
            )?;
            let maze_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO vertices (maze_id, id, kind, seq) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (seq, vertex) in graph.vertices().iter().enumerate() {
                    stmt.execute(rusqlite::params![
                        maze_id,
                        vertex.id.get(),
                        vertex.kind.code(),
                        seq as i64
                    ])?;
                }

                let mut stmt = tx.prepare(
                    "INSERT INTO edges (maze_id, origin, dest, weight, seq) VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (seq, edge) in graph.edges().enumerate() {
                    stmt.execute(rusqlite::params![
                        maze_id,
                        edge.origin.get(),
                        edge.dest.get(),
                        edge.weight,
                        seq as i64
                    ])?;
                }
            }

            tracing::info!(maze_id, "maze created");
            Ok(MazeId::new(maze_id))
        })
    }

    /// Rebuild the graph for `id`, `Ok(None)` when no such maze exists.
    #[instrument(skip(self), fields(maze_id = %id))]
    pub fn load(&self, id: MazeId) -> Result<Option<Graph>, StoreError> {
        self.db.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT id FROM mazes WHERE id = ?1", [id.get()], |row| row.get(0))
                .optional()?;
            if found.is_none() {
                return Ok(None);
            }

            let mut stmt =
                conn.prepare("SELECT id, kind FROM vertices WHERE maze_id = ?1 ORDER BY seq")?;
            let raw_vertices = stmt
                .query_map([id.get()], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u8>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            let vertices = raw_vertices
                .into_iter()
                .map(|(vid, code)| {
                    VertexKind::from_code(code)
                        .map(|kind| Vertex {
                            id: VertexId::new(vid),
                            kind,
                        })
                        .ok_or_else(|| StoreError::CorruptRow {
                            table: "vertices",
                            detail: format!("vertex {vid} has unknown kind {code}"),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT origin, dest, weight FROM edges WHERE maze_id = ?1 ORDER BY seq",
            )?;
            let edges = stmt
                .query_map([id.get()], |row| {
                    Ok(Edge {
                        origin: VertexId::new(row.get(0)?),
                        dest: VertexId::new(row.get(1)?),
                        weight: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Graph::new(id, vertices, edges)
                .map(Some)
                .map_err(|e| StoreError::CorruptRow {
                    table: "mazes",
                    detail: e.to_string(),
                })
        })
    }
}

impl GraphSource for MazeRepo {
    fn load_graph(&self, maze_id: MazeId) -> Result<Graph, MazeError> {
        self.load(maze_id)?
            .ok_or(MazeError::GraphNotFound(maze_id))
    }
}
