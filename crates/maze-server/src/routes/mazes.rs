use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use maze_core::{Edge, Graph, GroupId, MazeError, MazeId, Vertex, VertexId, VertexKind};

use crate::error::{ApiError, ApiResult, DETAIL_GROUP_NOT_FOUND};
use crate::server::AppState;

#[derive(Clone, Debug, Deserialize)]
pub struct VertexDefinition {
    pub id: i64,
    /// Accepted for compatibility; the stored maze gets a fresh id.
    #[serde(rename = "labirintoId", default)]
    pub labirinto_id: Option<i64>,
    pub tipo: u8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EdgeDefinition {
    #[serde(rename = "origemId")]
    pub origem_id: i64,
    #[serde(rename = "destinoId")]
    pub destino_id: i64,
    pub peso: i64,
}

/// Maze as posted to `/labirinto` and read by `maze check-maze`.
#[derive(Clone, Debug, Deserialize)]
pub struct MazeDefinition {
    #[serde(rename = "labirintoId", default)]
    pub labirinto_id: Option<i64>,
    pub vertices: Vec<VertexDefinition>,
    pub arestas: Vec<EdgeDefinition>,
    pub entrada: i64,
    #[serde(default)]
    pub dificuldade: String,
}

impl MazeDefinition {
    /// Build and validate the graph. `entrada` must name the Entrance vertex.
    pub fn to_graph(&self) -> Result<Graph, MazeError> {
        let vertices = self
            .vertices
            .iter()
            .map(|v| {
                VertexKind::from_code(v.tipo)
                    .map(|kind| Vertex {
                        id: VertexId::new(v.id),
                        kind,
                    })
                    .ok_or_else(|| {
                        MazeError::InvalidGraph(format!("vertex {} has unknown kind {}", v.id, v.tipo))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let edges = self
            .arestas
            .iter()
            .map(|a| {
                let weight = u32::try_from(a.peso).map_err(|_| {
                    MazeError::InvalidGraph(format!(
                        "edge {} -> {} has out-of-range weight {}",
                        a.origem_id, a.destino_id, a.peso
                    ))
                })?;
                Ok(Edge {
                    origin: VertexId::new(a.origem_id),
                    dest: VertexId::new(a.destino_id),
                    weight,
                })
            })
            .collect::<Result<Vec<_>, MazeError>>()?;

        let graph = Graph::new(MazeId::new(self.labirinto_id.unwrap_or(0)), vertices, edges)?;
        if graph.entrance() != VertexId::new(self.entrada) {
            return Err(MazeError::InvalidGraph(format!(
                "entrada {} is not the entrance vertex {}",
                self.entrada,
                graph.entrance()
            )));
        }
        Ok(graph)
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedMaze {
    #[serde(rename = "LabirintoId")]
    pub labirinto_id: MazeId,
}

#[derive(Debug, Serialize)]
pub struct MazeProgressDto {
    #[serde(rename = "LabirintoId")]
    pub labirinto_id: MazeId,
    #[serde(rename = "Dificuldade")]
    pub dificuldade: String,
    #[serde(rename = "Completo")]
    pub completo: bool,
    #[serde(rename = "Passos")]
    pub passos: u64,
    #[serde(rename = "Exploracao")]
    pub exploracao: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MazeProgressList {
    pub labirintos: Vec<MazeProgressDto>,
}

/// POST /labirinto
#[instrument(skip_all, fields(vertices = body.vertices.len(), edges = body.arestas.len()))]
pub async fn create_maze(
    State(state): State<AppState>,
    Json(body): Json<MazeDefinition>,
) -> ApiResult<Json<CreatedMaze>> {
    let graph = body.to_graph()?;
    let unreachable = graph.unreachable_from_entrance();
    if !unreachable.is_empty() {
        info!(count = unreachable.len(), "maze has vertices unreachable from the entrance");
    }
    let labirinto_id = state.mazes.create(&graph, &body.dificuldade)?;
    Ok(Json(CreatedMaze { labirinto_id }))
}

/// GET /labirintos/{grupo_id}
#[instrument(skip_all, fields(group_id = %group_id))]
pub async fn list_progress(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
) -> ApiResult<Json<MazeProgressList>> {
    if !state.groups.exists(group_id)? {
        return Err(ApiError::not_found(DETAIL_GROUP_NOT_FOUND));
    }
    let labirintos = state
        .progress
        .list_for_group(group_id)?
        .into_iter()
        .map(|row| MazeProgressDto {
            labirinto_id: row.maze_id,
            dificuldade: row.difficulty,
            completo: row.completed,
            passos: row.steps,
            exploracao: row.exploration,
        })
        .collect();
    Ok(Json(MazeProgressList { labirintos }))
}
