use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use maze_core::{GroupId, MazeId};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    pub nome: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedGroup {
    #[serde(rename = "GrupoId")]
    pub grupo_id: GroupId,
}

#[derive(Debug, Serialize)]
pub struct GroupDto {
    pub id: GroupId,
    pub nome: String,
    pub labirintos_concluidos: Vec<MazeId>,
}

#[derive(Debug, Serialize)]
pub struct GroupList {
    #[serde(rename = "Grupos")]
    pub grupos: Vec<GroupDto>,
}

/// POST /grupo
#[instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    Json(body): Json<CreateGroupBody>,
) -> ApiResult<Json<CreatedGroup>> {
    let name = body.nome.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Nome do grupo não pode ser vazio"));
    }
    let row = state.groups.create(name)?;
    Ok(Json(CreatedGroup { grupo_id: row.id }))
}

/// GET /grupos
#[instrument(skip_all)]
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Json<GroupList>> {
    let grupos = state
        .groups
        .list()?
        .into_iter()
        .map(|row| GroupDto {
            id: row.id,
            nome: row.name,
            labirintos_concluidos: row.completed,
        })
        .collect();
    Ok(Json(GroupList { grupos }))
}
