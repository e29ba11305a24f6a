use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use maze_core::{GroupId, MazeId};
use maze_engine::SessionSnapshot;

use crate::error::{ApiError, ApiResult, DETAIL_GROUP_NOT_FOUND};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub grupo_id: GroupId,
    pub labirinto_id: MazeId,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub websocket_url: String,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessoes: Vec<SessionSnapshot>,
}

/// POST /generate-websocket
#[instrument(skip_all, fields(group_id = %body.grupo_id, maze_id = %body.labirinto_id))]
pub async fn generate_websocket(
    State(state): State<AppState>,
    Json(body): Json<LinkRequest>,
) -> ApiResult<Json<LinkResponse>> {
    if !state.groups.exists(body.grupo_id)? {
        return Err(ApiError::not_found(DETAIL_GROUP_NOT_FOUND));
    }
    // Warms the graph cache for the attach that follows.
    let entrance = state.engine.graphs().entrance_of(body.labirinto_id)?;
    debug!(%entrance, "websocket link issued");
    let websocket_url = format!(
        "{}/ws/{}/{}",
        state.settings.websocket_base(),
        body.grupo_id,
        body.labirinto_id
    );
    Ok(Json(LinkResponse { websocket_url }))
}

/// GET /sessoes
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    Json(SessionList {
        sessoes: state.engine.snapshot(),
    })
}
