use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use maze_core::{GroupId, MazeId, VertexId};
use maze_engine::Submission;

use crate::error::ApiResult;
use crate::server::AppState;

pub const MESSAGE_COMPLETED: &str = "Labirinto concluído com sucesso";

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
    pub labirinto: MazeId,
    pub grupo: GroupId,
    pub vertices: Vec<VertexId>,
}

#[derive(Debug, Serialize)]
pub struct AnswerAccepted {
    pub message: &'static str,
}

/// POST /resposta
#[instrument(skip_all, fields(group_id = %body.grupo, maze_id = %body.labirinto))]
pub async fn submit_answer(
    State(state): State<AppState>,
    Json(body): Json<AnswerBody>,
) -> ApiResult<Json<AnswerAccepted>> {
    let submission = state.validator.submit(body.grupo, body.labirinto, &body.vertices)?;
    if submission == Submission::AlreadyCompleted {
        debug!("resubmission for a completed maze");
    }
    Ok(Json(AnswerAccepted {
        message: MESSAGE_COMPLETED,
    }))
}
