//! HTTP error responses.
//!
//! Bodies follow the `{"detail": "..."}` shape existing clients parse.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use maze_core::{MazeError, PathRejection};
use maze_store::StoreError;

pub const DETAIL_GROUP_NOT_FOUND: &str = "Grupo não encontrado";
pub const DETAIL_MAZE_NOT_FOUND: &str = "Labirinto não encontrado";
pub const DETAIL_NOT_COMPLETED: &str = "Labirinto não foi concluído";

#[derive(Debug, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Erro interno".into(),
        }
    }
}

/// Client-facing wording for a rejected answer.
pub fn rejection_detail(rejection: &PathRejection) -> String {
    match rejection {
        PathRejection::MissingEdge { from, to } => {
            format!("Caminho inválido: vértices {from} e {to} não estão conectados")
        }
        PathRejection::Empty | PathRejection::WrongStart { .. } | PathRejection::NotAnExit { .. } => {
            DETAIL_NOT_COMPLETED.to_string()
        }
    }
}

impl From<MazeError> for ApiError {
    fn from(err: MazeError) -> Self {
        match err {
            MazeError::GroupNotFound(_) => Self::not_found(DETAIL_GROUP_NOT_FOUND),
            MazeError::GraphNotFound(_) => Self::not_found(DETAIL_MAZE_NOT_FOUND),
            MazeError::PathRejected(ref r) => Self::bad_request(rejection_detail(r)),
            MazeError::InvalidGraph(reason) => Self::bad_request(format!("Labirinto inválido: {reason}")),
            MazeError::Storage(_) | MazeError::Inconsistent(_) => {
                error!(error = %err, error_kind = err.error_kind(), "request failed");
                Self::internal()
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        MazeError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
