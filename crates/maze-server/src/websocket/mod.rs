//! Traversal WebSocket: upgrade, per-connection reader loop and writer task.

pub mod connection;
pub mod writer;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use maze_core::{ConnectionId, GroupId, MazeId, SessionId};
use maze_engine::AttachRequest;

use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Resume an existing session instead of starting one.
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub observer: bool,
}

/// GET /ws/{group_id}/{maze_id}?session_id=&observer=
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((group_id, maze_id)): Path<(GroupId, MazeId)>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let req = AttachRequest {
        group_id,
        maze_id,
        session_id: query.session_id,
        observer: query.observer,
    };
    let connection_id = ConnectionId::new();
    ws.on_upgrade(move |socket| connection::run_connection(socket, connection_id, req, state))
}
