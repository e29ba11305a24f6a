use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use maze_engine::{GraphStore, PathValidator, TraversalEngine};
use maze_settings::ServerSettings;
use maze_store::{Database, GroupRepo, MazeRepo, ProgressRepo};

use crate::health::{self, HealthResponse};
use crate::routes::{answers, groups, mazes, sessions};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TraversalEngine>,
    pub validator: Arc<PathValidator>,
    pub mazes: MazeRepo,
    pub groups: GroupRepo,
    pub progress: ProgressRepo,
    pub settings: Arc<ServerSettings>,
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Open WebSocket connections.
    pub connections: Arc<AtomicUsize>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the repos into the engine: mazes feed the graph cache, progress
    /// receives session outcomes, groups back the completion ledger.
    pub fn new(db: Database, settings: ServerSettings) -> Self {
        let mazes = MazeRepo::new(db.clone());
        let groups = GroupRepo::new(db.clone());
        let progress = ProgressRepo::new(db);

        let graphs = Arc::new(GraphStore::new(Arc::new(mazes.clone())));
        let engine = TraversalEngine::new(Arc::clone(&graphs), Arc::new(progress.clone()));
        let validator = PathValidator::new(graphs, Arc::new(groups.clone()));

        Self {
            engine: Arc::new(engine),
            validator: Arc::new(validator),
            mazes,
            groups,
            progress,
            settings: Arc::new(settings),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            connections: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/grupo", post(groups::create_group))
        .route("/grupos", get(groups::list_groups))
        .route("/labirinto", post(mazes::create_maze))
        .route("/labirintos/{grupo_id}", get(mazes::list_progress))
        .route("/generate-websocket", post(sessions::generate_websocket))
        .route("/generate-websocket/", post(sessions::generate_websocket))
        .route("/resposta", post(answers::submit_answer))
        .route("/sessoes", get(sessions::list_sessions))
        .route("/ws/{group_id}/{maze_id}", get(websocket::ws_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind, serve in the background and return a handle.
///
/// With `port = 0` the OS picks the port; the bound port is written back
/// into the settings so generated links point at it.
pub async fn start(mut settings: ServerSettings, db: Database) -> Result<ServerHandle, std::io::Error> {
    let listener = tokio::net::TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    let addr = listener.local_addr()?;
    settings.port = addr.port();

    let state = AppState::new(db, settings);
    let router = build_router(state.clone());
    let token = state.shutdown.token();

    info!(%addr, "maze server started");

    let server = tokio::spawn(async move {
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await });
        if let Err(e) = serve.await {
            error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        addr,
        state,
        server,
    })
}

/// Keeps the server task alive; drop or shut down to stop it.
pub struct ServerHandle {
    pub addr: SocketAddr,
    state: AppState,
    server: JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Resolves when the server task exits.
    pub async fn wait(&mut self) {
        if let Err(e) = (&mut self.server).await {
            error!(error = %e, "server task failed");
        }
    }

    /// Cancel every connection and stop accepting, waiting up to `timeout`.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        let Self { state, server, .. } = self;
        state.shutdown.graceful_shutdown(vec![server], timeout).await;
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.connection_count(),
        state.engine.active_sessions(),
    ))
}
