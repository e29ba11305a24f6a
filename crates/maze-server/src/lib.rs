//! # maze-server
//!
//! Axum front end: REST routes for groups, mazes and answers, plus the
//! traversal WebSocket. Owns connection lifecycle and graceful shutdown.

#![deny(unsafe_code)]

pub mod error;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use routes::mazes::MazeDefinition;
pub use server::{build_router, start, AppState, ServerHandle};
pub use shutdown::ShutdownCoordinator;
