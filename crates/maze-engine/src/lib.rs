//! # maze-engine
//!
//! Session and traversal core: graph cache, session arena, movement rules,
//! per-session broadcast, path validation and exploration metrics.

#![deny(unsafe_code)]

pub mod engine;
pub mod exploration;
pub mod graph_store;
pub mod hub;
pub mod movement;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod validator;

pub use engine::{AttachRequest, Attached, TraversalEngine};
pub use graph_store::GraphStore;
pub use hub::{Outbox, Role};
pub use registry::{SessionRegistry, SessionSnapshot};
pub use session::{Session, SessionState};
pub use validator::{PathValidator, Submission};
