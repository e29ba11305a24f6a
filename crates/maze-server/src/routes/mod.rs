//! HTTP handlers for the group, maze, answer and session surfaces.
//!
//! JSON field names are kept as existing clients send and read them.

pub mod answers;
pub mod groups;
pub mod mazes;
pub mod sessions;
