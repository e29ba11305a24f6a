//! SQLite persistence for mazes, groups, completions and session progress.

pub mod database;
pub mod error;
pub mod groups;
pub mod mazes;
pub mod progress;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
pub use groups::{GroupRepo, GroupRow};
pub use mazes::MazeRepo;
pub use progress::{ProgressRepo, ProgressRow};
